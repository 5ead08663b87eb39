use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::models::{Department, NewComplaint, Priority, Visibility};

fn digits_only(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("digits_only");
        err.message = Some("Post code must contain only numbers".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateComplaintRequest {
    #[validate(length(min = 5, max = 200, message = "Title must be 5 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: String,
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: String,
    #[validate(
        length(min = 3, max = 10, message = "Post code must be 3 to 10 characters"),
        custom(function = "digits_only")
    )]
    pub post_code: String,
    #[validate(length(min = 2, max = 100))]
    pub thana: String,
    #[validate(length(min = 2, max = 100))]
    pub district: String,
    #[validate(length(min = 2, max = 100))]
    pub division: String,
    #[validate(length(min = 10, max = 500))]
    pub address: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub visibility: Visibility,
    pub department: Department,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl From<CreateComplaintRequest> for NewComplaint {
    fn from(req: CreateComplaintRequest) -> Self {
        NewComplaint {
            title: req.title,
            description: req.description,
            category: req.category,
            post_code: req.post_code,
            thana: req.thana,
            district: req.district,
            division: req.division,
            address: req.address,
            priority: req.priority,
            visibility: req.visibility,
            department: req.department,
            is_anonymous: req.is_anonymous,
        }
    }
}

/// Length and blank checks happen in the service so trimming applies first.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(post_code: &str) -> serde_json::Value {
        serde_json::json!({
            "title": "Overflowing drain",
            "description": "Drain has been overflowing for a week",
            "category": "drainage",
            "postCode": post_code,
            "thana": "Kotwali",
            "district": "Sylhet",
            "division": "Sylhet",
            "address": "Zindabazar main road, Sylhet",
            "department": "drainage"
        })
    }

    #[test]
    fn defaults_apply_to_optional_fields() {
        let req: CreateComplaintRequest = serde_json::from_value(body("3100")).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.priority, Priority::Medium);
        assert_eq!(req.visibility, Visibility::Public);
        assert!(!req.is_anonymous);
    }

    #[test]
    fn post_code_must_be_numeric() {
        let req: CreateComplaintRequest = serde_json::from_value(body("31A0")).unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("post_code"));
    }

    #[test]
    fn unknown_department_is_rejected() {
        let mut raw = body("3100");
        raw["department"] = serde_json::json!("space-agency");
        assert!(serde_json::from_value::<CreateComplaintRequest>(raw).is_err());
    }
}
