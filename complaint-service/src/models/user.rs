//! User accounts as stored in the `users` collection.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Department;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    User,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "superAdmin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored user record. `password` holds the argon2 PHC string, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    pub post_code: String,
    pub thana: String,
    pub district: String,
    pub division: String,
    pub address: String,
    pub role: UserRole,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_img: Option<String>,
    #[serde(
        default,
        with = "super::optional_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Profile data for a new account; the password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub designation: Option<String>,
    pub department: Option<Department>,
    pub post_code: String,
    pub thana: String,
    pub district: String,
    pub division: String,
    pub address: String,
    pub role: UserRole,
    pub profile_img: Option<String>,
}

impl User {
    pub fn new(profile: NewUser, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email.trim().to_lowercase(),
            password: password_hash,
            phone: profile.phone,
            designation: profile.designation,
            department: profile.department,
            post_code: profile.post_code,
            thana: profile.thana,
            district: profile.district,
            division: profile.division,
            address: profile.address,
            role: profile.role,
            is_deleted: false,
            is_banned: false,
            profile_img: profile.profile_img,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn public_view(&self) -> PublicUser {
        PublicUser::from(self)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// Minimal identity returned alongside a fresh session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            phone: user.phone.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// User record without credential material, for profile endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    pub post_code: String,
    pub thana: String,
    pub district: String,
    pub division: String,
    pub address: String,
    pub role: UserRole,
    pub is_banned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_img: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            designation: user.designation.clone(),
            department: user.department,
            post_code: user.post_code.clone(),
            thana: user.thana.clone(),
            district: user.district.clone(),
            division: user.division.clone(),
            address: user.address.clone(),
            role: user.role,
            is_banned: user.is_banned,
            profile_img: user.profile_img.clone(),
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    fn sample() -> User {
        User::new(
            NewUser {
                first_name: "Rahim".into(),
                last_name: "Uddin".into(),
                email: " Rahim@Example.com ".into(),
                phone: "01700000000".into(),
                designation: None,
                department: None,
                post_code: "1207".into(),
                thana: "Mohammadpur".into(),
                district: "Dhaka".into(),
                division: "Dhaka".into(),
                address: "House 1, Road 2, Block C".into(),
                role: UserRole::User,
                profile_img: None,
            },
            "$argon2id$v=19$m=8,t=1,p=1$c2FsdA$aGFzaA".into(),
        )
    }

    #[test]
    fn new_user_normalizes_email() {
        assert_eq!(sample().email, "rahim@example.com");
    }

    #[test]
    fn role_uses_camel_case_wire_names() {
        assert_eq!(
            serde_json::to_value(UserRole::SuperAdmin).unwrap(),
            serde_json::json!("superAdmin")
        );
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }

    #[test]
    fn stored_document_uses_camel_case_keys_and_bson_dates() {
        let mut user = sample();
        user.password_changed_at = Some(Utc::now());
        let doc = bson::to_document(&user).unwrap();

        assert!(doc.contains_key("_id"));
        assert!(doc.contains_key("firstName"));
        assert!(doc.get_datetime("createdAt").is_ok());
        assert!(doc.get_datetime("passwordChangedAt").is_ok());

        let back: User = bson::from_document(doc).unwrap();
        assert_eq!(back.email, user.email);
        assert!(back.password_changed_at.is_some());
    }

    #[test]
    fn profile_omits_password() {
        let json = serde_json::to_value(sample().profile()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "rahim@example.com");
    }
}
