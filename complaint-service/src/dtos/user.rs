use serde::Deserialize;
use validator::Validate;

use crate::models::{Department, NewUser, UserRole};
use crate::services::UserPatch;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must be at least 6 characters long"
    ))]
    pub password: String,
    #[validate(length(min = 11, max = 15))]
    pub phone: String,
    #[validate(length(max = 100))]
    pub designation: Option<String>,
    pub department: Option<Department>,
    #[validate(length(min = 1, message = "Post code is required"))]
    pub post_code: String,
    #[validate(length(min = 2, max = 100))]
    pub thana: String,
    #[validate(length(min = 2, max = 100))]
    pub district: String,
    #[validate(length(min = 2, max = 100))]
    pub division: String,
    #[validate(length(min = 10, max = 200))]
    pub address: String,
    pub profile_img: Option<String>,
}

impl SignupRequest {
    /// Profile plus the plaintext password, which the service hashes.
    pub fn into_parts(self) -> (NewUser, String) {
        let profile = NewUser {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            designation: self.designation,
            department: self.department,
            post_code: self.post_code,
            thana: self.thana,
            district: self.district,
            division: self.division,
            address: self.address,
            role: UserRole::User,
            profile_img: self.profile_img,
        };
        (profile, self.password)
    }
}

/// Self-service profile edit.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 11, max = 15))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub designation: Option<String>,
    pub post_code: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub thana: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub district: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub division: Option<String>,
    #[validate(length(min = 10, max = 200))]
    pub address: Option<String>,
    pub profile_img: Option<String>,
}

impl From<UpdateProfileRequest> for UserPatch {
    fn from(req: UpdateProfileRequest) -> Self {
        UserPatch {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            designation: req.designation,
            post_code: req.post_code,
            thana: req.thana,
            district: req.district,
            division: req.division,
            address: req.address,
            profile_img: req.profile_img,
            ..Default::default()
        }
    }
}

/// Administrative edit: profile fields plus role, department, ban flag and
/// an optional new password.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: UpdateProfileRequest,
    pub department: Option<Department>,
    pub role: Option<UserRole>,
    pub is_banned: Option<bool>,
    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must be at least 6 characters long"
    ))]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn into_parts(self) -> (UserPatch, Option<String>) {
        let patch = UserPatch {
            department: self.department,
            role: self.role,
            is_banned: self.is_banned,
            ..UserPatch::from(self.profile)
        };
        (patch, self.password)
    }
}
