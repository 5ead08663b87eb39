use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,

    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must be at least 6 characters long"
    ))]
    pub new_password: String,
}

/// Missing or blank email is rejected by the service with its own message.
#[derive(Debug, Deserialize)]
pub struct ForgetPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must be at least 6 characters long"
    ))]
    pub new_password: String,
}
