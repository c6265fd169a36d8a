use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::api::validation::validate_username;

/// `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Not a valid email address."))]
    pub email: String,
    #[validate(custom = "validate_username")]
    pub username: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters."))]
    pub password: String,
}

/// `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Not a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

/// `POST /send_reset_password_email`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Not a valid email address."))]
    pub email: String,
}

/// `POST /reset_password`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters."))]
    pub new_password: String,
}

/// `POST /confirm_email`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConfirmEmailRequest {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,
}

#[cfg(test)]
mod examples {
    use super::*;
    use crate::model::db::user::EXAMPLE_PASSWORD;

    impl RegisterRequest {
        pub fn example() -> Self {
            Self::example_named("carol")
        }

        pub fn example_named(username: &str) -> Self {
            Self {
                email: format!("{username}@example.com"),
                username: username.to_string(),
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }
    }

    impl LoginRequest {
        pub fn example_for(username: &str) -> Self {
            Self {
                email: format!("{username}@example.com"),
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }
    }
}
