use rocket::serde::json::Json;
use validator::{Validate, ValidationError};

use crate::error::Result;

/// Unwrap a JSON body, rejecting it with field-level detail if invalid.
pub fn validated<T: Validate>(data: Json<T>) -> Result<T> {
    let data = data.into_inner();
    data.validate()?;
    Ok(data)
}

/// Usernames appear in URLs, so they must be non-empty, at most 32
/// characters, and free of whitespace and slashes.
pub fn validate_username(username: &str) -> std::result::Result<(), ValidationError> {
    let length = username.chars().count();
    if length == 0 || length > 32 {
        let mut error = ValidationError::new("length");
        error.message = Some("Username must be 1-32 characters.".into());
        return Err(error);
    }
    if username
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '?' || c == '#')
    {
        let mut error = ValidationError::new("username");
        error.message = Some("Username must not contain whitespace, '/', '?' or '#'.".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("ålice_99").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("a/b").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
        assert!(validate_username(&"x".repeat(32)).is_ok());
    }
}
