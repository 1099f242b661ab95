use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// Single source of truth for the input rules; the messages are part of the
// public API surface and asserted by clients.
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const NAME_MIN_LENGTH: usize = 3;
pub const PASSWORD_SYMBOLS: &str = "@$!%*#?&";

pub const EMAIL_MESSAGE: &str = "Invalid email format";
pub const NAME_MESSAGE: &str = "Name must be at least 3 characters";
pub const PASSWORD_MESSAGE: &str = "Password must be at least 8 characters with at least 1 letter, 1 number, and 1 special character (@$!%*#?&)";
pub const PASSWORD_REQUIRED_MESSAGE: &str = "Password is required";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Signup strength rule: length, one letter, one digit, one symbol from the
/// allowed set, nothing outside `[A-Za-z0-9@$!%*#?&]`.
pub(crate) fn is_strong_password(password: &str) -> bool {
    password.len() >= PASSWORD_MIN_LENGTH
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c))
}

/// Normalize-then-validate, applied by the `ValidJson` extractor before a
/// handler ever sees the payload.
pub trait ValidateDto {
    fn normalize(&mut self);
    fn validate(&self) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl ValidateDto for SignupRequest {
    fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
        self.name = self.name.trim().to_string();
    }

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if !is_valid_email(&self.email) {
            errors.push(EMAIL_MESSAGE.to_string());
        }
        if self.name.chars().count() < NAME_MIN_LENGTH {
            errors.push(NAME_MESSAGE.to_string());
        }
        if !is_strong_password(&self.password) {
            errors.push(PASSWORD_MESSAGE.to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

impl ValidateDto for SigninRequest {
    fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
    }

    // Existing accounts may predate the strength rule, so signin only
    // requires a non-empty password.
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if !is_valid_email(&self.email) {
            errors.push(EMAIL_MESSAGE.to_string());
        }
        if self.password.is_empty() {
            errors.push(PASSWORD_REQUIRED_MESSAGE.to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// Public part of the user returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<&crate::db::User> for PublicUser {
    fn from(user: &crate::db::User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
