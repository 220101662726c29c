use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::dto::RegisterRequest;
use crate::error::ValidationError;

const NAME_MAX_LEN: usize = 150;
const EMAIL_MAX_LEN: usize = 254;
const PASSWORD_MIN_LEN: usize = 8;
const RESERVED_USERNAME: &str = "me";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() || username.chars().count() > NAME_MAX_LEN {
        return Err(ValidationError::field(
            "username",
            format!("must be between 1 and {NAME_MAX_LEN} characters"),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::field(
            "username",
            "may contain only letters, digits and @/./+/-/_",
        ));
    }
    if username.eq_ignore_ascii_case(RESERVED_USERNAME) {
        return Err(ValidationError::field(
            "username",
            format!("\"{username}\" is not available"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ValidationError::field(
            "password",
            format!("must be at least {PASSWORD_MIN_LEN} characters"),
        ));
    }
    Ok(())
}

/// Normalizes and checks a registration payload in place.
pub(crate) fn validate_registration(payload: &mut RegisterRequest) -> Result<(), ValidationError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();
    payload.first_name = payload.first_name.trim().to_string();
    payload.last_name = payload.last_name.trim().to_string();

    if payload.email.len() > EMAIL_MAX_LEN || !is_valid_email(&payload.email) {
        return Err(ValidationError::field("email", "invalid email"));
    }
    validate_username(&payload.username)?;
    for (field, value) in [
        ("first_name", &payload.first_name),
        ("last_name", &payload.last_name),
    ] {
        if value.is_empty() || value.chars().count() > NAME_MAX_LEN {
            return Err(ValidationError::field(
                field,
                format!("must be between 1 and {NAME_MAX_LEN} characters"),
            ));
        }
    }
    validate_password(&payload.password)
}
