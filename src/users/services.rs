use lazy_static::lazy_static;
use regex::Regex;

use super::dto::UserRequest;
use crate::error::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_NAME_LEN: usize = 255;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const BLANK: &str = "This field may not be blank.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are compared and stored lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validated user fields; `None` means "not supplied".
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Validates a user payload. With `require_all` every field must be present
/// (signup, PUT); otherwise only supplied fields are checked (PATCH).
pub fn validate_user(input: UserRequest, require_all: bool) -> Result<UserChanges, FieldErrors> {
    let mut errors = FieldErrors::new();

    let email = match input.email {
        Some(raw) => {
            let email = normalize_email(&raw);
            if email.is_empty() {
                errors.add("email", BLANK);
            } else if !is_valid_email(&email) {
                errors.add("email", "Enter a valid email address.");
            } else if email.len() > MAX_NAME_LEN {
                errors.add("email", format!("Ensure this field has no more than {MAX_NAME_LEN} characters."));
            }
            Some(email)
        }
        None => {
            if require_all {
                errors.add("email", REQUIRED);
            }
            None
        }
    };

    let password = match input.password {
        Some(p) => {
            if p.is_empty() {
                errors.add("password", BLANK);
            } else if p.chars().count() < MIN_PASSWORD_LEN {
                errors.add(
                    "password",
                    format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
                );
            }
            Some(p)
        }
        None => {
            if require_all {
                errors.add("password", REQUIRED);
            }
            None
        }
    };

    let name = match input.name {
        Some(n) => {
            let n = n.trim().to_string();
            if n.is_empty() {
                errors.add("name", BLANK);
            } else if n.chars().count() > MAX_NAME_LEN {
                errors.add("name", format!("Ensure this field has no more than {MAX_NAME_LEN} characters."));
            }
            Some(n)
        }
        None => {
            if require_all {
                errors.add("name", REQUIRED);
            }
            None
        }
    };

    if errors.is_empty() {
        Ok(UserChanges {
            email,
            name,
            password,
        })
    } else {
        Err(errors)
    }
}
