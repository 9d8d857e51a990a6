//! Login and signup form validation.
//!
//! Forms arrive as raw strings from HTML posts. Validation turns them into
//! typed values or a list of per-field errors suitable for re-rendering the
//! form.

use std::fmt;

use secrecy::SecretString;
use serde::Deserialize;

use super::email::{Email, EmailError};

const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 50;
const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;

/// A validation failure on a single form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Form field name.
    pub field: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// All validation failures of a form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// First message recorded for a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == name)
            .map(|e| e.message.as_str())
    }

    /// All recorded errors, in field order.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for FormErrors {}

/// Raw login form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Validated login credentials.
#[derive(Debug)]
pub struct ValidLogin {
    pub email: Email,
    pub password: SecretString,
}

impl LoginForm {
    /// Validate the submission.
    ///
    /// # Errors
    ///
    /// Returns every failing field: missing or malformed email, missing
    /// password or one shorter than 6 characters.
    pub fn validate(&self) -> Result<ValidLogin, FormErrors> {
        let mut errors = FormErrors::default();

        let email = check_email(&self.email, &mut errors);

        if self.password.is_empty() {
            errors.push("password", "Password is required");
        } else if self.password.chars().count() < PASSWORD_MIN {
            errors.push(
                "password",
                format!("Password must be at least {PASSWORD_MIN} characters"),
            );
        }

        match email {
            Some(email) if errors.is_empty() => Ok(ValidLogin {
                email,
                password: SecretString::from(self.password.clone()),
            }),
            _ => Err(errors),
        }
    }
}

/// Raw signup form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Validated signup data. The confirmation field is dropped.
#[derive(Debug)]
pub struct ValidRegistration {
    pub name: String,
    pub email: Email,
    pub password: SecretString,
}

impl RegisterForm {
    /// Validate the submission.
    ///
    /// # Errors
    ///
    /// Returns every failing field: name outside 2-100 characters, missing
    /// or malformed email, password outside 6-50 characters, missing or
    /// mismatched confirmation.
    pub fn validate(&self) -> Result<ValidRegistration, FormErrors> {
        let mut errors = FormErrors::default();

        let name = self.name.trim();
        let name_len = name.chars().count();
        if name.is_empty() {
            errors.push("name", "Name is required");
        } else if name_len < NAME_MIN {
            errors.push("name", format!("Name must be at least {NAME_MIN} characters"));
        } else if name_len > NAME_MAX {
            errors.push("name", format!("Name must be at most {NAME_MAX} characters"));
        }

        let email = check_email(&self.email, &mut errors);

        let password_len = self.password.chars().count();
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        } else if password_len < PASSWORD_MIN {
            errors.push(
                "password",
                format!("Password must be at least {PASSWORD_MIN} characters"),
            );
        } else if password_len > PASSWORD_MAX {
            errors.push(
                "password",
                format!("Password must be at most {PASSWORD_MAX} characters"),
            );
        }

        if self.confirm_password.is_empty() {
            errors.push("confirm_password", "Password confirmation is required");
        } else if self.confirm_password != self.password {
            errors.push("confirm_password", "Passwords do not match");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(ValidRegistration {
                name: name.to_owned(),
                email,
                password: SecretString::from(self.password.clone()),
            }),
            _ => Err(errors),
        }
    }
}

fn check_email(raw: &str, errors: &mut FormErrors) -> Option<Email> {
    match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(EmailError::Empty) => {
            errors.push("email", "Email is required");
            None
        }
        Err(e) => {
            errors.push("email", e.to_string());
            None
        }
    }
}
