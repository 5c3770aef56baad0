// session-store/src/forms.rs
//! Checks the auth forms apply before calling the store. The authority stays
//! the judge of what it accepts.

use common::looks_like_email;
use thiserror::Error;

/// Minimum password length asked for on sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, FormError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(FormError::Missing(field))
    } else {
        Ok(trimmed)
    }
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), FormError> {
        let email = require(&self.email, "Email")?;
        if self.password.is_empty() {
            return Err(FormError::Missing("Password"));
        }
        if !looks_like_email(email) {
            return Err(FormError::InvalidEmail);
        }
        Ok(())
    }
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require(&self.display_name, "Full name")?;
        let email = require(&self.email, "Email")?;
        if self.password.is_empty() {
            return Err(FormError::Missing("Password"));
        }
        if !looks_like_email(email) {
            return Err(FormError::InvalidEmail);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up(display_name: &str, email: &str, password: &str) -> SignUpForm {
        SignUpForm {
            display_name: display_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_sign_up_validation_order() {
        assert_eq!(
            sign_up(" ", "ann@example.com", "secret1").validate(),
            Err(FormError::Missing("Full name"))
        );
        assert_eq!(sign_up("Ann", "", "secret1").validate(), Err(FormError::Missing("Email")));
        assert_eq!(
            sign_up("Ann", "ann@example.com", "").validate(),
            Err(FormError::Missing("Password"))
        );
        assert_eq!(
            sign_up("Ann", "not-an-email", "secret1").validate(),
            Err(FormError::InvalidEmail)
        );
        assert_eq!(
            sign_up("Ann", "ann@example.com", "12345").validate(),
            Err(FormError::PasswordTooShort(6))
        );
        assert_eq!(sign_up("Ann", " ann@example.com ", "secret1").validate(), Ok(()));
    }

    #[test]
    fn test_sign_in_has_no_length_policy() {
        let form = SignInForm {
            email: "ann@example.com".to_string(),
            password: "x".to_string(),
        };
        assert_eq!(form.validate(), Ok(()));
        assert_eq!(
            SignInForm::default().validate(),
            Err(FormError::Missing("Email"))
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(FormError::PasswordTooShort(6).to_string(), "Password must be at least 6 characters");
        assert_eq!(FormError::Missing("Email").to_string(), "Email is required");
    }
}
