//! Login credential validation.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::DomainError;

const MIN_PASSWORD_CHARS: usize = 8;
const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+{}[]|:;<>,.?/";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// Email and password as submitted by a client.
#[derive(Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

pub fn validate_email(email: &str) -> Result<(), DomainError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(DomainError::validation("invalid email"))
    }
}

/// Passwords need at least eight characters including an uppercase ASCII
/// letter, a digit, and one special character.
pub fn validate_password(password: &str) -> Result<(), DomainError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_CHARS;
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if long_enough && has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(DomainError::validation("invalid password"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        for email in ["reader@example.com", "a.b+c@books.co.uk", "x_y%z@host.io"] {
            assert!(validate_email(email).is_ok(), "{email} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in ["", "plain", "@example.com", "a@b", "a@b.c", "a b@example.com"] {
            assert!(validate_email(email).is_err(), "{email} should be invalid");
        }
    }

    #[test]
    fn password_requires_every_character_class() {
        assert!(validate_password("Secret1!").is_ok());
        assert!(validate_password("Sec1!").is_err(), "too short");
        assert!(validate_password("secret1!").is_err(), "no uppercase");
        assert!(validate_password("Secret!!").is_err(), "no digit");
        assert!(validate_password("Secret11").is_err(), "no special");
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials {
            email: "reader@example.com".into(),
            password: "Secret1!".into(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("reader@example.com"));
        assert!(!rendered.contains("Secret1!"));
    }
}
