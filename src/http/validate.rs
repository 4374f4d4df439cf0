//! Field-level request validation. Collects every problem before rejecting
//! so clients can show all messages at once.

use email_address::EmailAddress;

use crate::http::error::{AppError, FieldErrors};

pub const USERNAME_MAX_CHARS: usize = 30;
pub const BIO_MAX_CHARS: usize = 255;
pub const NAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 5;
pub const PASSWORD_MAX_CHARS: usize = 128;
pub const POST_MAX_CHARS: usize = 2200;
pub const COMMENT_MAX_CHARS: usize = 1000;

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.entry(field).or_default().push(message.into());
    }

    pub fn not_blank(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "This field may not be blank.");
        }
    }

    pub fn max_chars(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                field,
                format!("Ensure this field has no more than {} characters.", max),
            );
        }
    }

    pub fn min_chars(&mut self, field: &'static str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.add(
                field,
                format!("Ensure this field has at least {} characters.", min),
            );
        }
    }

    pub fn email(&mut self, field: &'static str, value: &str) {
        if !EmailAddress::is_valid(value) {
            self.add(field, "Enter a valid email address.");
        }
    }

    pub fn username(&mut self, field: &'static str, value: &str) {
        self.not_blank(field, value);
        self.max_chars(field, value, USERNAME_MAX_CHARS);
        if !value
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
        {
            self.add(
                field,
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
    }

    pub fn password(&mut self, field: &'static str, value: &str) {
        self.min_chars(field, value, PASSWORD_MIN_CHARS);
        self.max_chars(field, value, PASSWORD_MAX_CHARS);
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(self.errors))
        }
    }
}

/// Emails are stored lowercased so uniqueness and login agree on identity.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn accepts_valid_input() {
        let mut v = Validator::new();
        v.username("username", "john.smith_1");
        v.email("email", "john@example.com");
        v.password("password", "secret");
        assert!(v.finish().is_ok());
    }

    #[test]
    fn collects_every_field_error() {
        let mut v = Validator::new();
        v.username("username", "");
        v.email("email", "not-an-email");
        v.password("password", "abc");
        v.max_chars("bio", &"x".repeat(BIO_MAX_CHARS + 1), BIO_MAX_CHARS);

        let err = v.finish().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rejects_usernames_with_spaces_or_overflow() {
        let mut v = Validator::new();
        v.username("username", "john smith");
        assert!(v.finish().is_err());

        let mut v = Validator::new();
        v.username("username", &"a".repeat(USERNAME_MAX_CHARS + 1));
        assert!(v.finish().is_err());
    }

    #[test]
    fn email_shapes() {
        for good in ["a@b.co", "first.last+tag@mail.example.org"] {
            let mut v = Validator::new();
            v.email("email", good);
            assert!(v.finish().is_ok(), "{good}");
        }
        for bad in ["not-an-email", "@b.co", "a@@b.co", "a b@c.co"] {
            let mut v = Validator::new();
            v.email("email", bad);
            assert!(v.finish().is_err(), "{bad}");
        }
    }

    #[test]
    fn normalizes_email_case_and_padding() {
        assert_eq!(normalize_email("  John.Smith@Example.COM "), "john.smith@example.com");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let mut v = Validator::new();
        v.max_chars("content", &"é".repeat(COMMENT_MAX_CHARS), COMMENT_MAX_CHARS);
        assert!(v.finish().is_ok());
    }
}
