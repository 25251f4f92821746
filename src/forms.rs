//! Client-side validation for the login and signup forms.

use regex::Regex;
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    sync::LazyLock,
};

/// The shortest password a new account may have.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Name,
    Email,
    Password,
    ConfirmPassword,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
            Field::ConfirmPassword => "confirm password",
        };
        f.write_str(name)
    }
}

/// Validation messages, keyed by the field they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    fn add<S: Into<String>>(&mut self, field: Field, message: S) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field, message)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.add(Field::Password, "Password is required");
        }

        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.name.trim().is_empty() {
            errors.add(Field::Name, "Name is required");
        }
        check_email(&self.email, &mut errors);
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                Field::Password,
                format!(
                    "Password must be at least {} characters",
                    MIN_PASSWORD_LEN
                ),
            );
        }
        if self.confirm_password != self.password {
            errors.add(Field::ConfirmPassword, "Passwords do not match");
        }

        errors.into_result()
    }
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.add(Field::Email, "Email is required");
    } else if !looks_like_email(email) {
        errors.add(Field::Email, "Please enter a valid email");
    }
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\S+@\S+\.\S+").expect("Invalid email pattern")
});

/// Does the text contain something shaped like `a@b.c`? Any run of
/// non-whitespace characters counts for each part.
pub fn looks_like_email(text: &str) -> bool { EMAIL.is_match(text) }

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            name: String::from("Alice"),
            email: String::from("alice@example.com"),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn email_shapes() {
        let good = [
            "a@b.co",
            "alice@example.com",
            "x@y.z",
            "see a@b.c here",
            "a@b@c.d",
            "a@.b.c",
        ];
        let bad = ["", "alice", "alice@", "@example.com", "a@b.", "a@.b", "a @b.c"];

        for email in good.iter() {
            assert!(looks_like_email(email), "{}", email);
        }
        for email in bad.iter() {
            assert!(!looks_like_email(email), "{}", email);
        }
    }

    #[test]
    fn a_valid_login() {
        let form = LoginForm {
            email: String::from("alice@example.com"),
            password: String::from("x"),
        };

        assert_eq!(form.validate(), Ok(()));
    }

    #[test]
    fn login_needs_a_password_and_a_real_email() {
        let form = LoginForm {
            email: String::from("alice"),
            password: String::new(),
        };

        let errors = form.validate().unwrap_err();

        assert_eq!(errors.get(Field::Email), Some("Please enter a valid email"));
        assert_eq!(errors.get(Field::Password), Some("Password is required"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        let errors = signup("abc", "abc").validate().unwrap_err();

        assert_eq!(
            errors.get(Field::Password),
            Some("Password must be at least 6 characters")
        );
        assert_eq!(errors.get(Field::ConfirmPassword), None);
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let errors = signup("abcdef", "abcdeg").validate().unwrap_err();

        assert_eq!(errors.get(Field::Password), None);
        assert_eq!(
            errors.get(Field::ConfirmPassword),
            Some("Passwords do not match")
        );
    }

    #[test]
    fn a_valid_signup() {
        assert_eq!(signup("abcdef", "abcdef").validate(), Ok(()));
    }

    #[test]
    fn errors_display_in_field_order() {
        let mut form = signup("abc", "xyz");
        form.name = String::new();

        let errors = form.validate().unwrap_err();

        assert_eq!(
            errors.to_string(),
            "name: Name is required, password: Password must be at least 6 \
             characters, confirm password: Passwords do not match"
        );
    }
}
