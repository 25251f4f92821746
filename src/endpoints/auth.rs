use super::{Mutation, Operation};
use crate::{credentials::User, transport::Request};
use serde_derive::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{self, Debug, Formatter};

/// Exchange an email and password for a bearer token.
#[derive(Debug, Copy, Clone)]
pub struct Login;

impl Operation for Login {
    const NAME: &'static str = "login";

    type Args = LoginArgs;
    type Output = LoginResponse;

    fn request(args: &LoginArgs) -> Request {
        Request::post("/auth/login").with_body(json!(args))
    }
}

impl Mutation for Login {}

#[derive(Clone, PartialEq, Serialize)]
pub struct LoginArgs {
    pub email: String,
    pub password: String,
}

// keep passwords out of the logs
impl Debug for LoginArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginArgs")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "data")]
    pub user: User,
}

/// Create a new account. This does *not* log the user in.
#[derive(Debug, Copy, Clone)]
pub struct Signup;

impl Operation for Signup {
    const NAME: &'static str = "signup";

    type Args = SignupArgs;
    type Output = SignupResponse;

    fn request(args: &SignupArgs) -> Request {
        Request::post("/auth/signup").with_body(json!(args))
    }
}

impl Mutation for Signup {}

#[derive(Clone, PartialEq, Serialize)]
pub struct SignupArgs {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Debug for SignupArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupArgs")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[test]
    fn login_posts_the_credentials() {
        let args = LoginArgs {
            email: String::from("alice@example.com"),
            password: String::from("hunter22"),
        };

        let request = Login::request(&args);

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/auth/login");
        assert_eq!(
            request.body,
            Some(json!({ "email": "alice@example.com", "password": "hunter22" }))
        );
    }

    #[test]
    fn the_user_comes_back_under_data() {
        let raw = r#"{
            "token": "abc",
            "data": { "name": "Alice", "email": "alice@example.com", "id": 7 }
        }"#;

        let got: LoginResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(got.token, "abc");
        assert_eq!(got.user.name, "Alice");
        assert_eq!(got.user.extra["id"], 7);
    }

    #[test]
    fn passwords_are_redacted_in_debug_output() {
        let args = SignupArgs {
            name: String::from("Alice"),
            email: String::from("alice@example.com"),
            password: String::from("super secret"),
        };

        let debug = format!("{:?}", args);

        assert!(!debug.contains("super secret"));
        assert!(debug.contains("alice@example.com"));
    }

    #[test]
    fn signup_replies_tolerate_missing_fields() {
        let got: SignupResponse = serde_json::from_str("{}").unwrap();

        assert_eq!(
            got,
            SignupResponse {
                success: false,
                message: None
            }
        );
    }
}
