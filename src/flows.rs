//! Submitting the login and signup forms.

use crate::{
    cache::{MutationHandle, RequestError},
    client::Budtender,
    credentials::{Credential, StorageError},
    endpoints::{Login, LoginArgs, Signup, SignupArgs},
    forms::{FieldErrors, LoginForm, SignupForm},
};

const LOGIN_FAILED: &str = "Something went wrong. Please try again.";
const SIGNUP_FAILED: &str = "Signup failed. Please try again.";
const SIGNUP_REJECTED: &str = "Signup failed.";
const SIGNUP_SUCCEEDED: &str = "Signup successful! Please log in.";

/// Something which can move the user to another page.
pub trait Navigator {
    /// Replace the current page with `path`, without adding a history entry.
    fn replace(&mut self, path: &str) -> Result<(), NavigationError>;

    /// A hard reload of `path`, used when `replace()` doesn't work.
    fn reload(&mut self, path: &str);
}

/// Something which can show the user a transient message.
pub trait Notifier {
    fn success(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unable to navigate to {}: {}", path, reason)]
pub struct NavigationError {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Redirecting,
}

impl Default for SubmissionState {
    fn default() -> Self { SubmissionState::Idle }
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The form never left the client.
    Invalid(FieldErrors),
    /// The backend (or the credential store) said no. The user was told why.
    Rejected(String),
    /// The user was sent to this page.
    Redirected(String),
}

/// Logging in with an email and password.
pub struct LoginFlow {
    client: Budtender,
    login: MutationHandle<Login>,
    state: SubmissionState,
}

impl LoginFlow {
    pub fn new(client: Budtender) -> Self {
        let login = client.cache().mutation::<Login>();

        LoginFlow {
            client,
            login,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> SubmissionState { self.state }

    pub async fn submit<N, T>(
        &mut self,
        form: &LoginForm,
        navigator: &mut N,
        notifier: &mut T,
    ) -> Outcome
    where
        N: Navigator,
        T: Notifier,
    {
        if let Err(errors) = form.validate() {
            return Outcome::Invalid(errors);
        }

        self.state = SubmissionState::Submitting;
        let args = LoginArgs {
            email: form.email.clone(),
            password: form.password.clone(),
        };

        let response = match self.login.trigger(&args).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Login failed: {}", e);
                return self.fail(failure_message(&e, LOGIN_FAILED), notifier);
            },
        };

        let credential = Credential {
            token: response.token,
            user: response.user,
        };

        if let Err(e) = self.client.sign_in(credential) {
            log::warn!("Unable to save the credential: {}", e);
            return self.fail(String::from(LOGIN_FAILED), notifier);
        }

        self.state = SubmissionState::Redirecting;
        let home = self.client.routes().home_path().to_string();
        go_to(navigator, &home);

        Outcome::Redirected(home)
    }

    fn fail<T: Notifier>(&mut self, message: String, notifier: &mut T) -> Outcome {
        notifier.error(&message);
        self.state = SubmissionState::Idle;
        Outcome::Rejected(message)
    }
}

/// Creating a new account. A successful signup sends the user to the login
/// page rather than logging them in.
pub struct SignupFlow {
    client: Budtender,
    signup: MutationHandle<Signup>,
    state: SubmissionState,
}

impl SignupFlow {
    pub fn new(client: Budtender) -> Self {
        let signup = client.cache().mutation::<Signup>();

        SignupFlow {
            client,
            signup,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> SubmissionState { self.state }

    pub async fn submit<N, T>(
        &mut self,
        form: &SignupForm,
        navigator: &mut N,
        notifier: &mut T,
    ) -> Outcome
    where
        N: Navigator,
        T: Notifier,
    {
        if let Err(errors) = form.validate() {
            return Outcome::Invalid(errors);
        }

        self.state = SubmissionState::Submitting;
        let args = SignupArgs {
            name: form.name.clone(),
            email: form.email.clone(),
            password: form.password.clone(),
        };

        match self.signup.trigger(&args).await {
            Ok(response) if response.success => {
                let message =
                    response.message.as_deref().unwrap_or(SIGNUP_SUCCEEDED);
                notifier.success(message);

                self.state = SubmissionState::Redirecting;
                let login = self.client.routes().login_path().to_string();
                go_to(navigator, &login);

                Outcome::Redirected(login)
            },
            Ok(response) => {
                let message = response
                    .message
                    .unwrap_or_else(|| String::from(SIGNUP_REJECTED));
                self.fail(message, notifier)
            },
            Err(e) => {
                log::warn!("Signup failed: {}", e);
                self.fail(failure_message(&e, SIGNUP_FAILED), notifier)
            },
        }
    }

    fn fail<T: Notifier>(&mut self, message: String, notifier: &mut T) -> Outcome {
        notifier.error(&message);
        self.state = SubmissionState::Idle;
        Outcome::Rejected(message)
    }
}

/// Log out, then send the user to the login page.
///
/// The navigation happens even if the credential store couldn't be cleared,
/// since the session and cache are gone either way.
pub fn log_out<N: Navigator>(
    client: &Budtender,
    navigator: &mut N,
) -> Result<(), StorageError> {
    let cleared = client.logout();
    go_to(navigator, client.routes().login_path());
    cleared
}

fn failure_message(error: &RequestError, fallback: &str) -> String {
    error.message().unwrap_or(fallback).to_string()
}

/// Navigate exactly once, falling back to a hard reload.
fn go_to<N: Navigator>(navigator: &mut N, path: &str) {
    if let Err(e) = navigator.replace(path) {
        log::warn!("{}, reloading instead", e);
        navigator.reload(path);
    }
}
