//! Deciding whether a page may be visited.

use crate::credentials::Credentials;

/// Who may visit a guarded path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    /// Only visitors *without* a credential (e.g. the login page). Anyone
    /// already logged in gets sent home.
    Public,
    /// Only visitors with a credential.
    Protected,
    /// Anyone at all.
    Ungated,
}

/// What the guard wants done with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// A table of guarded paths.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGuard {
    routes: Vec<(String, Access)>,
    unlisted: Access,
    home: String,
    login: String,
}

impl RouteGuard {
    /// A guard with no routes, where everything is `unlisted`.
    pub fn new(unlisted: Access) -> Self {
        RouteGuard {
            routes: Vec::new(),
            unlisted,
            home: String::from("/"),
            login: String::from("/login"),
        }
    }

    pub fn route<P: Into<String>>(mut self, path: P, access: Access) -> Self {
        let path = path.into();
        self.routes.retain(|(existing, _)| *existing != path);
        self.routes.push((path, access));
        self
    }

    /// Where logged-in visitors get sent when they hit a public page.
    pub fn home<P: Into<String>>(mut self, path: P) -> Self {
        self.home = path.into();
        self
    }

    /// Where anonymous visitors get sent when they hit a protected page.
    pub fn login<P: Into<String>>(mut self, path: P) -> Self {
        self.login = path.into();
        self
    }

    pub fn home_path(&self) -> &str { &self.home }

    pub fn login_path(&self) -> &str { &self.login }

    pub fn access(&self, path: &str) -> Access {
        self.routes
            .iter()
            .find(|(route, _)| route == path)
            .map(|(_, access)| *access)
            .unwrap_or(self.unlisted)
    }

    pub fn check(&self, path: &str, has_token: bool) -> GuardDecision {
        match (self.access(path), has_token) {
            (Access::Public, true) => GuardDecision::Redirect(self.home.clone()),
            (Access::Protected, false) => {
                GuardDecision::Redirect(self.login.clone())
            },
            _ => GuardDecision::Allow,
        }
    }

    /// Check a path against whatever credential is currently persisted.
    pub fn check_credentials(
        &self,
        path: &str,
        credentials: &Credentials,
    ) -> GuardDecision {
        let decision = self.check(path, credentials.resolve().is_some());
        log::debug!("Visiting {} => {:?}", path, decision);
        decision
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        RouteGuard::new(Access::Ungated)
            .route("/", Access::Protected)
            .route("/login", Access::Public)
            .route("/sign-up", Access::Public)
            .route("/strains", Access::Protected)
            .route("/products", Access::Protected)
            .route("/settings", Access::Protected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, User};

    fn redirect(path: &str) -> GuardDecision { GuardDecision::Redirect(path.to_string()) }

    #[test]
    fn the_default_table() {
        let guard = RouteGuard::default();

        let cases = [
            ("/login", true, redirect("/")),
            ("/login", false, GuardDecision::Allow),
            ("/sign-up", true, redirect("/")),
            ("/sign-up", false, GuardDecision::Allow),
            ("/products", true, GuardDecision::Allow),
            ("/products", false, redirect("/login")),
            ("/", false, redirect("/login")),
            ("/settings", false, redirect("/login")),
            ("/strains", true, GuardDecision::Allow),
        ];

        for (path, has_token, should_be) in cases.iter() {
            let got = guard.check(path, *has_token);
            assert_eq!(got, *should_be, "{} (token: {})", path, has_token);
        }
    }

    #[test]
    fn unlisted_paths_are_ungated_by_default() {
        let guard = RouteGuard::default();

        assert_eq!(guard.check("/terms", false), GuardDecision::Allow);
        assert_eq!(guard.check("/chat", true), GuardDecision::Allow);
    }

    #[test]
    fn unlisted_paths_can_be_protected() {
        let guard = RouteGuard::new(Access::Protected).route("/login", Access::Public);

        assert_eq!(guard.check("/chat", false), redirect("/login"));
        assert_eq!(guard.check("/login", false), GuardDecision::Allow);
    }

    #[test]
    fn redirect_targets_are_configurable() {
        let guard = RouteGuard::default().home("/chat").login("/sign-in");

        assert_eq!(guard.check("/login", true), redirect("/chat"));
        assert_eq!(guard.check("/products", false), redirect("/sign-in"));
    }

    #[test]
    fn later_routes_replace_earlier_ones() {
        let guard = RouteGuard::default().route("/settings", Access::Ungated);

        assert_eq!(guard.access("/settings"), Access::Ungated);
    }

    #[test]
    fn the_guard_reads_persisted_credentials() {
        let guard = RouteGuard::default();
        let credentials = Credentials::in_memory();
        assert_eq!(
            guard.check_credentials("/products", &credentials),
            redirect("/login")
        );

        credentials
            .persist(&Credential {
                token: String::from("t"),
                user: User::new("Alice", "alice@example.com"),
            })
            .unwrap();

        assert_eq!(
            guard.check_credentials("/products", &credentials),
            GuardDecision::Allow
        );
        assert_eq!(guard.check_credentials("/login", &credentials), redirect("/"));
    }
}
