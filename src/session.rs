//! The in-memory record of who is logged in.

use crate::credentials::User;
use std::sync::Arc;
use tokio::sync::watch;

/// Who is logged in, as far as the UI is concerned.
///
/// This is never the source of truth. It gets rebuilt from the persisted
/// [`Credential`](crate::Credential) every time the session is reconciled.
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct Session {
    pub user: Option<User>,
    pub is_logged_in: bool,
}

impl Session {
    pub fn login(&mut self, user: User) {
        self.user = Some(user);
        self.is_logged_in = true;
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.is_logged_in = false;
    }

    /// Replace the user record without logging anyone in or out.
    pub fn set_user(&mut self, user: Option<User>) { self.user = user; }
}

/// A shared, observable [`Session`].
///
/// Clones share the same state. The only way to change it is through
/// [`SessionStore::login()`], [`SessionStore::logout()`] and
/// [`SessionStore::set_user()`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    session: watch::Sender<Session>,
    auth_checked: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (session, _) = watch::channel(Session::default());
        let (auth_checked, _) = watch::channel(false);

        SessionStore {
            inner: Arc::new(Inner {
                session,
                auth_checked,
            }),
        }
    }

    /// A snapshot of the current session.
    pub fn current(&self) -> Session { self.inner.session.borrow().clone() }

    pub fn is_logged_in(&self) -> bool { self.inner.session.borrow().is_logged_in }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    pub fn login(&self, user: User) {
        log::info!("Logged in as {}", user.email);
        self.inner.session.send_modify(|session| session.login(user));
    }

    pub fn logout(&self) {
        log::debug!("Clearing the session");
        self.inner.session.send_modify(Session::logout);
    }

    pub fn set_user(&self, user: Option<User>) {
        self.inner.session.send_modify(|session| session.set_user(user));
    }

    /// Has the session been reconciled with the persisted credentials yet?
    /// Anything that depends on being logged in should wait for this.
    pub fn is_checked(&self) -> bool { *self.inner.auth_checked.borrow() }

    pub fn mark_checked(&self) { self.inner.auth_checked.send_replace(true); }

    pub async fn wait_until_checked(&self) {
        let mut checked = self.inner.auth_checked.subscribe();

        // the sender lives in `self`, so the channel can't close under us
        while !*checked.borrow_and_update() {
            if checked.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self { SessionStore::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User { User::new("Alice", "alice@example.com") }

    #[test]
    fn sessions_start_logged_out() {
        let store = SessionStore::new();

        assert_eq!(store.current(), Session::default());
        assert!(!store.is_logged_in());
        assert!(!store.is_checked());
    }

    #[test]
    fn login_and_logout() {
        let store = SessionStore::new();

        store.login(alice());
        assert!(store.is_logged_in());
        assert_eq!(store.current().user, Some(alice()));

        store.logout();
        assert_eq!(store.current(), Session::default());
    }

    #[test]
    fn set_user_leaves_the_flag_alone() {
        let store = SessionStore::new();

        store.set_user(Some(alice()));
        assert!(!store.is_logged_in());
        assert_eq!(store.current().user, Some(alice()));

        store.login(alice());
        store.set_user(Some(User::new("Alice B", "alice@example.com")));
        assert!(store.is_logged_in());
        assert_eq!(store.current().user.unwrap().name, "Alice B");
    }

    #[test]
    fn clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();

        other.login(alice());

        assert!(store.is_logged_in());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = SessionStore::new();
        let mut receiver = store.subscribe();

        store.login(alice());

        assert!(receiver.changed().await.is_ok());
        assert!(receiver.borrow().is_logged_in);
    }

    #[tokio::test]
    async fn waiting_for_the_check() {
        let store = SessionStore::new();
        let waiter = store.clone();
        let task = tokio::spawn(async move { waiter.wait_until_checked().await });
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        store.mark_checked();

        task.await.unwrap();
        assert!(store.is_checked());
    }
}
