use crate::{
    cache::QueryCache,
    config::Config,
    credentials::{Credential, CredentialStorage, Credentials, StorageError},
    guard::{GuardDecision, RouteGuard},
    reconcile::reconcile,
    session::SessionStore,
    transport::{HttpTransport, Transport},
};
use std::sync::Arc;

/// Everything a front end needs to talk to the Budtender backend, wired
/// together.
///
/// The transport, the route guard and session reconciliation all read the
/// same [`Credentials`], and the UI reads the [`SessionStore`] derived from
/// them.
#[derive(Clone)]
pub struct Budtender {
    credentials: Credentials,
    session: SessionStore,
    cache: QueryCache,
    routes: RouteGuard,
}

impl Budtender {
    /// Connect to the backend over HTTP.
    pub fn connect(
        config: &Config,
        storage: Arc<dyn CredentialStorage>,
    ) -> Result<Self, reqwest::Error> {
        let credentials = Credentials::new(storage);
        let transport = HttpTransport::new(
            config.api_base_url.clone(),
            config.request_timeout,
            credentials.clone(),
        )?;

        Ok(Budtender::with_transport(
            Arc::new(transport),
            credentials,
            config,
        ))
    }

    /// Use a custom [`Transport`].
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        config: &Config,
    ) -> Self {
        Budtender {
            credentials,
            session: SessionStore::new(),
            cache: QueryCache::with_grace_period(transport, config.keep_unused_for),
            routes: config.routes.clone(),
        }
    }

    pub fn credentials(&self) -> &Credentials { &self.credentials }

    pub fn session(&self) -> &SessionStore { &self.session }

    pub fn cache(&self) -> &QueryCache { &self.cache }

    pub fn routes(&self) -> &RouteGuard { &self.routes }

    /// Sync the session with the persisted credential. Call this once on
    /// startup, before showing anything that depends on who is logged in.
    pub fn reconcile(&self) -> bool { reconcile(&self.credentials, &self.session) }

    /// Ask the route guard whether `path` may be visited right now.
    pub fn visit(&self, path: &str) -> GuardDecision {
        self.routes.check_credentials(path, &self.credentials)
    }

    /// Persist a freshly issued credential, then update the session.
    ///
    /// Anything cached so far was fetched as somebody else (or nobody), so
    /// the cache is emptied too.
    pub fn sign_in(&self, credential: Credential) -> Result<(), StorageError> {
        self.credentials.persist(&credential)?;
        self.cache.reset();
        self.session.login(credential.user);
        Ok(())
    }

    /// Log out: forget the credential, every cached query, and the session.
    ///
    /// All three steps always run so the previous user's data can't leak
    /// into the next session, even if the credential store misbehaves.
    pub fn logout(&self) -> Result<(), StorageError> {
        let cleared = self.credentials.clear();
        self.cache.reset();
        self.session.logout();

        log::info!("Logged out");
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credentials::User,
        endpoints::{GetChatHistory, GetProducts},
        transport::{fake::FakeTransport, Request, TransportError},
        Session,
    };
    use reqwest::StatusCode;
    use serde_json::json;

    fn client() -> Budtender {
        let transport = FakeTransport::new(|_: &Request| Ok(json!([])));
        Budtender::with_transport(
            Arc::new(transport),
            Credentials::in_memory(),
            &Config::default(),
        )
    }

    fn alice() -> Credential {
        Credential {
            token: String::from("t"),
            user: User::new("Alice", "alice@example.com"),
        }
    }

    #[test]
    fn signing_in_persists_then_logs_in() {
        let client = client();

        client.sign_in(alice()).unwrap();

        assert_eq!(client.credentials().resolve(), Some(alice()));
        assert!(client.session().is_logged_in());
        assert_eq!(client.visit("/login"), GuardDecision::Redirect(String::from("/")));
    }

    #[tokio::test]
    async fn anonymous_failures_are_forgotten_after_signing_in() {
        let transport = Arc::new(FakeTransport::new(|request: &Request| {
            match request.path.as_str() {
                "/chat/history" => Err(TransportError::http(
                    StatusCode::UNAUTHORIZED,
                    json!({ "message": "Not authorized" }),
                )),
                _ => Ok(json!([])),
            }
        }));
        let client = Budtender::with_transport(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Credentials::in_memory(),
            &Config::default(),
        );
        let products = client.cache().fetch::<GetProducts>(&()).await;
        assert!(products.is_ok());
        assert!(client.cache().fetch::<GetChatHistory>(&()).await.is_err());

        client.sign_in(alice()).unwrap();

        assert!(client.cache().is_empty());
        client.cache().fetch::<GetProducts>(&()).await.unwrap();
        assert_eq!(transport.calls_to("/products"), 2);
    }

    #[tokio::test]
    async fn logout_clears_all_three() {
        let client = client();
        client.sign_in(alice()).unwrap();
        client.cache().fetch::<GetProducts>(&()).await.unwrap();

        client.logout().unwrap();

        assert_eq!(client.credentials().resolve(), None);
        assert!(client.cache().is_empty());
        assert_eq!(client.session().current(), Session::default());
        assert_eq!(
            client.visit("/products"),
            GuardDecision::Redirect(String::from("/login"))
        );
    }

    #[test]
    fn reconciling_marks_the_session_checked() {
        let client = client();
        assert!(!client.session().is_checked());

        assert!(!client.reconcile());

        assert!(client.session().is_checked());
    }
}
