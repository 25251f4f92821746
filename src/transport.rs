//! Sending requests to the backend.

use crate::credentials::Credentials;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::{
    fmt::{self, Display, Formatter},
    time::Duration,
};
use url::Url;

/// A request relative to the API's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// The path to append to the base URL (e.g. `/products`).
    pub path: String,
    pub body: Option<Value>,
    pub params: Vec<(String, String)>,
}

impl Request {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Request {
            method,
            path: path.into(),
            body: None,
            params: Vec::new(),
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Request::new(Method::GET, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Request::new(Method::POST, path)
    }

    pub fn delete<P: Into<String>>(path: P) -> Self {
        Request::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params.push((key.into(), value.into()));
        self
    }

    /// A textual form of everything that distinguishes this request from
    /// another one, suitable for use as a cache key.
    pub fn identity(&self) -> String {
        let mut identity = format!("{} {}", self.method, self.path);

        for (i, (key, value)) in self.params.iter().enumerate() {
            identity.push(if i == 0 { '?' } else { '&' });
            identity.push_str(key);
            identity.push('=');
            identity.push_str(value);
        }

        if let Some(body) = &self.body {
            identity.push(' ');
            identity.push_str(&body.to_string());
        }

        identity
    }
}

/// The normalized form of every failed request.
///
/// A `status` of `None` means no response ever arrived (the server was
/// unreachable, the request timed out, etc.).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportError {
    pub status: Option<u16>,
    /// The backend's error payload, or a plain message when there wasn't one.
    pub data: Value,
}

impl TransportError {
    pub fn network<S: Into<String>>(message: S) -> Self {
        TransportError {
            status: None,
            data: Value::String(message.into()),
        }
    }

    pub fn http(status: StatusCode, data: Value) -> Self {
        TransportError {
            status: Some(status.as_u16()),
            data,
        }
    }

    /// Did the request fail before getting any response?
    pub fn is_network(&self) -> bool { self.status.is_none() }

    /// The human-readable message the backend attached to this error.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    fn detail(&self) -> Option<&str> {
        self.message()
            .or_else(|| self.data.as_str())
            .filter(|detail| !detail.is_empty())
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.status, self.detail()) {
            (None, Some(msg)) => write!(f, "Unable to reach the server: {}", msg),
            (None, None) => write!(f, "Unable to reach the server"),
            (Some(status), Some(msg)) => {
                write!(f, "The server responded with {}: {}", status, msg)
            },
            (Some(status), None) => {
                write!(f, "The server responded with {}", status)
            },
        }
    }
}

impl std::error::Error for TransportError {}

/// Something which can send a [`Request`] and hand back the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request exactly once.
    async fn send(&self, request: Request) -> Result<Value, TransportError>;
}

/// A [`Transport`] which talks to the backend over HTTP, attaching the
/// persisted bearer token to every request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(
        base_url: Url,
        timeout: Duration,
        credentials: Credentials,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(crate::DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(HttpTransport {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url { &self.base_url }

    /// Append a relative path to the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path))
    }

    fn build(&self, request: &Request) -> Result<reqwest::Request, TransportError> {
        let url = self
            .url_for(&request.path)
            .map_err(|e| TransportError::network(e.to_string()))?;

        let mut builder = self.client.request(request.method.clone(), url);

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(token) = self.credentials.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
            .build()
            .map_err(|e| TransportError::network(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        let http_request = self.build(&request)?;

        log::debug!(
            "Sending a {} request to {}",
            http_request.method(),
            http_request.url()
        );

        let response = self.client.execute(http_request).await.map_err(|e| {
            log::debug!("The request failed: {}", e);
            TransportError::network(e.to_string())
        })?;

        let status = response.status();
        log::trace!("Headers: {:#?}", response.headers());

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::http(status, Value::String(e.to_string())))?;
        log::trace!("Response: {}", body);

        let data = parse_body(&body);

        if status.is_success() {
            Ok(data)
        } else {
            log::debug!("{} {} failed with {}", request.method, request.path, status);
            Err(TransportError::http(status, data))
        }
    }
}

/// Interpret a response body as JSON, falling back to a plain string.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }

    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    type Handler =
        dyn Fn(&Request) -> Result<Value, TransportError> + Send + Sync;

    /// A [`Transport`] that answers from a closure and remembers every
    /// request it saw.
    pub(crate) struct FakeTransport {
        handler: Box<Handler>,
        calls: Mutex<Vec<Request>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakeTransport {
        pub(crate) fn new<F>(handler: F) -> Self
        where
            F: Fn(&Request) -> Result<Value, TransportError>
                + Send
                + Sync
                + 'static,
        {
            FakeTransport {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        /// Requests will block until a permit is added to the returned
        /// semaphore.
        pub(crate) fn gated<F>(handler: F) -> (Self, Arc<Semaphore>)
        where
            F: Fn(&Request) -> Result<Value, TransportError>
                + Send
                + Sync
                + 'static,
        {
            let gate = Arc::new(Semaphore::new(0));
            let mut transport = FakeTransport::new(handler);
            transport.gate = Some(Arc::clone(&gate));
            (transport, gate)
        }

        pub(crate) fn calls(&self) -> Vec<Request> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn calls_to(&self, path: &str) -> usize {
            self.calls().iter().filter(|r| r.path == path).count()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: Request) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push(request.clone());

            match &self.gate {
                Some(gate) => gate.acquire().await.unwrap().forget(),
                None => tokio::task::yield_now().await,
            }

            (self.handler)(&request)
        }
    }
}
