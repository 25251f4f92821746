//! A client for the Budtender cannabis recommendation service.
//!
//! The [`Budtender`] type ties everything together: a [`QueryCache`] in
//! front of the HTTP API, the persisted [`Credentials`], and the reactive
//! [`SessionStore`] a front end renders from.

#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod cache;
pub mod catalog;
pub mod chat;
mod client;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod flows;
pub mod forms;
pub mod guard;
mod reconcile;
mod session;
pub mod transport;

pub use cache::{QueryCache, QueryState, RequestError, Subscription};
pub use client::Budtender;
pub use config::{Config, ConfigError};
pub use credentials::{
    Credential, CredentialStorage, Credentials, FileStorage, MemoryStorage,
    StorageError, User,
};
pub use guard::{Access, GuardDecision, RouteGuard};
pub use reconcile::reconcile;
pub use session::{Session, SessionStore};
pub use transport::{HttpTransport, Request, Transport, TransportError};

/// The default user agent to use when communicating with the Budtender
/// backend.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
