//! The backend API's endpoints.
//!
//! Each endpoint is a zero-sized type implementing [`Operation`] plus either
//! [`Query`] (a cacheable read) or [`Mutation`] (a write). The
//! [`QueryCache`](crate::QueryCache) is what actually sends them.

mod auth;
mod catalog;
mod chat;
mod groq;

pub use auth::{Login, LoginArgs, LoginResponse, Signup, SignupArgs, SignupResponse};
pub use catalog::{GetProducts, GetStrains};
pub use chat::{
    ChatRecord, DeleteChatHistory, GetChatHistory, SaveChat, SaveChatArgs,
};
pub use groq::{
    ChatArgs, ChatReply, ChatWithGroq, HistoryItem, Preferences,
    RecommendArgs, RecommendProducts, RecommendResponse, Recommendations, Role,
};

use crate::transport::Request;
use serde::de::DeserializeOwned;

/// A named remote call.
pub trait Operation {
    /// The name queries are cached under and mutations invalidate by.
    const NAME: &'static str;

    type Args;
    type Output: DeserializeOwned;

    fn request(args: &Self::Args) -> Request;
}

/// An idempotent read. Results are cached and shared between subscribers.
pub trait Query: Operation {}

/// A write. Every trigger sends exactly one request.
pub trait Mutation: Operation {
    /// The names of the queries whose cached results become stale when this
    /// mutation succeeds.
    const INVALIDATES: &'static [&'static str] = &[];
}
