use super::{Mutation, Operation, Query};
use crate::transport::Request;
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One saved exchange between the user and the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: DateTime<Utc>,
}

/// The current user's saved conversation.
#[derive(Debug, Copy, Clone)]
pub struct GetChatHistory;

impl Operation for GetChatHistory {
    const NAME: &'static str = "getChatHistory";

    type Args = ();
    type Output = Vec<ChatRecord>;

    fn request(_: &()) -> Request { Request::get("/chat/history") }
}

impl Query for GetChatHistory {}

/// Append an exchange to the user's history.
#[derive(Debug, Copy, Clone)]
pub struct SaveChat;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatArgs {
    pub user_message: String,
    pub ai_response: String,
}

impl Operation for SaveChat {
    const NAME: &'static str = "saveChat";

    type Args = SaveChatArgs;
    type Output = ChatRecord;

    fn request(args: &SaveChatArgs) -> Request {
        Request::post("/chat/save").with_body(json!(args))
    }
}

impl Mutation for SaveChat {
    const INVALIDATES: &'static [&'static str] = &[GetChatHistory::NAME];
}

/// Throw away the user's saved conversation.
#[derive(Debug, Copy, Clone)]
pub struct DeleteChatHistory;

impl Operation for DeleteChatHistory {
    const NAME: &'static str = "deleteChatHistory";

    type Args = ();
    /// Whatever confirmation the backend sends back.
    type Output = Value;

    fn request(_: &()) -> Request { Request::delete("/chat/history") }
}

impl Mutation for DeleteChatHistory {
    const INVALIDATES: &'static [&'static str] = &[GetChatHistory::NAME];
}
