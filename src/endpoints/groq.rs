use super::{Mutation, Operation};
use crate::{
    catalog::{Product, Strain},
    transport::Request,
};
use serde_derive::{Deserialize, Serialize};
use serde_json::json;

/// Ask the assistant for products and strains matching the user's
/// preferences.
#[derive(Debug, Copy, Clone)]
pub struct RecommendProducts;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendArgs {
    pub preferences: Preferences,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// The effects the user is after (e.g. "Sleep", "Pain Relief").
    pub goals: Vec<String>,
    pub experience: String,
    pub product_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecommendResponse {
    pub recommendations: Recommendations,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub strains: Vec<Strain>,
}

impl Operation for RecommendProducts {
    const NAME: &'static str = "recommendProducts";

    type Args = RecommendArgs;
    type Output = RecommendResponse;

    fn request(args: &RecommendArgs) -> Request {
        Request::post("/groq/recommend-products").with_body(json!(args))
    }
}

impl Mutation for RecommendProducts {}

/// Send a message to the assistant along with the conversation so far.
#[derive(Debug, Copy, Clone)]
pub struct ChatWithGroq;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Everything the assistant said is replayed with the `system` role.
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatArgs {
    pub message: String,
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

impl Operation for ChatWithGroq {
    const NAME: &'static str = "chatWithGroq";

    type Args = ChatArgs;
    type Output = ChatReply;

    fn request(args: &ChatArgs) -> Request {
        Request::post("/groq/chat").with_body(json!(args))
    }
}

impl Mutation for ChatWithGroq {}
