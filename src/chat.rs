//! Talking to the budtender assistant.

use crate::{
    cache::{MutationHandle, QueryCache, RequestError},
    endpoints::{
        ChatArgs, ChatRecord, ChatWithGroq, DeleteChatHistory, HistoryItem,
        Role, SaveChat, SaveChatArgs,
    },
};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

/// Shown in place of a reply when the assistant can't be reached.
pub const APOLOGY: &str =
    "Sorry, there was an error getting a response. Please try again.";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    fn role(self) -> Role {
        match self {
            Sender::User => Role::User,
            Sender::Assistant => Role::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// The messages currently on screen, plus the means to add to them.
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
    chat: MutationHandle<ChatWithGroq>,
    save: MutationHandle<SaveChat>,
    delete: MutationHandle<DeleteChatHistory>,
}

impl Conversation {
    pub fn new(cache: &QueryCache) -> Self {
        Conversation {
            messages: Vec::new(),
            next_id: 0,
            chat: cache.mutation(),
            save: cache.mutation(),
            delete: cache.mutation(),
        }
    }

    /// Pick up where a saved history left off.
    pub fn from_history<'a, I>(cache: &QueryCache, records: I) -> Self
    where
        I: IntoIterator<Item = &'a ChatRecord>,
    {
        let mut conversation = Conversation::new(cache);

        for record in records {
            conversation.messages.push(ChatMessage {
                id: format!("{}-user", record.id),
                sender: Sender::User,
                text: record.user_message.clone(),
                timestamp: record.timestamp,
            });
            conversation.messages.push(ChatMessage {
                id: format!("{}-ai", record.id),
                sender: Sender::Assistant,
                text: record.ai_response.clone(),
                timestamp: record.timestamp,
            });
        }

        conversation
    }

    pub fn messages(&self) -> &[ChatMessage] { &self.messages }

    /// Is the assistant still thinking?
    pub fn is_waiting(&self) -> bool { self.chat.is_loading() }

    /// Send a message to the assistant and append its reply.
    ///
    /// A successful exchange is saved in the background. The returned handle
    /// resolves once that save has been attempted; dropping it doesn't
    /// cancel anything. Blank messages and failed exchanges return `None`.
    pub async fn send(&mut self, text: &str) -> Option<JoinHandle<()>> {
        if text.trim().is_empty() {
            return None;
        }

        let mut history: Vec<HistoryItem> = self
            .messages
            .iter()
            .map(|msg| HistoryItem {
                role: msg.sender.role(),
                content: msg.text.clone(),
            })
            .collect();
        history.push(HistoryItem {
            role: Role::User,
            content: text.to_string(),
        });

        self.push(Sender::User, text.to_string());

        let args = ChatArgs {
            message: text.to_string(),
            history,
        };

        match self.chat.trigger(&args).await {
            Ok(reply) => {
                self.push(Sender::Assistant, reply.reply.clone());
                Some(self.save_in_background(SaveChatArgs {
                    user_message: text.to_string(),
                    ai_response: reply.reply,
                }))
            },
            Err(e) => {
                log::warn!("The assistant didn't answer: {}", e);
                self.push(Sender::Assistant, String::from(APOLOGY));
                None
            },
        }
    }

    /// Delete the saved history and start afresh.
    pub async fn clear(&mut self) -> Result<(), RequestError> {
        self.delete.trigger(&()).await?;
        self.messages.clear();
        log::info!("Cleared the chat history");
        Ok(())
    }

    fn save_in_background(&self, args: SaveChatArgs) -> JoinHandle<()> {
        let save = self.save.clone();

        tokio::spawn(async move {
            if let Err(e) = save.trigger(&args).await {
                log::warn!("Unable to save the conversation: {}", e);
            }
        })
    }

    fn push(&mut self, sender: Sender, text: String) {
        self.next_id += 1;
        let suffix = match sender {
            Sender::User => "user",
            Sender::Assistant => "ai",
        };

        self.messages.push(ChatMessage {
            id: format!("local-{}-{}", self.next_id, suffix),
            sender,
            text,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{fake::FakeTransport, Request, Transport, TransportError};
    use chrono::TimeZone;
    use reqwest::{Method, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn cache_with<F>(handler: F) -> (QueryCache, Arc<FakeTransport>)
    where
        F: Fn(&Request) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        let transport = Arc::new(FakeTransport::new(handler));
        let cache = QueryCache::new(Arc::clone(&transport) as Arc<dyn Transport>);
        (cache, transport)
    }

    fn record(id: &str, question: &str, answer: &str) -> ChatRecord {
        ChatRecord {
            id: id.to_string(),
            user_id: None,
            user_message: question.to_string(),
            ai_response: answer.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 4, 10, 15, 0).unwrap(),
        }
    }

    fn texts(conversation: &Conversation) -> Vec<(Sender, &str)> {
        conversation
            .messages()
            .iter()
            .map(|msg| (msg.sender, msg.text.as_str()))
            .collect()
    }

    fn friendly_assistant(request: &Request) -> Result<Value, TransportError> {
        match request.path.as_str() {
            "/groq/chat" => Ok(json!({ "reply": "Try a calming indica." })),
            "/chat/save" => Ok(json!({
                "_id": "new",
                "userMessage": "x",
                "aiResponse": "y",
                "timestamp": "2024-06-04T10:15:00Z",
            })),
            _ => Ok(Value::Null),
        }
    }

    #[test]
    fn history_becomes_message_pairs() {
        let (cache, _) = cache_with(|_: &Request| Ok(Value::Null));
        let records = vec![record("a1", "Hi", "Hello!"), record("b2", "Sleep?", "Indica.")];

        let conversation = Conversation::from_history(&cache, &records);

        let ids: Vec<_> = conversation.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a1-user", "a1-ai", "b2-user", "b2-ai"]);
        assert_eq!(
            texts(&conversation),
            vec![
                (Sender::User, "Hi"),
                (Sender::Assistant, "Hello!"),
                (Sender::User, "Sleep?"),
                (Sender::Assistant, "Indica."),
            ]
        );
    }

    #[tokio::test]
    async fn blank_messages_are_ignored() {
        let (cache, transport) = cache_with(friendly_assistant);
        let mut conversation = Conversation::new(&cache);

        assert!(conversation.send("   ").await.is_none());

        assert!(conversation.messages().is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn messages_are_sent_as_typed() {
        let (cache, transport) = cache_with(friendly_assistant);
        let records = vec![record("a1", "Hi", "Hello!")];
        let mut conversation = Conversation::from_history(&cache, &records);

        let saving = conversation.send(" I can't sleep ").await.unwrap();
        saving.await.unwrap();

        assert_eq!(
            texts(&conversation)[2..].to_vec(),
            vec![
                (Sender::User, " I can't sleep "),
                (Sender::Assistant, "Try a calming indica."),
            ]
        );

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].path, "/groq/chat");
        assert_eq!(
            calls[0].body,
            Some(json!({
                "message": " I can't sleep ",
                "history": [
                    { "role": "user", "content": "Hi" },
                    { "role": "system", "content": "Hello!" },
                    { "role": "user", "content": " I can't sleep " },
                ],
            }))
        );
        assert_eq!(calls[1].path, "/chat/save");
        assert_eq!(
            calls[1].body,
            Some(json!({
                "userMessage": " I can't sleep ",
                "aiResponse": "Try a calming indica.",
            }))
        );
    }

    #[tokio::test]
    async fn failures_show_an_apology_and_save_nothing() {
        let (cache, transport) = cache_with(|_: &Request| {
            Err(TransportError::http(StatusCode::BAD_GATEWAY, Value::Null))
        });
        let mut conversation = Conversation::new(&cache);

        assert!(conversation.send("Hello?").await.is_none());

        assert_eq!(
            texts(&conversation),
            vec![(Sender::User, "Hello?"), (Sender::Assistant, APOLOGY)]
        );
        assert_eq!(transport.calls_to("/chat/save"), 0);
    }

    #[tokio::test]
    async fn a_failed_save_is_not_retried() {
        let (cache, transport) = cache_with(|request: &Request| {
            match request.path.as_str() {
                "/groq/chat" => Ok(json!({ "reply": "Sure." })),
                _ => Err(TransportError::network("connection reset")),
            }
        });
        let mut conversation = Conversation::new(&cache);

        conversation.send("Hi").await.unwrap().await.unwrap();

        assert_eq!(transport.calls_to("/chat/save"), 1);
        assert_eq!(conversation.messages().len(), 2);
    }

    #[tokio::test]
    async fn clearing_deletes_the_saved_history() {
        let (cache, transport) = cache_with(|_: &Request| Ok(json!({ "ok": true })));
        let records = vec![record("a1", "Hi", "Hello!")];
        let mut conversation = Conversation::from_history(&cache, &records);

        conversation.clear().await.unwrap();

        assert!(conversation.messages().is_empty());
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::DELETE);
        assert_eq!(calls[0].path, "/chat/history");
    }

    #[tokio::test]
    async fn a_failed_clear_keeps_the_messages() {
        let (cache, _) = cache_with(|_: &Request| {
            Err(TransportError::network("offline"))
        });
        let records = vec![record("a1", "Hi", "Hello!")];
        let mut conversation = Conversation::from_history(&cache, &records);

        assert!(conversation.clear().await.is_err());
        assert_eq!(conversation.messages().len(), 2);
    }
}
