use std::sync::{Arc, Mutex};

use course_pipeline::{ChatCompletion, ChatReply, ChatRequest};

/// Scripted chat-completion backend: chunk calls (recognized by the
/// segment system prompt) get `chunk_reply`, everything else gets
/// `final_reply`.
#[derive(Clone)]
pub struct MockChatClient {
    pub requests: Arc<Mutex<Vec<ChatRequest>>>,
    pub chunk_reply: String,
    pub final_reply: String,
}

impl MockChatClient {
    pub fn new(final_reply: &str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            chunk_reply: "A partial segment summary.".into(),
            final_reply: final_reply.to_string(),
        }
    }
}

impl ChatCompletion for MockChatClient {
    type Error = anyhow::Error;

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, Self::Error> {
        let is_chunk_call = request
            .messages
            .first()
            .is_some_and(|m| m.content.contains("ONE SEGMENT"));

        self.requests.lock().unwrap().push(request);

        Ok(ChatReply {
            content: if is_chunk_call {
                self.chunk_reply.clone()
            } else {
                self.final_reply.clone()
            },
            usage: None,
        })
    }
}
