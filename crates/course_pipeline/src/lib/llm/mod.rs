use std::{fmt::Debug, future::Future};

use serde::{Deserialize, Serialize};

pub mod openai;
pub mod summarizer;

/// One chat-completion call against an AI provider.
///
/// The pipeline never talks to a concrete vendor directly; everything goes
/// through this seam so tests can substitute a scripted fake.
pub trait ChatCompletion {
    type Error: Debug + Send + Sync;

    fn complete(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, Self::Error>> + Send;
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub usage: Option<ChatUsage>,
}
