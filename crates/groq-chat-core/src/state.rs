//! UI-agnostic application state types
//!
//! This module contains the conversation records kept by the stores and the
//! request-side shapes sent to the chat-completion API. Nothing here depends
//! on a specific UI framework.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One conversation turn as the API sees it (no internal id)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: MessageContent,
}

/// Plain text, or an ordered list of parts when an image rides along
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
    /// Lets the model pick its own inspection fidelity
    pub detail: String,
}

impl From<&Message> for ApiMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: MessageContent::Text(message.content.clone()),
        }
    }
}

/// Everything needed for one streaming completion call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
}
