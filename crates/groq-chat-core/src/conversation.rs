use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::{Message, Role};
use crate::storage::{KeyValueStore, CONVERSATION_KEY};

#[derive(Deserialize)]
struct Snapshot {
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    messages: &'a [Message],
}

/// Ordered conversation history with write-through persistence
pub struct ConversationStore {
    messages: Vec<Message>,
    storage: Arc<dyn KeyValueStore>,
}

impl ConversationStore {
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let messages = match storage.get(CONVERSATION_KEY)? {
            Some(raw) => match serde_json::from_str::<Snapshot>(&raw) {
                Ok(snapshot) => snapshot.messages,
                Err(e) => {
                    warn!("ignoring unreadable conversation snapshot: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Ok(Self { messages, storage })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append(&mut self, message: Message) -> Result<()> {
        self.messages.push(message);
        self.persist()
    }

    /// Appends `chunk` to the in-progress assistant message.
    ///
    /// Returns `false` without touching state or storage when the history is
    /// empty or ends with a user message.
    pub fn append_to_last(&mut self, chunk: &str) -> Result<bool> {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content.push_str(chunk);
            }
            _ => return Ok(false),
        }
        self.persist()?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.messages.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string(&SnapshotRef {
            messages: &self.messages,
        })?;
        self.storage.set(CONVERSATION_KEY, &raw)
    }
}
