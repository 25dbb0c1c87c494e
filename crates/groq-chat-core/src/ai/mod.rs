pub mod groq;
pub mod sse;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::Stream;

use crate::state::ChatRequest;

pub use groq::GroqClient;
pub use sse::{SseDecoder, SseEvent};

/// Incremental text fragments of one response. Finite and not restartable;
/// the remote end decides when it is over.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Anything that can answer a conversation with a stream of text deltas
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn stream_chat(&self, api_key: &str, request: &ChatRequest) -> Result<FragmentStream>;
}
