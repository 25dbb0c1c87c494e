use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::sse::{SseDecoder, SseEvent};
use super::{ChatBackend, FragmentStream};
use crate::state::{ApiMessage, ChatRequest};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    stream: bool,
}

#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    base_url: String,
}

impl GroqClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Bounds establishing the connection only. A reply that keeps
    /// streaming is never cut off.
    pub fn with_connect_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().connect_timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatBackend for GroqClient {
    async fn stream_chat(&self, api_key: &str, request: &ChatRequest) -> Result<FragmentStream> {
        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };

        debug!(
            "POST {}/chat/completions (model: {}, {} messages)",
            self.base_url,
            request.model,
            request.messages.len()
        );

        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Groq API error {}: {}", status, text));
        }

        Ok(fragments(response.bytes_stream()))
    }
}

struct FragmentState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    exhausted: bool,
}

/// Turns a raw SSE byte stream into text fragments, ending at `[DONE]`,
/// at the end of the body, or after the first error.
pub fn fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    let state = FragmentState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return match event {
                    SseEvent::Delta(text) => Some((Ok(text), state)),
                    SseEvent::Done => None,
                    SseEvent::Error(message) => {
                        state.pending.clear();
                        state.exhausted = true;
                        Some((Err(anyhow!(message)), state))
                    }
                };
            }

            if state.exhausted {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.exhausted = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    }))
}
