//! The chat submission flow: validate, record the user turn, stream the
//! answer into an assistant placeholder, and report failures in-band.
//!
//! [`submit`] runs the whole thing headless. Front ends that drive the
//! stream from their own event loop call [`begin`], [`apply_fragment`],
//! [`record_failure`] and [`finish`] themselves.

use std::fmt::Display;

use anyhow::Result;
use futures_util::StreamExt;
use tracing::{debug, error, info};

use crate::ai::ChatBackend;
use crate::attachment::{Attachment, Composer};
use crate::conversation::ConversationStore;
use crate::error::SubmitError;
use crate::models::model_for_turn;
use crate::settings::SettingsStore;
use crate::state::{ApiMessage, ChatRequest, ContentPart, ImageUrl, Message, MessageContent, Role};

/// Assistant message appended when a call fails
pub const STREAM_ERROR_MESSAGE: &str = "An error occurred.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

/// A turn that has been recorded and is ready to be sent
#[derive(Debug, Clone)]
pub struct Submission {
    api_key: String,
    request: ChatRequest,
}

impl Submission {
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    pub fn model(&self) -> &str {
        &self.request.model
    }
}

/// Validates the composer and records the turn.
///
/// Refusals (`Busy`, `NothingToSend`, `MissingApiKey`) leave every store
/// untouched. On success the user message and an empty assistant placeholder
/// have been appended, the input is cleared and the composer is busy until
/// [`finish`].
pub fn begin(
    conversation: &mut ConversationStore,
    settings: &SettingsStore,
    composer: &mut Composer,
) -> Result<Submission, SubmitError> {
    if composer.busy {
        return Err(SubmitError::Busy);
    }
    if composer.input.trim().is_empty() && !composer.has_image() {
        return Err(SubmitError::NothingToSend);
    }
    if !settings.has_api_key() {
        return Err(SubmitError::MissingApiKey);
    }

    let input = composer.input.clone();
    let (turn, display) = match &composer.attachment {
        Some(image @ Attachment::Image { name, .. }) => {
            let parts = vec![
                ContentPart::Text { text: input.clone() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url().unwrap_or_default(),
                        detail: "auto".to_string(),
                    },
                },
            ];
            let display = annotate(&input, &format!("[Attached image: {}]", name));
            (MessageContent::Parts(parts), display)
        }
        Some(Attachment::Other { name, mime_type }) => {
            let text = annotate(&input, &format!("[Attached file: {} ({})]", name, mime_type));
            (MessageContent::Text(text.clone()), text)
        }
        Some(Attachment::Text { .. }) | None => (MessageContent::Text(input.clone()), input),
    };

    let mut messages: Vec<ApiMessage> = conversation.messages().iter().map(ApiMessage::from).collect();
    messages.push(ApiMessage {
        role: Role::User,
        content: turn,
    });

    let model = model_for_turn(settings.model(), composer.attachment.is_some()).to_string();

    conversation.append(Message::user(display))?;
    conversation.append(Message::assistant(""))?;

    composer.input.clear();
    composer.busy = true;

    info!("submitting turn {} to {}", messages.len(), model);

    Ok(Submission {
        api_key: settings.api_key().to_string(),
        request: ChatRequest { model, messages },
    })
}

fn annotate(input: &str, note: &str) -> String {
    if input.trim().is_empty() {
        note.to_string()
    } else {
        format!("{}\n\n{}", input, note)
    }
}

/// Appends one streamed fragment. Empty fragments are ignored.
pub fn apply_fragment(conversation: &mut ConversationStore, fragment: &str) -> Result<bool> {
    if fragment.is_empty() {
        return Ok(false);
    }
    conversation.append_to_last(fragment)
}

/// Leaves the partial answer as it is and appends the error message after it
pub fn record_failure(conversation: &mut ConversationStore, reason: &dyn Display) -> Result<()> {
    error!("chat completion failed: {}", reason);
    conversation.append(Message::assistant(STREAM_ERROR_MESSAGE))
}

/// Drops the pending attachment and re-enables input
pub fn finish(composer: &mut Composer) {
    composer.clear_attachment();
    composer.busy = false;
}

/// Runs one full submission against `backend`.
pub async fn submit<B>(
    backend: &B,
    conversation: &mut ConversationStore,
    settings: &SettingsStore,
    composer: &mut Composer,
) -> Result<Outcome, SubmitError>
where
    B: ChatBackend + ?Sized,
{
    let submission = begin(conversation, settings, composer)?;

    let streamed = stream_into(backend, &submission, conversation).await;
    let recorded = match &streamed {
        Ok(()) => Ok(()),
        Err(e) => record_failure(conversation, e),
    };
    finish(composer);
    recorded?;

    match streamed {
        Ok(()) => Ok(Outcome::Completed),
        Err(_) => Ok(Outcome::Failed),
    }
}

async fn stream_into<B>(
    backend: &B,
    submission: &Submission,
    conversation: &mut ConversationStore,
) -> Result<()>
where
    B: ChatBackend + ?Sized,
{
    let mut fragments = backend
        .stream_chat(submission.api_key(), submission.request())
        .await?;

    let mut count = 0usize;
    while let Some(fragment) = fragments.next().await {
        if apply_fragment(conversation, &fragment?)? {
            count += 1;
            // Give a renderer sharing this thread a chance to paint
            tokio::task::yield_now().await;
        }
    }

    debug!("stream finished after {} fragments", count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FragmentStream;
    use crate::attachment::{mime_type_for_path, AttachedFile, AttachmentPolicy};
    use crate::models::{DEFAULT_MODEL, VISION_MODEL};
    use crate::storage::{KeyValueStore, SqliteStore};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Replays fragments, optionally failing after them, and records requests
    #[derive(Default)]
    struct ScriptedBackend {
        fragments: Vec<&'static str>,
        fail_after: Option<&'static str>,
        fail_on_connect: bool,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn replying(fragments: &[&'static str]) -> Self {
            Self {
                fragments: fragments.to_vec(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn stream_chat(&self, _api_key: &str, request: &ChatRequest) -> Result<FragmentStream> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_on_connect {
                return Err(anyhow!("connection refused"));
            }

            let mut items: Vec<Result<String>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            if let Some(message) = self.fail_after {
                items.push(Err(anyhow!(message)));
            }
            Ok(Box::pin(stream::iter(items)))
        }
    }

    struct Fixture {
        conversation: ConversationStore,
        settings: SettingsStore,
        composer: Composer,
    }

    fn fixture() -> Fixture {
        let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut settings = SettingsStore::load(storage.clone()).unwrap();
        settings.save("gsk_test_key_123456", DEFAULT_MODEL).unwrap();
        Fixture {
            conversation: ConversationStore::load(storage).unwrap(),
            settings,
            composer: Composer::new(),
        }
    }

    fn attached(name: &str, bytes: &[u8]) -> AttachedFile {
        AttachedFile {
            name: name.to_string(),
            mime_type: mime_type_for_path(Path::new(name)).to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_streamed_fragments_build_the_answer() {
        let mut f = fixture();
        let backend = ScriptedBackend::replying(&["Hel", "lo, ", "world!"]);
        f.composer.input = "Say hello".to_string();

        let outcome = submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Completed);
        let messages = f.conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Say hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello, world!");
        assert!(!f.composer.busy);
        assert!(f.composer.input.is_empty());
    }

    #[tokio::test]
    async fn test_error_mid_stream_keeps_partial_and_appends_error() {
        let mut f = fixture();
        let backend = ScriptedBackend {
            fragments: vec!["Par"],
            fail_after: Some("stream broke"),
            ..ScriptedBackend::default()
        };
        f.composer.input = "Tell me a story".to_string();

        let outcome = submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Failed);
        let contents: Vec<(Role, &str)> = f
            .conversation
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            contents,
            vec![
                (Role::User, "Tell me a story"),
                (Role::Assistant, "Par"),
                (Role::Assistant, STREAM_ERROR_MESSAGE),
            ]
        );
        assert!(!f.composer.busy);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_empty_placeholder() {
        let mut f = fixture();
        let backend = ScriptedBackend {
            fail_on_connect: true,
            ..ScriptedBackend::default()
        };
        f.composer.input = "hi".to_string();

        let outcome = submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Failed);
        let messages = f.conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "");
        assert_eq!(messages[2].content, STREAM_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_whitespace_input_sends_nothing() {
        let mut f = fixture();
        let backend = ScriptedBackend::replying(&["unused"]);
        f.composer.input = "   \n\t ".to_string();

        let err = submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::NothingToSend));
        assert!(f.conversation.is_empty());
        assert!(backend.calls().is_empty());
        assert_eq!(f.composer.input, "   \n\t ");
    }

    #[tokio::test]
    async fn test_missing_api_key_blocks_before_side_effects() {
        let mut f = fixture();
        f.settings.set_api_key("").unwrap();
        let backend = ScriptedBackend::replying(&["unused"]);
        f.composer.input = "hello".to_string();

        let err = submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::MissingApiKey));
        assert!(f.conversation.is_empty());
        assert!(backend.calls().is_empty());
        assert_eq!(f.composer.input, "hello");
    }

    #[test]
    fn test_busy_composer_is_refused() {
        let mut f = fixture();
        f.composer.input = "hello".to_string();
        f.composer.busy = true;

        let err = begin(&mut f.conversation, &f.settings, &mut f.composer).unwrap_err();
        assert!(matches!(err, SubmitError::Busy));
        assert!(f.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_no_attachment_uses_configured_model() {
        let mut f = fixture();
        f.settings.set_model("my/custom-model").unwrap();
        let backend = ScriptedBackend::replying(&["ok"]);
        f.composer.input = "hi".to_string();

        submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap();

        assert_eq!(backend.calls()[0].model, "my/custom-model");
    }

    #[tokio::test]
    async fn test_any_attachment_selects_vision_model() {
        for name in ["notes.txt", "cat.png", "report.pdf"] {
            let mut f = fixture();
            let backend = ScriptedBackend::replying(&["ok"]);
            f.composer.input = "look".to_string();
            f.composer
                .attach(attached(name, b"data"), AttachmentPolicy::Any)
                .unwrap();

            submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
                .await
                .unwrap();

            assert_eq!(backend.calls()[0].model, VISION_MODEL, "attachment {}", name);
            assert!(f.composer.attachment.is_none());
        }
        let settings_model = fixture().settings.model().to_string();
        assert_eq!(settings_model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_image_turn_is_sent_as_parts() {
        let mut f = fixture();
        f.conversation.append(Message::user("earlier")).unwrap();
        f.conversation.append(Message::assistant("reply")).unwrap();
        let backend = ScriptedBackend::replying(&["a cat"]);
        f.composer
            .attach(attached("cat.png", b"abc"), AttachmentPolicy::Any)
            .unwrap();

        submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap();

        let request = &backend.calls()[0];
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].content, MessageContent::Text("earlier".to_string()));
        assert_eq!(
            request.messages[2].content,
            MessageContent::Parts(vec![
                ContentPart::Text { text: String::new() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,YWJj".to_string(),
                        detail: "auto".to_string(),
                    },
                },
            ])
        );
        assert_eq!(f.conversation.messages()[2].content, "[Attached image: cat.png]");
    }

    #[tokio::test]
    async fn test_other_attachment_is_annotated() {
        let mut f = fixture();
        let backend = ScriptedBackend::replying(&["ok"]);
        f.composer.input = "read this".to_string();
        f.composer
            .attach(attached("report.pdf", b"%PDF"), AttachmentPolicy::Any)
            .unwrap();

        submit(&backend, &mut f.conversation, &f.settings, &mut f.composer)
            .await
            .unwrap();

        let expected = "read this\n\n[Attached file: report.pdf (application/pdf)]";
        assert_eq!(
            backend.calls()[0].messages[0].content,
            MessageContent::Text(expected.to_string())
        );
        assert_eq!(f.conversation.messages()[0].content, expected);
    }

    #[test]
    fn test_begin_appends_placeholder_and_locks_input() {
        let mut f = fixture();
        f.composer.input = "hi".to_string();

        let submission = begin(&mut f.conversation, &f.settings, &mut f.composer).unwrap();

        assert_eq!(submission.api_key(), "gsk_test_key_123456");
        assert_eq!(submission.model(), DEFAULT_MODEL);
        assert_eq!(submission.request().messages.len(), 1);
        let last = f.conversation.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.content.is_empty());
        assert!(f.composer.busy);
        assert!(f.composer.input.is_empty());
    }

    #[test]
    fn test_empty_fragments_are_noops() {
        let mut f = fixture();
        f.composer.input = "hi".to_string();
        begin(&mut f.conversation, &f.settings, &mut f.composer).unwrap();

        assert!(!apply_fragment(&mut f.conversation, "").unwrap());
        assert!(apply_fragment(&mut f.conversation, "x").unwrap());
        assert_eq!(f.conversation.last().unwrap().content, "x");
    }

    #[test]
    fn test_clear_history_leaves_settings_alone() {
        let mut f = fixture();
        f.conversation.append(Message::user("hi")).unwrap();
        f.conversation.clear().unwrap();

        assert!(f.conversation.is_empty());
        assert_eq!(f.settings.api_key(), "gsk_test_key_123456");
        assert_eq!(f.settings.model(), DEFAULT_MODEL);
    }

    /// Breaks the store as soon as the request goes out
    struct BreaksStorage {
        store: Arc<crate::storage::FailingStore>,
    }

    #[async_trait]
    impl ChatBackend for BreaksStorage {
        async fn stream_chat(&self, _api_key: &str, _request: &ChatRequest) -> Result<FragmentStream> {
            self.store.fail_writes();
            let items: Vec<Result<String>> = vec![Ok("never saved".to_string())];
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn failing_fixture(store: &Arc<crate::storage::FailingStore>) -> Fixture {
        let mut settings = SettingsStore::load(store.clone()).unwrap();
        settings.save("gsk_test_key_123456", DEFAULT_MODEL).unwrap();
        Fixture {
            conversation: ConversationStore::load(store.clone()).unwrap(),
            settings,
            composer: Composer::new(),
        }
    }

    #[test]
    fn test_begin_reports_storage_failure() {
        let store = Arc::new(crate::storage::FailingStore::new(false));
        let mut f = failing_fixture(&store);
        store.fail_writes();
        f.composer.input = "hello".to_string();

        let result = begin(&mut f.conversation, &f.settings, &mut f.composer);

        assert!(matches!(result, Err(SubmitError::Storage(_))));
        assert!(!f.composer.busy);
        assert_eq!(f.composer.input, "hello");
    }

    #[tokio::test]
    async fn test_storage_failure_mid_stream_still_unlocks_input() {
        let store = Arc::new(crate::storage::FailingStore::new(false));
        let mut f = failing_fixture(&store);
        let backend = BreaksStorage { store: store.clone() };
        f.composer.input = "hello".to_string();
        f.composer
            .attach(attached("notes.bin", b"\x00\x01"), AttachmentPolicy::Any)
            .unwrap();

        let result = submit(&backend, &mut f.conversation, &f.settings, &mut f.composer).await;

        assert!(matches!(result, Err(SubmitError::Storage(_))));
        assert!(!f.composer.busy);
        assert!(f.composer.attachment.is_none());
    }
}
