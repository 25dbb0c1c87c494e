pub mod ai;
pub mod attachment;
pub mod config;
pub mod conversation;
pub mod error;
pub mod models;
pub mod settings;
pub mod state;
pub mod storage;
pub mod submit;

// Re-export main types for convenience
pub use ai::{ChatBackend, FragmentStream, GroqClient};
pub use attachment::{AttachedFile, Attachment, AttachmentKind, AttachmentPolicy, Composer};
pub use config::Config;
pub use conversation::ConversationStore;
pub use error::{AttachmentError, SubmitError};
pub use models::{ModelOption, DEFAULT_MODEL, VISION_MODEL};
pub use settings::SettingsStore;
pub use state::{ApiMessage, ChatRequest, ContentPart, Message, MessageContent, Role};
pub use storage::{KeyValueStore, SqliteStore};
pub use submit::{Outcome, Submission, STREAM_ERROR_MESSAGE};
