use std::path::PathBuf;
use thiserror::Error;

/// Reasons a chat submission is refused before any network call
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a response is still streaming")]
    Busy,
    #[error("nothing to send")]
    NothingToSend,
    #[error("API key is not set. Open Settings and save your Groq API key.")]
    MissingApiKey,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("only text files can be attached ({name} is {mime_type})")]
    Unsupported { name: String, mime_type: String },
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
