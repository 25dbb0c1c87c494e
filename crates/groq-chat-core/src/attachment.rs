//! File attachments and the compose-box state they hang off.

use std::path::Path;

use base64::Engine;
use tracing::debug;

use crate::error::AttachmentError;

/// Get MIME type from file path
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        // Text
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "rs" => "text/x-rust",
        "py" => "text/x-python",
        "toml" => "text/x-toml",
        "yaml" | "yml" => "text/yaml",
        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        // Everything else is passed along by name only
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Text,
    Image,
    Other,
}

impl AttachmentKind {
    pub fn of(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            AttachmentKind::Image
        } else if mime_type.starts_with("text/") {
            AttachmentKind::Text
        } else {
            AttachmentKind::Other
        }
    }
}

/// Which file types the attach action accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachmentPolicy {
    #[default]
    Any,
    TextOnly,
}

impl AttachmentPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "any" => Some(AttachmentPolicy::Any),
            "text-only" | "text_only" | "text" => Some(AttachmentPolicy::TextOnly),
            _ => None,
        }
    }

    pub fn allows(&self, kind: AttachmentKind) -> bool {
        match self {
            AttachmentPolicy::Any => true,
            AttachmentPolicy::TextOnly => kind == AttachmentKind::Text,
        }
    }
}

/// A file picked by the user, read into memory
#[derive(Debug, Clone)]
pub struct AttachedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AttachedFile {
    pub fn read(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = std::fs::read(path).map_err(|source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            mime_type: mime_type_for_path(path).to_string(),
            bytes,
        })
    }

    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::of(&self.mime_type)
    }
}

/// Pending attachment for the next turn. Discarded once the turn finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Content already spliced into the composer input
    Text { name: String },
    Image {
        name: String,
        mime_type: String,
        /// Base64 payload
        data: String,
    },
    Other { name: String, mime_type: String },
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Text { name }
            | Attachment::Image { name, .. }
            | Attachment::Other { name, .. } => name,
        }
    }

    pub fn data_url(&self) -> Option<String> {
        match self {
            Attachment::Image { mime_type, data, .. } => {
                Some(format!("data:{};base64,{}", mime_type, data))
            }
            _ => None,
        }
    }
}

/// Compose-box state: the input line, at most one attachment, and whether a
/// submission is outstanding (input disabled).
#[derive(Debug, Clone, Default)]
pub struct Composer {
    pub input: String,
    pub attachment: Option<Attachment>,
    pub busy: bool,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_image(&self) -> bool {
        matches!(self.attachment, Some(Attachment::Image { .. }))
    }

    pub fn attach(
        &mut self,
        file: AttachedFile,
        policy: AttachmentPolicy,
    ) -> Result<(), AttachmentError> {
        let kind = file.kind();
        if !policy.allows(kind) {
            return Err(AttachmentError::Unsupported {
                name: file.name,
                mime_type: file.mime_type,
            });
        }

        debug!("attaching {} ({}, {} bytes)", file.name, file.mime_type, file.bytes.len());

        let attachment = match kind {
            AttachmentKind::Text => {
                let content = String::from_utf8_lossy(&file.bytes);
                self.input = format!(
                    "{}\n\n--- Attached file: {} ---\n~~~\n{}\n~~~",
                    self.input, file.name, content
                );
                Attachment::Text { name: file.name }
            }
            AttachmentKind::Image => Attachment::Image {
                data: base64::engine::general_purpose::STANDARD.encode(&file.bytes),
                name: file.name,
                mime_type: file.mime_type,
            },
            AttachmentKind::Other => Attachment::Other {
                name: file.name,
                mime_type: file.mime_type,
            },
        };

        self.attachment = Some(attachment);
        Ok(())
    }

    pub fn clear_attachment(&mut self) {
        self.attachment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file(name: &str, bytes: &[u8]) -> AttachedFile {
        AttachedFile {
            name: name.to_string(),
            mime_type: mime_type_for_path(Path::new(name)).to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type_for_path(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("doc.pdf")), "application/pdf");
        assert_eq!(mime_type_for_path(Path::new("no_extension")), "application/octet-stream");
    }

    #[test]
    fn test_mime_type_case_insensitive() {
        assert_eq!(mime_type_for_path(Path::new("PHOTO.PNG")), "image/png");
        assert_eq!(mime_type_for_path(Path::new("README.MD")), "text/markdown");
    }

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(AttachmentKind::of("image/webp"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::of("text/csv"), AttachmentKind::Text);
        assert_eq!(AttachmentKind::of("application/zip"), AttachmentKind::Other);
    }

    #[test]
    fn test_text_attachment_is_spliced_into_input() {
        let mut composer = Composer::new();
        composer.input = "Summarize this".to_string();
        composer
            .attach(file("notes.txt", b"line one\nline two"), AttachmentPolicy::Any)
            .unwrap();

        assert_eq!(
            composer.input,
            "Summarize this\n\n--- Attached file: notes.txt ---\n~~~\nline one\nline two\n~~~"
        );
        assert_eq!(
            composer.attachment,
            Some(Attachment::Text { name: "notes.txt".to_string() })
        );
    }

    #[test]
    fn test_image_attachment_is_base64_encoded() {
        let mut composer = Composer::new();
        composer.attach(file("cat.png", b"abc"), AttachmentPolicy::Any).unwrap();

        assert!(composer.has_image());
        assert!(composer.input.is_empty());
        let url = composer.attachment.as_ref().and_then(|a| a.data_url());
        assert_eq!(url.as_deref(), Some("data:image/png;base64,YWJj"));
    }

    #[test]
    fn test_second_attachment_replaces_first() {
        let mut composer = Composer::new();
        composer.attach(file("cat.png", b"abc"), AttachmentPolicy::Any).unwrap();
        composer.attach(file("report.pdf", b"%PDF"), AttachmentPolicy::Any).unwrap();

        assert!(!composer.has_image());
        assert_eq!(composer.attachment.as_ref().map(|a| a.name()), Some("report.pdf"));
    }

    #[test]
    fn test_text_only_policy_rejects_images() {
        let mut composer = Composer::new();
        let err = composer
            .attach(file("cat.png", b"abc"), AttachmentPolicy::TextOnly)
            .unwrap_err();

        assert!(matches!(err, AttachmentError::Unsupported { .. }));
        assert!(composer.attachment.is_none());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(AttachmentPolicy::from_str("ANY"), Some(AttachmentPolicy::Any));
        assert_eq!(AttachmentPolicy::from_str("text-only"), Some(AttachmentPolicy::TextOnly));
        assert_eq!(AttachmentPolicy::from_str("images"), None);
    }

    #[test]
    fn test_read_from_disk() {
        let mut tmp = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        write!(tmp, "# Title").unwrap();

        let attached = AttachedFile::read(tmp.path()).unwrap();
        assert_eq!(attached.mime_type, "text/markdown");
        assert_eq!(attached.kind(), AttachmentKind::Text);
        assert_eq!(attached.bytes, b"# Title");
    }

    #[test]
    fn test_read_missing_file() {
        let err = AttachedFile::read(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, AttachmentError::Read { .. }));
    }
}
