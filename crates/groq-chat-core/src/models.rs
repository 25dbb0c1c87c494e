/// Model used when nothing has been saved yet
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// Vision-capable model every turn with an attachment is routed to
pub const VISION_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    pub id: &'static str,
    pub vision: bool,
}

impl ModelOption {
    pub fn display_name(&self) -> String {
        if self.vision {
            format!("{} (images)", self.id)
        } else {
            format!("{} (text only)", self.id)
        }
    }
}

pub fn all() -> Vec<ModelOption> {
    vec![
        ModelOption { id: DEFAULT_MODEL, vision: false },
        ModelOption { id: VISION_MODEL, vision: true },
    ]
}

pub fn find(id: &str) -> Option<ModelOption> {
    all().into_iter().find(|m| m.id == id)
}

/// Picks the model for one call. Any pending attachment, whatever its type,
/// overrides the configured model with [`VISION_MODEL`].
pub fn model_for_turn(configured: &str, has_attachment: bool) -> &str {
    if has_attachment {
        VISION_MODEL
    } else {
        configured
    }
}
