use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::DEFAULT_MODEL;
use crate::storage::{KeyValueStore, SETTINGS_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    #[serde(default)]
    api_key: String,
    #[serde(default = "default_model")]
    model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
        }
    }
}

/// API key and model selection, persisted on every write.
///
/// Values are not validated; a bad key or model only shows up as a failed
/// call to the API.
pub struct SettingsStore {
    settings: Settings,
    storage: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let settings = match storage.get(SETTINGS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("ignoring unreadable settings snapshot: {}", e);
                Settings::default()
            }),
            None => Settings::default(),
        };

        Ok(Self { settings, storage })
    }

    pub fn api_key(&self) -> &str {
        &self.settings.api_key
    }

    pub fn has_api_key(&self) -> bool {
        !self.settings.api_key.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn set_api_key(&mut self, api_key: &str) -> Result<()> {
        self.settings.api_key = api_key.to_string();
        self.persist()
    }

    pub fn set_model(&mut self, model: &str) -> Result<()> {
        self.settings.model = model.to_string();
        self.persist()
    }

    /// Saves both fields in one write (the settings page save action)
    pub fn save(&mut self, api_key: &str, model: &str) -> Result<()> {
        self.settings.api_key = api_key.to_string();
        self.settings.model = model.to_string();
        self.persist()?;
        info!("settings saved (model: {})", self.settings.model);
        Ok(())
    }

    /// Key shown as first five and last four characters
    pub fn masked_api_key(&self) -> String {
        let key = &self.settings.api_key;
        let chars: Vec<char> = key.chars().collect();
        if chars.is_empty() {
            "Not set".to_string()
        } else if chars.len() < 10 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..5].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.settings)?;
        self.storage.set(SETTINGS_KEY, &raw)
    }
}
