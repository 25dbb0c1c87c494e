use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::attachment::AttachmentPolicy;

pub const DEFAULT_API_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Application configuration. The API key and model are not part of it;
/// those live in the settings store.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub storage_path: Option<String>,
    pub attachment_policy: Option<String>,
    /// Seconds allowed for connecting to the API; streamed replies may run longer
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Env var first, then config file, then the public Groq endpoint
    pub fn api_base_url(&self) -> String {
        std::env::var("GROQ_BASE_URL")
            .ok()
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        if let Some(path) = std::env::var_os("GROQ_CHAT_DB") {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.storage_path {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::get_data_dir()?.join("storage.sqlite"))
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        self.attachment_policy
            .as_deref()
            .and_then(AttachmentPolicy::from_str)
            .unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn get_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("groq-chat"))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("groq-chat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.api_base_url.is_none());
        assert_eq!(config.attachment_policy(), AttachmentPolicy::Any);
    }

    #[test]
    fn test_load_reads_every_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("groq-chat").join("config.json");
        let config = Config {
            api_base_url: Some("http://localhost:8080/v1/".to_string()),
            storage_path: Some("/tmp/chat.sqlite".to_string()),
            attachment_policy: Some("text-only".to_string()),
            request_timeout_secs: Some(30),
        };
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.attachment_policy(), AttachmentPolicy::TextOnly);
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(loaded.storage_path.as_deref(), Some("/tmp/chat.sqlite"));
    }

    #[test]
    fn test_unknown_policy_falls_back_to_any() {
        let config = Config {
            attachment_policy: Some("everything".to_string()),
            ..Config::default()
        };
        assert_eq!(config.attachment_policy(), AttachmentPolicy::Any);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
