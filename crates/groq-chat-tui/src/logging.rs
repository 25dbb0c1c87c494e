use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use groq_chat_core::Config;
use tracing_subscriber::EnvFilter;

/// Send tracing output to a log file; the terminal belongs to the UI.
/// Filter comes from `GROQ_CHAT_LOG`, default `info`.
pub fn init() -> Result<PathBuf> {
    let log_dir = Config::get_data_dir()?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let log_path = log_dir.join("groq-chat.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_env("GROQ_CHAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(log_path)
}
