use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use groq_chat_core::models::{self, ModelOption};
use groq_chat_core::submit::{self, Submission};
use groq_chat_core::{
    AttachedFile, AttachmentKind, AttachmentPolicy, ChatBackend, Composer, Config,
    ConversationStore, GroqClient, KeyValueStore, SettingsStore, SqliteStore, SubmitError,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Chat,
    HowToUse,
    Settings,
}

impl Page {
    pub fn all() -> [Page; 3] {
        [Page::Chat, Page::HowToUse, Page::Settings]
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Chat => "Chat",
            Page::HowToUse => "How to use",
            Page::Settings => "Settings",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Page::Chat => 0,
            Page::HowToUse => 1,
            Page::Settings => 2,
        }
    }

    pub fn next(&self) -> Page {
        Page::all()[(self.index() + 1) % 3]
    }

    pub fn prev(&self) -> Page {
        Page::all()[(self.index() + 2) % 3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    /// Blocking message, dismissed with Enter/Esc
    Notice(String),
    ConfirmClear,
    AttachPath,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub page: Page,
    pub input_mode: InputMode,
    pub popup: Option<Popup>,

    // Chat state
    pub conversation: ConversationStore,
    pub composer: Composer,
    pub input_cursor: usize,
    pub chat_scroll: u16,
    pub chat_max_scroll: u16,
    pub chat_height: u16,
    pub follow_output: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub stream_task: Option<tokio::task::JoinHandle<()>>,

    // Attach prompt state
    pub attach_input: String,
    pub attach_cursor: usize,
    pub attachment_policy: AttachmentPolicy,

    // Settings page state (local edits until saved)
    pub settings: SettingsStore,
    pub api_key_input: String,
    pub api_key_cursor: usize,
    pub selected_model: String,
    pub model_state: ListState,

    // How-to-use page
    pub help_scroll: u16,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    backend: Arc<dyn ChatBackend>,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, events: UnboundedSender<AppEvent>) -> Result<Self> {
        let storage_path = config.storage_path()?;
        info!("opening storage at {}", storage_path.display());
        let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&storage_path)?);

        let base_url = config.api_base_url();
        let client = match config.request_timeout() {
            Some(timeout) => GroqClient::with_connect_timeout(&base_url, timeout)?,
            None => GroqClient::new(&base_url),
        };

        Self::with_parts(storage, Arc::new(client), config.attachment_policy(), events)
    }

    pub fn with_parts(
        storage: Arc<dyn KeyValueStore>,
        backend: Arc<dyn ChatBackend>,
        attachment_policy: AttachmentPolicy,
        events: UnboundedSender<AppEvent>,
    ) -> Result<Self> {
        let conversation = ConversationStore::load(storage.clone())?;
        let settings = SettingsStore::load(storage)?;

        let mut app = Self {
            should_quit: false,
            page: Page::Chat,
            input_mode: InputMode::Normal,
            popup: None,

            conversation,
            composer: Composer::new(),
            input_cursor: 0,
            chat_scroll: 0,
            chat_max_scroll: 0,
            chat_height: 0,
            follow_output: true,
            animation_frame: 0,
            stream_task: None,

            attach_input: String::new(),
            attach_cursor: 0,
            attachment_policy,

            settings,
            api_key_input: String::new(),
            api_key_cursor: 0,
            selected_model: String::new(),
            model_state: ListState::default(),

            help_scroll: 0,

            chat_area: None,

            backend,
            events,
        };
        app.reset_settings_form();
        Ok(app)
    }

    pub fn switch_page(&mut self, page: Page) {
        if page == Page::Settings && self.page != Page::Settings {
            self.reset_settings_form();
        }
        self.page = page;
        self.input_mode = InputMode::Normal;
    }

    // Chat actions

    /// Sends the composer contents. Refusals become notices; only storage
    /// failures are returned as errors.
    pub fn submit(&mut self) -> Result<()> {
        match submit::begin(&mut self.conversation, &self.settings, &mut self.composer) {
            Ok(submission) => {
                self.input_cursor = 0;
                self.input_mode = InputMode::Normal;
                self.follow_output = true;
                self.spawn_stream(submission);
                Ok(())
            }
            Err(SubmitError::MissingApiKey) => {
                self.popup = Some(Popup::Notice(SubmitError::MissingApiKey.to_string()));
                Ok(())
            }
            Err(SubmitError::NothingToSend) | Err(SubmitError::Busy) => Ok(()),
            Err(SubmitError::Storage(e)) => Err(e),
        }
    }

    fn spawn_stream(&mut self, submission: Submission) {
        let backend = self.backend.clone();
        let tx = self.events.clone();
        debug!("streaming reply from {}", submission.model());

        self.stream_task = Some(tokio::spawn(async move {
            match backend.stream_chat(submission.api_key(), submission.request()).await {
                Ok(mut fragments) => {
                    while let Some(item) = fragments.next().await {
                        match item {
                            Ok(fragment) => {
                                if tx.send(AppEvent::StreamFragment(fragment)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                let _ = tx.send(AppEvent::StreamFailed(e.to_string()));
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::StreamFailed(e.to_string()));
                }
            }
            let _ = tx.send(AppEvent::StreamFinished);
        }));
    }

    pub fn on_stream_fragment(&mut self, fragment: &str) -> Result<()> {
        submit::apply_fragment(&mut self.conversation, fragment)?;
        Ok(())
    }

    pub fn on_stream_failed(&mut self, reason: &str) -> Result<()> {
        submit::record_failure(&mut self.conversation, &reason)
    }

    pub fn on_stream_finished(&mut self) {
        submit::finish(&mut self.composer);
        self.stream_task = None;
    }

    pub fn is_streaming(&self) -> bool {
        self.composer.busy
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.conversation.clear()?;
        self.chat_scroll = 0;
        self.follow_output = true;
        info!("conversation history cleared");
        Ok(())
    }

    pub fn open_attach_prompt(&mut self) {
        if self.composer.busy {
            return;
        }
        self.attach_input.clear();
        self.attach_cursor = 0;
        self.popup = Some(Popup::AttachPath);
    }

    /// Reads the file named in the attach prompt into the composer
    pub fn attach_from_prompt(&mut self) {
        let raw = self.attach_input.trim().to_string();
        self.attach_input.clear();
        self.attach_cursor = 0;
        self.popup = None;

        if raw.is_empty() {
            return;
        }

        let path = expand_home(&raw);
        let result = AttachedFile::read(&path).and_then(|file| {
            let kind = file.kind();
            self.composer.attach(file, self.attachment_policy).map(|_| kind)
        });

        match result {
            Ok(AttachmentKind::Text) => {
                self.input_cursor = self.composer.input.chars().count();
            }
            Ok(_) => {}
            Err(e) => {
                warn!("attachment rejected: {}", e);
                self.popup = Some(Popup::Notice(e.to_string()));
            }
        }
    }

    // Chat scrolling (max scroll is recomputed on every render)
    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_max_scroll);
        self.follow_output = self.chat_scroll >= self.chat_max_scroll;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_output = false;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_output = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.chat_max_scroll;
        self.follow_output = true;
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.composer.busy {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Settings page

    pub fn reset_settings_form(&mut self) {
        self.api_key_input = self.settings.api_key().to_string();
        self.api_key_cursor = self.api_key_input.chars().count();
        self.selected_model = self.settings.model().to_string();
        let index = models::all().iter().position(|m| m.id == self.selected_model);
        self.model_state.select(index);
    }

    pub fn model_options(&self) -> Vec<ModelOption> {
        models::all()
    }

    pub fn model_nav_down(&mut self) {
        let options = models::all();
        let i = match self.model_state.selected() {
            Some(i) => (i + 1).min(options.len() - 1),
            None => 0,
        };
        self.model_state.select(Some(i));
        self.selected_model = options[i].id.to_string();
    }

    pub fn model_nav_up(&mut self) {
        let options = models::all();
        let i = self.model_state.selected().unwrap_or(0).saturating_sub(1);
        self.model_state.select(Some(i));
        self.selected_model = options[i].id.to_string();
    }

    pub fn save_settings(&mut self) -> Result<()> {
        let api_key = self.api_key_input.trim().to_string();
        self.settings.save(&api_key, &self.selected_model)?;
        self.reset_settings_form();
        self.input_mode = InputMode::Normal;
        self.popup = Some(Popup::Notice("Settings saved.".to_string()));
        Ok(())
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
