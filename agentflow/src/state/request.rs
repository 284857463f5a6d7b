//! Immutable input parameters for one pipeline invocation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Podcast rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodcastMode {
    /// One narrator.
    #[default]
    Monologue,
    /// Two alternating speakers.
    Dialog,
}

/// One turn of prior conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role, e.g. `user` or `assistant`.
    pub role: String,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Caller-supplied parameters. Never mutated by steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Input files to parse.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Free-text query.
    #[serde(default)]
    pub query: String,
    /// Prior conversation turns.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    /// Completion model identifier.
    #[serde(default)]
    pub model: String,
    /// Completion endpoint.
    #[serde(default)]
    pub endpoint: String,
    /// Output language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Podcast style.
    #[serde(default)]
    pub podcast_mode: PodcastMode,
    /// Voice for speaker A.
    #[serde(default = "default_voice_a")]
    pub voice_a: String,
    /// Voice for speaker B.
    #[serde(default = "default_voice_b")]
    pub voice_b: String,
    /// Speech model identifier.
    #[serde(default)]
    pub tts_model: String,
    /// Owner of generated artifacts.
    #[serde(default = "default_user")]
    pub user: String,
    /// Requested number of search hits.
    #[serde(default)]
    pub top_k: Option<usize>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_voice_a() -> String {
    "Kore".to_string()
}

fn default_voice_b() -> String {
    "Puck".to_string()
}

fn default_user() -> String {
    "default".to_string()
}

impl Default for Request {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            query: String::new(),
            history: Vec::new(),
            model: String::new(),
            endpoint: String::new(),
            language: default_language(),
            podcast_mode: PodcastMode::default(),
            voice_a: default_voice_a(),
            voice_b: default_voice_b(),
            tts_model: String::new(),
            user: default_user(),
            top_k: None,
        }
    }
}

impl Request {
    /// Creates a request with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the input files.
    #[must_use]
    pub fn with_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the query.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Appends a history turn.
    #[must_use]
    pub fn with_history_message(mut self, message: ChatMessage) -> Self {
        self.history.push(message);
        self
    }

    /// Sets the completion model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the podcast mode.
    #[must_use]
    pub fn with_podcast_mode(mut self, mode: PodcastMode) -> Self {
        self.podcast_mode = mode;
        self
    }

    /// Sets the owning user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets the requested hit count.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Whether the requested language is Chinese.
    #[must_use]
    pub fn is_chinese(&self) -> bool {
        self.language.to_lowercase().starts_with("zh")
    }
}
