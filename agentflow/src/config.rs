//! Process configuration.
//!
//! Every field has a serde default, so a partial JSON document (or `{}`) yields a
//! usable configuration.

use crate::errors::AgentflowError;
use crate::runner::RunnerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentflowConfig {
    /// Fan-out and retry settings shared by every workflow.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Podcast workflow settings.
    #[serde(default)]
    pub podcast: PodcastConfig,
    /// Q&A workflow settings.
    #[serde(default)]
    pub qa: QaConfig,
    /// Research workflow settings.
    #[serde(default)]
    pub research: ResearchConfig,
    /// Directory receiving generated artifacts.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

fn default_output_root() -> PathBuf {
    PathBuf::from("outputs/kb_outputs")
}

impl Default for AgentflowConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            podcast: PodcastConfig::default(),
            qa: QaConfig::default(),
            research: ResearchConfig::default(),
            output_root: default_output_root(),
            log: LogConfig::default(),
        }
    }
}

impl AgentflowConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, AgentflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AgentflowError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Sets the output root.
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Sets the runner section.
    #[must_use]
    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), AgentflowError> {
        self.runner.validate()?;
        if self.podcast.max_chars == 0 {
            return Err(AgentflowError::Config("podcast.max_chars must be positive".into()));
        }
        if self.research.max_top_k == 0 {
            return Err(AgentflowError::Config("research.max_top_k must be positive".into()));
        }
        Ok(())
    }
}

/// Podcast workflow settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastConfig {
    /// Character budget per speech chunk.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Output sample rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Temperature for script generation.
    #[serde(default = "default_script_temperature")]
    pub script_temperature: f32,
    /// Characters kept from each parsed file.
    #[serde(default = "default_content_char_limit")]
    pub content_char_limit: usize,
}

fn default_max_chars() -> usize {
    1500
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_script_temperature() -> f32 {
    0.7
}

fn default_content_char_limit() -> usize {
    50_000
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            sample_rate: default_sample_rate(),
            script_temperature: default_script_temperature(),
            content_char_limit: default_content_char_limit(),
        }
    }
}

/// Q&A workflow settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaConfig {
    /// Characters of each file sent for analysis.
    #[serde(default = "default_content_char_limit")]
    pub content_char_limit: usize,
    /// Characters of each analysis logged at debug level.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Temperature for per-file analysis.
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,
    /// Temperature for the final answer.
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,
}

fn default_preview_chars() -> usize {
    1000
}

fn default_analysis_temperature() -> f32 {
    0.3
}

fn default_answer_temperature() -> f32 {
    0.7
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            content_char_limit: default_content_char_limit(),
            preview_chars: default_preview_chars(),
            analysis_temperature: default_analysis_temperature(),
            answer_temperature: default_answer_temperature(),
        }
    }
}

/// Research workflow settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Hits requested when the request names none.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Upper clamp for requested hits.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

fn default_top_k() -> usize {
    10
}

fn default_max_top_k() -> usize {
    50
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}
