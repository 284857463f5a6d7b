//! The per-invocation state record.

use super::extensions::Extensions;
use super::request::Request;
use crate::errors::AgentflowError;
use crate::services::{DocumentKind, SearchHit};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result of parsing one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ContentOutcome {
    /// Extracted text, possibly truncated.
    Parsed(String),
    /// Parsing failed with this message.
    Failed(String),
}

impl ContentOutcome {
    /// The parsed text, if parsing succeeded.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Parsed(text) => Some(text),
            Self::Failed(_) => None,
        }
    }
}

/// Result of analysing one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// The model's analysis.
    Completed(String),
    /// Analysis failed with this message.
    Failed(String),
}

impl AnalysisOutcome {
    /// Whether the analysis failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Text to place into a downstream prompt. Failures render as a visible placeholder.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Completed(text) => text.clone(),
            Self::Failed(message) => format!("[Analysis failed: {message}]"),
        }
    }
}

/// Parsed content of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// File name without directories.
    pub filename: String,
    /// Detected document kind.
    pub kind: DocumentKind,
    /// Parse result.
    pub outcome: ContentOutcome,
}

/// Analysis of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// File name without directories.
    pub filename: String,
    /// Analysis result.
    pub outcome: AnalysisOutcome,
}

/// State threaded through every step of one pipeline invocation.
///
/// The engine never initializes fields on a step's behalf: a step that reads a field
/// no earlier step wrote gets [`AgentflowError::MissingField`] from the matching
/// `require_*` accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// The immutable request.
    pub request: Request,
    /// Directory receiving artifacts for this run.
    pub result_path: Option<PathBuf>,
    /// Parsed file contents, in input order.
    pub file_contents: Vec<FileContent>,
    /// Per-file analyses, in input order.
    pub file_analyses: Vec<FileAnalysis>,
    /// Generated podcast script.
    pub podcast_script: Option<String>,
    /// Written podcast audio.
    pub audio_path: Option<PathBuf>,
    /// Final answer text.
    pub answer: Option<String>,
    /// Search hits.
    pub sources: Vec<SearchHit>,
    /// Typed side-channel values.
    pub extensions: Extensions,
}

impl PipelineState {
    /// Creates the initial state for `request`.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            result_path: None,
            file_contents: Vec::new(),
            file_analyses: Vec::new(),
            podcast_script: None,
            audio_path: None,
            answer: None,
            sources: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    /// Returns the artifact directory.
    pub fn require_result_path(&self) -> Result<&Path, AgentflowError> {
        self.result_path
            .as_deref()
            .ok_or(AgentflowError::MissingField { field: "result_path" })
    }

    /// Returns the podcast script.
    pub fn require_podcast_script(&self) -> Result<&str, AgentflowError> {
        self.podcast_script
            .as_deref()
            .ok_or(AgentflowError::MissingField {
                field: "podcast_script",
            })
    }

    /// Returns the answer.
    pub fn require_answer(&self) -> Result<&str, AgentflowError> {
        self.answer
            .as_deref()
            .ok_or(AgentflowError::MissingField { field: "answer" })
    }

    /// Parsed texts paired with file names, skipping failed parses.
    pub fn parsed_texts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.file_contents
            .iter()
            .filter_map(|c| c.outcome.text().map(|text| (c.filename.as_str(), text)))
    }
}
