//! External collaborators the pipelines call out to.
//!
//! Every trait here is a suspension point: the runner bounds how many calls are in
//! flight, and a slow call is cut off by the runner's per-call timeout. Concrete
//! wire clients live outside this crate and plug in behind these traits.

pub mod audio;
mod parser;

pub use parser::PlainTextParser;

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Broad classification of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// PDF or word-processor document.
    Document,
    /// Slide deck.
    Presentation,
    /// Image or video, analysed by attachment rather than text.
    Media,
    /// Plain text.
    Text,
}

impl DocumentKind {
    /// Classifies a path by its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" | "docx" | "doc" => Self::Document,
            "pptx" | "ppt" => Self::Presentation,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "mp4" | "mov" | "avi" | "mkv"
            | "webm" => Self::Media,
            _ => Self::Text,
        }
    }
}

/// Text extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// File name without directories.
    pub filename: String,
    /// Detected kind.
    pub kind: DocumentKind,
    /// Extracted text. Empty for media.
    pub text: String,
}

/// A completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Prompt text.
    pub prompt: String,
    /// Model identifier.
    pub model: String,
    /// Endpoint URL.
    pub endpoint: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// File sent alongside the prompt, for media analysis.
    pub attachment: Option<PathBuf>,
}

/// A speech synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Text to speak.
    pub text: String,
    /// Voice name.
    pub voice: String,
    /// Speech model identifier.
    pub model: String,
    /// Endpoint URL.
    pub endpoint: String,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub link: String,
    /// Short excerpt.
    pub snippet: String,
}

/// Extracts text from files.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Parser: Send + Sync {
    /// Parses one file.
    async fn parse(&self, path: &Path) -> Result<ParsedDocument, ServiceError>;
}

/// Text completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Completion: Send + Sync {
    /// Returns the model's reply to `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Speech synthesis backend returning raw PCM bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Synthesizes `request.text`. The bytes are headerless 16-bit mono PCM.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ServiceError>;
}

/// Web search backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Search: Send + Sync {
    /// Returns up to `top_k` hits for `query`.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, ServiceError>;
}

/// One handle to each collaborator.
#[derive(Clone)]
pub struct Services {
    /// File parser.
    pub parser: Arc<dyn Parser>,
    /// Completion backend.
    pub completion: Arc<dyn Completion>,
    /// Speech backend.
    pub speech: Arc<dyn SpeechSynthesis>,
    /// Search backend.
    pub search: Arc<dyn Search>,
}

impl Services {
    /// Bundles the collaborators.
    #[must_use]
    pub fn new(
        parser: Arc<dyn Parser>,
        completion: Arc<dyn Completion>,
        speech: Arc<dyn SpeechSynthesis>,
        search: Arc<dyn Search>,
    ) -> Self {
        Self {
            parser,
            completion,
            speech,
            search,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_kind_by_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/b/report.PDF")), DocumentKind::Document);
        assert_eq!(DocumentKind::from_path(Path::new("deck.pptx")), DocumentKind::Presentation);
        assert_eq!(DocumentKind::from_path(Path::new("clip.mp4")), DocumentKind::Media);
        assert_eq!(DocumentKind::from_path(Path::new("photo.jpeg")), DocumentKind::Media);
        assert_eq!(DocumentKind::from_path(Path::new("notes.md")), DocumentKind::Text);
        assert_eq!(DocumentKind::from_path(Path::new("README")), DocumentKind::Text);
    }

    #[tokio::test]
    async fn test_mocked_completion_through_trait_object() {
        let mut mock = MockCompletion::new();
        mock.expect_complete()
            .withf(|req| req.temperature > 0.5)
            .times(1)
            .returning(|req| Ok(format!("echo: {}", req.prompt)));

        let completion: Arc<dyn Completion> = Arc::new(mock);
        let reply = completion
            .complete(&CompletionRequest {
                prompt: "hi".into(),
                model: "m".into(),
                endpoint: String::new(),
                temperature: 0.7,
                attachment: None,
            })
            .await
            .unwrap();

        assert_eq!(reply, "echo: hi");
    }
}
