use super::{DocumentKind, ParsedDocument, Parser};
use crate::errors::ServiceError;
use async_trait::async_trait;
use std::path::Path;

/// Reads UTF-8 text files from disk.
///
/// Media files are not read; they parse to empty text and are analysed by attachment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl PlainTextParser {
    /// Creates a parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Parser for PlainTextParser {
    async fn parse(&self, path: &Path) -> Result<ParsedDocument, ServiceError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = DocumentKind::from_path(path);

        let text = if kind == DocumentKind::Media {
            tokio::fs::metadata(path)
                .await
                .map_err(|e| ServiceError::failed("parser", format!("{}: {e}", path.display())))?;
            String::new()
        } else {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ServiceError::failed("parser", format!("{}: {e}", path.display())))?
        };

        tracing::debug!(file = %filename, ?kind, chars = text.chars().count(), "Parsed file");
        Ok(ParsedDocument { filename, kind, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_reads_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello parser").unwrap();

        let doc = assert_ok!(PlainTextParser::new().parse(&path).await);
        assert_eq!(doc.filename, "notes.txt");
        assert_eq!(doc.kind, DocumentKind::Text);
        assert_eq!(doc.text, "hello parser");
    }

    #[tokio::test]
    async fn test_media_parses_to_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let doc = assert_ok!(PlainTextParser::new().parse(&path).await);
        assert_eq!(doc.kind, DocumentKind::Media);
        assert!(doc.text.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_service_error() {
        let err = assert_err!(PlainTextParser::new().parse(Path::new("/nonexistent/x.txt")).await);
        assert!(matches!(err, ServiceError::Failed { .. }));
    }
}
