//! Plain Text Source - 读取 UTF-8 文本/Markdown 文件
//!
//! 实现 DocumentSourcePort trait。去除 BOM，统一换行为 `\n`。

use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

use crate::application::ports::{DocumentSourcePort, SourceError};

/// 默认支持的扩展名
const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

pub struct PlainTextSource {
    extensions: Vec<String>,
}

impl Default for PlainTextSource {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl PlainTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into().to_lowercase());
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl DocumentSourcePort for PlainTextSource {
    async fn load_text(&self, path: &Path) -> Result<String, SourceError> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        if !self.accepts(path) {
            return Err(SourceError::Unsupported(format!(
                "{} (expected one of: {})",
                path.display(),
                self.extensions.join(", ")
            )));
        }

        let bytes = fs::read(path).await.map_err(|e| SourceError::Io(e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| SourceError::Unsupported(format!("{} is not UTF-8 text: {}", path.display(), e)))?;

        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let text = if text.contains('\r') {
            text.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            text.to_string()
        };

        tracing::debug!(path = %path.display(), bytes = text.len(), "Document text loaded");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_bom_and_crlf_are_normalized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, "\u{feff}Title\r\n\r\nBody\r\n").unwrap();

        let text = PlainTextSource::new().load_text(&path).await.unwrap();
        assert_eq!(text, "Title\n\nBody\n");
    }

    #[tokio::test]
    async fn test_missing_and_unsupported_files() {
        let dir = tempdir().unwrap();
        let source = PlainTextSource::new();

        let missing = source.load_text(&dir.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(missing, SourceError::NotFound(_)));

        let pdf = dir.path().join("book.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        assert!(matches!(source.load_text(&pdf).await.unwrap_err(), SourceError::Unsupported(_)));

        let source = source.with_extension("PDF");
        assert!(source.load_text(&pdf).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0x43, 0x61, 0x66, 0xe9]).unwrap();
        assert!(matches!(
            PlainTextSource::new().load_text(&path).await.unwrap_err(),
            SourceError::Unsupported(_)
        ));
    }
}
