//! Book Context - Aggregate Root

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{BookError, BookInfo, Language};
use crate::domain::text_segmenter::count_words;

/// Document 聚合根
///
/// 不变量:
/// - 加载后全文不可修改
/// - 全文至少含一个非空白字符
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    source_path: PathBuf,
    text: String,
    info: BookInfo,
    language: Language,
}

impl Document {
    /// 从已提取的纯文本创建文档，元数据从文件名推断
    pub fn new(source_path: impl Into<PathBuf>, text: String) -> Result<Self, BookError> {
        let source_path = source_path.into();
        if text.trim().is_empty() {
            return Err(BookError::EmptyDocument(source_path.display().to_string()));
        }
        let info = BookInfo::from_filename(&source_path);
        let language = Language::detect(&text);
        Ok(Self {
            source_path,
            text,
            info,
            language,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn info(&self) -> &BookInfo {
        &self.info
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn byte_len(&self) -> usize {
        self.text.len()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_creation() {
        let doc = Document::new("/tmp/Walden -- Henry Thoreau.txt", "I went to the woods.".to_string()).unwrap();
        assert_eq!(doc.info().title(), "Walden");
        assert_eq!(doc.info().author(), Some("Henry Thoreau"));
        assert_eq!(doc.language(), Language::En);
        assert_eq!(doc.word_count(), 5);
        assert_eq!(doc.char_len(), doc.byte_len());
    }

    #[test]
    fn test_blank_document_is_rejected() {
        assert!(matches!(
            Document::new("/tmp/blank.txt", " \n\t".to_string()),
            Err(BookError::EmptyDocument(_))
        ));
    }
}
