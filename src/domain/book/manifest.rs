//! Book Context - Chapter Manifest
//!
//! 切分全部完成后写入章节存储。没有清单的章节目录视为中断的切分，不可复用。
//! 清单同时保存原始标题与细分深度（文件名里的标题经过清洗）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookError, Chapter, Document};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub title: String,
    pub depth: u32,
    /// 章节字符数
    pub chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterManifest {
    /// 源文件路径
    pub source: String,
    pub source_chars: usize,
    pub created_at: DateTime<Utc>,
    pub chapters: Vec<ManifestEntry>,
}

impl ChapterManifest {
    pub fn new(document: &Document, chapters: &[Chapter]) -> Self {
        Self {
            source: document.source_path().display().to_string(),
            source_chars: document.char_len(),
            created_at: Utc::now(),
            chapters: chapters
                .iter()
                .map(|chapter| ManifestEntry {
                    index: chapter.index(),
                    title: chapter.title().to_string(),
                    depth: chapter.depth(),
                    chars: chapter.char_count(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, BookError> {
        serde_json::to_string_pretty(self).map_err(|e| BookError::InvalidManifest(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, BookError> {
        serde_json::from_str(content).map_err(|e| BookError::InvalidManifest(e.to_string()))
    }

    /// 用清单核对已存储的 `(index, text)`，返回带原始标题和深度的章节
    pub fn restore(&self, stored: Vec<(usize, String)>) -> Result<Vec<Chapter>, BookError> {
        if stored.len() != self.chapters.len() {
            return Err(BookError::InvalidManifest(format!(
                "manifest lists {} chapters but {} are stored",
                self.chapters.len(),
                stored.len()
            )));
        }

        let mut chapters = Vec::with_capacity(stored.len());
        let mut total_chars = 0;
        for (entry, (index, text)) in self.chapters.iter().zip(stored) {
            let chars = text.chars().count();
            if entry.index != index || entry.chars != chars {
                return Err(BookError::InvalidManifest(format!(
                    "chapter {} ({} chars) does not match the manifest entry {} ({} chars)",
                    index, chars, entry.index, entry.chars
                )));
            }
            total_chars += chars;
            chapters.push(Chapter::new(index, entry.title.clone(), text, entry.depth)?);
        }

        if total_chars != self.source_chars {
            return Err(BookError::InvalidManifest(format!(
                "stored chapters hold {} chars but the source had {}",
                total_chars, self.source_chars
            )));
        }
        Ok(chapters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_book() -> (Document, Vec<Chapter>) {
        let document = Document::new("/books/Tales.txt", "ONE\nfirst.\nTWO\nsecond.\n".to_string()).unwrap();
        let chapters = vec![
            Chapter::new(0, "Chapter 1: One", "ONE\nfirst.\n", 0).unwrap(),
            Chapter::new(1, "Chapter 1: Two", "TWO\nsecond.\n", 1).unwrap(),
        ];
        (document, chapters)
    }

    fn stored(chapters: &[Chapter]) -> Vec<(usize, String)> {
        chapters.iter().map(|c| (c.index(), c.text().to_string())).collect()
    }

    #[test]
    fn test_restore_keeps_titles_and_depth() {
        let (document, chapters) = split_book();
        let manifest = ChapterManifest::from_json(&ChapterManifest::new(&document, &chapters).to_json().unwrap()).unwrap();

        let restored = manifest.restore(stored(&chapters)).unwrap();
        assert_eq!(restored, chapters);
        assert_eq!(restored[1].title(), "Chapter 1: Two");
        assert_eq!(restored[1].depth(), 1);
    }

    #[test]
    fn test_missing_or_changed_chapters_are_rejected() {
        let (document, chapters) = split_book();
        let manifest = ChapterManifest::new(&document, &chapters);

        let mut partial = stored(&chapters);
        partial.pop();
        assert!(matches!(manifest.restore(partial), Err(BookError::InvalidManifest(_))));

        let mut edited = stored(&chapters);
        edited[1].1.push_str("extra");
        assert!(matches!(manifest.restore(edited), Err(BookError::InvalidManifest(_))));
    }
}
