//! File Unit Store - 文件系统单元存储实现
//!
//! 实现 UnitStorePort trait
//!
//! 文件名: `{index:03}_{title}{suffix}`，例如 `007_The_Storm.txt`、`007_The_Storm_summary.md`。
//! 写入先落到隐藏临时文件再 rename，中断时不会留下半个单元。
//! 清单保存在同一目录的 `manifest.json`。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::application::ports::{StoreError, StoredUnit, UnitStorePort};
use crate::domain::text_segmenter::sanitize_for_filename;

/// 章节文件后缀
pub const CHAPTER_SUFFIX: &str = ".txt";
/// 总结文件后缀
pub const SUMMARY_SUFFIX: &str = "_summary.md";

/// 清单文件名
pub const MANIFEST_FILE: &str = "manifest.json";

const TITLE_MAX_CHARS: usize = 60;
const INDEX_WIDTH: usize = 3;

pub struct FileUnitStore {
    dir: PathBuf,
    suffix: String,
}

impl FileUnitStore {
    /// 创建存储，目录不存在时自动创建
    pub async fn new(dir: impl AsRef<Path>, suffix: impl Into<String>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            suffix: suffix.into(),
        })
    }

    pub async fn chapters(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(dir, CHAPTER_SUFFIX).await
    }

    pub async fn summaries(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(dir, SUMMARY_SUFFIX).await
    }

    pub fn file_name(&self, index: usize, title: &str) -> String {
        format!(
            "{:0width$}_{}{}",
            index,
            sanitize_for_filename(title, TITLE_MAX_CHARS),
            self.suffix,
            width = INDEX_WIDTH
        )
    }

    /// 解析文件名为 (索引, 标题)；不属于本存储的文件返回 None
    fn parse_name(&self, name: &str) -> Option<(usize, String)> {
        let stem = name.strip_suffix(self.suffix.as_str())?;
        let (digits, title) = stem.split_once('_')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index = digits.parse().ok()?;
        Some((index, title.replace('_', " ")))
    }

    /// 目录中属于本存储的文件，按索引升序
    async fn entries(&self) -> Result<Vec<(usize, String, PathBuf)>, StoreError> {
        let mut found = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some((index, title)) = self.parse_name(name) {
                found.push((index, title, entry.path()));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));
        Ok(found)
    }

    /// 先写临时文件再 rename 到 `path`
    async fn write_atomic(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        let temp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&temp, content).await?;
        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_unit(index: usize, title: String, path: PathBuf) -> Result<StoredUnit, StoreError> {
        let content = fs::read_to_string(&path).await?;
        let modified: DateTime<Utc> = fs::metadata(&path)
            .await?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(StoredUnit {
            index,
            title,
            content,
            path,
            modified,
        })
    }
}

#[async_trait]
impl UnitStorePort for FileUnitStore {
    fn dir(&self) -> &Path {
        &self.dir
    }

    async fn has(&self, index: usize) -> Result<bool, StoreError> {
        Ok(self.entries().await?.iter().any(|(i, _, _)| *i == index))
    }

    async fn get(&self, index: usize) -> Result<Option<StoredUnit>, StoreError> {
        let entry = self.entries().await?.into_iter().find(|(i, _, _)| *i == index);
        match entry {
            Some((index, title, path)) => Ok(Some(Self::read_unit(index, title, path).await?)),
            None => Ok(None),
        }
    }

    async fn put(&self, index: usize, title: &str, content: &str) -> Result<PathBuf, StoreError> {
        if self.has(index).await? {
            return Err(StoreError::AlreadyExists(index));
        }

        let path = self.dir.join(self.file_name(index, title));
        self.write_atomic(&path, content).await?;

        tracing::debug!(
            index,
            path = %path.display(),
            bytes = content.len(),
            "Unit saved"
        );
        Ok(path)
    }

    async fn list(&self) -> Result<Vec<StoredUnit>, StoreError> {
        let mut units = Vec::new();
        for (index, title, path) in self.entries().await? {
            units.push(Self::read_unit(index, title, path).await?);
        }
        Ok(units)
    }

    async fn read_manifest(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.dir.join(MANIFEST_FILE)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_manifest(&self, content: &str) -> Result<(), StoreError> {
        let path = self.dir.join(MANIFEST_FILE);
        self.write_atomic(&path, content).await?;
        tracing::debug!(path = %path.display(), "Manifest saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_and_list_in_index_order() {
        let temp_dir = tempdir().unwrap();
        let store = FileUnitStore::chapters(temp_dir.path().join("chapters")).await.unwrap();

        store.put(10, "Ten", "ten\n").await.unwrap();
        let path = store.put(2, "Chapter 2: The Storm!", "  two\n\n").await.unwrap();
        assert!(path.ends_with("002_Chapter_2_The_Storm.txt"));

        let unit = store.get(2).await.unwrap().unwrap();
        assert_eq!(unit.content, "  two\n\n");
        assert_eq!(unit.title, "Chapter 2 The Storm");
        assert!(store.get(3).await.unwrap().is_none());

        let indices: Vec<usize> = store.list().await.unwrap().iter().map(|u| u.index).collect();
        assert_eq!(indices, vec![2, 10]);
    }

    #[tokio::test]
    async fn test_existing_index_is_never_overwritten() {
        let temp_dir = tempdir().unwrap();
        let store = FileUnitStore::summaries(temp_dir.path()).await.unwrap();

        store.put(0, "Intro", "first").await.unwrap();
        let err = store.put(0, "Other title", "second").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(0)));
        assert_eq!(store.get(0).await.unwrap().unwrap().content, "first");
    }

    #[tokio::test]
    async fn test_manifest_is_kept_apart_from_units() {
        let temp_dir = tempdir().unwrap();
        let store = FileUnitStore::chapters(temp_dir.path()).await.unwrap();
        assert!(store.read_manifest().await.unwrap().is_none());

        store.put(0, "One", "one\n").await.unwrap();
        store.write_manifest("{\"v\": 1}").await.unwrap();
        store.write_manifest("{\"v\": 2}").await.unwrap();

        assert_eq!(store.read_manifest().await.unwrap().as_deref(), Some("{\"v\": 2}"));
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(temp_dir.path().join(MANIFEST_FILE).is_file());
    }

    #[tokio::test]
    async fn test_foreign_files_are_ignored() {
        let temp_dir = tempdir().unwrap();
        let store = FileUnitStore::summaries(temp_dir.path()).await.unwrap();
        std::fs::write(temp_dir.path().join("00_Cover.md"), "cover").unwrap();
        std::fs::write(temp_dir.path().join("notes.md"), "x").unwrap();
        std::fs::write(temp_dir.path().join("x1_bad_summary.md"), "x").unwrap();
        store.put(1, "One", "# One").await.unwrap();

        let units = store.list().await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].index, 1);
        assert!(!store.has(0).await.unwrap());
    }
}
