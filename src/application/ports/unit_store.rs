//! Unit Store Port - 章节/总结的持久化存储
//!
//! 按索引寻址的追加式存储：已存在的索引不会被覆盖

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unit {0} already exists")]
    AlreadyExists(usize),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// 已持久化的单元
#[derive(Debug, Clone)]
pub struct StoredUnit {
    pub index: usize,
    pub title: String,
    pub content: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

/// Unit Store Port
#[async_trait]
pub trait UnitStorePort: Send + Sync {
    /// 存储目录
    fn dir(&self) -> &Path;

    async fn has(&self, index: usize) -> Result<bool, StoreError>;

    async fn get(&self, index: usize) -> Result<Option<StoredUnit>, StoreError>;

    /// 写入新单元；索引已存在时返回 `StoreError::AlreadyExists`
    async fn put(&self, index: usize, title: &str, content: &str) -> Result<PathBuf, StoreError>;

    /// 全部单元，按索引升序
    async fn list(&self) -> Result<Vec<StoredUnit>, StoreError>;

    /// 存储清单；尚未写入时返回 None
    async fn read_manifest(&self) -> Result<Option<String>, StoreError>;

    /// 写入存储清单（覆盖旧清单）
    async fn write_manifest(&self, content: &str) -> Result<(), StoreError>;
}
