//! Book Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("文档内容为空: {0}")]
    EmptyDocument(String),

    #[error("无效的章节: {0}")]
    InvalidChapter(String),

    #[error("章节清单无效: {0}")]
    InvalidManifest(String),
}
