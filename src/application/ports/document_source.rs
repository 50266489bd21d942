//! Document Source Port - 输入文档转纯文本

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(String),
}

#[async_trait]
pub trait DocumentSourcePort: Send + Sync {
    /// 读取输入文档并返回纯文本
    async fn load_text(&self, path: &Path) -> Result<String, SourceError>;
}
