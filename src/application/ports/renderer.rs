//! Renderer Port - 产物渲染
//!
//! 输入为总结目录，输出一个产物文件

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::book::BookMeta;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No summaries found in {0}")]
    NoSummaries(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[async_trait]
pub trait RendererPort: Send + Sync {
    /// 渲染器名称（用于汇总报告）
    fn name(&self) -> &str;

    async fn render(&self, summaries_dir: &Path, meta: &BookMeta, output_dir: &Path) -> Result<PathBuf, RenderError>;
}
