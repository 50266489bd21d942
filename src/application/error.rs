//! 应用层错误定义
//!
//! 流水线各阶段的失败统一为 `PipelineError`，携带阶段名与章节索引

use thiserror::Error;

use crate::application::ports::{SourceError, StoreError};
use crate::application::services::{AnalysisError, DiscoveryError, SplitError};
use crate::domain::book::BookError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to load document: {0}")]
    Source(#[from] SourceError),

    #[error("Invalid document: {0}")]
    Document(#[from] BookError),

    #[error("Chapter discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Chapter split failed: {0}")]
    Split(#[from] SplitError),

    #[error("Analysis failed at {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Chapter store {0} is not empty; clear it before re-splitting")]
    ChapterStoreNotEmpty(String),

    #[error("Chapter store {dir} has a gap: expected chapter {expected}, found {found}")]
    InconsistentChapters {
        dir: String,
        expected: usize,
        found: usize,
    },

    #[error("Chapter store {dir} is incomplete ({reason}); clear it and split again")]
    IncompleteChapters { dir: String, reason: String },

    #[error("No chapters in {0}; run split first")]
    NoChapters(String),

    #[error("No artifact was rendered: {0}")]
    Assembly(String),
}

impl PipelineError {
    /// 出错的阶段
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Source(_) | Self::Document(_) => "load",
            Self::Discovery(_) => "discover",
            Self::Split(_)
            | Self::ChapterStoreNotEmpty(_)
            | Self::InconsistentChapters { .. }
            | Self::IncompleteChapters { .. } => "split",
            Self::Analysis(_) | Self::NoChapters(_) => "analyze",
            Self::Store(_) => "store",
            Self::Assembly(_) => "render",
        }
    }

    /// 出错的章节索引（与章节无关时为 None）
    pub fn chapter_index(&self) -> Option<usize> {
        match self {
            Self::Analysis(e) => Some(e.chapter_index()),
            Self::InconsistentChapters { expected, .. } => Some(*expected),
            _ => None,
        }
    }
}
