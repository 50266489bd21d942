//! Book Commands

use std::path::PathBuf;

/// 切分书籍：发现章节边界并写入章节存储
#[derive(Debug, Clone)]
pub struct SplitBook {
    pub input: PathBuf,
    /// 忽略已有章节，重新发现（要求章节存储为空）
    pub resplit: bool,
}

/// 按顺序分析已持久化的章节
#[derive(Debug, Clone, Default)]
pub struct AnalyzeBook {
    /// 输入文件（仅用于推断书名）
    pub input: Option<PathBuf>,
    pub resume_from: Option<usize>,
}

/// 由总结目录生成产物
#[derive(Debug, Clone, Default)]
pub struct RenderBook {
    /// 输入文件（仅用于推断书名和作者）
    pub input: Option<PathBuf>,
}

/// 完整流水线
#[derive(Debug, Clone)]
pub struct RunPipeline {
    pub input: PathBuf,
    pub resplit: bool,
    pub resume_from: Option<usize>,
}
