//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（LanguageModel、UnitStore、DocumentSource、Renderer）
//! - services: 流水线各阶段（调用执行器、边界发现、切分、分析、产物汇总）
//! - commands: 命令及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod services;

// Re-exports
pub use commands::{
    handlers::{
        AnalyzeBookHandler, BookPipeline, PipelineReport, RenderBookHandler, SplitBookHandler, SplitBookResponse,
    },
    AnalyzeBook, RenderBook, RunPipeline, SplitBook,
};

pub use error::PipelineError;

pub use ports::{
    DocumentSourcePort, LanguageModelPort, ModelError, ModelRequest, RenderError, RendererPort, SourceError,
    StoreError, StoredUnit, UnitStorePort,
};

pub use services::{
    AnalysisError, AnalysisOutcome, AnalysisSettings, ArtifactAssembler, AssemblyReport, BackoffPolicy,
    BoundaryDiscoverer, CallError, CallExecutor, ChapterSplitter, ContinuityAnalyzer, DiscoveryError,
    DiscoveryScope, FailureKind, SplitError, SplitWarning, SplitterSettings, StructureError,
};
