//! 应用服务 - 分章与分析流水线的各个阶段

pub mod analyzer;
pub mod assembler;
pub mod discoverer;
pub mod executor;
pub mod prompts;
pub mod splitter;

pub use analyzer::{AnalysisError, AnalysisOutcome, AnalysisSettings, ContinuityAnalyzer};
pub use assembler::{ArtifactAssembler, AssemblyReport, COVER_FILES};
pub use discoverer::{BoundaryDiscoverer, DiscoveryError, StructureError};
pub use executor::{classify, BackoffPolicy, CallError, CallExecutor, FailureKind};
pub use prompts::DiscoveryScope;
pub use splitter::{ChapterSplitter, SplitError, SplitOutcome, SplitWarning, SplitterSettings};
