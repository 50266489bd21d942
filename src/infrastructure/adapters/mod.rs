//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod llm;
pub mod render;
pub mod source;
pub mod storage;

pub use llm::*;
pub use render::{HtmlReaderRenderer, MarkdownBookRenderer};
pub use source::*;
pub use storage::*;
