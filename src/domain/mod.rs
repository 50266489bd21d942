//! Domain Layer - 领域层
//!
//! - Book Context: 文档、章节、总结与书籍元数据
//! - 章节边界表及其校验
//! - 预览长度预算

pub mod book;

mod boundary;
mod budget;
pub mod text_segmenter;

pub use boundary::{Boundary, BoundaryMap, BoundaryProposal, LineIndex, ValidationIssue};
pub use budget::PreviewBudget;
