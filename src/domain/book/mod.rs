//! Book Context - 书籍限界上下文
//!
//! 职责:
//! - 文档聚合（全文 + 元数据）
//! - 章节与总结实体
//! - 章节清单（切分完成凭据）
//! - 书籍元数据解析（文件名 / 封面文件）

mod aggregate;
mod entities;
mod errors;
mod manifest;
mod value_objects;

pub use aggregate::Document;
pub use entities::{Chapter, Summary, SummarySections};
pub use errors::BookError;
pub use manifest::{ChapterManifest, ManifestEntry};
pub use value_objects::{BookInfo, BookMeta, CoverInfo, Language};
