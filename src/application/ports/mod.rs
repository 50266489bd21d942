//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod document_source;
mod language_model;
mod renderer;
mod unit_store;

pub use document_source::{DocumentSourcePort, SourceError};
pub use language_model::{LanguageModelPort, ModelError, ModelRequest};
pub use renderer::{RenderError, RendererPort};
pub use unit_store::{StoreError, StoredUnit, UnitStorePort};
