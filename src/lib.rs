//! Bookdigest - 长篇文档逐章总结流水线
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book: 文档、章节、总结、书籍元数据
//! - Boundary: 章节边界与校验
//! - Budget: 预览长度预算
//!
//! 应用层 (application/):
//! - Ports: 端口定义（LanguageModel, UnitStore, DocumentSource, Renderer）
//! - Services: 调用执行器、边界发现、章节切分、连续性分析、产物汇总
//! - Commands: 命令处理器与完整流水线
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP 模型客户端、离线模型、文件存储、文本读取、渲染器

pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use bootstrap::{build_model, build_pipeline, build_render_handler, BootstrapError};
pub use config::{load_config, AppConfig};
