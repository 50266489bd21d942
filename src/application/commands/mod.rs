//! 应用层 - 命令
//!
//! 流水线的每个阶段对应一个命令及其处理器

mod book_commands;

pub mod handlers;

pub use book_commands::*;
