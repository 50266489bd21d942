//! Renderer Adapters
//!
//! 两个渲染器共享总结文件的读取与清洗逻辑

mod html_reader;
mod markdown_book;

pub use html_reader::{HtmlReaderRenderer, HTML_READER_FILE};
pub use markdown_book::{MarkdownBookRenderer, MARKDOWN_BOOK_FILE};

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::application::ports::{RenderError, UnitStorePort};
use crate::domain::book::Summary;
use crate::infrastructure::adapters::storage::FileUnitStore;

/// 待渲染的一章总结
#[derive(Debug, Clone)]
pub(crate) struct SummaryEntry {
    pub index: usize,
    /// 取自总结的 "# " 标题，缺失时用文件名标题
    pub title: String,
    pub markdown: String,
}

/// 读取目录中全部总结（按章节索引升序）
pub(crate) async fn load_summaries(dir: &Path) -> Result<Vec<SummaryEntry>, RenderError> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Err(RenderError::NoSummaries(dir.display().to_string()));
    }

    let store = FileUnitStore::summaries(dir)
        .await
        .map_err(|e| RenderError::Io(e.to_string()))?;
    let units = store.list().await.map_err(|e| RenderError::Io(e.to_string()))?;
    if units.is_empty() {
        return Err(RenderError::NoSummaries(dir.display().to_string()));
    }

    Ok(units
        .into_iter()
        .map(|unit| {
            let markdown = clean_summary(&unit.content);
            let summary = Summary::restore(unit.index, unit.title.clone(), markdown.clone(), unit.modified);
            let title = summary.sections().title.unwrap_or(unit.title);
            SummaryEntry {
                index: unit.index,
                title,
                markdown,
            }
        })
        .collect())
}

/// 去掉模型偶尔加在开头的角色寒暄行，合并多余空行
pub(crate) fn clean_summary(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    if let Some(first) = lines.first() {
        if first.to_lowercase().contains("ghost-reader") && !first.trim_start().starts_with('#') {
            lines.remove(0);
        }
    }

    let mut out = String::new();
    let mut blank_run = 0;
    for line in lines {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn chapter_prefix_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^第[一二三四五六七八九十百千万\d]+章[：:\s]*").ok())
        .as_ref()
}

/// 目录项标题：去掉 "第N章" 前缀
pub(crate) fn toc_title(title: &str) -> String {
    let stripped = match chapter_prefix_regex() {
        Some(re) => re.replace(title.trim(), "").into_owned(),
        None => title.trim().to_string(),
    };
    if stripped.is_empty() {
        title.trim().to_string()
    } else {
        stripped
    }
}
