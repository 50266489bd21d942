//! Markdown Book Renderer - 将全部总结合并为一份 Markdown 书稿
//!
//! 结构：封面块 → 目录 → 各章总结（以分隔线隔开）

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{load_summaries, toc_title, SummaryEntry};
use crate::application::ports::{RenderError, RendererPort};
use crate::domain::book::BookMeta;

pub const MARKDOWN_BOOK_FILE: &str = "book_summary.md";

#[derive(Debug, Clone, Default)]
pub struct MarkdownBookRenderer;

impl MarkdownBookRenderer {
    pub fn new() -> Self {
        Self
    }

    fn compose(meta: &BookMeta, entries: &[SummaryEntry]) -> String {
        let mut out = String::new();

        out.push_str(&format!("# {}\n\n", meta.title));
        out.push_str(&format!("**{}**\n\n", meta.author));
        out.push_str(&format!("Summarized by {} · {}\n\n", meta.model, meta.date));
        out.push_str("---\n\n## Contents\n\n");
        for (n, entry) in entries.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", n + 1, toc_title(&entry.title)));
        }

        for entry in entries {
            out.push_str("\n---\n\n");
            out.push_str(&entry.markdown);
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl RendererPort for MarkdownBookRenderer {
    fn name(&self) -> &str {
        "markdown"
    }

    async fn render(&self, summaries_dir: &Path, meta: &BookMeta, output_dir: &Path) -> Result<PathBuf, RenderError> {
        let entries = load_summaries(summaries_dir).await?;
        let content = Self::compose(meta, &entries);

        let path = output_dir.join(MARKDOWN_BOOK_FILE);
        tokio::fs::write(&path, content).await?;

        tracing::debug!(path = %path.display(), chapters = entries.len(), "Markdown book written");
        Ok(path)
    }
}
