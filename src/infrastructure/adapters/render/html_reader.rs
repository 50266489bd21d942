//! HTML Reader Renderer - 单文件交互式阅读页
//!
//! 左侧章节导航，右侧逐章显示总结；配置了章节目录时附带可折叠的原文。
//! 总结在生成时即转为 HTML，页面不依赖外部脚本或网络。

use async_trait::async_trait;
use html_escape::{encode_double_quoted_attribute, encode_text};
use pulldown_cmark::{html, Options, Parser};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{load_summaries, toc_title, SummaryEntry};
use crate::application::ports::{RenderError, RendererPort, UnitStorePort};
use crate::domain::book::BookMeta;
use crate::infrastructure::adapters::storage::FileUnitStore;

pub const HTML_READER_FILE: &str = "interactive_reader.html";

const STYLE: &str = r#"
* { box-sizing: border-box; }
body { margin: 0; font-family: -apple-system, "PingFang SC", "Noto Sans CJK SC", "Segoe UI", sans-serif; color: #222; background: #faf8f4; }
.container { display: flex; min-height: 100vh; }
.sidebar { width: 300px; flex-shrink: 0; position: sticky; top: 0; height: 100vh; overflow-y: auto; background: #2c3e50; color: #ecf0f1; padding: 24px 16px; }
.sidebar h2 { font-size: 18px; margin: 0 0 4px; }
.sidebar .meta { font-size: 12px; opacity: 0.7; margin-bottom: 16px; }
.chapter-list { list-style: none; padding: 0; margin: 0; }
.chapter-list a { display: block; padding: 8px 10px; border-radius: 4px; color: inherit; text-decoration: none; font-size: 14px; }
.chapter-list a:hover, .chapter-list a.active { background: rgba(255,255,255,0.12); }
.main-content { flex: 1; max-width: 860px; margin: 0 auto; padding: 48px 40px; line-height: 1.8; }
.chapter { display: none; }
.chapter.active { display: block; }
.chapter h1 { border-bottom: 2px solid #c0a062; padding-bottom: 8px; }
blockquote { margin: 16px 0; padding: 8px 16px; border-left: 4px solid #c0a062; background: #f3efe6; }
details.original { margin-top: 32px; border-top: 1px dashed #bbb; padding-top: 16px; }
details.original pre { white-space: pre-wrap; font-family: inherit; font-size: 14px; color: #555; }
.pager { display: flex; justify-content: space-between; margin-top: 40px; }
.pager button { padding: 8px 16px; border: 1px solid #c0a062; background: none; border-radius: 4px; cursor: pointer; }
"#;

const SCRIPT: &str = r#"
const chapters = Array.from(document.querySelectorAll('.chapter'));
const links = Array.from(document.querySelectorAll('.chapter-list a'));
function show(i) {
  if (i < 0 || i >= chapters.length) return;
  chapters.forEach((c, n) => c.classList.toggle('active', n === i));
  links.forEach((a, n) => a.classList.toggle('active', n === i));
  history.replaceState(null, '', '#' + chapters[i].id);
  window.scrollTo({ top: 0 });
}
links.forEach((a, i) => a.addEventListener('click', e => { e.preventDefault(); show(i); }));
document.querySelectorAll('[data-go]').forEach(b => b.addEventListener('click', () => show(Number(b.dataset.go))));
const start = chapters.findIndex(c => '#' + c.id === location.hash);
show(start >= 0 ? start : 0);
"#;

#[derive(Debug, Clone, Default)]
pub struct HtmlReaderRenderer {
    /// 章节原文目录（可选）
    chapters_dir: Option<PathBuf>,
}

impl HtmlReaderRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_originals(mut self, chapters_dir: impl Into<PathBuf>) -> Self {
        self.chapters_dir = Some(chapters_dir.into());
        self
    }

    /// 读取章节原文；目录缺失或读取失败时不附带原文
    async fn load_originals(&self) -> HashMap<usize, String> {
        let Some(dir) = &self.chapters_dir else {
            return HashMap::new();
        };
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            return HashMap::new();
        }

        let units = match FileUnitStore::chapters(dir).await {
            Ok(store) => store.list().await,
            Err(e) => Err(e),
        };
        match units {
            Ok(units) => units.into_iter().map(|u| (u.index, u.content)).collect(),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Chapter originals unavailable");
                HashMap::new()
            }
        }
    }

    fn compose(meta: &BookMeta, entries: &[SummaryEntry], originals: &HashMap<usize, String>) -> String {
        let mut nav = String::new();
        let mut body = String::new();

        for (n, entry) in entries.iter().enumerate() {
            let id = format!("chapter-{:03}", entry.index);
            nav.push_str(&format!(
                "<li><a href=\"#{}\">{}</a></li>\n",
                id,
                encode_text(&toc_title(&entry.title))
            ));

            body.push_str(&format!(
                "<article class=\"chapter\" id=\"{}\" data-title=\"{}\">\n",
                id,
                encode_double_quoted_attribute(&entry.title)
            ));
            body.push_str(&markdown_to_html(&entry.markdown));

            if let Some(original) = originals.get(&entry.index) {
                body.push_str("<details class=\"original\"><summary>Original text</summary><pre>");
                body.push_str(&encode_text(original));
                body.push_str("</pre></details>\n");
            }

            body.push_str("<div class=\"pager\">");
            if n > 0 {
                body.push_str(&format!("<button data-go=\"{}\">&larr; Previous</button>", n - 1));
            } else {
                body.push_str("<span></span>");
            }
            if n + 1 < entries.len() {
                body.push_str(&format!("<button data-go=\"{}\">Next &rarr;</button>", n + 1));
            }
            body.push_str("</div>\n</article>\n");
        }

        format!(
            "<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"UTF-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
             <title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n\
             <div class=\"container\">\n<aside class=\"sidebar\">\n<h2>{title}</h2>\n\
             <div class=\"meta\">{author} · {model} · {date} · {count} chapters</div>\n\
             <nav><ul class=\"chapter-list\">\n{nav}</ul></nav>\n</aside>\n\
             <main class=\"main-content\">\n{body}</main>\n</div>\n<script>{script}</script>\n</body>\n</html>\n",
            lang = "zh-CN",
            title = encode_text(&meta.title),
            author = encode_text(&meta.author),
            model = encode_text(&meta.model),
            date = encode_text(&meta.date),
            count = entries.len(),
            style = STYLE,
            nav = nav,
            body = body,
            script = SCRIPT,
        )
    }
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

#[async_trait]
impl RendererPort for HtmlReaderRenderer {
    fn name(&self) -> &str {
        "html"
    }

    async fn render(&self, summaries_dir: &Path, meta: &BookMeta, output_dir: &Path) -> Result<PathBuf, RenderError> {
        let entries = load_summaries(summaries_dir).await?;
        let originals = self.load_originals().await;
        let content = Self::compose(meta, &entries, &originals);

        let path = output_dir.join(HTML_READER_FILE);
        tokio::fs::write(&path, content).await?;

        tracing::debug!(
            path = %path.display(),
            chapters = entries.len(),
            originals = originals.len(),
            "HTML reader written"
        );
        Ok(path)
    }
}
