//! Scripted Model - 离线的确定性语言模型
//!
//! 不访问网络：按标题正则回答结构发现请求，按章节内容生成固定格式的总结。
//! 可注入预设回答、按章节位置注入失败、模拟上下文上限，用于测试和离线演练。

use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::application::ports::{LanguageModelPort, ModelError, ModelRequest};
use crate::application::services::prompts::{
    ANALYSIS_TASK, BOOK_STRUCTURE_TASK, CHAPTER_TITLE_LABEL, LINE_NUMBER_SEPARATOR, SECTION_STRUCTURE_TASK,
    TEXT_MARKER,
};
use crate::domain::text_segmenter::{normalize_whitespace, prefix_chars};

/// 默认章节标题：Markdown 一/二级标题、"Chapter N"、"第N章"
pub const DEFAULT_BOOK_HEADING: &str = r"^(#{1,2} \S.*|(?i:chapter|part) [0-9ivxlc]+\b.*|第[0-9一二三四五六七八九十百]+[章回].*)$";
/// 默认小节标题：Markdown 三级标题、"* * *" 分隔
pub const DEFAULT_SECTION_HEADING: &str = r"^(### \S.*|\* \* \*)$";

const OVERFLOW_MESSAGE: &str = "The input token count exceeds the maximum number of tokens allowed";

/// Scripted Model 配置
#[derive(Debug, Clone)]
pub struct ScriptedModelConfig {
    pub name: String,
    pub book_heading: String,
    pub section_heading: String,
    /// 请求字符数上限，超过时返回上下文过大错误
    pub max_request_chars: Option<usize>,
}

impl Default for ScriptedModelConfig {
    fn default() -> Self {
        Self {
            name: "scripted".to_string(),
            book_heading: DEFAULT_BOOK_HEADING.to_string(),
            section_heading: DEFAULT_SECTION_HEADING.to_string(),
            max_request_chars: None,
        }
    }
}

/// 请求类型（由提示词首行判断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    BookStructure,
    SectionStructure,
    Analysis,
    Other,
}

impl RequestKind {
    fn of(prompt: &str) -> Self {
        match prompt.lines().next().unwrap_or_default() {
            BOOK_STRUCTURE_TASK => Self::BookStructure,
            SECTION_STRUCTURE_TASK => Self::SectionStructure,
            ANALYSIS_TASK => Self::Analysis,
            _ => Self::Other,
        }
    }
}

#[derive(Default)]
struct Script {
    /// 预设回答，按请求顺序消费
    replies: VecDeque<Result<String, ModelError>>,
    /// 按章节位置（1-based）注入的失败，仅生效一次
    analysis_failures: HashMap<usize, ModelError>,
    requests: Vec<ModelRequest>,
}

pub struct ScriptedModel {
    name: String,
    book_heading: Regex,
    section_heading: Regex,
    max_request_chars: Option<usize>,
    script: Mutex<Script>,
}

impl ScriptedModel {
    pub fn new(config: ScriptedModelConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            name: config.name,
            book_heading: Regex::new(&config.book_heading)?,
            section_heading: Regex::new(&config.section_heading)?,
            max_request_chars: config.max_request_chars,
            script: Mutex::new(Script::default()),
        })
    }

    pub fn with_defaults() -> Result<Self, regex::Error> {
        Self::new(ScriptedModelConfig::default())
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 追加一条预设回答（优先于自动回答）
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script().replies.push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: ModelError) {
        self.script().replies.push_back(Err(error));
    }

    /// 第 `position` 章（1-based）的首次分析请求返回 `error`
    pub fn fail_analysis_at(&self, position: usize, error: ModelError) {
        self.script().analysis_failures.insert(position, error);
    }

    /// 已收到的全部请求
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script().requests.clone()
    }

    pub fn requests_of(&self, kind: RequestKind) -> Vec<ModelRequest> {
        self.script()
            .requests
            .iter()
            .filter(|r| RequestKind::of(&r.prompt) == kind)
            .cloned()
            .collect()
    }

    fn structure_reply(&self, prompt: &str, heading: &Regex, always_first_line: bool) -> String {
        let lines = numbered_lines(prompt);
        let shown = lines.last().map(|(n, _)| *n).unwrap_or(0);
        let truncated = declared_line_count(prompt).is_some_and(|total| total > shown);

        let mut entries: Vec<serde_json::Value> = Vec::new();
        let mut seen_content = false;
        for (n, text) in &lines {
            let trimmed = text.trim();
            let is_heading = !trimmed.is_empty() && heading.is_match(trimmed);
            if is_heading {
                if entries.is_empty() && *n != 1 && (seen_content || always_first_line) {
                    entries.push(opening_entry());
                }
                let anchor = normalize_whitespace(trimmed);
                entries.push(serde_json::json!({
                    "line": n,
                    "anchor": anchor,
                    "title": anchor.trim_start_matches('#').trim(),
                }));
            }
            seen_content |= !trimmed.is_empty();
        }
        if entries.is_empty() {
            entries.push(opening_entry());
        }

        let pattern = truncated.then(|| heading.as_str().to_string());
        serde_json::json!({ "chapters": entries, "heading_pattern": pattern }).to_string()
    }
}

fn opening_entry() -> serde_json::Value {
    serde_json::json!({ "line": 1, "anchor": "", "title": "Opening" })
}

/// 解析 TEXT_MARKER 之后的 "N| text" 行
fn numbered_lines(prompt: &str) -> Vec<(usize, &str)> {
    let Some((_, body)) = prompt.split_once(TEXT_MARKER) else {
        return Vec::new();
    };
    body.lines()
        .filter_map(|line| {
            let (number, text) = line.split_once(LINE_NUMBER_SEPARATOR.trim_end())?;
            let n = number.parse::<usize>().ok()?;
            Some((n, text.strip_prefix(' ').unwrap_or(text)))
        })
        .collect()
}

fn declared_line_count(prompt: &str) -> Option<usize> {
    let rest = prompt.split("The text has ").nth(1)?;
    rest.split_whitespace().next()?.parse().ok()
}

fn analysis_position(prompt: &str) -> Option<usize> {
    let rest = prompt.split("Position: ").nth(1)?;
    rest.split_whitespace().next()?.parse().ok()
}

/// 确定性总结：标题、首句作为要点、首个非空行作为引文
fn analysis_reply(prompt: &str) -> String {
    let title = prompt
        .lines()
        .find_map(|l| l.strip_prefix(CHAPTER_TITLE_LABEL))
        .unwrap_or("Untitled")
        .trim();
    let body = prompt.split_once(TEXT_MARKER).map(|(_, b)| b).unwrap_or_default();
    let normalized = normalize_whitespace(body);
    let gist = prefix_chars(&normalized, 160);
    let quote = body
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| prefix_chars(l, 80))
        .unwrap_or_default();

    format!(
        "# {}\n\n**Gist** {}\n\n**Length** {} characters were read.\n\n> {}\n",
        title,
        gist,
        body.chars().count(),
        quote
    )
}

#[async_trait]
impl LanguageModelPort for ScriptedModel {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let kind = RequestKind::of(&request.prompt);
        let scripted = {
            let mut script = self.script();
            script.requests.push(request.clone());
            match script.replies.pop_front() {
                Some(reply) => Some(reply),
                None if kind == RequestKind::Analysis => analysis_position(&request.prompt)
                    .and_then(|p| script.analysis_failures.remove(&p))
                    .map(Err),
                None => None,
            }
        };

        tracing::debug!(kind = ?kind, chars = request.char_len(), scripted = scripted.is_some(), "ScriptedModel: request");

        if let Some(reply) = scripted {
            return reply;
        }

        if let Some(limit) = self.max_request_chars {
            if request.char_len() > limit {
                return Err(ModelError::service(400, OVERFLOW_MESSAGE));
            }
        }

        match kind {
            RequestKind::BookStructure => Ok(self.structure_reply(&request.prompt, &self.book_heading, false)),
            RequestKind::SectionStructure => Ok(self.structure_reply(&request.prompt, &self.section_heading, true)),
            RequestKind::Analysis => Ok(analysis_reply(&request.prompt)),
            RequestKind::Other => Err(ModelError::InvalidResponse("unrecognized request".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::discoverer::build_preview;
    use crate::application::services::prompts::{analysis_prompt, structure_prompt, DiscoveryScope};

    fn book_prompt(text: &str, max_chars: usize) -> String {
        let preview = build_preview(text, max_chars);
        structure_prompt(&DiscoveryScope::Book { title: "T".into() }, &preview, &[])
    }

    #[tokio::test]
    async fn test_book_structure_reply_lists_headings() {
        let model = ScriptedModel::with_defaults().unwrap();
        let text = "Title page\n\n# One\nbody\n# Two\nbody\n";
        let reply = model.generate(&ModelRequest::new(book_prompt(text, 10_000))).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&reply).unwrap();

        let lines: Vec<u64> = json["chapters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["line"].as_u64().unwrap())
            .collect();
        assert_eq!(lines, vec![1, 3, 5]);
        assert_eq!(json["chapters"][1]["title"], "One");
        assert!(json["heading_pattern"].is_null());
    }

    #[tokio::test]
    async fn test_truncated_preview_returns_pattern() {
        let model = ScriptedModel::with_defaults().unwrap();
        let text = "# One\nbody\n# Two\nbody\n# Three\nbody\n";
        let reply = model.generate(&ModelRequest::new(book_prompt(text, 20))).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["heading_pattern"], DEFAULT_BOOK_HEADING);
    }

    #[test]
    fn test_analysis_reply_condenses_body() {
        let body = "# Heading\n\nFirst   line of the\n chapter.\n";
        let reply = analysis_reply(&analysis_prompt("B", "One", 1, 1, "English", body, false));
        assert!(reply.starts_with("# One\n"));
        assert!(reply.contains("**Gist** # Heading First line of the chapter."));
        assert!(reply.contains("> First   line of the\n"));
    }

    #[tokio::test]
    async fn test_scripted_replies_and_failures() {
        let model = ScriptedModel::with_defaults().unwrap();
        model.push_reply("{}");
        model.fail_analysis_at(2, ModelError::InvalidResponse("boom".into()));

        let first = analysis_prompt("B", "One", 1, 3, "English", "Alpha.", false);
        let second = analysis_prompt("B", "Two", 2, 3, "English", "Beta.", false);

        assert_eq!(model.generate(&ModelRequest::new(first.clone())).await.unwrap(), "{}");
        assert!(model.generate(&ModelRequest::new(first)).await.unwrap().starts_with("# One\n"));
        assert!(model.generate(&ModelRequest::new(second.clone())).await.is_err());
        assert!(model.generate(&ModelRequest::new(second)).await.is_ok());
        assert_eq!(model.requests_of(RequestKind::Analysis).len(), 4);
    }

    #[tokio::test]
    async fn test_request_limit_reports_overflow() {
        let model = ScriptedModel::new(ScriptedModelConfig {
            max_request_chars: Some(10),
            ..Default::default()
        })
        .unwrap();
        let err = model
            .generate(&ModelRequest::new(analysis_prompt("B", "One", 1, 1, "English", "Alpha.", false)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("exceeds the maximum"));
    }
}
