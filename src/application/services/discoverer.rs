//! Boundary Discoverer - 由模型提出章节边界，在本地校验
//!
//! 流程:
//! 1. 按预算构建带行号的预览（超出部分以截断标记代替）
//! 2. 请求模型返回 (line, anchor, title) 列表，可附带 heading_pattern
//! 3. 校验失败时把失败原因反馈给模型，同一预览最多尝试 `max_attempts` 次
//! 4. 模型报告上下文超限时按预算序列缩小预览

use regex::RegexBuilder;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::executor::{CallError, CallExecutor};
use super::prompts::{self, DiscoveryScope, Preview, LINE_NUMBER_SEPARATOR};
use crate::application::ports::ModelRequest;
use crate::domain::text_segmenter::{normalize_whitespace, prefix_chars};
use crate::domain::{BoundaryMap, BoundaryProposal, LineIndex, PreviewBudget, ValidationIssue};

/// heading_pattern 编译后的大小上限
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// 校验重试耗尽
#[derive(Debug, Clone, Error)]
pub struct StructureError {
    pub scope: String,
    pub attempts: u32,
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no valid boundary map for {} after {} attempts",
            self.scope, self.attempts
        )?;
        for issue in &self.issues {
            write!(f, "; [{}] {}", issue.check(), issue)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("preview budget exhausted at {min_chars} chars: {message}")]
    BudgetExhausted { min_chars: usize, message: String },

    #[error(transparent)]
    Call(#[from] CallError),
}

#[derive(Debug, Deserialize)]
struct StructureResponse {
    #[serde(default, alias = "chapters", alias = "sections", alias = "parts")]
    boundaries: Vec<BoundaryProposal>,
    #[serde(default)]
    heading_pattern: Option<String>,
}

pub struct BoundaryDiscoverer {
    executor: Arc<CallExecutor>,
    budget: PreviewBudget,
    max_attempts: u32,
    temperature: f32,
}

impl BoundaryDiscoverer {
    pub fn new(executor: Arc<CallExecutor>, budget: PreviewBudget, max_attempts: u32, temperature: f32) -> Self {
        Self {
            executor,
            budget,
            max_attempts: max_attempts.max(1),
            temperature,
        }
    }

    pub async fn discover(&self, text: &str, scope: &DiscoveryScope) -> Result<BoundaryMap, DiscoveryError> {
        let mut budgets = self.budget.schedule(text.chars().count());
        let mut budget = budgets.next().unwrap_or(self.budget.min_chars);
        let mut feedback: Vec<ValidationIssue> = Vec::new();
        let mut attempts = 0;

        loop {
            let preview = build_preview(text, budget);
            let request = ModelRequest::new(prompts::structure_prompt(scope, &preview, &feedback))
                .with_temperature(self.temperature);

            tracing::debug!(
                scope = scope.label(),
                budget = budget,
                shown_lines = preview.shown_lines,
                total_lines = preview.total_lines,
                attempt = attempts + 1,
                "Requesting boundary proposals"
            );

            let response = match self.executor.invoke(&request).await {
                Ok(response) => response,
                Err(CallError::ContextTooLarge { message }) => match budgets.next() {
                    Some(smaller) => {
                        tracing::warn!(scope = scope.label(), from = budget, to = smaller, "Preview too large, shrinking");
                        budget = smaller;
                        continue;
                    }
                    None => {
                        tracing::error!(scope = scope.label(), budget = budget, "Preview budget exhausted");
                        return Err(DiscoveryError::BudgetExhausted {
                            min_chars: self.budget.min_chars,
                            message,
                        });
                    }
                },
                Err(e) => return Err(e.into()),
            };

            attempts += 1;
            match interpret(text, &preview, &response) {
                Ok(map) => {
                    tracing::info!(
                        scope = scope.label(),
                        boundaries = map.len(),
                        attempts = attempts,
                        "Boundary map validated"
                    );
                    return Ok(map);
                }
                Err(issues) => {
                    for issue in &issues {
                        tracing::warn!(
                            scope = scope.label(),
                            attempt = attempts,
                            check = issue.check(),
                            issue = %issue,
                            "Boundary proposal rejected"
                        );
                    }
                    if attempts >= self.max_attempts {
                        return Err(StructureError {
                            scope: describe(scope),
                            attempts,
                            issues,
                        }
                        .into());
                    }
                    feedback = issues;
                }
            }
        }
    }
}

fn describe(scope: &DiscoveryScope) -> String {
    match scope {
        DiscoveryScope::Book { title } => format!("book \"{}\"", title),
        DiscoveryScope::Section { parent_title, .. } => format!("chapter \"{}\"", parent_title),
    }
}

/// 构建带行号的预览，最多包含 `max_chars` 个原文字符（换行符计入，末行无换行）
///
/// 首行就放不下时只显示其开头部分，此时预览同样视为被截断。
pub fn build_preview(text: &str, max_chars: usize) -> Preview {
    let index = LineIndex::new(text);
    let total_lines = index.line_count();
    let mut numbered = String::new();
    let mut used = 0;
    let mut shown_lines = 0;
    let mut cut_line = false;

    for (n, line) in index.lines() {
        let chars = line.chars().count();
        let newline = usize::from(n < total_lines);
        let remaining = max_chars.saturating_sub(used);
        if chars + newline <= remaining {
            numbered.push_str(&format!("{}{}{}\n", n, LINE_NUMBER_SEPARATOR, line));
            used += chars + newline;
            shown_lines = n;
            continue;
        }
        if shown_lines == 0 && remaining > 0 {
            let shown = prefix_chars(line, remaining);
            numbered.push_str(&format!("{}{}{}\n", n, LINE_NUMBER_SEPARATOR, shown));
            cut_line = shown.len() < line.len();
            shown_lines = n;
        }
        break;
    }

    if cut_line {
        numbered.push_str(&format!("[... truncated: the rest of line {} is not shown ...]\n", shown_lines));
    }
    if shown_lines < total_lines {
        numbered.push_str(&format!(
            "[... truncated: lines {}-{} not shown ...]\n",
            shown_lines + 1,
            total_lines
        ));
    }

    Preview {
        numbered,
        total_lines,
        shown_lines,
        cut_line,
    }
}

/// 解析模型回答并校验
fn interpret(text: &str, preview: &Preview, response: &str) -> Result<BoundaryMap, Vec<ValidationIssue>> {
    let parsed = parse_response(response).map_err(|reason| vec![ValidationIssue::Unparseable { reason }])?;
    let mut proposals = parsed.boundaries;

    if let Some(pattern) = parsed.heading_pattern.filter(|p| !p.trim().is_empty()) {
        if preview.is_truncated() {
            let extra = scan_unseen(text, preview.shown_lines, &pattern)?;
            tracing::debug!(pattern = %pattern, matches = extra.len(), "Heading pattern applied beyond preview");
            proposals.extend(extra);
        }
    }

    BoundaryMap::validate(text, &proposals)
}

fn parse_response(response: &str) -> Result<StructureResponse, String> {
    let start = response.find('{').ok_or_else(|| "no JSON object found".to_string())?;
    let end = response.rfind('}').ok_or_else(|| "no JSON object found".to_string())?;
    if end < start {
        return Err("no JSON object found".to_string());
    }
    serde_json::from_str(&response[start..=end]).map_err(|e| e.to_string())
}

/// 在预览之外的行中查找标题行
fn scan_unseen(text: &str, shown_lines: usize, pattern: &str) -> Result<Vec<BoundaryProposal>, Vec<ValidationIssue>> {
    let regex = RegexBuilder::new(pattern)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| {
            vec![ValidationIssue::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }]
        })?;

    let index = LineIndex::new(text);
    Ok(index
        .lines()
        .skip(shown_lines)
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && regex.is_match(trimmed)
        })
        .map(|(n, line)| {
            let anchor = normalize_whitespace(line);
            BoundaryProposal::at_line(n, anchor.clone(), anchor)
        })
        .collect())
}
