//! BoundaryMap - 章节边界及其校验
//!
//! 不变量:
//! - 偏移严格递增（均位于行首）
//! - 各 span `[start_i, start_{i+1})` 无缝覆盖全文，首个 span 从 0 开始
//! - 第一个边界位于首个非空白内容所在行或之前
//!
//! `BoundaryMap` 只能通过 [`BoundaryMap::validate`] 构造，构造后不可变。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::text_segmenter::normalize_whitespace;

/// 模型提出的一个边界（未经校验）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryProposal {
    /// 1-based 行号（可选，提供时边界固定在该行）
    #[serde(default, alias = "start_line")]
    pub line: Option<usize>,
    /// 标题行原文（或其开头部分）
    #[serde(default)]
    pub anchor: String,
    /// 章节标题
    #[serde(default)]
    pub title: String,
}

impl BoundaryProposal {
    pub fn at_line(line: usize, anchor: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            anchor: anchor.into(),
            title: title.into(),
        }
    }

    pub fn by_anchor(anchor: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            line: None,
            anchor: anchor.into(),
            title: title.into(),
        }
    }
}

/// 已定位的边界
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    offset: usize,
    line: usize,
    title: String,
}

impl Boundary {
    /// 字节偏移（行首）
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 1-based 行号
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// 校验失败的具体原因，Display 文本会原样反馈给模型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyText,
    NoBoundaries,
    LineOutOfRange {
        index: usize,
        line: usize,
        total_lines: usize,
    },
    AnchorMismatch {
        index: usize,
        line: usize,
        anchor: String,
        found: String,
    },
    AnchorNotFound {
        index: usize,
        anchor: String,
    },
    AnchorAmbiguous {
        index: usize,
        anchor: String,
        lines: Vec<usize>,
    },
    OutOfOrder {
        index: usize,
        line: usize,
        previous_line: usize,
    },
    LeadingContentUncovered {
        first_boundary_line: usize,
        first_content_line: usize,
    },
    EmptyPart {
        index: usize,
        line: usize,
    },
    InvalidPattern {
        pattern: String,
        reason: String,
    },
    Unparseable {
        reason: String,
    },
}

impl ValidationIssue {
    /// 失败的检查项名称（用于日志和诊断）
    pub fn check(&self) -> &'static str {
        match self {
            Self::EmptyText | Self::NoBoundaries => "non-empty",
            Self::LineOutOfRange { .. } => "line-range",
            Self::AnchorMismatch { .. } | Self::AnchorNotFound { .. } => "anchor-location",
            Self::AnchorAmbiguous { .. } => "anchor-uniqueness",
            Self::OutOfOrder { .. } => "strict-order",
            Self::LeadingContentUncovered { .. } | Self::EmptyPart { .. } => "coverage",
            Self::InvalidPattern { .. } => "heading-pattern",
            Self::Unparseable { .. } => "response-format",
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyText => write!(f, "the text contains no content to divide"),
            Self::NoBoundaries => write!(f, "no chapter boundaries were returned"),
            Self::LineOutOfRange {
                index,
                line,
                total_lines,
            } => write!(
                f,
                "boundary #{} cites line {} but the text has only {} lines",
                index + 1,
                line,
                total_lines
            ),
            Self::AnchorMismatch {
                index,
                line,
                anchor,
                found,
            } => write!(
                f,
                "boundary #{} cites line {} with anchor {:?}, but that line reads {:?}",
                index + 1,
                line,
                anchor,
                found
            ),
            Self::AnchorNotFound { index, anchor } => write!(
                f,
                "boundary #{} anchor {:?} does not start any line of the text",
                index + 1,
                anchor
            ),
            Self::AnchorAmbiguous {
                index,
                anchor,
                lines,
            } => write!(
                f,
                "boundary #{} anchor {:?} starts several lines ({:?}); give its line number",
                index + 1,
                anchor,
                lines
            ),
            Self::OutOfOrder {
                index,
                line,
                previous_line,
            } => write!(
                f,
                "boundary #{} at line {} does not come after the previous boundary at line {} (boundaries overlap or are out of order)",
                index + 1,
                line,
                previous_line
            ),
            Self::LeadingContentUncovered {
                first_boundary_line,
                first_content_line,
            } => write!(
                f,
                "the first boundary is at line {} but content starts at line {}; add a boundary covering the opening material",
                first_boundary_line, first_content_line
            ),
            Self::EmptyPart { index, line } => write!(
                f,
                "boundary #{} at line {} starts a part with no content; remove it or move it to a line with text",
                index + 1,
                line
            ),
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "heading_pattern {:?} is not a valid regex: {}", pattern, reason)
            }
            Self::Unparseable { reason } => {
                write!(f, "the response was not the requested JSON object: {}", reason)
            }
        }
    }
}

/// 文本行索引（按 `\n` 切分，行文本不含换行符及行尾 `\r`）
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(pos, _)| pos + 1));
        Self { text, starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// 1-based 行号对应的起始偏移
    pub fn offset_of(&self, line: usize) -> Option<usize> {
        line.checked_sub(1).and_then(|i| self.starts.get(i).copied())
    }

    /// 偏移所在的 1-based 行号
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// 1-based 行号对应的行文本
    pub fn line_text(&self, line: usize) -> Option<&'a str> {
        let start = self.offset_of(line)?;
        let end = self
            .starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches('\r'))
    }

    pub fn lines(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        (1..=self.line_count()).filter_map(move |n| self.line_text(n).map(|t| (n, t)))
    }
}

/// 已校验的章节边界表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryMap {
    boundaries: Vec<Boundary>,
    text_len: usize,
}

impl BoundaryMap {
    /// 校验模型提出的边界，成功时返回新的 `BoundaryMap`
    ///
    /// 失败时返回全部问题，供下一轮纠正反馈使用。
    pub fn validate(text: &str, proposals: &[BoundaryProposal]) -> Result<Self, Vec<ValidationIssue>> {
        let Some(first_content) = text.find(|c: char| !c.is_whitespace()) else {
            return Err(vec![ValidationIssue::EmptyText]);
        };
        if proposals.is_empty() {
            return Err(vec![ValidationIssue::NoBoundaries]);
        }

        let index = LineIndex::new(text);
        let mut issues = Vec::new();
        let mut located: Vec<(usize, Boundary)> = Vec::with_capacity(proposals.len());

        for (i, proposal) in proposals.iter().enumerate() {
            match locate(&index, i, proposal) {
                Ok(boundary) => located.push((i, boundary)),
                Err(issue) => issues.push(issue),
            }
        }

        for pair in located.windows(2) {
            let (_, previous) = &pair[0];
            let (i, current) = &pair[1];
            if current.offset <= previous.offset {
                issues.push(ValidationIssue::OutOfOrder {
                    index: *i,
                    line: current.line,
                    previous_line: previous.line,
                });
            }
        }

        if let Some((_, first)) = located.first() {
            let first_content_line = index.line_of(first_content);
            if first.line > first_content_line {
                issues.push(ValidationIssue::LeadingContentUncovered {
                    first_boundary_line: first.line,
                    first_content_line,
                });
            }
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        let map = Self {
            boundaries: located.iter().map(|(_, boundary)| boundary.clone()).collect(),
            text_len: text.len(),
        };
        // 每个部分都必须有非空白内容，末尾空行上的边界会切出空章节
        let empty: Vec<ValidationIssue> = map
            .spans()
            .into_iter()
            .zip(&located)
            .filter(|((start, end, _), _)| text[*start..*end].trim().is_empty())
            .map(|(_, (i, boundary))| ValidationIssue::EmptyPart {
                index: *i,
                line: boundary.line,
            })
            .collect();
        if !empty.is_empty() {
            return Err(empty);
        }

        Ok(map)
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn text_len(&self) -> usize {
        self.text_len
    }

    /// 每个章节的 `(start, end, title)`，首个 span 从 0 开始，末个 span 到文本末尾
    pub fn spans(&self) -> Vec<(usize, usize, &str)> {
        self.boundaries
            .iter()
            .enumerate()
            .map(|(i, boundary)| {
                let start = if i == 0 { 0 } else { boundary.offset };
                let end = self
                    .boundaries
                    .get(i + 1)
                    .map(|next| next.offset)
                    .unwrap_or(self.text_len);
                (start, end, boundary.title.as_str())
            })
            .collect()
    }

    /// 按边界切分文本，返回 `(title, slice)`
    pub fn slice<'t>(&self, text: &'t str) -> Vec<(String, &'t str)> {
        self.spans()
            .into_iter()
            .map(|(start, end, title)| (title.to_string(), &text[start..end]))
            .collect()
    }
}

fn boundary_title(proposal: &BoundaryProposal, anchor: &str, line_text: &str) -> String {
    let title = proposal.title.trim();
    if !title.is_empty() {
        title.to_string()
    } else if !anchor.is_empty() {
        anchor.to_string()
    } else {
        normalize_whitespace(line_text)
    }
}

fn locate(index: &LineIndex<'_>, i: usize, proposal: &BoundaryProposal) -> Result<Boundary, ValidationIssue> {
    let anchor = normalize_whitespace(&proposal.anchor);

    if let Some(line) = proposal.line {
        let (Some(line_text), Some(offset)) = (index.line_text(line), index.offset_of(line)) else {
            return Err(ValidationIssue::LineOutOfRange {
                index: i,
                line,
                total_lines: index.line_count(),
            });
        };
        let found = normalize_whitespace(line_text);
        if !anchor.is_empty() && !found.contains(&anchor) {
            return Err(ValidationIssue::AnchorMismatch {
                index: i,
                line,
                anchor,
                found,
            });
        }
        return Ok(Boundary {
            offset,
            line,
            title: boundary_title(proposal, &anchor, line_text),
        });
    }

    if anchor.is_empty() {
        return Err(ValidationIssue::AnchorNotFound { index: i, anchor });
    }

    let matches: Vec<(usize, &str)> = index
        .lines()
        .filter(|(_, text)| normalize_whitespace(text).starts_with(&anchor))
        .collect();

    match matches.as_slice() {
        [] => Err(ValidationIssue::AnchorNotFound { index: i, anchor }),
        [(line, line_text)] => Ok(Boundary {
            offset: index.offset_of(*line).unwrap_or(0),
            line: *line,
            title: boundary_title(proposal, &anchor, line_text),
        }),
        many => Err(ValidationIssue::AnchorAmbiguous {
            index: i,
            lines: many.iter().map(|(line, _)| *line).collect(),
            anchor,
        }),
    }
}
