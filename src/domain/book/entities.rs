//! Book Context - Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BookError;
use crate::domain::text_segmenter::{count_words, prefix_chars};

/// 叶子章节 - 送去分析的最小单位
///
/// 不变量:
/// - index 在全书内唯一且连续（从 0 开始）
/// - text 不可为空
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    index: usize,
    title: String,
    text: String,
    /// 递归拆分深度（0 为顶层章节）
    depth: u32,
}

impl Chapter {
    pub fn new(index: usize, title: impl Into<String>, text: impl Into<String>, depth: u32) -> Result<Self, BookError> {
        let text = text.into();
        if text.is_empty() {
            return Err(BookError::InvalidChapter(format!("章节 {} 内容为空", index)));
        }
        Ok(Self {
            index,
            title: title.into(),
            text,
            depth,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.text)
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 总结中识别出的结构
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummarySections {
    /// 第一个 `# ` 标题
    pub title: Option<String>,
    /// 以粗体开头的段落或列表项
    pub key_points: Vec<String>,
    /// `>` 引用段落
    pub passages: Vec<String>,
}

/// 单个叶子章节的总结，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    chapter_index: usize,
    title: String,
    text: String,
    generated_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(chapter_index: usize, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::restore(chapter_index, title, text, Utc::now())
    }

    /// 从持久化存储恢复
    pub fn restore(
        chapter_index: usize,
        title: impl Into<String>,
        text: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chapter_index,
            title: title.into(),
            text: text.into(),
            generated_at,
        }
    }

    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn sections(&self) -> SummarySections {
        let mut sections = SummarySections::default();

        for raw in self.text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(heading) = line.strip_prefix("# ") {
                if sections.title.is_none() {
                    sections.title = Some(heading.trim().to_string());
                }
            } else if let Some(quote) = line.strip_prefix('>') {
                let quote = quote.trim();
                if !quote.is_empty() {
                    sections.passages.push(quote.to_string());
                }
            } else if let Some(item) = strip_list_marker(line) {
                sections.key_points.push(strip_emphasis(item));
            } else if line.starts_with("**") {
                sections.key_points.push(strip_emphasis(line));
            }
        }

        sections
    }

    /// 压缩版总结：标题 + 前 `max_points` 个要点，最多 `max_chars` 个字符
    ///
    /// 没有识别出要点时退回到正文开头。
    pub fn condensed(&self, max_points: usize, max_chars: usize) -> String {
        let sections = self.sections();
        let title = sections.title.unwrap_or_else(|| self.title.clone());

        let mut out = format!("# {}\n", title);
        if sections.key_points.is_empty() {
            let body: Vec<&str> = self
                .text
                .lines()
                .filter(|line| !line.trim_start().starts_with('#'))
                .collect();
            out.push_str(body.join("\n").trim());
        } else {
            for point in sections.key_points.iter().take(max_points) {
                out.push_str("- ");
                out.push_str(point);
                out.push('\n');
            }
        }

        prefix_chars(out.trim_end(), max_chars).to_string()
    }
}

fn strip_list_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return Some(rest.trim());
        }
    }
    None
}

fn strip_emphasis(text: &str) -> String {
    text.replace("**", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = "# 第三章 渡河\n\n**决断时刻** 凯撒在河边停留了一夜。\n\n- **后勤** 粮草只够十天。\n- 士兵们开始唱歌。\n\n> 骰子已经掷下。\n\n普通段落不算要点。\n";

    #[test]
    fn test_chapter_rejects_empty_text() {
        assert!(Chapter::new(0, "Empty", "", 0).is_err());
        let chapter = Chapter::new(3, "One", "Alpha beta.", 1).unwrap();
        assert_eq!(chapter.index(), 3);
        assert_eq!(chapter.word_count(), 2);
        assert_eq!(chapter.depth(), 1);
    }

    #[test]
    fn test_summary_sections() {
        let summary = Summary::new(2, "渡河", SUMMARY);
        let sections = summary.sections();
        assert_eq!(sections.title.as_deref(), Some("第三章 渡河"));
        assert_eq!(
            sections.key_points,
            vec!["决断时刻 凯撒在河边停留了一夜。", "后勤 粮草只够十天。", "士兵们开始唱歌。"]
        );
        assert_eq!(sections.passages, vec!["骰子已经掷下。"]);
    }

    #[test]
    fn test_condensed_keeps_title_and_first_points() {
        let summary = Summary::new(2, "渡河", SUMMARY);
        let condensed = summary.condensed(2, 1000);
        assert_eq!(condensed, "# 第三章 渡河\n- 决断时刻 凯撒在河边停留了一夜。\n- 后勤 粮草只够十天。");

        let short = summary.condensed(2, 5);
        assert_eq!(short.chars().count(), 5);
    }

    #[test]
    fn test_condensed_without_points_uses_body() {
        let summary = Summary::new(0, "Intro", "# Intro\n\nJust prose here.\nMore prose.");
        assert_eq!(summary.condensed(3, 1000), "# Intro\nJust prose here.\nMore prose.");
    }
}
