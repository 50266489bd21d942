//! 提示词模板
//!
//! 每个提示词首行是任务标识，便于日志和桩模型识别请求类型。

use crate::domain::ValidationIssue;

pub const BOOK_STRUCTURE_TASK: &str = "Task: chapter boundaries";
pub const SECTION_STRUCTURE_TASK: &str = "Task: section boundaries";
pub const ANALYSIS_TASK: &str = "Task: chapter summary";

/// 正文开始标记（其后为带行号的预览或章节全文）
pub const TEXT_MARKER: &str = "=== TEXT ===";
/// 章节标题行前缀
pub const CHAPTER_TITLE_LABEL: &str = "Chapter title: ";

/// 预览中行号与行文本的分隔符
pub const LINE_NUMBER_SEPARATOR: &str = "| ";

/// 结构发现的作用范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryScope {
    /// 整本书 → 章节
    Book { title: String },
    /// 超长章节 → 小节
    Section {
        parent_title: String,
        words: usize,
        max_words: usize,
    },
}

impl DiscoveryScope {
    pub fn label(&self) -> &str {
        match self {
            Self::Book { .. } => "book",
            Self::Section { .. } => "section",
        }
    }
}

/// 带行号的预览
#[derive(Debug, Clone)]
pub struct Preview {
    /// 带行号的文本
    pub numbered: String,
    pub total_lines: usize,
    /// 预览中最后一行的行号
    pub shown_lines: usize,
    /// 最后一行只显示了开头部分
    pub cut_line: bool,
}

impl Preview {
    pub fn is_truncated(&self) -> bool {
        self.cut_line || self.shown_lines < self.total_lines
    }
}

pub fn structure_prompt(scope: &DiscoveryScope, preview: &Preview, feedback: &[ValidationIssue]) -> String {
    let mut prompt = String::new();

    match scope {
        DiscoveryScope::Book { title } => {
            prompt.push_str(BOOK_STRUCTURE_TASK);
            prompt.push_str("\n\n");
            prompt.push_str(&format!(
                "You are dividing the book \"{}\" into its chapters.\n\
                 Identify the real body chapters (prologue, parts, chapters, epilogue). \
                 A table of contents, title page or copyright page is front matter: \
                 it belongs to the first entry and is never a chapter of its own.\n",
                title
            ));
        }
        DiscoveryScope::Section {
            parent_title,
            words,
            max_words,
        } => {
            prompt.push_str(SECTION_STRUCTURE_TASK);
            prompt.push_str("\n\n");
            prompt.push_str(&format!(
                "The text below is the chapter \"{}\". It has {} words, more than the limit of {} words.\n\
                 Divide it into consecutive parts of at most {} words each. \
                 Start new parts at subheadings, scene breaks or paragraph starts, never inside a sentence. \
                 The first part starts at line 1.\n",
                parent_title, words, max_words, max_words
            ));
        }
    }

    prompt.push_str(&format!(
        "\nThe text has {} lines. Each line is shown as \"N{}text\" where N is its line number.\n",
        preview.total_lines, LINE_NUMBER_SEPARATOR
    ));

    if preview.cut_line {
        prompt.push_str(&format!(
            "Line {} is too long to show in full; only its beginning is shown.\n",
            preview.shown_lines
        ));
    }

    if preview.shown_lines < preview.total_lines {
        prompt.push_str(&format!(
            "Only lines 1-{} are shown. Also return \"heading_pattern\": a regular expression \
             (Rust regex syntax) that matches the full text of a heading line like the ones you found, \
             so headings in lines {}-{} can be located. Use null if headings follow no pattern.\n",
            preview.shown_lines,
            preview.shown_lines + 1,
            preview.total_lines
        ));
    }

    prompt.push_str(
        "\nRules:\n\
         - One entry per part, in text order.\n\
         - \"line\" is the line number where the part starts; \"anchor\" is that line's text copied exactly; \"title\" is a short human-readable title.\n\
         - Line numbers must be strictly increasing. Never repeat a line.\n\
         - The first entry must start at or before the first line that has content.\n\
         \nAnswer with JSON only:\n\
         {\"chapters\": [{\"line\": 1, \"anchor\": \"...\", \"title\": \"...\"}], \"heading_pattern\": null}\n",
    );

    if !feedback.is_empty() {
        prompt.push_str("\nYour previous answer was rejected:\n");
        for issue in feedback {
            prompt.push_str(&format!("- [{}] {}\n", issue.check(), issue));
        }
        prompt.push_str("Fix these problems and return the complete corrected list.\n");
    }

    prompt.push('\n');
    prompt.push_str(TEXT_MARKER);
    prompt.push('\n');
    prompt.push_str(&preview.numbered);
    prompt
}

/// 章节分析提示词
pub fn analysis_prompt(
    book_title: &str,
    chapter_title: &str,
    position: usize,
    total: usize,
    output_language: &str,
    chapter_text: &str,
    truncated: bool,
) -> String {
    let mut prompt = format!(
        "{task}\n\n\
         You are an expert ghost-reader. Rewrite the chapter below as a high-fidelity condensed version: \
         reading it should feel like reading the original, with no memorable detail lost.\n\n\
         Book: {book}\n\
         {label}{chapter}\n\
         Position: {position} of {total}\n\n\
         Principles:\n\
         - State the content directly in the book's own tone. Never write \"the author discusses\" or \"this chapter covers\".\n\
         - Every claim is followed by the concrete case, data, story or image the book uses to support it.\n\
         - Narrative chapters follow the plot; argumentative chapters go insight, evidence, advice; \
         popular-science chapters keep the analogies and thought experiments.\n\
         - Caption-only fragments (map labels, coordinates) are ignored. Functional chapters (contents, acknowledgements) get one sentence.\n\n\
         Format:\n\
         - Markdown. Start with a single \"# \" heading holding the chapter title.\n\
         - Each key point is a paragraph that opens with a **bold theme**.\n\
         - Quote notable passages on their own line starting with \"> \".\n\
         - Write everything, including the heading, in {language}.\n",
        task = ANALYSIS_TASK,
        book = book_title,
        label = CHAPTER_TITLE_LABEL,
        chapter = chapter_title,
        position = position,
        total = total,
        language = output_language,
    );

    if truncated {
        prompt.push_str("\nThe chapter text was shortened to fit; summarize what is shown.\n");
    }

    prompt.push('\n');
    prompt.push_str(TEXT_MARKER);
    prompt.push('\n');
    prompt.push_str(chapter_text);
    prompt
}

pub fn previous_summary_context(summary: &str) -> String {
    format!("Summary of the previous chapter (for continuity):\n{}", summary)
}

pub fn digest_context(entries: &[String]) -> String {
    format!("Earlier chapters in brief:\n{}", entries.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(shown: usize, total: usize) -> Preview {
        Preview {
            numbered: "1| CHAPTER ONE\n2| text".to_string(),
            total_lines: total,
            shown_lines: shown,
            cut_line: false,
        }
    }

    #[test]
    fn test_structure_prompt_mentions_pattern_only_when_truncated() {
        let scope = DiscoveryScope::Book { title: "Walden".into() };
        let full = structure_prompt(&scope, &preview(2, 2), &[]);
        assert!(full.starts_with(BOOK_STRUCTURE_TASK));
        assert!(!full.contains("heading_pattern\": a regular"));

        let cut = structure_prompt(&scope, &preview(2, 900), &[]);
        assert!(cut.contains("Only lines 1-2 are shown"));
        assert!(cut.ends_with("1| CHAPTER ONE\n2| text"));
    }

    #[test]
    fn test_structure_prompt_carries_feedback() {
        let scope = DiscoveryScope::Section {
            parent_title: "Chapter 7".into(),
            words: 21000,
            max_words: 7000,
        };
        let issues = vec![ValidationIssue::OutOfOrder {
            index: 2,
            line: 3,
            previous_line: 9,
        }];
        let prompt = structure_prompt(&scope, &preview(2, 2), &issues);
        assert!(prompt.starts_with(SECTION_STRUCTURE_TASK));
        assert!(prompt.contains("[strict-order] boundary #3 at line 3"));
    }

    #[test]
    fn test_analysis_prompt_layout() {
        let prompt = analysis_prompt("Walden", "Economy", 1, 18, "English", "Body.", false);
        assert!(prompt.starts_with(ANALYSIS_TASK));
        assert!(prompt.contains("Chapter title: Economy\n"));
        assert!(prompt.ends_with("=== TEXT ===\nBody."));
    }
}
