//! Book Context - Value Objects

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::domain::text_segmenter::{is_cjk, prefix_chars};

pub const DEFAULT_TITLE: &str = "Book Summary";
pub const DEFAULT_AUTHOR: &str = "Unknown Author";

/// 文件名中书名的最大字符数
const MAX_FILENAME_TITLE_CHARS: usize = 50;

/// 文档语言（按字符比例粗略判断）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    Unknown,
}

impl Language {
    pub fn detect(text: &str) -> Self {
        let mut cjk = 0usize;
        let mut latin = 0usize;
        let mut letters = 0usize;
        for ch in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            if is_cjk(ch) {
                cjk += 1;
            } else if ch.is_ascii_alphabetic() {
                latin += 1;
            }
        }

        if letters == 0 {
            return Self::Unknown;
        }
        if cjk * 10 >= letters * 3 {
            Self::Zh
        } else if latin * 2 > letters {
            Self::En
        } else {
            Self::Unknown
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// 从输入文件名解析出的书名/作者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    title: String,
    author: Option<String>,
}

impl BookInfo {
    pub fn new(title: impl Into<String>, author: Option<String>) -> Self {
        Self {
            title: title.into(),
            author,
        }
    }

    /// 支持 `书名 -- 作者` 与 `书名 - 作者`（仅出现一次 ` - ` 时）
    ///
    /// 作者截断到第一个 `,` 或 `;`，书名超过 50 字符时截断并追加 `...`。
    pub fn from_filename(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (title, author) = if let Some((title, author)) = stem.split_once(" -- ") {
            (title.trim().to_string(), clean_author(author))
        } else if stem.matches(" - ").count() == 1 {
            match stem.split_once(" - ") {
                Some((title, author)) => (title.trim().to_string(), clean_author(author)),
                None => (stem.trim().to_string(), None),
            }
        } else {
            (stem.trim().to_string(), None)
        };

        let title = if title.is_empty() {
            DEFAULT_TITLE.to_string()
        } else if title.chars().count() > MAX_FILENAME_TITLE_CHARS {
            format!("{}...", prefix_chars(&title, MAX_FILENAME_TITLE_CHARS))
        } else {
            title
        };

        Self { title, author }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
}

fn clean_author(raw: &str) -> Option<String> {
    let author = raw.split([',', ';']).next().unwrap_or_default().trim();
    if author.is_empty() {
        None
    } else {
        Some(author.to_string())
    }
}

/// 封面文件内容
///
/// ```text
/// CAESAR - life of a colossus
///
/// by Adrian Goldsworthy
///
/// Summarized by bookdigest (gemini-2.5-pro)
/// 2026/01/26
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub model: Option<String>,
    /// 统一为 `YYYY/MM/DD`
    pub date: Option<String>,
}

fn date_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}[/-]\d{1,2}[/-]\d{1,2})").ok())
        .as_ref()
}

fn paren_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").ok()).as_ref()
}

impl CoverInfo {
    pub fn parse(content: &str) -> Self {
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let mut info = Self::default();
        let Some(first) = lines.first() else {
            return info;
        };
        info.title = Some(first.to_string());

        info.author = lines.iter().find_map(|line| {
            let lower = line.to_lowercase();
            lower
                .starts_with("by ")
                .then(|| line[3..].trim().to_string())
                .filter(|author| !author.is_empty())
        });

        if let Some(line) = lines
            .iter()
            .find(|line| line.to_lowercase().contains("summarized by"))
        {
            info.model = paren_regex()
                .and_then(|re| re.captures(line))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string());
        }

        info.date = lines.iter().find_map(|line| {
            date_regex()
                .and_then(|re| re.captures(line))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().replace('-', "/"))
        });

        info
    }
}

/// 渲染用的书籍元数据（封面 > 文件名 > 默认值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMeta {
    pub title: String,
    pub author: String,
    pub model: String,
    pub date: String,
}

impl BookMeta {
    pub fn resolve(cover: Option<&CoverInfo>, info: Option<&BookInfo>, model: &str, date: &str) -> Self {
        let cover = cover.cloned().unwrap_or_default();
        let title = cover
            .title
            .or_else(|| info.map(|i| i.title().to_string()))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let author = cover
            .author
            .or_else(|| info.and_then(|i| i.author().map(str::to_string)))
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());

        Self {
            title,
            author,
            model: cover.model.unwrap_or_else(|| model.to_string()),
            date: cover.date.unwrap_or_else(|| date.to_string()),
        }
    }
}
