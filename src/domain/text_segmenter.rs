//! 文本工具
//!
//! 字数统计、句子断点、按句子拆分，以及文件名清理

/// 检查是否为句末标点（西文标点后需跟空白才算断点）
#[inline]
fn is_latin_terminator(ch: char) -> bool {
    matches!(ch, '.' | '?' | '!')
}

/// 中文句末标点，不需要后随空白
#[inline]
fn is_cjk_terminator(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！')
}

#[inline]
pub fn is_cjk(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

#[inline]
fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// 统计文本字数
///
/// - 含拉丁字母：统计纯 ASCII 字母组成的单词
/// - 含中文：统计汉字个数
/// - 其他：统计 `\w+` 片段
pub fn count_words(text: &str) -> usize {
    if text.chars().any(|c| c.is_ascii_alphabetic()) {
        text.split(|c: char| !is_word_char(c))
            .filter(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic()))
            .count()
    } else if text.chars().any(is_cjk) {
        text.chars().filter(|c| is_cjk(*c)).count()
    } else {
        text.split(|c: char| !is_word_char(c))
            .filter(|token| !token.is_empty())
            .count()
    }
}

/// 找到所有句子断点（字节偏移，位于句末标点及其后空白之后）
///
/// 结果总是以 `text.len()` 结尾。
pub fn sentence_breaks(text: &str) -> Vec<usize> {
    let mut breaks = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        let terminated = if is_cjk_terminator(ch) {
            true
        } else if is_latin_terminator(ch) {
            matches!(chars.peek(), Some((_, next)) if next.is_whitespace())
        } else {
            false
        };

        if !terminated {
            continue;
        }

        // 把后随空白归入前一句
        let mut end = text.len();
        while let Some(&(pos, next)) = chars.peek() {
            if next.is_whitespace() {
                chars.next();
            } else {
                end = pos;
                break;
            }
        }
        breaks.push(end);
    }

    if breaks.last() != Some(&text.len()) {
        breaks.push(text.len());
    }
    breaks.dedup();
    breaks
}

/// 在完整句子处拆分文本，每块不超过 `max_words`（单句超限时整句保留）
///
/// 所有块按顺序拼接后与原文完全一致。
pub fn split_at_sentences(text: &str, max_words: usize) -> Vec<&str> {
    if text.is_empty() || count_words(text) <= max_words {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut chunk_start = 0;
    let mut chunk_words = 0;
    let mut sentence_start = 0;

    for brk in sentence_breaks(text) {
        let sentence_words = count_words(&text[sentence_start..brk]);
        if chunk_words + sentence_words > max_words && sentence_start > chunk_start {
            chunks.push(&text[chunk_start..sentence_start]);
            chunk_start = sentence_start;
            chunk_words = 0;
        }
        chunk_words += sentence_words;
        sentence_start = brk;
    }

    if chunk_start < text.len() {
        chunks.push(&text[chunk_start..]);
    }
    chunks
}

/// 折叠连续空白并去除首尾空白
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 取前 `max_chars` 个字符（按字符边界截断）
pub fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((pos, _)) => &text[..pos],
        None => text,
    }
}

/// 清理标题用于文件名：非字母数字替换为 `_`，合并连续 `_`，截断长度
pub fn sanitize_for_filename(title: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    let cut = prefix_chars(trimmed, max_chars).trim_end_matches('_');
    if cut.is_empty() {
        "Untitled".to_string()
    } else {
        cut.to_string()
    }
}
