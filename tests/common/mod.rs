#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bookdigest::application::ports::LanguageModelPort;
use bookdigest::application::BookPipeline;
use bookdigest::config::{AppConfig, LlmProvider};
use bookdigest::infrastructure::ScriptedModel;

pub const BOOK_FILE: &str = "Lantern Tales -- Ada Writer.txt";

/// `n` 句话，每句 10 个单词
pub fn prose(n: usize) -> String {
    (0..n)
        .map(|_| "The old lantern keeper walks through the quiet green valley.")
        .collect::<Vec<_>>()
        .join(" ")
}

/// `chapters` 章，每章 12 句；`long_chapter`（1-based）由四个 15 句的小节组成
pub fn lantern_book(chapters: usize, long_chapter: Option<usize>) -> String {
    let mut text = String::new();
    for n in 1..=chapters {
        text.push_str(&format!("# Chapter {}\n\n", n));
        if Some(n) == long_chapter {
            for part in ["Alpha", "Beta", "Gamma", "Delta"] {
                text.push_str(&format!("### Part {}\n\n{}\n\n", part, prose(15)));
            }
        } else {
            text.push_str(&format!("{}\n\n", prose(12)));
        }
    }
    text
}

pub fn write_book(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join(BOOK_FILE);
    std::fs::write(&path, text).unwrap();
    path
}

pub fn scripted_config(base_dir: &Path, max_chapter_words: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.llm.provider = LlmProvider::Scripted;
    config.storage.base_dir = base_dir.to_path_buf();
    config.splitter.max_chapter_words = max_chapter_words;
    config.analysis.output_language = "English".to_string();
    config
}

pub async fn pipeline(config: &AppConfig, model: &Arc<ScriptedModel>) -> BookPipeline {
    let model: Arc<dyn LanguageModelPort> = model.clone();
    bookdigest::build_pipeline(config, model).await.unwrap()
}

/// 目录中按文件名排序的 (文件名, 内容)
pub fn read_dir_sorted(dir: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .map(|p| {
            (
                p.file_name().unwrap().to_string_lossy().into_owned(),
                std::fs::read_to_string(&p).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}
