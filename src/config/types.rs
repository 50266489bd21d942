//! Configuration Types
//!
//! 定义所有配置结构体，并提供到各服务设置的转换

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::{AnalysisSettings, BackoffPolicy, SplitterSettings};
use crate::domain::PreviewBudget;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 语言模型配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 重试退避配置
    #[serde(default)]
    pub retry: RetryConfig,

    /// 预览长度预算
    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub splitter: SplitterConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// 存储目录配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 模型提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Gemini generateContent HTTP 接口
    Gemini,
    /// 离线确定性模型（不访问网络）
    Scripted,
}

/// 语言模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,

    /// 服务基础 URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API Key（为空时读取 GEMINI_API_KEY）
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// 单次请求超时时间（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// 结构发现温度
    #[serde(default = "default_structure_temperature")]
    pub structure_temperature: f32,

    /// 章节分析温度
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,

    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

fn default_provider() -> LlmProvider {
    LlmProvider::Gemini
}

fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_llm_timeout() -> u64 {
    600
}

fn default_structure_temperature() -> f32 {
    0.3
}

fn default_analysis_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
            structure_temperature: default_structure_temperature(),
            analysis_temperature: default_analysis_temperature(),
            max_output_tokens: None,
        }
    }
}

impl LlmConfig {
    /// 已配置的 API Key（空字符串视为未配置）
    pub fn api_key(&self) -> Option<&str> {
        Some(self.api_key.trim()).filter(|k| !k.is_empty())
    }
}

/// 重试退避配置
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// 总尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 各次重试前的等待时间（秒）
    #[serde(default = "default_delays")]
    pub delays_secs: Vec<u64>,

    /// 服务端建议等待时间之外的额外余量（秒）
    #[serde(default = "default_padding")]
    pub suggested_wait_padding_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delays() -> Vec<u64> {
    vec![60, 90, 120, 150, 180]
}

fn default_padding() -> u64 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays_secs: default_delays(),
            suggested_wait_padding_secs: default_padding(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            delays: self.delays_secs.iter().copied().map(Duration::from_secs).collect(),
            suggested_wait_padding: Duration::from_secs(self.suggested_wait_padding_secs),
        }
    }
}

/// 预览长度预算（字符数）
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_initial_preview")]
    pub initial_preview_chars: usize,

    #[serde(default = "default_shrink_ratio")]
    pub shrink_ratio: f64,

    #[serde(default = "default_min_preview")]
    pub min_preview_chars: usize,
}

fn default_initial_preview() -> usize {
    400_000
}

fn default_shrink_ratio() -> f64 {
    0.75
}

fn default_min_preview() -> usize {
    12_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            initial_preview_chars: default_initial_preview(),
            shrink_ratio: default_shrink_ratio(),
            min_preview_chars: default_min_preview(),
        }
    }
}

impl BudgetConfig {
    pub fn budget(&self) -> PreviewBudget {
        PreviewBudget::new(self.initial_preview_chars, self.shrink_ratio, self.min_preview_chars)
    }
}

/// 结构发现配置
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// 结构校验失败后的最大尝试次数
    #[serde(default = "default_discovery_attempts")]
    pub max_attempts: u32,
}

fn default_discovery_attempts() -> u32 {
    3
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_discovery_attempts(),
        }
    }
}

/// 章节切分配置
#[derive(Debug, Clone, Deserialize)]
pub struct SplitterConfig {
    /// 叶子章节的字数上限
    #[serde(default = "default_max_chapter_words")]
    pub max_chapter_words: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

fn default_max_chapter_words() -> usize {
    7000
}

fn default_max_depth() -> u32 {
    3
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_chapter_words: default_max_chapter_words(),
            max_depth: default_max_depth(),
        }
    }
}

impl SplitterConfig {
    pub fn settings(&self) -> SplitterSettings {
        SplitterSettings {
            max_chapter_words: self.max_chapter_words,
            max_depth: self.max_depth,
        }
    }
}

/// 章节分析配置
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_full_context")]
    pub full_context_max_chars: usize,

    #[serde(default = "default_digest_max")]
    pub digest_max_chars: usize,

    #[serde(default = "default_digest_points")]
    pub digest_point_limit: usize,

    /// 总结使用的语言
    #[serde(default = "default_output_language")]
    pub output_language: String,
}

fn default_full_context() -> usize {
    12_000
}

fn default_digest_max() -> usize {
    4_000
}

fn default_digest_points() -> usize {
    5
}

fn default_output_language() -> String {
    "Simplified Chinese".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            full_context_max_chars: default_full_context(),
            digest_max_chars: default_digest_max(),
            digest_point_limit: default_digest_points(),
            output_language: default_output_language(),
        }
    }
}

impl AnalysisConfig {
    pub fn settings(&self, llm: &LlmConfig) -> AnalysisSettings {
        AnalysisSettings {
            full_context_max_chars: self.full_context_max_chars,
            digest_max_chars: self.digest_max_chars,
            digest_point_limit: self.digest_point_limit,
            output_language: self.output_language.clone(),
            temperature: llm.analysis_temperature,
            max_output_tokens: llm.max_output_tokens,
        }
    }
}

/// 存储配置
///
/// 未单独配置的目录都位于 `base_dir` 之下
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default)]
    pub chapters_dir: Option<PathBuf>,

    #[serde(default)]
    pub summaries_dir: Option<PathBuf>,

    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            chapters_dir: None,
            summaries_dir: None,
            output_dir: None,
        }
    }
}

impl StorageConfig {
    /// 章节原文目录
    pub fn chapters_dir(&self) -> PathBuf {
        self.chapters_dir.clone().unwrap_or_else(|| self.base_dir.join("chapters"))
    }

    /// 章节总结目录
    pub fn summaries_dir(&self) -> PathBuf {
        self.summaries_dir.clone().unwrap_or_else(|| self.base_dir.join("summaries"))
    }

    /// 渲染产物目录
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| self.base_dir.join("output"))
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
