//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（bookdigest.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, LlmProvider};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["bookdigest", "bookdigest.local"];

/// API Key 的备用环境变量
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BOOKDIGEST_`，层级分隔符 `__`）
/// 2. 配置文件（bookdigest.toml 或 bookdigest.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BOOKDIGEST_LLM__MODEL=gemini-2.5-flash`
/// - `BOOKDIGEST_RETRY__DELAYS_SECS=30,60,90`
/// - `BOOKDIGEST_SPLITTER__MAX_CHAPTER_WORDS=5000`
/// - `BOOKDIGEST_STORAGE__BASE_DIR=/data/walden`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("llm.provider", "gemini")?
        .set_default("llm.base_url", "https://generativelanguage.googleapis.com")?
        .set_default("llm.model", "gemini-2.5-pro")?
        .set_default("llm.timeout_secs", 600)?
        .set_default("retry.max_attempts", 5)?
        .set_default("retry.delays_secs", vec![60, 90, 120, 150, 180])?
        .set_default("retry.suggested_wait_padding_secs", 5)?
        .set_default("budget.initial_preview_chars", 400_000)?
        .set_default("budget.shrink_ratio", 0.75)?
        .set_default("budget.min_preview_chars", 12_000)?
        .set_default("discovery.max_attempts", 3)?
        .set_default("splitter.max_chapter_words", 7000)?
        .set_default("splitter.max_depth", 3)?
        .set_default("storage.base_dir", ".")?
        .set_default("log.level", "info")?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: BOOKDIGEST_LLM__MODEL=gemini-2.5-flash
    // 列表值以逗号分隔: BOOKDIGEST_RETRY__DELAYS_SECS=30,60
    builder = builder.add_source(
        Environment::with_prefix("BOOKDIGEST")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("retry.delays_secs")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let mut app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    apply_api_key_fallback(&mut app_config, std::env::var(API_KEY_ENV).ok());

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 配置中没有 API Key 时使用 `fallback`（来自 GEMINI_API_KEY）
fn apply_api_key_fallback(config: &mut AppConfig, fallback: Option<String>) {
    if config.llm.api_key().is_none() {
        if let Some(key) = fallback {
            config.llm.api_key = key;
        }
    }
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError("Model name cannot be empty".to_string()));
    }

    if config.llm.provider == LlmProvider::Gemini && config.llm.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError("LLM base URL cannot be empty".to_string()));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError("Retry max_attempts must be at least 1".to_string()));
    }

    if config.retry.delays_secs.is_empty() {
        return Err(ConfigError::ValidationError("Retry delays cannot be empty".to_string()));
    }

    if config.discovery.max_attempts == 0 {
        return Err(ConfigError::ValidationError("Discovery max_attempts must be at least 1".to_string()));
    }

    let budget = &config.budget;
    if !(budget.shrink_ratio > 0.0 && budget.shrink_ratio < 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "Budget shrink_ratio must be between 0 and 1, got {}",
            budget.shrink_ratio
        )));
    }
    if budget.min_preview_chars == 0 || budget.min_preview_chars > budget.initial_preview_chars {
        return Err(ConfigError::ValidationError(format!(
            "Budget min_preview_chars ({}) must be positive and not exceed initial_preview_chars ({})",
            budget.min_preview_chars, budget.initial_preview_chars
        )));
    }

    if config.splitter.max_chapter_words == 0 {
        return Err(ConfigError::ValidationError("Splitter max_chapter_words cannot be 0".to_string()));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("LLM Provider: {:?}", config.llm.provider);
    tracing::info!("LLM Model: {}", config.llm.model);
    if config.llm.provider == LlmProvider::Gemini {
        tracing::info!("LLM Base URL: {}", config.llm.base_url);
        tracing::info!("LLM API Key: {}", if config.llm.api_key().is_some() { "set" } else { "missing" });
        tracing::info!("LLM Timeout: {}s", config.llm.timeout_secs);
    }
    tracing::info!(
        "Retry: {} attempts, delays {:?}s",
        config.retry.max_attempts,
        config.retry.delays_secs
    );
    tracing::info!(
        "Preview Budget: {} -> {} chars (x{})",
        config.budget.initial_preview_chars,
        config.budget.min_preview_chars,
        config.budget.shrink_ratio
    );
    tracing::info!("Max Chapter Words: {}", config.splitter.max_chapter_words);
    tracing::info!("Output Language: {}", config.analysis.output_language);
    tracing::info!("Chapters Directory: {:?}", config.storage.chapters_dir());
    tracing::info!("Summaries Directory: {:?}", config.storage.summaries_dir());
    tracing::info!("Output Directory: {:?}", config.storage.output_dir());
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_model() {
        let mut config = AppConfig::default();
        config.llm.model = " ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_retry_settings() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.retry.delays_secs.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_budget() {
        let mut config = AppConfig::default();
        config.budget.shrink_ratio = 1.0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.budget.min_preview_chars = config.budget.initial_preview_chars + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_api_key_fallback_only_fills_missing_key() {
        let mut config = AppConfig::default();
        apply_api_key_fallback(&mut config, None);
        assert!(config.llm.api_key().is_none());

        apply_api_key_fallback(&mut config, Some("from-env".to_string()));
        assert_eq!(config.llm.api_key(), Some("from-env"));

        apply_api_key_fallback(&mut config, Some("other".to_string()));
        assert_eq!(config.llm.api_key(), Some("from-env"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"scripted\"\nmodel = \"offline\"\n\n[splitter]\nmax_chapter_words = 500\n\n[retry]\ndelays_secs = [1, 2]\n",
        )
        .unwrap();

        let config = load_config_from_path(Some(&path)).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Scripted);
        assert_eq!(config.llm.model, "offline");
        assert_eq!(config.splitter.max_chapter_words, 500);
        assert_eq!(config.retry.delays_secs, vec![1, 2]);
        assert_eq!(config.splitter.max_depth, 3);
    }
}
