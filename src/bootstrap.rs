//! 组装流水线：按配置创建适配器并注入各服务

use std::sync::Arc;
use thiserror::Error;

use crate::application::ports::{LanguageModelPort, ModelError, RendererPort, StoreError, UnitStorePort};
use crate::application::services::{
    ArtifactAssembler, BoundaryDiscoverer, CallExecutor, ChapterSplitter, ContinuityAnalyzer,
};
use crate::application::{AnalyzeBookHandler, BookPipeline, RenderBookHandler, SplitBookHandler};
use crate::config::{AppConfig, LlmConfig, LlmProvider};
use crate::infrastructure::adapters::{
    FileUnitStore, HtmlReaderRenderer, HttpModelClient, HttpModelClientConfig, MarkdownBookRenderer, PlainTextSource,
    ScriptedModel,
};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("LLM API key is not set (BOOKDIGEST_LLM__API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Failed to create model client: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid heading pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),
}

/// 按配置创建语言模型适配器
pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModelPort>, BootstrapError> {
    match config.provider {
        LlmProvider::Gemini => {
            let api_key = config.api_key().ok_or(BootstrapError::MissingApiKey)?;
            let client = HttpModelClient::new(
                HttpModelClientConfig::new(api_key, config.model.clone())
                    .with_base_url(config.base_url.clone())
                    .with_timeout(config.timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
        LlmProvider::Scripted => Ok(Arc::new(ScriptedModel::with_defaults()?)),
    }
}

/// 创建完整流水线（目录不存在时自动创建）
pub async fn build_pipeline(
    config: &AppConfig,
    model: Arc<dyn LanguageModelPort>,
) -> Result<BookPipeline, BootstrapError> {
    let chapters_dir = config.storage.chapters_dir();
    let summaries_dir = config.storage.summaries_dir();

    let chapter_store: Arc<dyn UnitStorePort> = Arc::new(FileUnitStore::chapters(&chapters_dir).await?);
    let summary_store: Arc<dyn UnitStorePort> = Arc::new(FileUnitStore::summaries(&summaries_dir).await?);

    let model_name = model.model_name().to_string();
    let executor = Arc::new(CallExecutor::new(model, config.retry.policy()));
    let budget = config.budget.budget();

    let discoverer = Arc::new(BoundaryDiscoverer::new(
        executor.clone(),
        budget.clone(),
        config.discovery.max_attempts,
        config.llm.structure_temperature,
    ));
    let splitter = Arc::new(ChapterSplitter::new(
        discoverer.clone(),
        chapter_store.clone(),
        config.splitter.settings(),
    ));
    let analyzer = Arc::new(ContinuityAnalyzer::new(
        executor,
        summary_store.clone(),
        budget,
        config.analysis.settings(&config.llm),
    ));

    let split = SplitBookHandler::new(Arc::new(PlainTextSource::new()), chapter_store.clone(), discoverer, splitter);
    let analyze = AnalyzeBookHandler::new(chapter_store, summary_store, analyzer, model_name.clone());
    let render = build_render_handler(config, &model_name).await?;

    Ok(BookPipeline::new(split, analyze, render))
}

/// 只创建渲染处理器（不需要语言模型）
pub async fn build_render_handler(config: &AppConfig, model_name: &str) -> Result<RenderBookHandler, BootstrapError> {
    let chapters_dir = config.storage.chapters_dir();
    let summaries_dir = config.storage.summaries_dir();
    let summary_store: Arc<dyn UnitStorePort> = Arc::new(FileUnitStore::summaries(&summaries_dir).await?);

    let renderers: Vec<Arc<dyn RendererPort>> = vec![
        Arc::new(MarkdownBookRenderer::new()),
        Arc::new(HtmlReaderRenderer::new().with_originals(chapters_dir)),
    ];
    let assembler = Arc::new(ArtifactAssembler::new(renderers, summaries_dir, config.storage.output_dir()));

    Ok(RenderBookHandler::new(assembler, summary_store, model_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(build_model(&config), Err(BootstrapError::MissingApiKey)));

        let config = LlmConfig {
            api_key: "k".into(),
            ..Default::default()
        };
        assert_eq!(build_model(&config).unwrap().model_name(), "gemini-2.5-pro");
    }

    #[tokio::test]
    async fn test_pipeline_creates_store_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Scripted;
        config.storage.base_dir = dir.path().to_path_buf();

        let model = build_model(&config.llm).unwrap();
        build_pipeline(&config, model).await.unwrap();
        assert!(dir.path().join("chapters").is_dir());
        assert!(dir.path().join("summaries").is_dir());
    }
}
