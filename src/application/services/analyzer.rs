//! Continuity-Aware Analyzer - 按章节顺序生成总结
//!
//! 不变量:
//! - 严格按索引顺序处理，第 i 章的总结必须在第 i-1 章之后产生
//! - 已持久化的总结直接加载，不会重新生成或覆盖
//! - 每个总结生成后立即持久化

use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

use super::executor::{CallError, CallExecutor};
use super::prompts;
use crate::application::ports::{ModelRequest, StoreError, UnitStorePort};
use crate::domain::book::{Chapter, Summary};
use crate::domain::text_segmenter::prefix_chars;
use crate::domain::PreviewBudget;

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// 前一章总结不超过该长度时全文提供，否则提供压缩版
    pub full_context_max_chars: usize,
    /// 更早章节摘要的总长度上限
    pub digest_max_chars: usize,
    /// 压缩版总结保留的要点数
    pub digest_point_limit: usize,
    pub output_language: String,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            full_context_max_chars: 12_000,
            digest_max_chars: 4_000,
            digest_point_limit: 5,
            output_language: "Simplified Chinese".to_string(),
            temperature: 0.7,
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("chapter {chapter_index}: {source}")]
    Call {
        chapter_index: usize,
        #[source]
        source: CallError,
    },

    #[error("chapter {chapter_index}: request still too large with chapter text cut to {min_chars} chars")]
    ContextExhausted { chapter_index: usize, min_chars: usize },

    #[error("cannot resume from chapter {resume_from}: summary for chapter {chapter_index} is missing")]
    MissingSummary { resume_from: usize, chapter_index: usize },

    #[error("chapter {chapter_index}: summary store error: {source}")]
    Store {
        chapter_index: usize,
        #[source]
        source: StoreError,
    },
}

impl AnalysisError {
    pub fn chapter_index(&self) -> usize {
        match self {
            Self::Call { chapter_index, .. }
            | Self::ContextExhausted { chapter_index, .. }
            | Self::MissingSummary { chapter_index, .. }
            | Self::Store { chapter_index, .. } => *chapter_index,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    pub summaries: Vec<Summary>,
    /// 从存储加载的数量
    pub loaded: usize,
    /// 本次生成的数量
    pub generated: usize,
}

/// 上下文降级阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextLevel {
    /// 完整前章总结 + 早期摘要
    Full,
    /// 压缩版前章总结，不带早期摘要
    Condensed,
}

/// 早期章节的滚动摘要
#[derive(Debug, Default)]
struct RollingDigest {
    entries: VecDeque<String>,
    chars: usize,
}

impl RollingDigest {
    fn push(&mut self, entry: String, max_chars: usize) {
        self.chars += entry.chars().count();
        self.entries.push_back(entry);
        while self.chars > max_chars {
            match self.entries.pop_front() {
                Some(dropped) => self.chars -= dropped.chars().count(),
                None => break,
            }
        }
    }

    fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

pub struct ContinuityAnalyzer {
    executor: Arc<CallExecutor>,
    summaries: Arc<dyn UnitStorePort>,
    budget: PreviewBudget,
    settings: AnalysisSettings,
}

impl ContinuityAnalyzer {
    pub fn new(
        executor: Arc<CallExecutor>,
        summaries: Arc<dyn UnitStorePort>,
        budget: PreviewBudget,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            executor,
            summaries,
            budget,
            settings,
        }
    }

    /// 分析全部章节
    ///
    /// `resume_from = Some(k)` 时要求 0..k 的总结都已存在。
    pub async fn analyze(
        &self,
        book_title: &str,
        chapters: &[Chapter],
        resume_from: Option<usize>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let total = chapters.len();
        let mut outcome = AnalysisOutcome::default();
        let mut digest = RollingDigest::default();
        let mut previous: Option<Summary> = None;

        for chapter in chapters {
            let index = chapter.index();
            let stored = self
                .summaries
                .get(index)
                .await
                .map_err(|source| AnalysisError::Store {
                    chapter_index: index,
                    source,
                })?;

            let summary = match stored {
                Some(unit) => {
                    tracing::debug!(chapter_index = index, path = %unit.path.display(), "Summary exists, loading");
                    outcome.loaded += 1;
                    Summary::restore(index, chapter.title(), unit.content, unit.modified)
                }
                None => {
                    if let Some(k) = resume_from.filter(|k| index < *k) {
                        return Err(AnalysisError::MissingSummary {
                            resume_from: k,
                            chapter_index: index,
                        });
                    }
                    let summary = self
                        .summarize(book_title, chapter, total, previous.as_ref(), &digest)
                        .await?;
                    let path = self
                        .summaries
                        .put(index, chapter.title(), summary.text())
                        .await
                        .map_err(|source| AnalysisError::Store {
                            chapter_index: index,
                            source,
                        })?;
                    tracing::info!(
                        chapter_index = index,
                        total = total,
                        title = %chapter.title(),
                        path = %path.display(),
                        "Chapter summary saved"
                    );
                    outcome.generated += 1;
                    summary
                }
            };

            if let Some(done) = previous.take() {
                digest.push(
                    done.condensed(self.settings.digest_point_limit, self.settings.digest_max_chars),
                    self.settings.digest_max_chars,
                );
            }
            previous = Some(summary.clone());
            outcome.summaries.push(summary);
        }

        tracing::info!(
            chapters = total,
            loaded = outcome.loaded,
            generated = outcome.generated,
            "Analysis complete"
        );
        Ok(outcome)
    }

    async fn summarize(
        &self,
        book_title: &str,
        chapter: &Chapter,
        total: usize,
        previous: Option<&Summary>,
        digest: &RollingDigest,
    ) -> Result<Summary, AnalysisError> {
        let index = chapter.index();
        let char_count = chapter.char_count();
        let mut level = ContextLevel::Full;
        let mut text_limit: Option<usize> = None;
        // 只保留比全文短的预算
        let mut cuts = self.budget.schedule(char_count).filter(move |b| *b < char_count);

        loop {
            let request = self.build_request(book_title, chapter, total, previous, digest, level, text_limit);
            tracing::debug!(
                chapter_index = index,
                request_chars = request.char_len(),
                level = ?level,
                text_limit = ?text_limit,
                "Requesting chapter summary"
            );

            match self.executor.invoke(&request).await {
                Ok(text) => return Ok(Summary::new(index, chapter.title(), text.trim())),
                Err(CallError::ContextTooLarge { .. }) => {
                    if level == ContextLevel::Full && (previous.is_some() || !digest.entries.is_empty()) {
                        tracing::warn!(chapter_index = index, "Request too large, condensing continuity context");
                        level = ContextLevel::Condensed;
                        continue;
                    }
                    match cuts.next() {
                        Some(limit) => {
                            tracing::warn!(chapter_index = index, budget = limit, "Request too large, cutting chapter text");
                            text_limit = Some(limit);
                        }
                        None => {
                            tracing::error!(chapter_index = index, "Chapter cannot fit the model context");
                            return Err(AnalysisError::ContextExhausted {
                                chapter_index: index,
                                min_chars: self.budget.min_chars,
                            });
                        }
                    }
                }
                Err(source) => {
                    return Err(AnalysisError::Call {
                        chapter_index: index,
                        source,
                    })
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_request(
        &self,
        book_title: &str,
        chapter: &Chapter,
        total: usize,
        previous: Option<&Summary>,
        digest: &RollingDigest,
        level: ContextLevel,
        text_limit: Option<usize>,
    ) -> ModelRequest {
        let text = match text_limit {
            Some(limit) => prefix_chars(chapter.text(), limit),
            None => chapter.text(),
        };
        let prompt = prompts::analysis_prompt(
            book_title,
            chapter.title(),
            chapter.index() + 1,
            total,
            &self.settings.output_language,
            text,
            text_limit.is_some(),
        );

        let mut request = ModelRequest::new(prompt).with_temperature(self.settings.temperature);
        if let Some(max) = self.settings.max_output_tokens {
            request = request.with_max_output_tokens(max);
        }

        if level == ContextLevel::Full && !digest.entries.is_empty() {
            request = request.with_context(prompts::digest_context(&digest.entries()));
        }
        if let Some(prev) = previous {
            let context = if level == ContextLevel::Full
                && prev.text().chars().count() <= self.settings.full_context_max_chars
            {
                prev.text().to_string()
            } else {
                prev.condensed(self.settings.digest_point_limit, self.settings.full_context_max_chars)
            };
            request = request.with_context(prompts::previous_summary_context(&context));
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{LanguageModelPort, ModelError, StoredUnit};
    use crate::application::services::executor::BackoffPolicy;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// 回显章节标题；可预设若干次上下文超限
    struct Echo {
        overflows: Mutex<u32>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl Echo {
        fn new(overflows: u32) -> Arc<Self> {
            Arc::new(Self {
                overflows: Mutex::new(overflows),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModelPort for Echo {
        async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut overflows = self.overflows.lock().unwrap();
            if *overflows > 0 {
                *overflows -= 1;
                return Err(ModelError::service(400, "token count exceeds the maximum"));
            }
            let title = request
                .prompt
                .lines()
                .find_map(|l| l.strip_prefix(prompts::CHAPTER_TITLE_LABEL))
                .unwrap_or("?");
            Ok(format!("# {title}\n\n**Point** about {title}.\n"))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        units: Mutex<BTreeMap<usize, String>>,
    }

    #[async_trait]
    impl UnitStorePort for MemoryStore {
        fn dir(&self) -> &Path {
            Path::new("/memory")
        }

        async fn has(&self, index: usize) -> Result<bool, StoreError> {
            Ok(self.units.lock().unwrap().contains_key(&index))
        }

        async fn get(&self, index: usize) -> Result<Option<StoredUnit>, StoreError> {
            Ok(self.units.lock().unwrap().get(&index).map(|content| StoredUnit {
                index,
                title: String::new(),
                content: content.clone(),
                path: PathBuf::from("/memory"),
                modified: chrono::Utc::now(),
            }))
        }

        async fn put(&self, index: usize, _title: &str, content: &str) -> Result<PathBuf, StoreError> {
            let mut units = self.units.lock().unwrap();
            if units.contains_key(&index) {
                return Err(StoreError::AlreadyExists(index));
            }
            units.insert(index, content.to_string());
            Ok(PathBuf::from("/memory"))
        }

        async fn list(&self) -> Result<Vec<StoredUnit>, StoreError> {
            Ok(Vec::new())
        }

        async fn read_manifest(&self) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn write_manifest(&self, _content: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn chapters(n: usize) -> Vec<Chapter> {
        (0..n)
            .map(|i| Chapter::new(i, format!("Chapter {i}"), format!("Text of chapter {i}."), 0).unwrap())
            .collect()
    }

    fn analyzer(model: Arc<Echo>, store: Arc<MemoryStore>, budget: PreviewBudget) -> ContinuityAnalyzer {
        let executor = Arc::new(CallExecutor::new(model, BackoffPolicy::default()));
        ContinuityAnalyzer::new(executor, store, budget, AnalysisSettings::default())
    }

    #[tokio::test]
    async fn test_previous_summary_is_passed_as_context() {
        let model = Echo::new(0);
        let store = Arc::new(MemoryStore::default());
        let outcome = analyzer(model.clone(), store.clone(), PreviewBudget::default())
            .analyze("Book", &chapters(3), None)
            .await
            .unwrap();

        assert_eq!(outcome.generated, 3);
        assert_eq!(outcome.summaries[2].text(), "# Chapter 2\n\n**Point** about Chapter 2.");

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].context_items.is_empty());
        assert_eq!(requests[1].context_items.len(), 1);
        assert!(requests[1].context_items[0].contains("# Chapter 0"));
        // 第三章：早期摘要 + 前一章
        assert_eq!(requests[2].context_items.len(), 2);
        assert!(requests[2].context_items[0].starts_with("Earlier chapters in brief:"));
        assert!(requests[2].context_items[1].contains("# Chapter 1"));
        assert_eq!(store.units.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_existing_summaries_are_loaded_not_regenerated() {
        let model = Echo::new(0);
        let store = Arc::new(MemoryStore::default());
        store.units.lock().unwrap().insert(0, "# Stored zero".to_string());
        store.units.lock().unwrap().insert(1, "# Stored one".to_string());

        let outcome = analyzer(model.clone(), store, PreviewBudget::default())
            .analyze("Book", &chapters(3), Some(2))
            .await
            .unwrap();

        assert_eq!(outcome.loaded, 2);
        assert_eq!(outcome.generated, 1);
        assert_eq!(outcome.summaries[0].text(), "# Stored zero");
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Chapter title: Chapter 2"));
        assert!(requests[0].context_items.last().unwrap().contains("# Stored one"));
    }

    #[tokio::test]
    async fn test_resume_requires_earlier_summaries() {
        let store = Arc::new(MemoryStore::default());
        let err = analyzer(Echo::new(0), store, PreviewBudget::default())
            .analyze("Book", &chapters(3), Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingSummary { chapter_index: 0, .. }));
    }

    #[tokio::test]
    async fn test_overflow_condenses_then_cuts_text() {
        let model = Echo::new(2);
        let store = Arc::new(MemoryStore::default());
        store.units.lock().unwrap().insert(0, "# Stored zero\n\n**A** one.\n".to_string());
        let long = Chapter::new(1, "Long", "word ".repeat(200), 0).unwrap();
        let chapters = vec![chapters(1).remove(0), long];

        let outcome = analyzer(model.clone(), store, PreviewBudget::new(500, 0.5, 100))
            .analyze("Book", &chapters, None)
            .await
            .unwrap();
        assert_eq!(outcome.generated, 1);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        // 第一次：完整前章；第二次：压缩前章；第三次：正文截断到 500 字符
        assert!(requests[0].context_items[0].contains("**A** one."));
        assert!(requests[1].context_items[0].contains("- A one."));
        assert!(requests[2].prompt.contains("shortened to fit"));
    }

    #[tokio::test]
    async fn test_overflow_below_minimum_is_fatal() {
        let model = Echo::new(100);
        let store = Arc::new(MemoryStore::default());
        let err = analyzer(model, store, PreviewBudget::new(500, 0.5, 400))
            .analyze("Book", &[Chapter::new(0, "Long", "word ".repeat(200), 0).unwrap()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ContextExhausted { chapter_index: 0, .. }));
    }
}
