//! Book Command Handlers

use chrono::Local;
use std::path::Path;
use std::sync::Arc;

use crate::application::commands::{AnalyzeBook, RenderBook, RunPipeline, SplitBook};
use crate::application::error::PipelineError;
use crate::application::ports::{DocumentSourcePort, UnitStorePort};
use crate::application::services::{
    assembler, AnalysisOutcome, ArtifactAssembler, AssemblyReport, BoundaryDiscoverer, ChapterSplitter,
    ContinuityAnalyzer, DiscoveryScope, SplitWarning,
};
use crate::domain::book::{BookInfo, BookMeta, Chapter, ChapterManifest, Document};

/// 从章节存储加载全部章节
///
/// 要求索引从 0 连续，且有与之相符的章节清单；标题和深度取自清单。
async fn load_chapters(store: &dyn UnitStorePort) -> Result<Vec<Chapter>, PipelineError> {
    let units = store.list().await?;
    if units.is_empty() {
        return Ok(Vec::new());
    }

    let dir = store.dir().display().to_string();
    for (expected, unit) in units.iter().enumerate() {
        if unit.index != expected {
            return Err(PipelineError::InconsistentChapters {
                dir,
                expected,
                found: unit.index,
            });
        }
    }

    let Some(raw) = store.read_manifest().await? else {
        return Err(PipelineError::IncompleteChapters {
            dir,
            reason: format!("{} chapter files but no manifest, the split did not finish", units.len()),
        });
    };
    let restored = ChapterManifest::from_json(&raw)
        .and_then(|manifest| manifest.restore(units.into_iter().map(|u| (u.index, u.content)).collect()));
    restored.map_err(|e| PipelineError::IncompleteChapters {
        dir,
        reason: e.to_string(),
    })
}

/// 书籍元数据：封面文件 > 输入文件名 > 默认值
async fn resolve_meta(summaries_dir: &Path, input: Option<&Path>, model_name: &str) -> BookMeta {
    let cover = assembler::load_cover(summaries_dir).await;
    let info = input.map(BookInfo::from_filename);
    let today = Local::now().format("%Y/%m/%d").to_string();
    BookMeta::resolve(cover.as_ref(), info.as_ref(), model_name, &today)
}

// ============================================================================
// SplitBook
// ============================================================================

#[derive(Debug, Clone)]
pub struct SplitBookResponse {
    pub chapters: Vec<Chapter>,
    /// 是否复用了已有章节
    pub reused: bool,
    pub warnings: Vec<SplitWarning>,
}

pub struct SplitBookHandler {
    source: Arc<dyn DocumentSourcePort>,
    chapter_store: Arc<dyn UnitStorePort>,
    discoverer: Arc<BoundaryDiscoverer>,
    splitter: Arc<ChapterSplitter>,
}

impl SplitBookHandler {
    pub fn new(
        source: Arc<dyn DocumentSourcePort>,
        chapter_store: Arc<dyn UnitStorePort>,
        discoverer: Arc<BoundaryDiscoverer>,
        splitter: Arc<ChapterSplitter>,
    ) -> Self {
        Self {
            source,
            chapter_store,
            discoverer,
            splitter,
        }
    }

    pub async fn handle(&self, command: SplitBook) -> Result<SplitBookResponse, PipelineError> {
        let existing = load_chapters(self.chapter_store.as_ref()).await?;
        if !existing.is_empty() {
            if command.resplit {
                return Err(PipelineError::ChapterStoreNotEmpty(
                    self.chapter_store.dir().display().to_string(),
                ));
            }
            tracing::info!(
                chapters = existing.len(),
                dir = %self.chapter_store.dir().display(),
                "Reusing existing chapters"
            );
            return Ok(SplitBookResponse {
                chapters: existing,
                reused: true,
                warnings: Vec::new(),
            });
        }

        let text = self.source.load_text(&command.input).await?;
        let document = Document::new(&command.input, text)?;
        tracing::info!(
            path = %document.source_path().display(),
            title = %document.info().title(),
            chars = document.char_len(),
            words = document.word_count(),
            language = %document.language(),
            "Document loaded"
        );

        let scope = DiscoveryScope::Book {
            title: document.info().title().to_string(),
        };
        let map = self.discoverer.discover(document.text(), &scope).await?;
        let outcome = self.splitter.split(&document, &map).await?;

        Ok(SplitBookResponse {
            chapters: outcome.chapters,
            reused: false,
            warnings: outcome.warnings,
        })
    }
}

// ============================================================================
// AnalyzeBook
// ============================================================================

pub struct AnalyzeBookHandler {
    chapter_store: Arc<dyn UnitStorePort>,
    summary_store: Arc<dyn UnitStorePort>,
    analyzer: Arc<ContinuityAnalyzer>,
    model_name: String,
}

impl AnalyzeBookHandler {
    pub fn new(
        chapter_store: Arc<dyn UnitStorePort>,
        summary_store: Arc<dyn UnitStorePort>,
        analyzer: Arc<ContinuityAnalyzer>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            chapter_store,
            summary_store,
            analyzer,
            model_name: model_name.into(),
        }
    }

    pub async fn handle(&self, command: AnalyzeBook) -> Result<AnalysisOutcome, PipelineError> {
        let chapters = load_chapters(self.chapter_store.as_ref()).await?;
        if chapters.is_empty() {
            return Err(PipelineError::NoChapters(
                self.chapter_store.dir().display().to_string(),
            ));
        }

        let meta = resolve_meta(self.summary_store.dir(), command.input.as_deref(), &self.model_name).await;
        tracing::info!(
            title = %meta.title,
            chapters = chapters.len(),
            resume_from = ?command.resume_from,
            "Analyzing chapters"
        );

        Ok(self
            .analyzer
            .analyze(&meta.title, &chapters, command.resume_from)
            .await?)
    }
}

// ============================================================================
// RenderBook
// ============================================================================

pub struct RenderBookHandler {
    assembler: Arc<ArtifactAssembler>,
    summary_store: Arc<dyn UnitStorePort>,
    model_name: String,
}

impl RenderBookHandler {
    pub fn new(
        assembler: Arc<ArtifactAssembler>,
        summary_store: Arc<dyn UnitStorePort>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            assembler,
            summary_store,
            model_name: model_name.into(),
        }
    }

    pub async fn handle(&self, command: RenderBook) -> Result<AssemblyReport, PipelineError> {
        let meta = resolve_meta(self.summary_store.dir(), command.input.as_deref(), &self.model_name).await;
        let report = self.assembler.assemble(&meta).await;

        if report.artifacts.is_empty() {
            let reasons: Vec<String> = report
                .failures
                .iter()
                .map(|(name, error)| format!("{}: {}", name, error))
                .collect();
            return Err(PipelineError::Assembly(reasons.join("; ")));
        }

        tracing::info!(
            artifacts = report.artifacts.len(),
            failures = report.failures.len(),
            "Artifacts assembled"
        );
        Ok(report)
    }
}

// ============================================================================
// RunPipeline
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub split: SplitBookResponse,
    pub analysis: AnalysisOutcome,
    pub assembly: AssemblyReport,
}

/// 完整流水线：切分 → 分析 → 渲染
pub struct BookPipeline {
    split: SplitBookHandler,
    analyze: AnalyzeBookHandler,
    render: RenderBookHandler,
}

impl BookPipeline {
    pub fn new(split: SplitBookHandler, analyze: AnalyzeBookHandler, render: RenderBookHandler) -> Self {
        Self {
            split,
            analyze,
            render,
        }
    }

    pub fn split_handler(&self) -> &SplitBookHandler {
        &self.split
    }

    pub fn analyze_handler(&self) -> &AnalyzeBookHandler {
        &self.analyze
    }

    pub fn render_handler(&self) -> &RenderBookHandler {
        &self.render
    }

    pub async fn handle(&self, command: RunPipeline) -> Result<PipelineReport, PipelineError> {
        tracing::info!(input = %command.input.display(), "Stage 1/3: splitting chapters");
        let split = self
            .split
            .handle(SplitBook {
                input: command.input.clone(),
                resplit: command.resplit,
            })
            .await?;

        tracing::info!(chapters = split.chapters.len(), "Stage 2/3: analyzing chapters");
        let analysis = self
            .analyze
            .handle(AnalyzeBook {
                input: Some(command.input.clone()),
                resume_from: command.resume_from,
            })
            .await?;

        tracing::info!(summaries = analysis.summaries.len(), "Stage 3/3: rendering artifacts");
        let assembly = self
            .render
            .handle(RenderBook {
                input: Some(command.input),
            })
            .await?;

        Ok(PipelineReport {
            split,
            analysis,
            assembly,
        })
    }
}
