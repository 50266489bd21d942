//! Bookdigest - 长篇文档逐章总结
//!
//! 流水线: 结构发现 → 章节切分 → 连续性分析 → 产物渲染

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bookdigest::application::{AnalyzeBook, PipelineError, RenderBook, RunPipeline, SplitBook};
use bookdigest::config::{load_config_from_path, print_config, AppConfig};
use bookdigest::{build_model, build_pipeline, build_render_handler};

/// Split a long document into chapters and summarize them one by one
#[derive(Parser, Debug)]
#[command(name = "bookdigest", version, about)]
struct Cli {
    /// Configuration file (defaults to bookdigest.toml / bookdigest.local.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Working directory holding chapters/, summaries/ and output/
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline: split, analyze, render
    Run {
        /// Input text or Markdown file
        input: PathBuf,

        /// Rediscover chapters (the chapter directory must be empty)
        #[arg(long, default_value_t = false)]
        resplit: bool,

        /// Chapter index to resume analysis from; earlier summaries must exist
        #[arg(long)]
        resume_from: Option<usize>,
    },

    /// Discover chapter boundaries and write chapter files
    Split {
        input: PathBuf,

        #[arg(long, default_value_t = false)]
        resplit: bool,
    },

    /// Summarize the chapters already written, skipping existing summaries
    Analyze {
        /// Original input file, used for title and author
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        resume_from: Option<usize>,
    },

    /// Render the output artifacts from existing summaries
    Render {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},bookdigest={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();
}

fn report_failure(error: &PipelineError) {
    match error.chapter_index() {
        Some(index) => tracing::error!(stage = error.stage(), chapter_index = index, error = %error, "Pipeline stopped"),
        None => tracing::error!(stage = error.stage(), error = %error, "Pipeline stopped"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    let mut config =
        load_config_from_path(cli.config.as_deref()).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    if let Some(base_dir) = cli.base_dir {
        config.storage.base_dir = base_dir;
    }

    init_tracing(&config);
    tracing::info!("Bookdigest {}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    let command = match cli.command {
        Command::Render { input } => {
            let handler = build_render_handler(&config, &config.llm.model).await?;
            let report = handler.handle(RenderBook { input }).await.inspect_err(report_failure)?;
            for (renderer, path) in &report.artifacts {
                tracing::info!(renderer = %renderer, path = %path.display(), "Artifact ready");
            }
            return Ok(());
        }
        other => other,
    };

    let model = build_model(&config.llm)?;
    let pipeline = build_pipeline(&config, model).await?;

    match command {
        Command::Run {
            input,
            resplit,
            resume_from,
        } => {
            let report = pipeline
                .handle(RunPipeline {
                    input,
                    resplit,
                    resume_from,
                })
                .await
                .inspect_err(report_failure)?;
            tracing::info!(
                chapters = report.split.chapters.len(),
                reused_chapters = report.split.reused,
                split_warnings = report.split.warnings.len(),
                summaries_generated = report.analysis.generated,
                summaries_loaded = report.analysis.loaded,
                artifacts = report.assembly.artifacts.len(),
                render_failures = report.assembly.failures.len(),
                "Pipeline complete"
            );
        }
        Command::Split { input, resplit } => {
            let response = pipeline
                .split_handler()
                .handle(SplitBook { input, resplit })
                .await
                .inspect_err(report_failure)?;
            for chapter in &response.chapters {
                tracing::info!(
                    index = chapter.index(),
                    title = %chapter.title(),
                    words = chapter.word_count(),
                    "Chapter"
                );
            }
            tracing::info!(
                chapters = response.chapters.len(),
                reused = response.reused,
                warnings = response.warnings.len(),
                "Split complete"
            );
        }
        Command::Analyze { input, resume_from } => {
            let outcome = pipeline
                .analyze_handler()
                .handle(AnalyzeBook { input, resume_from })
                .await
                .inspect_err(report_failure)?;
            tracing::info!(
                generated = outcome.generated,
                loaded = outcome.loaded,
                "Analysis complete"
            );
        }
        Command::Render { .. } => {}
    }

    Ok(())
}
