//! Artifact Assembler - 调用各渲染器并汇总结果

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::ports::RendererPort;
use crate::domain::book::{BookMeta, CoverInfo};

/// 封面文件名（位于总结目录，按优先级排列）
pub const COVER_FILES: &[&str] = &["00_Cover.md", "00_Cover"];

#[derive(Debug, Clone, Default)]
pub struct AssemblyReport {
    /// (渲染器名称, 产物路径)
    pub artifacts: Vec<(String, PathBuf)>,
    /// (渲染器名称, 错误信息)
    pub failures: Vec<(String, String)>,
}

impl AssemblyReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ArtifactAssembler {
    renderers: Vec<Arc<dyn RendererPort>>,
    summaries_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactAssembler {
    pub fn new(renderers: Vec<Arc<dyn RendererPort>>, summaries_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            renderers,
            summaries_dir,
            output_dir,
        }
    }

    /// 读取封面文件（不存在或读取失败时返回 None）
    pub async fn load_cover(&self) -> Option<CoverInfo> {
        load_cover(&self.summaries_dir).await
    }

    /// 依次调用全部渲染器；单个渲染器失败不影响其他渲染器
    pub async fn assemble(&self, meta: &BookMeta) -> AssemblyReport {
        let mut report = AssemblyReport::default();

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            tracing::error!(dir = %self.output_dir.display(), error = %e, "Failed to create output directory");
            for renderer in &self.renderers {
                report.failures.push((renderer.name().to_string(), e.to_string()));
            }
            return report;
        }

        for renderer in &self.renderers {
            match renderer.render(&self.summaries_dir, meta, &self.output_dir).await {
                Ok(path) => {
                    tracing::info!(renderer = renderer.name(), path = %path.display(), "Artifact rendered");
                    report.artifacts.push((renderer.name().to_string(), path));
                }
                Err(e) => {
                    tracing::error!(renderer = renderer.name(), error = %e, "Renderer failed");
                    report.failures.push((renderer.name().to_string(), e.to_string()));
                }
            }
        }

        report
    }
}

pub async fn load_cover(summaries_dir: &Path) -> Option<CoverInfo> {
    for name in COVER_FILES {
        let path = summaries_dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                tracing::info!(path = %path.display(), "Cover file found");
                return Some(CoverInfo::parse(&content));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read cover file");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::RenderError;
    use async_trait::async_trait;

    struct Named(&'static str, bool);

    #[async_trait]
    impl RendererPort for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn render(&self, _summaries_dir: &Path, _meta: &BookMeta, output_dir: &Path) -> Result<PathBuf, RenderError> {
            if self.1 {
                Ok(output_dir.join(self.0))
            } else {
                Err(RenderError::NoSummaries("nowhere".into()))
            }
        }
    }

    fn meta() -> BookMeta {
        BookMeta::resolve(None, None, "m", "2026/10/16")
    }

    #[tokio::test]
    async fn test_failures_are_reported_per_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = ArtifactAssembler::new(
            vec![Arc::new(Named("good", true)), Arc::new(Named("bad", false))],
            dir.path().join("summaries"),
            dir.path().join("output"),
        );

        let report = assembler.assemble(&meta()).await;
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].0, "good");
        assert_eq!(report.failures[0].0, "bad");
        assert!(!report.is_complete());
        assert!(dir.path().join("output").is_dir());
    }

    #[tokio::test]
    async fn test_cover_file_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cover(dir.path()).await.is_none());

        std::fs::write(dir.path().join("00_Cover"), "My Book\nby Someone\n").unwrap();
        let cover = load_cover(dir.path()).await.unwrap();
        assert_eq!(cover.title.as_deref(), Some("My Book"));
        assert_eq!(cover.author.as_deref(), Some("Someone"));
    }
}
