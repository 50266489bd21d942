//! Chapter Splitter - 按边界切分章节并递归细分超长章节
//!
//! 使用显式工作队列 (title, text, depth)。细分结果插回队首，
//! 因此出队顺序即最终的叶子章节顺序。

use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

use super::discoverer::{BoundaryDiscoverer, DiscoveryError};
use super::prompts::DiscoveryScope;
use crate::application::ports::{StoreError, UnitStorePort};
use crate::domain::book::{BookError, Chapter, ChapterManifest, Document};
use crate::domain::text_segmenter::{count_words, split_at_sentences};
use crate::domain::BoundaryMap;

#[derive(Debug, Clone)]
pub struct SplitterSettings {
    /// 叶子章节的字数上限
    pub max_chapter_words: usize,
    /// 递归细分的最大深度
    pub max_depth: u32,
}

impl Default for SplitterSettings {
    fn default() -> Self {
        Self {
            max_chapter_words: 7000,
            max_depth: 3,
        }
    }
}

/// 非致命的切分事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitWarning {
    /// 到达深度上限仍超长，原样接受
    SizeLimitExceeded { title: String, words: usize, depth: u32 },
    /// 结构发现失败，按句子切分
    SentenceFallback { title: String, parts: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("refining chapter \"{title}\" failed: {source}")]
    Discovery {
        title: String,
        #[source]
        source: DiscoveryError,
    },

    #[error(transparent)]
    Chapter(#[from] BookError),

    #[error("chapter store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub chapters: Vec<Chapter>,
    pub warnings: Vec<SplitWarning>,
}

struct WorkItem<'t> {
    title: String,
    text: &'t str,
    depth: u32,
}

pub struct ChapterSplitter {
    discoverer: Arc<BoundaryDiscoverer>,
    store: Arc<dyn UnitStorePort>,
    settings: SplitterSettings,
}

impl ChapterSplitter {
    pub fn new(discoverer: Arc<BoundaryDiscoverer>, store: Arc<dyn UnitStorePort>, settings: SplitterSettings) -> Self {
        Self {
            discoverer,
            store,
            settings,
        }
    }

    /// 切分并细分，全部叶子章节确定后按顺序持久化，最后写入章节清单
    pub async fn split(&self, document: &Document, map: &BoundaryMap) -> Result<SplitOutcome, SplitError> {
        let mut queue: VecDeque<WorkItem<'_>> = map
            .slice(document.text())
            .into_iter()
            .map(|(title, text)| WorkItem { title, text, depth: 0 })
            .collect();

        let mut outcome = SplitOutcome::default();
        let mut leaves: Vec<WorkItem<'_>> = Vec::new();

        while let Some(item) = queue.pop_front() {
            let words = count_words(item.text);
            if words <= self.settings.max_chapter_words {
                leaves.push(item);
                continue;
            }

            if item.depth >= self.settings.max_depth {
                tracing::warn!(
                    title = %item.title,
                    words = words,
                    depth = item.depth,
                    "Chapter still oversized at depth limit, accepted as-is"
                );
                outcome.warnings.push(SplitWarning::SizeLimitExceeded {
                    title: item.title.clone(),
                    words,
                    depth: item.depth,
                });
                leaves.push(item);
                continue;
            }

            let parts = self.refine(&item, words, &mut outcome.warnings).await?;
            tracing::info!(
                title = %item.title,
                words = words,
                parts = parts.len(),
                depth = item.depth,
                "Oversized chapter refined"
            );
            for part in parts.into_iter().rev() {
                queue.push_front(part);
            }
        }

        for (index, leaf) in leaves.into_iter().enumerate() {
            let chapter = Chapter::new(index, leaf.title, leaf.text, leaf.depth)?;
            let path = self.store.put(index, chapter.title(), chapter.text()).await?;
            tracing::debug!(chapter_index = index, path = %path.display(), words = chapter.word_count(), "Chapter persisted");
            outcome.chapters.push(chapter);
        }

        // 清单最后写入：没有清单的章节目录表示切分被中断
        let manifest = ChapterManifest::new(document, &outcome.chapters);
        self.store.write_manifest(&manifest.to_json()?).await?;

        tracing::info!(
            chapters = outcome.chapters.len(),
            warnings = outcome.warnings.len(),
            "Chapters split"
        );
        Ok(outcome)
    }

    /// 细分一个超长章节，返回按顺序排列的子项
    async fn refine<'t>(
        &self,
        item: &WorkItem<'t>,
        words: usize,
        warnings: &mut Vec<SplitWarning>,
    ) -> Result<Vec<WorkItem<'t>>, SplitError> {
        let scope = DiscoveryScope::Section {
            parent_title: item.title.clone(),
            words,
            max_words: self.settings.max_chapter_words,
        };

        let reason = match self.discoverer.discover(item.text, &scope).await {
            Ok(sub) if sub.len() > 1 => {
                return Ok(sub
                    .slice(item.text)
                    .into_iter()
                    .map(|(title, text)| WorkItem {
                        title: sub_title(&item.title, &title),
                        text,
                        depth: item.depth + 1,
                    })
                    .collect());
            }
            Ok(_) => "model proposed a single part".to_string(),
            Err(DiscoveryError::Structure(e)) => e.to_string(),
            Err(e) => {
                return Err(SplitError::Discovery {
                    title: item.title.clone(),
                    source: e,
                })
            }
        };

        let pieces = split_at_sentences(item.text, self.settings.max_chapter_words);
        tracing::warn!(
            title = %item.title,
            parts = pieces.len(),
            reason = %reason,
            "Falling back to sentence split"
        );
        warnings.push(SplitWarning::SentenceFallback {
            title: item.title.clone(),
            parts: pieces.len(),
            reason,
        });

        // 句子切分结果不再细分
        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| WorkItem {
                title: format!("{} (part {})", item.title, i + 1),
                text,
                depth: self.settings.max_depth,
            })
            .collect())
    }
}

fn sub_title(parent: &str, child: &str) -> String {
    if child.is_empty() || child == parent {
        parent.to_string()
    } else if child.starts_with(parent) {
        child.to_string()
    } else {
        format!("{}: {}", parent, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{LanguageModelPort, ModelError, ModelRequest, StoredUnit};
    use crate::application::services::executor::{BackoffPolicy, CallExecutor};
    use crate::domain::{BoundaryProposal, PreviewBudget};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// 总是返回同一个回答
    struct Fixed(String);

    #[async_trait]
    impl LanguageModelPort for Fixed {
        async fn generate(&self, _request: &ModelRequest) -> Result<String, ModelError> {
            Ok(self.0.clone())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        units: Mutex<BTreeMap<usize, (String, String)>>,
        manifest: Mutex<Option<String>>,
        fail_at: Option<usize>,
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
            Ok(self.list().await?.into_iter().find(|u| u.index == index))
        }

        async fn put(&self, index: usize, title: &str, content: &str) -> Result<PathBuf, StoreError> {
            if self.fail_at == Some(index) {
                return Err(StoreError::Io("disk full".into()));
            }
            let mut units = self.units.lock().unwrap();
            if units.contains_key(&index) {
                return Err(StoreError::AlreadyExists(index));
            }
            units.insert(index, (title.to_string(), content.to_string()));
            Ok(PathBuf::from(format!("/memory/{index}")))
        }

        async fn list(&self) -> Result<Vec<StoredUnit>, StoreError> {
            Ok(self
                .units
                .lock()
                .unwrap()
                .iter()
                .map(|(index, (title, content))| StoredUnit {
                    index: *index,
                    title: title.clone(),
                    content: content.clone(),
                    path: PathBuf::from(format!("/memory/{index}")),
                    modified: chrono::Utc::now(),
                })
                .collect())
        }

        async fn read_manifest(&self) -> Result<Option<String>, StoreError> {
            Ok(self.manifest.lock().unwrap().clone())
        }

        async fn write_manifest(&self, content: &str) -> Result<(), StoreError> {
            *self.manifest.lock().unwrap() = Some(content.to_string());
            Ok(())
        }
    }

    fn splitter(reply: &str, store: Arc<MemoryStore>, settings: SplitterSettings) -> ChapterSplitter {
        let executor = Arc::new(CallExecutor::new(Arc::new(Fixed(reply.to_string())), BackoffPolicy::default()));
        let discoverer = Arc::new(BoundaryDiscoverer::new(executor, PreviewBudget::default(), 3, 0.0));
        ChapterSplitter::new(discoverer, store, settings)
    }

    fn sentences(prefix: &str, count: usize) -> String {
        (0..count).map(|i| format!("{prefix} word number {i}. ")).collect()
    }

    #[tokio::test]
    async fn test_short_chapters_are_persisted_in_order() {
        let text = "ONE\nalpha beta.\nTWO\ngamma delta.\n";
        let document = Document::new("/tmp/book.txt", text.to_string()).unwrap();
        let map = BoundaryMap::validate(
            text,
            &[BoundaryProposal::at_line(1, "ONE", "One"), BoundaryProposal::at_line(3, "TWO", "Two")],
        )
        .unwrap();

        let store = Arc::new(MemoryStore::default());
        let outcome = splitter("{}", store.clone(), SplitterSettings::default())
            .split(&document, &map)
            .await
            .unwrap();

        assert_eq!(outcome.chapters.len(), 2);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.chapters[1].text(), "TWO\ngamma delta.\n");
        let stored = store.list().await.unwrap();
        assert_eq!(stored[0].title, "One");
        assert_eq!(stored[1].content, "TWO\ngamma delta.\n");

        let manifest = ChapterManifest::from_json(&store.read_manifest().await.unwrap().unwrap()).unwrap();
        assert_eq!(manifest.chapters.len(), 2);
        assert_eq!(manifest.source_chars, text.chars().count());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_manifest() {
        let text = "ONE\nalpha beta.\nTWO\ngamma delta.\nTHREE\nepsilon.\n";
        let document = Document::new("/tmp/book.txt", text.to_string()).unwrap();
        let map = BoundaryMap::validate(
            text,
            &[
                BoundaryProposal::at_line(1, "ONE", "One"),
                BoundaryProposal::at_line(3, "TWO", "Two"),
                BoundaryProposal::at_line(5, "THREE", "Three"),
            ],
        )
        .unwrap();

        let store = Arc::new(MemoryStore {
            fail_at: Some(2),
            ..Default::default()
        });
        let err = splitter("{}", store.clone(), SplitterSettings::default())
            .split(&document, &map)
            .await
            .unwrap_err();

        assert!(matches!(err, SplitError::Store(_)));
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert!(store.read_manifest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_chapter_refined_by_model() {
        // 第二章 3 个小节，每节约 14 词
        let body = format!(
            "INTRO\nshort.\nBIG\n{}\nPART A\n{}\nPART B\n{}\n",
            sentences("a", 4),
            sentences("b", 4),
            sentences("c", 4)
        );
        let document = Document::new("/tmp/book.txt", body.clone()).unwrap();
        let map = BoundaryMap::validate(
            &body,
            &[BoundaryProposal::at_line(1, "INTRO", "Intro"), BoundaryProposal::at_line(3, "BIG", "Big")],
        )
        .unwrap();

        let reply = r#"{"chapters": [
            {"line": 1, "anchor": "BIG", "title": "Opening"},
            {"line": 3, "anchor": "PART A", "title": "A"},
            {"line": 5, "anchor": "PART B", "title": "B"}]}"#;
        let store = Arc::new(MemoryStore::default());
        let settings = SplitterSettings {
            max_chapter_words: 25,
            max_depth: 3,
        };
        let outcome = splitter(reply, store, settings).split(&document, &map).await.unwrap();

        let titles: Vec<&str> = outcome.chapters.iter().map(|c| c.title()).collect();
        assert_eq!(titles, vec!["Intro", "Big: Opening", "Big: A", "Big: B"]);
        let indices: Vec<usize> = outcome.chapters.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        let rejoined: String = outcome.chapters[1..].iter().map(|c| c.text()).collect();
        assert_eq!(rejoined, map.slice(&body)[1].1);
        let depths: Vec<u32> = outcome.chapters.iter().map(|c| c.depth()).collect();
        assert_eq!(depths, vec![0, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_structure_failure_falls_back_to_sentences() {
        let text = format!("HEAD\n{}", sentences("x", 10));
        let document = Document::new("/tmp/book.txt", text.clone()).unwrap();
        let map = BoundaryMap::validate(&text, &[BoundaryProposal::at_line(1, "HEAD", "Head")]).unwrap();

        let store = Arc::new(MemoryStore::default());
        let settings = SplitterSettings {
            max_chapter_words: 12,
            max_depth: 3,
        };
        let outcome = splitter("not json", store, settings).split(&document, &map).await.unwrap();

        assert_eq!(outcome.chapters.len(), 3);
        assert!(matches!(outcome.warnings[0], SplitWarning::SentenceFallback { .. }));
        let rejoined: String = outcome.chapters.iter().map(|c| c.text()).collect();
        assert_eq!(rejoined, text);
        for chapter in &outcome.chapters {
            assert!(chapter.word_count() <= 12);
        }
    }

    #[tokio::test]
    async fn test_depth_limit_accepts_chapter_as_is() {
        let text = format!("HEAD\n{}", sentences("x", 10));
        let document = Document::new("/tmp/book.txt", text.clone()).unwrap();
        let map = BoundaryMap::validate(&text, &[BoundaryProposal::at_line(1, "HEAD", "Head")]).unwrap();

        let store = Arc::new(MemoryStore::default());
        let settings = SplitterSettings {
            max_chapter_words: 12,
            max_depth: 0,
        };
        let outcome = splitter("{}", store, settings).split(&document, &map).await.unwrap();

        assert_eq!(outcome.chapters.len(), 1);
        assert!(matches!(
            outcome.warnings[0],
            SplitWarning::SizeLimitExceeded { depth: 0, .. }
        ));
    }
}
