//! Embeds chunked documents into a vector index.
//!
//! Passages from all documents are embedded in batches of
//! `embedding.batch_size`. A batch that still fails after the retry policy
//! is given up is logged and skipped; the rest of the folder is indexed.

use std::sync::Arc;

use anyhow::Result;

use crate::embedding::{embed_with_retry, EmbeddingProvider, RetryPolicy};
use crate::index::{entry_id, EntryMetadata, InMemoryIndex, VectorIndex};
use crate::models::{Document, Passage};
use crate::progress::{Phase, ProgressEvent, ProgressReporter};
use crate::services::Services;

/// A searchable set of documents: the vector index plus the documents it
/// was built from.
pub struct FolderIndex {
    pub index: Arc<dyn VectorIndex>,
    pub documents: Vec<Document>,
}

impl FolderIndex {
    /// Every passage, in document then passage order.
    pub fn passages(&self) -> impl Iterator<Item = &Passage> {
        self.documents.iter().flat_map(|d| d.passages.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub passages: usize,
    pub embedded: usize,
    pub failed_batches: usize,
}

/// Index chunked `documents` into a fresh [`InMemoryIndex`].
pub async fn index(
    services: &Services,
    documents: Vec<Document>,
    progress: &dyn ProgressReporter,
) -> Result<(FolderIndex, IndexStats)> {
    let target: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new());
    let stats = index_into(
        services.embedding.as_ref(),
        target.as_ref(),
        &documents,
        services.config.embedding.batch_size,
        &RetryPolicy::from_config(&services.config.embedding),
        progress,
    )
    .await?;
    Ok((
        FolderIndex {
            index: target,
            documents,
        },
        stats,
    ))
}

/// Embed and upsert every passage of `documents` into `target`.
pub async fn index_into(
    provider: &dyn EmbeddingProvider,
    target: &dyn VectorIndex,
    documents: &[Document],
    batch_size: usize,
    policy: &RetryPolicy,
    progress: &dyn ProgressReporter,
) -> Result<IndexStats> {
    let entries: Vec<(&Passage, &str)> = documents
        .iter()
        .flat_map(|d| d.passages.iter().map(move |p| (p, d.name.as_str())))
        .collect();

    let mut stats = IndexStats {
        documents: documents.len(),
        passages: entries.len(),
        ..Default::default()
    };
    let total = entries.len() as u64;
    let mut done: u64 = 0;

    for (batch_no, batch) in entries.chunks(batch_size.max(1)).enumerate() {
        let texts: Vec<String> = batch.iter().map(|(p, _)| p.text.clone()).collect();
        match embed_with_retry(provider, &texts, policy).await {
            Ok(vectors) => {
                for ((passage, doc_name), vector) in batch.iter().zip(vectors.iter()) {
                    target
                        .upsert(
                            &entry_id(passage),
                            vector,
                            EntryMetadata::from_passage(passage, doc_name),
                        )
                        .await?;
                    stats.embedded += 1;
                }
            }
            Err(e) => {
                stats.failed_batches += 1;
                tracing::warn!(
                    "skipping batch {} ({} passage(s)): {:#}",
                    batch_no,
                    batch.len(),
                    e
                );
            }
        }
        done += batch.len() as u64;
        progress.report(ProgressEvent {
            phase: Phase::Indexing,
            subject: "passages".to_string(),
            n: done,
            total,
        });
    }

    tracing::info!(
        "indexed {} of {} passage(s) from {} document(s), {} batch(es) skipped",
        stats.embedded,
        stats.passages,
        stats.documents,
        stats.failed_batches
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk;
    use crate::embedding::HashEmbedder;
    use crate::error::DocQaError;
    use crate::models::{FileKind, TextUnit};
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(name: &str, text: &str) -> Document {
        chunk(
            Document::new(
                format!("id-{}", name),
                name.to_string(),
                FileKind::Txt,
                vec![TextUnit::new(text.to_string(), None)],
            ),
            4,
            0,
        )
    }

    /// Fails every call whose number is listed in `fail_calls`.
    struct FailSome {
        fail_calls: Vec<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FailSome {
        fn model_name(&self) -> &str {
            "fail-some"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls.contains(&n) {
                return Err(DocQaError::embedding(false, "400 Bad Request").into());
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn indexes_every_passage() {
        let docs = vec![
            doc("a.txt", "one two three four five six seven"),
            doc("b.txt", "alpha beta"),
        ];
        let target = InMemoryIndex::new();
        let stats = index_into(
            &HashEmbedder::new(32),
            &target,
            &docs,
            2,
            &RetryPolicy::none(),
            &NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(stats.passages, 3);
        assert_eq!(stats.embedded, 3);
        assert_eq!(stats.failed_batches, 0);
        assert_eq!(target.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_batch_is_skipped() {
        let docs = vec![doc("a.txt", "a b c d e f g h i j k l")];
        let provider = FailSome {
            fail_calls: vec![1],
            calls: AtomicUsize::new(0),
        };
        let target = InMemoryIndex::new();
        let stats = index_into(&provider, &target, &docs, 1, &RetryPolicy::none(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(stats.passages, 3);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.embedded, 2);
        assert_eq!(target.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn entries_carry_document_metadata() {
        let docs = vec![doc("notes.txt", "hello world")];
        let target = InMemoryIndex::new();
        index_into(
            &HashEmbedder::new(16),
            &target,
            &docs,
            8,
            &RetryPolicy::none(),
            &NoProgress,
        )
        .await
        .unwrap();
        let hits = target.query(&HashEmbedder::new(16).embed_one("hello"), 1).await.unwrap();
        assert_eq!(hits[0].id, "id-notes.txt:notes.txt-0");
        assert_eq!(hits[0].metadata.document_name, "notes.txt");
        assert_eq!(hits[0].metadata.text, "hello world");
    }
}
