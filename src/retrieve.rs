//! Nearest-passage retrieval over a [`FolderIndex`].

use anyhow::Result;
use serde::Serialize;

use crate::embedding::{embed_query, RetryPolicy};
use crate::indexer::FolderIndex;
use crate::models::Passage;
use crate::services::Services;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub document_name: String,
    pub score: f32,
}

/// The `k` passages most similar to `query`, best first.
pub async fn search(
    services: &Services,
    folder_index: &FolderIndex,
    query: &str,
    k: usize,
) -> Result<Vec<Passage>> {
    Ok(search_scored(services, folder_index, query, k)
        .await?
        .into_iter()
        .map(|s| s.passage)
        .collect())
}

/// Like [`search`], keeping similarity scores. Passages are rebuilt from
/// index metadata alone. The query embedding is retried like an indexing
/// batch.
pub async fn search_scored(
    services: &Services,
    folder_index: &FolderIndex,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredPassage>> {
    if query.trim().is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let policy = RetryPolicy::from_config(&services.config.embedding);
    let vector = embed_query(services.embedding.as_ref(), query, &policy).await?;
    let hits = folder_index.index.query(&vector, k).await?;
    tracing::debug!("retrieved {} passage(s) for {:?}", hits.len(), query);
    Ok(hits
        .into_iter()
        .map(|hit| ScoredPassage {
            passage: hit.metadata.to_passage(),
            document_name: hit.metadata.document_name,
            score: hit.score,
        })
        .collect())
}
