//! Vector index abstraction and the in-memory implementation.
//!
//! Entries are keyed `<document-identifier>:<source_id>` and carry enough
//! metadata to rebuild a [`Passage`] without consulting the source
//! document.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::cosine_similarity;
use crate::models::Passage;

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub text: String,
    pub source_id: String,
    pub document_id: String,
    pub document_name: String,
    pub unit_index: Option<u32>,
}

impl EntryMetadata {
    pub fn from_passage(passage: &Passage, document_name: &str) -> Self {
        Self {
            text: passage.text.clone(),
            source_id: passage.source_id.clone(),
            document_id: passage.document_id.clone(),
            document_name: document_name.to_string(),
            unit_index: passage.unit_index,
        }
    }

    pub fn to_passage(&self) -> Passage {
        Passage {
            text: self.text.clone(),
            source_id: self.source_id.clone(),
            document_id: self.document_id.clone(),
            unit_index: self.unit_index,
            token_length: 0,
        }
    }
}

/// Id of the index entry for a passage.
pub fn entry_id(passage: &Passage) -> String {
    format!("{}:{}", passage.document_id, passage.source_id)
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub score: f32,
    pub metadata: EntryMetadata,
}

/// Storage for passage vectors with nearest-neighbour lookup.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the entry with this id.
    async fn upsert(&self, id: &str, vector: &[f32], metadata: EntryMetadata) -> Result<()>;

    /// Top-`k` entries by cosine similarity, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Remove every entry.
    async fn delete_all(&self) -> Result<()>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

struct StoredVector {
    id: String,
    vector: Vec<f32>,
    metadata: EntryMetadata,
}

#[derive(Default)]
struct Entries {
    vectors: Vec<StoredVector>,
    positions: HashMap<String, usize>,
}

/// Brute-force cosine index behind a `RwLock`.
///
/// Ties are broken by insertion order.
pub struct InMemoryIndex {
    entries: RwLock<Entries>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, id: &str, vector: &[f32], metadata: EntryMetadata) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let entry = StoredVector {
            id: id.to_string(),
            vector: vector.to_vec(),
            metadata,
        };
        match entries.positions.get(id).copied() {
            Some(position) => entries.vectors[position] = entry,
            None => {
                let position = entries.vectors.len();
                entries.positions.insert(id.to_string(), position);
                entries.vectors.push(entry);
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let entries = self.entries.read().unwrap();
        let mut hits: Vec<IndexHit> = entries
            .vectors
            .iter()
            .map(|sv| IndexHit {
                id: sv.id.clone(),
                score: cosine_similarity(vector, &sv.vector),
                metadata: sv.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.vectors.clear();
        entries.positions.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().vectors.len())
    }
}
