//! In-memory vector index with whole-snapshot persistence.
//!
//! Chunks and embeddings live in two parallel vectors paired by position.
//! Every mutation rewrites the full snapshot through a [`SnapshotStore`]; there
//! is no incremental format, so a crash between mutation and write loses that
//! mutation.

use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hdr_core::clock::now_rfc3339_utc;
use hdr_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::model::{Chunk, IndexSnapshot, SearchResult};

pub mod similarity;
pub mod snapshot;

pub use similarity::cosine_similarity;
pub use snapshot::{JsonFileSnapshotStore, SnapshotStore};

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub chunk_count: usize,
    pub document_count: usize,
    pub dims: Option<usize>,
    pub updated_at: Option<String>,
}

pub struct VectorIndex {
    state: RwLock<IndexSnapshot>,
    store: Box<dyn SnapshotStore>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("chunks", &self.len())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Load whatever the store holds; an absent snapshot is an empty index.
    pub fn open(store: Box<dyn SnapshotStore>) -> Result<Self, AppError> {
        let mut snapshot = store.load()?.unwrap_or_default();

        if snapshot.chunks.len() != snapshot.embeddings.len() {
            return Err(AppError::new(
                ErrorKind::Storage,
                "INDEX_CORRUPT",
                "Index snapshot has unequal chunk and embedding counts",
            )
            .with_details(format!(
                "chunks={}; embeddings={}",
                snapshot.chunks.len(),
                snapshot.embeddings.len()
            )));
        }
        for chunk in snapshot.chunks.iter_mut().filter(|c| c.id.is_empty()) {
            chunk.id = Chunk::derive_id(&chunk.source, chunk.sequence_number, &chunk.text);
        }

        tracing::info!(chunks = snapshot.chunks.len(), "vector index loaded");
        Ok(Self {
            state: RwLock::new(snapshot),
            store,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexSnapshot> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexSnapshot> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tag `chunks` with `document_id` and store them with their vectors.
    ///
    /// If the snapshot cannot be written the append is undone and the error
    /// returned, so memory and disk agree.
    pub fn append(
        &self,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        document_id: &str,
    ) -> Result<usize, AppError> {
        if chunks.len() != vectors.len() {
            return Err(AppError::new(
                ErrorKind::DimensionMismatch,
                "INDEX_DIMENSION_MISMATCH",
                "Chunk and embedding counts differ",
            )
            .with_details(format!(
                "chunks={}; embeddings={}; document_id={document_id}",
                chunks.len(),
                vectors.len()
            )));
        }

        let added = chunks.len();
        let mut state = self.write();
        let prev_len = state.chunks.len();
        let prev_updated_at = state.updated_at.clone();

        state.chunks.extend(chunks.into_iter().map(|mut c| {
            c.document_id = Some(document_id.to_string());
            c
        }));
        state.embeddings.extend(vectors);
        state.updated_at = now_rfc3339_utc().ok();

        if let Err(e) = self.store.save(&state) {
            state.chunks.truncate(prev_len);
            state.embeddings.truncate(prev_len);
            state.updated_at = prev_updated_at;
            tracing::warn!(document_id, code = %e.code, "append rolled back; snapshot write failed");
            return Err(e);
        }

        tracing::debug!(document_id, added, total = state.chunks.len(), "chunks appended");
        Ok(added)
    }

    /// Drop every chunk tagged with `document_id`. Unknown ids remove nothing.
    pub fn remove_by_document_id(&self, document_id: &str) -> usize {
        let mut state = self.write();
        let IndexSnapshot {
            chunks, embeddings, ..
        } = &mut *state;

        let before = chunks.len();
        let keep: Vec<bool> = chunks
            .iter()
            .map(|c| c.document_id.as_deref() != Some(document_id))
            .collect();
        let mut flags = keep.iter();
        chunks.retain(|_| *flags.next().unwrap_or(&true));
        let mut flags = keep.iter();
        embeddings.retain(|_| *flags.next().unwrap_or(&true));
        let removed = before - chunks.len();

        if removed > 0 {
            state.updated_at = now_rfc3339_utc().ok();
            if let Err(e) = self.store.save(&state) {
                tracing::warn!(document_id, removed, err = %e, "snapshot write after removal failed");
            }
            tracing::debug!(document_id, removed, "chunks removed");
        }
        removed
    }

    /// Top `k` chunks by cosine similarity, best first. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let state = self.read();
        let mut scored: Vec<(usize, f32)> = state
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                chunk: state.chunks[i].clone(),
                score,
            })
            .collect()
    }

    pub fn has_data(&self) -> bool {
        !self.read().chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    pub fn chunks_for_document(&self, document_id: &str) -> Vec<Chunk> {
        self.read()
            .chunks
            .iter()
            .filter(|c| c.document_id.as_deref() == Some(document_id))
            .cloned()
            .collect()
    }

    pub fn status(&self) -> IndexStatus {
        let state = self.read();
        let documents: BTreeSet<&str> = state
            .chunks
            .iter()
            .filter_map(|c| c.document_id.as_deref())
            .collect();
        IndexStatus {
            chunk_count: state.chunks.len(),
            document_count: documents.len(),
            dims: state.embeddings.first().map(Vec::len),
            updated_at: state.updated_at.clone(),
        }
    }

    /// Empty the index and delete the persisted snapshot.
    pub fn clear(&self) -> Result<(), AppError> {
        let mut state = self.write();
        self.store.delete()?;
        *state = IndexSnapshot::default();
        tracing::info!("vector index cleared");
        Ok(())
    }
}
