use hdr_core::config::{AiSettings, StoragePaths};
use hdr_core::db;
use hdr_core::error::AppError;
use rusqlite::Connection;

use crate::chunking::Chunker;
use crate::index::{JsonFileSnapshotStore, VectorIndex};
use crate::orchestrator::ProviderOrchestrator;

mod ask;
mod documents;
mod ingest;

pub use ask::{answer_question, is_general_question, Answer, AnswerSource};
pub use documents::{list_documents, remove_document, DocumentList, RemovedDocument};
pub use ingest::{ingest_document, IngestOutcome, IngestRequest, SUPPORTED_EXTENSIONS};

/// Chunks embedded per orchestrator call during ingest.
pub const EMBED_BATCH_SIZE: usize = 10;

/// Everything a request handler needs, passed explicitly.
#[derive(Debug)]
pub struct RagContext {
    pub orchestrator: ProviderOrchestrator,
    pub index: VectorIndex,
    pub registry: Connection,
    pub chunker: Chunker,
}

impl RagContext {
    pub fn new(orchestrator: ProviderOrchestrator, index: VectorIndex, registry: Connection) -> Self {
        Self {
            orchestrator,
            index,
            registry,
            chunker: Chunker::default(),
        }
    }

    /// Open the snapshot and registry under `paths` and build providers from `settings`.
    pub fn open(paths: &StoragePaths, settings: AiSettings) -> Result<Self, AppError> {
        let orchestrator = ProviderOrchestrator::from_settings(settings)?;
        let index = VectorIndex::open(Box::new(JsonFileSnapshotStore::new(paths.snapshot_path())))?;
        let registry = db::open_and_migrate(&paths.registry_db_path())?;
        Ok(Self::new(orchestrator, index, registry))
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }
}
