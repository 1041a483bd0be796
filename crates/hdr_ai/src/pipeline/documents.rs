use hdr_core::error::{AppError, ErrorKind};
use hdr_core::files::{self, FileRecord, FileTotals};
use serde::{Deserialize, Serialize};

use super::RagContext;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentList {
    pub files: Vec<FileRecord>,
    pub totals: FileTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovedDocument {
    pub file: FileRecord,
    pub removed_chunks: usize,
}

pub fn list_documents(ctx: &RagContext) -> Result<DocumentList, AppError> {
    Ok(DocumentList {
        files: files::list_files(&ctx.registry)?,
        totals: files::totals(&ctx.registry)?,
    })
}

/// Drop a document's chunks from the index, then its registry record.
pub fn remove_document(ctx: &RagContext, file_id: &str) -> Result<RemovedDocument, AppError> {
    let file = files::get_file(&ctx.registry, file_id)?.ok_or_else(|| {
        AppError::new(ErrorKind::NotFound, "FILE_NOT_FOUND", "File not found")
            .with_details(format!("id={file_id}"))
    })?;

    let removed_chunks = ctx.index.remove_by_document_id(file_id);
    files::remove_file(&ctx.registry, file_id)?;

    tracing::info!(file_id, filename = %file.filename, removed_chunks, "document removed");
    Ok(RemovedDocument {
        file,
        removed_chunks,
    })
}
