use std::path::Path;

use hdr_core::config::ProviderName;
use hdr_core::error::{AppError, ErrorKind};
use hdr_core::files::{self, FileRecord, NewFile};
use serde::{Deserialize, Serialize};

use super::{RagContext, EMBED_BATCH_SIZE};
use crate::chunking::strip_markdown;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "txt", "xlsx", "md"];

/// Already-extracted document text plus the name it was uploaded under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestRequest {
    pub filename: String,
    pub text: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestOutcome {
    pub file: FileRecord,
    pub chunks: usize,
    pub embedding_provider: ProviderName,
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn ingest_document(ctx: &RagContext, req: IngestRequest) -> Result<IngestOutcome, AppError> {
    let ext = extension(&req.filename)
        .filter(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| {
            AppError::new(
                ErrorKind::InvalidInput,
                "DOCUMENT_UNSUPPORTED_TYPE",
                "Unsupported format; only PDF, TXT, XLSX or MD files are accepted",
            )
            .with_details(format!("filename={}", req.filename))
        })?;

    let source = Path::new(&req.filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(req.filename.as_str())
        .to_string();

    let text = if ext == "md" {
        strip_markdown(&req.text)
    } else {
        req.text
    };

    let chunks = ctx.chunker.split(&text, &source);
    if chunks.is_empty() {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "DOCUMENT_EMPTY",
            "No text could be extracted from the document",
        )
        .with_details(format!("filename={source}")));
    }
    tracing::info!(filename = %source, chunks = chunks.len(), "document chunked");

    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        vectors.extend(ctx.orchestrator.embed_batch(&texts)?);
        tracing::debug!(filename = %source, embedded = vectors.len(), total = chunks.len(), "embedding progress");
    }

    let chunk_count = chunks.len();
    let record = files::add_file(
        &ctx.registry,
        NewFile {
            filename: source.clone(),
            file_type: ext,
            chunks: u32::try_from(chunk_count).unwrap_or(u32::MAX),
            size: req.size,
        },
    )?;

    if let Err(e) = ctx.index.append(chunks, vectors, &record.id) {
        if let Err(cleanup) = files::remove_file(&ctx.registry, &record.id) {
            tracing::warn!(file_id = %record.id, err = %cleanup, "failed to drop file record after index error");
        }
        return Err(e);
    }

    tracing::info!(file_id = %record.id, filename = %source, chunks = chunk_count, "document ingested");
    Ok(IngestOutcome {
        file: record,
        chunks: chunk_count,
        embedding_provider: ctx.orchestrator.embedding_provider(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(extension("Manual.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension("notes.md").as_deref(), Some("md"));
        assert_eq!(extension("README"), None);
    }
}
