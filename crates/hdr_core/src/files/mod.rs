//! Metadata for ingested documents, keyed by an opaque file id.
//!
//! The file id doubles as the `document_id` chunks are tagged with in the vector index.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::clock::{now_rfc3339_utc, unix_nanos};
use crate::error::{AppError, ErrorKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub file_type: String,
    pub chunks: u32,
    pub size: u64,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFile {
    pub filename: String,
    pub file_type: String,
    pub chunks: u32,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FileTotals {
    pub total_files: u64,
    pub total_chunks: u64,
}

fn query_error(message: &str, e: rusqlite::Error) -> AppError {
    AppError::new(ErrorKind::Storage, "DB_QUERY_FAILED", message).with_details(e.to_string())
}

fn new_file_id(input: &NewFile, uploaded_at: &str) -> String {
    let payload = format!(
        "filename={}\nsize={}\nuploaded_at={}\nnanos={}",
        input.filename,
        input.size,
        uploaded_at,
        unix_nanos()
    );
    let digest = hex::encode(Sha256::digest(payload.as_bytes()));
    format!("file_{}", &digest[..13])
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_type: row.get(2)?,
        chunks: row.get::<_, i64>(3)?.max(0) as u32,
        size: row.get::<_, i64>(4)?.max(0) as u64,
        uploaded_at: row.get(5)?,
    })
}

pub fn add_file(conn: &Connection, input: NewFile) -> Result<FileRecord, AppError> {
    if input.filename.trim().is_empty() {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "FILE_INVALID",
            "Filename is required",
        ));
    }

    let uploaded_at = now_rfc3339_utc()?;
    let record = FileRecord {
        id: new_file_id(&input, &uploaded_at),
        filename: input.filename,
        file_type: input.file_type,
        chunks: input.chunks,
        size: input.size,
        uploaded_at,
    };

    conn.execute(
        "INSERT INTO files (id, filename, file_type, chunks, size, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            record.filename,
            record.file_type,
            i64::from(record.chunks),
            i64::try_from(record.size).unwrap_or(i64::MAX),
            record.uploaded_at,
        ],
    )
    .map_err(|e| {
        AppError::new(ErrorKind::Storage, "FILE_INSERT_FAILED", "Failed to record file")
            .with_details(format!("filename={}; err={e}", record.filename))
    })?;

    Ok(record)
}

/// Returns whether a record was deleted.
pub fn remove_file(conn: &Connection, file_id: &str) -> Result<bool, AppError> {
    let n = conn
        .execute("DELETE FROM files WHERE id = ?1", [file_id])
        .map_err(|e| {
            AppError::new(ErrorKind::Storage, "FILE_DELETE_FAILED", "Failed to delete file record")
                .with_details(format!("id={file_id}; err={e}"))
        })?;
    Ok(n > 0)
}

/// Delete every record; returns how many were removed.
pub fn clear_files(conn: &Connection) -> Result<usize, AppError> {
    conn.execute("DELETE FROM files", []).map_err(|e| {
        AppError::new(ErrorKind::Storage, "FILE_DELETE_FAILED", "Failed to clear file records")
            .with_details(e.to_string())
    })
}

pub fn get_file(conn: &Connection, file_id: &str) -> Result<Option<FileRecord>, AppError> {
    conn.query_row(
        "SELECT id, filename, file_type, chunks, size, uploaded_at FROM files WHERE id = ?1",
        [file_id],
        record_from_row,
    )
    .optional()
    .map_err(|e| query_error("Failed to load file record", e))
}

/// Newest first.
pub fn list_files(conn: &Connection) -> Result<Vec<FileRecord>, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, filename, file_type, chunks, size, uploaded_at FROM files ORDER BY uploaded_at DESC, id ASC",
        )
        .map_err(|e| query_error("Failed to prepare file listing", e))?;
    let rows = stmt
        .query_map([], record_from_row)
        .map_err(|e| query_error("Failed to list files", e))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| query_error("Failed to read file row", e))
}

pub fn totals(conn: &Connection) -> Result<FileTotals, AppError> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(chunks), 0) FROM files",
        [],
        |row| {
            Ok(FileTotals {
                total_files: row.get::<_, i64>(0)?.max(0) as u64,
                total_chunks: row.get::<_, i64>(1)?.max(0) as u64,
            })
        },
    )
    .map_err(|e| query_error("Failed to compute file totals", e))
}
