use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "hdr",
    about = "Help desk retrieval backend: ingest documents and answer questions from them"
)]
pub struct Cli {
    /// Directory holding data.json and files.sqlite (defaults to $HDR_DATA_DIR or ./vector_db)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// TOML settings file (defaults to ./hdr.toml when present); `.env` and the environment override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chunk, embed and index an already-extracted text file
    Ingest {
        /// UTF-8 text file to read
        path: PathBuf,
        /// Name to register the document under (its extension picks the format)
        #[arg(long)]
        name: Option<String>,
    },
    /// Ask a question against the indexed documents
    Ask {
        question: String,
        /// JSON file with earlier turns: [{"role":"user","text":"..."}, ...]
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// List ingested documents
    Files,
    /// Remove a document and its chunks
    Remove {
        /// File id as shown by `hdr files`
        file_id: String,
    },
    /// Show provider configuration and availability
    Status,
    /// List models installed in the local runtime
    Models,
    /// Delete every indexed chunk
    Clear,
}
