use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use hdr_ai::model::ConversationTurn;
use hdr_ai::orchestrator::ProviderOrchestrator;
use hdr_ai::pipeline::{self, IngestRequest, RagContext};
use hdr_ai::providers::OllamaClient;
use hdr_core::config::{AiSettings, ConfigSources, StoragePaths};
use hdr_core::error::{AppError, ErrorKind};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("HDR_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn io_error(code: &str, message: &str, path: &Path, e: std::io::Error) -> AppError {
    AppError::new(ErrorKind::InvalidInput, code, message)
        .with_details(format!("path={}; err={e}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new(ErrorKind::Decode, "CLI_ENCODE_FAILED", "Failed to encode output")
            .with_details(e.to_string())
    })?;
    println!("{out}");
    Ok(())
}

fn load_history(path: Option<&Path>) -> Result<Vec<ConversationTurn>, AppError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = fs::read_to_string(path)
        .map_err(|e| io_error("CLI_HISTORY_READ_FAILED", "Failed to read history file", path, e))?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::new(ErrorKind::InvalidInput, "CLI_HISTORY_INVALID", "History file is not valid JSON")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}

fn config_sources(config: Option<&Path>) -> Result<ConfigSources, AppError> {
    let sources = ConfigSources::default();
    let Some(path) = config else {
        return Ok(sources);
    };
    if !path.is_file() {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "CLI_CONFIG_NOT_FOUND",
            "Config file does not exist",
        )
        .with_details(format!("path={}", path.display())));
    }
    Ok(sources.with_toml_file(path))
}

fn run(cli: Cli) -> Result<(), AppError> {
    let figment = config_sources(cli.config.as_deref())?.figment()?;
    let paths = match &cli.data_dir {
        Some(dir) => StoragePaths::new(dir.clone()),
        None => StoragePaths::from_figment(&figment)?,
    };
    let settings = AiSettings::from_figment(&figment)?;
    tracing::debug!(?settings, data_dir = %paths.root().display(), "configuration loaded");

    match cli.command {
        Command::Models => {
            let client = OllamaClient::from_settings(&settings)?;
            let models = client.list_installed_models()?;
            if cli.json {
                return print_json(&models);
            }
            if models.is_empty() {
                println!("No models installed at {}", client.base_url());
            }
            for m in &models {
                println!("{}\t{}\t{}", m.name, m.size_label, m.modified_at);
            }
            Ok(())
        }
        Command::Status => {
            let orchestrator = ProviderOrchestrator::from_settings(settings)?;
            let status = orchestrator.status();
            if cli.json {
                return print_json(&status);
            }
            println!("{}", status.message);
            for p in &status.providers {
                println!(
                    "  {:<7} configured={} available={} model={}",
                    p.provider.display_name(),
                    p.configured,
                    p.available,
                    p.model.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        command => {
            let ctx = RagContext::open(&paths, settings)?;
            run_with_context(&ctx, command, cli.json)
        }
    }
}

fn run_with_context(ctx: &RagContext, command: Command, json: bool) -> Result<(), AppError> {
    match command {
        Command::Ingest { path, name } => {
            let text = fs::read_to_string(&path)
                .map_err(|e| io_error("CLI_READ_FAILED", "Failed to read document text", &path, e))?;
            let filename = name.unwrap_or_else(|| path.display().to_string());
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(text.len() as u64);
            let outcome = pipeline::ingest_document(ctx, IngestRequest { filename, text, size })?;
            if json {
                return print_json(&outcome);
            }
            println!(
                "{} indexed as {} ({} chunks)",
                outcome.file.filename, outcome.file.id, outcome.chunks
            );
        }
        Command::Ask { question, history } => {
            let history = load_history(history.as_deref())?;
            let answer = pipeline::answer_question(ctx, &question, &history)?;
            if json {
                return print_json(&answer);
            }
            println!("{}", answer.answer);
            if let Some(label) = answer.source.label() {
                println!("\nSource: {label}");
            }
        }
        Command::Files => {
            let list = pipeline::list_documents(ctx)?;
            if json {
                return print_json(&list);
            }
            for f in &list.files {
                println!("{}\t{}\t{} chunks\t{}", f.id, f.filename, f.chunks, f.uploaded_at);
            }
            println!(
                "{} files, {} chunks",
                list.totals.total_files, list.totals.total_chunks
            );
        }
        Command::Remove { file_id } => {
            let removed = pipeline::remove_document(ctx, &file_id)?;
            if json {
                return print_json(&removed);
            }
            println!(
                "Removed {} ({} chunks)",
                removed.file.filename, removed.removed_chunks
            );
        }
        Command::Clear => {
            let dropped = ctx.index.len();
            ctx.index.clear()?;
            let files = hdr_core::files::clear_files(&ctx.registry)?;
            println!("Cleared {dropped} chunks from {files} files");
        }
        Command::Status | Command::Models => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = %e.code, kind = ?e.kind, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(if e.kind == ErrorKind::InvalidInput { 2 } else { 1 })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_rejected() {
        let err = config_sources(Some(Path::new("does/not/exist/hdr.toml"))).expect_err("missing");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.code, "CLI_CONFIG_NOT_FOUND");
    }

    #[test]
    fn default_sources_read_dotenv_and_environment() {
        let sources = config_sources(None).expect("sources");
        assert_eq!(sources, ConfigSources::default());
        assert!(sources.dotenv_file.is_some());
        assert!(sources.process_env);
    }
}
