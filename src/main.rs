use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use noteflow::fetcher::HttpPageFetcherBuilder;
use noteflow::llm::ModelError;
use noteflow::runner::DEFAULT_MAX_CONTENT_CHARS;
use noteflow::{
    BatchOptions, BatchReport, BatchRunner, NoteSource, Pipeline, PipelineConfig, PipelineError,
    SqliteStore, StoreNoteSource, config, logging, source,
};

/// noteflow - summarize and tag notes with language models
#[derive(Parser)]
#[command(name = "noteflow")]
#[command(about = "Summarize, tag and persist notes, following the links inside them")]
#[command(version)]
struct Cli {
    /// Path to the SQLite document store
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log at debug level when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run every note of a collection through the pipeline
    Process(ProcessCommand),
    /// Load a JSON note backup into a collection
    Import(ImportCommand),
    /// List a collection's notes, newest first
    List(ListCommand),
    /// Show the registered models and the default
    Models,
}

#[derive(Parser)]
struct ProcessCommand {
    /// Collection to read notes from
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Collection to write transformed notes to
    #[arg(value_name = "DESTINATION")]
    destination: String,

    /// Number of leading notes to leave untouched
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Process at most this many notes after the skip
    #[arg(long)]
    limit: Option<usize>,

    /// Truncate note content to this many characters
    #[arg(long, default_value_t = DEFAULT_MAX_CONTENT_CHARS)]
    max_chars: usize,

    /// JSON pipeline configuration (models and instructions)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct ImportCommand {
    /// JSON backup: an array of notes or {"notes": [...]}
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Collection to import into
    #[arg(long, default_value = "simplenote_backup")]
    collection: String,
}

#[derive(Parser)]
struct ListCommand {
    /// Collection to list
    #[arg(value_name = "COLLECTION")]
    collection: String,
}

/// An error caused by the invocation rather than by the system.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

fn main() -> ExitCode {
    let cli = Cli::parse();
    config::load_dotenv();
    logging::init(cli.verbose);

    let result = match &cli.command {
        Commands::Process(cmd) => handle_process(cmd, cli.db.as_deref()),
        Commands::Import(cmd) => handle_import(cmd, cli.db.as_deref()).map(|()| ExitCode::SUCCESS),
        Commands::List(cmd) => handle_list(cmd, cli.db.as_deref()).map(|()| ExitCode::SUCCESS),
        Commands::Models => handle_models().map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if is_user_error(&e) {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad arguments, unreadable input files, invalid run
/// configuration and unknown model names.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.is::<UsageError>()
            || matches!(
                cause.downcast_ref::<PipelineError>(),
                Some(PipelineError::UnknownModel { .. })
            )
            || matches!(
                cause.downcast_ref::<ModelError>(),
                Some(ModelError::UnknownModel(_))
            )
    })
}

/// Maps a finished batch onto the process exit code.
///
/// 0 when nothing failed, 2 when every attempted note failed, 3 otherwise.
fn exit_code_for(report: &BatchReport) -> ExitCode {
    if report.failures.is_empty() {
        ExitCode::SUCCESS
    } else if report.persisted == 0 {
        ExitCode::from(2)
    } else {
        ExitCode::from(3)
    }
}

fn open_store(db: Option<&Path>) -> Result<Arc<SqliteStore>> {
    let db_path = config::database_path(db)?;
    config::ensure_database_directory(&db_path)?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    Ok(Arc::new(store))
}

fn handle_process(cmd: &ProcessCommand, db: Option<&Path>) -> Result<ExitCode> {
    let pipeline_config = match &cmd.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .map_err(|e| UsageError(format!("{e:#}")))?,
        None => PipelineConfig::with_default_instructions(),
    };

    let registry = config::registry_from_env()?;
    let fetcher = HttpPageFetcherBuilder::new()
        .build()
        .context("Failed to create page fetcher")?;
    let pipeline = Pipeline::new(&registry, Arc::new(fetcher), &pipeline_config)?;

    let store = open_store(db)?;
    let source = StoreNoteSource::new(Arc::clone(&store), cmd.source.as_str());
    let options = BatchOptions {
        skip: cmd.skip,
        limit: cmd.limit,
        max_content_chars: cmd.max_chars,
    };

    let report = BatchRunner::new(&pipeline, &*store, options)
        .run(&source, &cmd.destination)
        .with_context(|| format!("Failed to read collection {}", cmd.source))?;

    println!(
        "Processed {} of {} notes: {} persisted, {} failed ({} skipped)",
        report.attempted(),
        report.total,
        report.persisted,
        report.failures.len(),
        report.skipped
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.key, failure.error);
    }

    Ok(exit_code_for(&report))
}

fn handle_import(cmd: &ImportCommand, db: Option<&Path>) -> Result<()> {
    let raw = std::fs::read_to_string(&cmd.file)
        .map_err(|e| UsageError(format!("Failed to read {}: {e}", cmd.file.display())))?;
    let notes = source::parse_backup(&raw)
        .map_err(|e| UsageError(format!("Invalid note backup {}: {e}", cmd.file.display())))?;

    let store = open_store(db)?;
    let count = source::import_notes(&*store, &cmd.collection, &notes)
        .context("Failed to import notes")?;

    println!("Imported {count} notes into {}", cmd.collection);
    Ok(())
}

fn handle_list(cmd: &ListCommand, db: Option<&Path>) -> Result<()> {
    let store = open_store(db)?;
    let notes = StoreNoteSource::new(store, cmd.collection.as_str())
        .list_notes()
        .with_context(|| format!("Failed to read collection {}", cmd.collection))?;

    if notes.is_empty() {
        println!("No notes in {}", cmd.collection);
        return Ok(());
    }
    for line in source::listing(&notes) {
        println!("{line}");
    }
    Ok(())
}

fn handle_models() -> Result<()> {
    let registry = config::registry_from_env()?;
    for name in registry.names() {
        let marker = if name == registry.default_name() {
            " (default)"
        } else {
            ""
        };
        println!("{name}{marker}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use noteflow::runner::{NoteError, NoteFailure};
    use noteflow::store::StoreError;

    fn report(persisted: usize, failed: usize) -> BatchReport {
        BatchReport {
            total: persisted + failed,
            skipped: 0,
            persisted,
            failures: (0..failed)
                .map(|i| NoteFailure {
                    key: format!("k{i}"),
                    error: NoteError::Store(StoreError::Poisoned),
                })
                .collect(),
        }
    }

    #[test]
    fn clean_batch_exits_zero() {
        assert_eq!(exit_code_for(&report(3, 0)), ExitCode::SUCCESS);
        assert_eq!(exit_code_for(&report(0, 0)), ExitCode::SUCCESS);
    }

    #[test]
    fn partial_failure_exits_three() {
        assert_eq!(exit_code_for(&report(2, 1)), ExitCode::from(3));
    }

    #[test]
    fn total_failure_exits_two() {
        assert_eq!(exit_code_for(&report(0, 2)), ExitCode::from(2));
    }

    #[test]
    fn usage_errors_are_user_errors_through_context() {
        let err = anyhow::Error::new(UsageError("bad file".into())).context("while importing");
        assert!(is_user_error(&err));
        assert!(!is_user_error(&anyhow::anyhow!("disk on fire")));
    }

    #[test]
    fn cli_parses_process_defaults() {
        let cli = Cli::parse_from([
            "noteflow",
            "process",
            "simplenote_backup",
            "simplenote_summarised",
        ]);
        let Commands::Process(cmd) = cli.command else {
            panic!("expected process command");
        };
        assert_eq!(cmd.skip, 0);
        assert_eq!(cmd.max_chars, 1_000_000);
        assert!(cmd.limit.is_none());
    }

    #[test]
    fn cli_import_defaults_collection() {
        let cli = Cli::parse_from(["noteflow", "--db", "/tmp/x.db", "import", "notes.json"]);
        assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/x.db")));
        let Commands::Import(cmd) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(cmd.collection, "simplenote_backup");
    }
}
