//! pims-file-update - apply a lease or acquisition file payload from the command line
//!
//! Usage:
//!   cargo run --bin pims_file_update --features cli,database -- --user jdoe add lease.json
//!   cargo run --bin pims_file_update --features cli,database -- --user jdoe update lease.json
//!   cargo run --bin pims_file_update --features cli,database -- get LEASE 10
//!
//! The payload file holds `{ "file": {...}, "userOverrideCodes": [...] }`.
//! On failure the error is printed as JSON with its status and, for
//! conflicts, the override code to resubmit with.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pims::spatial::ProjectionTransformer;
use pims::store::PgStore;
use pims::types::{ActingUser, FileKind, PimsFile, Uuid};
use pims::{ErrorResponse, FileUpdateOrchestrator, FileUpdateRequest, PimsConfig, PimsError};

#[derive(Parser)]
#[command(name = "pims-file-update")]
#[command(about = "Add or update PIMS files and their property associations")]
struct Cli {
    /// Username recorded on notes and in logs
    #[arg(short, long, default_value = "pims-cli")]
    user: String,

    /// Directory guid of the user, recorded on notes
    #[arg(long, env = "PIMS_USER_GUID")]
    user_guid: Option<Uuid>,

    /// Create missing tables before running
    #[arg(long)]
    init_schema: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new file from a payload
    Add { payload: PathBuf },
    /// Update fields and properties of an existing file
    Update { payload: PathBuf },
    /// Update only the header fields of an existing file
    UpdateFields { payload: PathBuf },
    /// Update only the property associations of an existing file
    UpdateProperties { payload: PathBuf },
    /// Print a file with its properties
    Get { kind: FileKind, id: i64 },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pims=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(PimsConfig::from_env()?);

    let store = PgStore::connect(&config.database).await?;
    if cli.init_schema {
        store.ensure_schema().await?;
    }

    let orchestrator = FileUpdateOrchestrator::new(
        Arc::new(store),
        Arc::new(ProjectionTransformer::new()),
        Arc::clone(&config),
    )?;
    let user = match cli.user_guid {
        Some(guid) => ActingUser::new(cli.user).with_guid(guid),
        None => ActingUser::new(cli.user),
    };

    let outcome = match cli.command {
        Command::Get { kind, id } => orchestrator.get_file(kind, id).await,
        Command::Add { payload } => {
            apply(&orchestrator, &user, Action::Add, read_request(&payload)?).await
        }
        Command::Update { payload } => {
            apply(&orchestrator, &user, Action::Update, read_request(&payload)?).await
        }
        Command::UpdateFields { payload } => {
            apply(&orchestrator, &user, Action::Fields, read_request(&payload)?).await
        }
        Command::UpdateProperties { payload } => {
            apply(&orchestrator, &user, Action::Properties, read_request(&payload)?).await
        }
    };

    match outcome {
        Ok(file) => {
            println!("{}", serde_json::to_string_pretty(&file)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report(&err)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

enum Action {
    Add,
    Update,
    Fields,
    Properties,
}

async fn apply(
    orchestrator: &FileUpdateOrchestrator,
    user: &ActingUser,
    action: Action,
    request: FileUpdateRequest,
) -> Result<PimsFile, PimsError> {
    let overrides = request.overrides()?;
    match action {
        Action::Add => orchestrator.add_file(user, request.file, &overrides).await,
        Action::Update => orchestrator.update_file(user, request.file, &overrides).await,
        Action::Fields => orchestrator.update_fields(user, request.file, &overrides).await,
        Action::Properties => {
            orchestrator
                .update_properties(user, request.file, &overrides)
                .await
        }
    }
}

fn read_request(path: &Path) -> Result<FileUpdateRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a valid file payload", path.display()))
}

fn report(err: &PimsError) -> Result<()> {
    if err.http_status() >= 500 {
        tracing::error!(error = ?err, "File update failed");
    }
    eprintln!("{}", serde_json::to_string_pretty(&ErrorResponse::from(err))?);
    Ok(())
}
