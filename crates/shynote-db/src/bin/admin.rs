//! shynote-admin: operator tool for schema migration and tenant backups.
//!
//! Reads `DATABASE_URL` and `SHYNOTE_SHARE_SALT` from the environment (or a
//! `.env` file). Logging follows `RUST_LOG` and `LOG_FORMAT` (`json` or `text`).

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shynote_db::{
    database_url_from_env, log_pool_metrics, Backup, Database, PoolConfig, SyncConfig,
};

#[derive(Parser)]
#[command(name = "shynote-admin")]
#[command(author, version, about = "Administration tool for shynote")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Write every folder and note of one owner as a JSON backup
    Export {
        /// Owner whose data is exported
        #[arg(long)]
        owner: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge a JSON backup into one owner's data
    Import {
        /// Owner receiving the backup
        #[arg(long)]
        owner: String,

        /// Backup file produced by `export`
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shynote_core=info,shynote_db=info,shynote_admin=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let url = database_url_from_env()?;
    let db = Database::connect_with_config(&url, PoolConfig::from_env()?)
        .await
        .context("connecting to database")?;

    match cli.command {
        Commands::Migrate => {
            db.migrate().await.context("applying migrations")?;
            info!(subsystem = "admin", op = "migrate", "Migrations applied");
        }

        Commands::Export { owner, output } => {
            let engine = db.engine(SyncConfig::from_env()?);
            let backup = engine.export_backup(&owner).await?;
            let json = serde_json::to_string_pretty(&backup)?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(json.as_bytes())?;
                    stdout.write_all(b"\n")?;
                }
            }
        }

        Commands::Import { owner, input } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let backup: Backup = serde_json::from_str(&raw)
                .with_context(|| format!("parsing backup {}", input.display()))?;

            let engine = db.engine(SyncConfig::from_env()?);
            let report = engine.merge_backup(&owner, backup).await?;
            println!(
                "folders_added={} notes_added={} folders_skipped={} notes_skipped={}",
                report.folders_added,
                report.notes_added,
                report.folders_skipped,
                report.notes_skipped
            );
        }
    }

    log_pool_metrics(db.pool());
    Ok(())
}
