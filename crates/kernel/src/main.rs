//! Fresco content transfer CLI.
//!
//! Exports the live content tree to a ZIP archive, or imports such an
//! archive into the PostgreSQL-backed content store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fresco_kernel::config::Config;
use fresco_kernel::store::PgContentStore;
use fresco_kernel::transfer::{ContentExporter, ContentImporter};

#[derive(Parser)]
#[command(name = "fresco", about = "Fresco content transfer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export live content to a ZIP archive.
    Export {
        /// Output path; defaults to the generated archive filename.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import a content archive.
    Import {
        /// Path of the archive to import.
        archive: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let store = Arc::new(PgContentStore::new(pool));

    match cli.command {
        Command::Export { out } => {
            let exporter =
                ContentExporter::with_source_tag(store, config.export_source_tag.clone());
            let result = exporter.export().await?;

            let path = out.unwrap_or_else(|| PathBuf::from(&result.filename));
            std::fs::write(&path, &result.zip_bytes)
                .with_context(|| format!("failed to write archive: {}", path.display()))?;

            info!(path = %path.display(), "archive written");
            println!(
                "Exported {} groups and {} elements to {}",
                result.group_count,
                result.element_count,
                path.display()
            );
        }
        Command::Import { archive } => {
            let importer = ContentImporter::with_limits(
                store,
                config.import_max_archive_bytes,
                config.import_max_entries,
            );
            let result = importer.import_path(&archive).await?;

            println!(
                "Imported {} items (created {}, updated {}, restored {})",
                result.total_processed(),
                result.created,
                result.updated,
                result.restored
            );
            for error in &result.errors {
                warn!(error = %error, "item skipped");
            }
            if !result.success() {
                println!("{} items reported errors, see log", result.errors.len());
            }
        }
    }

    Ok(())
}

/// Initialize tracing with env-filter support.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
