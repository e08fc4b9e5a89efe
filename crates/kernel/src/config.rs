//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

use crate::transfer::{MAX_ARCHIVE_BYTES, MAX_ARCHIVE_ENTRIES};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Source tag written into exported manifests (default: "fresco").
    pub export_source_tag: String,

    /// Maximum accepted import archive size in bytes (default: 50 MiB).
    pub import_max_archive_bytes: u64,

    /// Maximum number of entries extracted from an import archive (default: 500).
    pub import_max_entries: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let export_source_tag =
            env::var("EXPORT_SOURCE_TAG").unwrap_or_else(|_| "fresco".to_string());

        let import_max_archive_bytes = match env::var("IMPORT_MAX_ARCHIVE_BYTES") {
            Ok(v) => v
                .parse()
                .context("IMPORT_MAX_ARCHIVE_BYTES must be a valid u64")?,
            Err(_) => MAX_ARCHIVE_BYTES,
        };

        let import_max_entries = match env::var("IMPORT_MAX_ENTRIES") {
            Ok(v) => v.parse().context("IMPORT_MAX_ENTRIES must be a valid usize")?,
            Err(_) => MAX_ARCHIVE_ENTRIES,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            export_source_tag,
            import_max_archive_bytes,
            import_max_entries,
        })
    }
}
