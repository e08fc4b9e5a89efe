//! Application error types.

use thiserror::Error;

/// Fatal content-transfer errors.
///
/// These abort an entire import or export. Per-item problems during an
/// import are never represented here — they are recorded as strings on
/// the [`ImportResult`](crate::transfer::ImportResult) and the call still
/// returns normally.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("archive too large: {size} bytes (max {max} bytes)")]
    ArchiveTooLarge { size: u64, max: u64 },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("archive has no content.json entry")]
    MissingManifest,

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Result type alias using TransferError.
pub type TransferResult<T> = Result<T, TransferError>;
