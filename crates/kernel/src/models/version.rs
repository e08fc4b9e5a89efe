//! Content element version history.
//!
//! A version is an immutable snapshot of an element's *previous*
//! `text_content`, created as a side effect of an update that changes the
//! text. Version numbers are strictly increasing per element with no
//! reuse. Versions are never mutated and only disappear via cascade when
//! the owning element is hard-destroyed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable snapshot of a past text value for one element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentElementVersion {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Owning element.
    pub element_id: Uuid,

    /// Positive, strictly increasing per element.
    pub version_number: i32,

    /// The text value *before* the change that triggered the snapshot.
    pub text_content: Option<String>,

    /// Author of the change, when attributed.
    pub author_id: Option<Uuid>,

    /// Unix timestamp when created.
    pub created: i64,
}

/// Decide whether an element update must record a version snapshot.
///
/// A snapshot is required when the update supplies a text value and that
/// value differs from what the row currently holds. Updates that omit
/// `text_content` entirely never version, and neither do no-op writes of
/// the same text. Store implementations call this inside their update
/// path so the decision stays independently testable.
pub fn snapshot_required(previous: Option<&str>, incoming: Option<&str>) -> bool {
    match incoming {
        Some(text) => previous != Some(text),
        None => false,
    }
}
