//! Content group model.
//!
//! A group is a named collection of content elements (e.g. "Headers").
//! Groups are soft-deleted rather than destroyed: `deleted_at` is set and
//! the row is retained so a later import can restore it by name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named collection of content elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentGroup {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Group name. Unique across all groups regardless of soft-delete
    /// state (enforced by a database unique index, not scoped to active
    /// rows).
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Author user ID, when attributed.
    pub author_id: Option<Uuid>,

    /// Unix timestamp of soft deletion; None while the group is active.
    pub deleted_at: Option<i64>,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

impl ContentGroup {
    /// Check if this group is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating a group.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    pub author_id: Option<Uuid>,
}

/// Input for updating a group. Fields left as None are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGroup {
    pub description: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn deleted_state() {
        let mut group = ContentGroup {
            id: Uuid::now_v7(),
            name: "Headers".to_string(),
            description: None,
            author_id: None,
            deleted_at: None,
            created: 0,
            changed: 0,
        };
        assert!(!group.is_deleted());

        group.deleted_at = Some(1_700_000_000);
        assert!(group.is_deleted());
    }
}
