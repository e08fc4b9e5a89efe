//! Content store.
//!
//! Persistence seam for the transfer pipeline. The exporter and importer
//! talk to an `Arc<dyn ContentStore>`; production uses the PostgreSQL
//! implementation and tests substitute an in-memory one.
//!
//! Soft delete is a first-class lifecycle state here: finders take an
//! explicit `include_deleted` flag rather than relying on an implicit
//! global scope, because the importer deliberately matches deleted rows
//! in order to restore them instead of creating duplicates.

pub mod pg;

pub use pg::PgContentStore;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::focal::{FocalKey, FocalPoint};
use crate::models::{
    ContentElement, ContentElementVersion, ContentGroup, CreateElement, CreateGroup,
    UpdateElement, UpdateGroup,
};

/// Persistence operations consumed by the transfer pipeline.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// List non-deleted groups ordered by name.
    async fn list_active_groups_ordered(&self) -> Result<Vec<ContentGroup>>;

    /// List a group's non-deleted elements in their natural order
    /// (position first, then creation time).
    async fn list_active_elements_ordered(&self, group_id: Uuid) -> Result<Vec<ContentElement>>;

    /// Find a group by exact name. With `include_deleted`, soft-deleted
    /// rows match too.
    async fn find_group_by_name(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<ContentGroup>>;

    /// Find an element by `(owning group, name)`. With `include_deleted`,
    /// soft-deleted rows match too; an active row wins over deleted ones.
    async fn find_element_by_group_and_name(
        &self,
        group_id: Uuid,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<ContentElement>>;

    /// Create a group. Fails if the name is taken by any row, deleted or
    /// not (database unique constraint).
    async fn create_group(&self, input: CreateGroup) -> Result<ContentGroup>;

    /// Apply a partial update to a group.
    async fn update_group(&self, id: Uuid, input: UpdateGroup) -> Result<ContentGroup>;

    /// Clear a group's soft-delete marker.
    async fn restore_group(&self, id: Uuid) -> Result<()>;

    /// Soft-delete a group. Refused while the group still owns an active
    /// required element.
    async fn soft_delete_group(&self, id: Uuid) -> Result<()>;

    /// Create an element. Fails if the `(group, name)` pair collides with
    /// an active row.
    async fn create_element(&self, input: CreateElement) -> Result<ContentElement>;

    /// Apply a partial update to an element. When the update changes
    /// `text_content`, a version snapshot of the previous value is
    /// recorded in the same transaction.
    async fn update_element(&self, id: Uuid, input: UpdateElement) -> Result<ContentElement>;

    /// Clear an element's soft-delete marker.
    async fn restore_element(&self, id: Uuid) -> Result<()>;

    /// Soft-delete an element. Refused for required elements.
    async fn soft_delete_element(&self, id: Uuid) -> Result<()>;

    /// List an element's version history, oldest first.
    async fn list_versions(&self, element_id: Uuid) -> Result<Vec<ContentElementVersion>>;

    /// Attach an image blob to an element, replacing any existing one.
    async fn attach_image(
        &self,
        element_id: Uuid,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<()>;

    /// Download the raw bytes of an element's attached image.
    async fn download_image_bytes(&self, element_id: Uuid) -> Result<Option<Vec<u8>>>;

    /// Set the focal point addressed by `key`.
    async fn set_focal_point(&self, key: &FocalKey, point: FocalPoint) -> Result<()>;

    /// Get the focal point addressed by `key`, if set.
    async fn get_focal_point(&self, key: &FocalKey) -> Result<Option<FocalPoint>>;

    /// Best-effort invalidation of the process-wide request cache.
    fn clear_request_cache(&self);
}
