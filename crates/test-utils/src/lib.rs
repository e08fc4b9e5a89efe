//! Fresco test utilities.
//!
//! Manifest fixture builders, archive helpers, and an in-memory
//! [`ContentStore`] with the same reconciliation semantics as the
//! PostgreSQL store (soft delete, unique names, version snapshots), so
//! the transfer pipeline can be tested without a database.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use uuid::Uuid;

use fresco_kernel::focal::{FocalKey, FocalPoint};
use fresco_kernel::models::{
    ContentElement, ContentElementVersion, ContentGroup, CreateElement, CreateGroup,
    UpdateElement, UpdateGroup, snapshot_required,
};
use fresco_kernel::store::ContentStore;
use fresco_kernel::transfer::{Manifest, ManifestElement, ManifestFocalPoint, ManifestGroup};

/// Build a version-1 manifest from group records.
pub fn manifest(groups: Vec<ManifestGroup>) -> Manifest {
    Manifest {
        version: 1,
        exported_at: Some("2026-01-01T00:00:00Z".to_string()),
        source: Some("test".to_string()),
        groups,
    }
}

/// Build a group record.
pub fn manifest_group(name: &str, elements: Vec<ManifestElement>) -> ManifestGroup {
    ManifestGroup {
        name: Some(name.to_string()),
        description: None,
        elements,
    }
}

/// Build a text element record.
pub fn text_element(name: &str, text: &str) -> ManifestElement {
    ManifestElement {
        name: Some(name.to_string()),
        content_type: Some(fresco_kernel::models::ContentType::Text),
        position: None,
        text_content: Some(text.to_string()),
        required: None,
        image_hint: None,
        image_path: None,
        focal_point: None,
    }
}

/// Build an image element record referencing an archive path.
pub fn image_element(name: &str, image_path: &str) -> ManifestElement {
    ManifestElement {
        name: Some(name.to_string()),
        content_type: Some(fresco_kernel::models::ContentType::Image),
        position: None,
        text_content: None,
        required: None,
        image_hint: None,
        image_path: Some(image_path.to_string()),
        focal_point: None,
    }
}

/// Attach a focal point to an element record.
pub fn with_focal(mut element: ManifestElement, x: f32, y: f32) -> ManifestElement {
    element.focal_point = Some(ManifestFocalPoint { x, y });
    element
}

/// Bytes of a minimal valid PNG (magic header plus a truncated body),
/// enough for content sniffing to recognize `image/png`.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R', 0, 0, 0, 1, 0, 0, 0, 1]);
    bytes
}

/// Build an archive containing `content.json` for the given manifest
/// plus the given extra entries.
pub fn zip_manifest(manifest: &Manifest, extra: &[(&str, &[u8])]) -> Vec<u8> {
    let json = serde_json::to_vec_pretty(manifest).unwrap_or_default();
    let mut entries: Vec<(&str, &[u8])> = vec![("content.json", json.as_slice())];
    entries.extend_from_slice(extra);
    zip_entries(&entries)
}

/// Build an archive from raw named entries. Entry names are written
/// verbatim, so hostile names (traversal, absolute paths) can be staged.
pub fn zip_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);

    for (name, bytes) in entries {
        if zip.start_file(*name, options).is_ok() {
            let _ = zip.write_all(bytes);
        }
    }

    zip.finish().map(Cursor::into_inner).unwrap_or_default()
}

/// Image blob held by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

#[derive(Default)]
struct Inner {
    groups: Vec<ContentGroup>,
    elements: Vec<ContentElement>,
    versions: Vec<ContentElementVersion>,
    images: HashMap<Uuid, StoredImage>,
    focal_points: HashMap<FocalKey, FocalPoint>,
    cache_clears: usize,
}

/// In-memory content store mirroring the PostgreSQL semantics.
#[derive(Default)]
pub struct MemoryContentStore {
    inner: Mutex<Inner>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Total group rows, deleted ones included.
    pub fn group_count(&self) -> usize {
        self.lock().groups.len()
    }

    /// Total element rows, deleted ones included.
    pub fn element_count(&self) -> usize {
        self.lock().elements.len()
    }

    /// Version snapshots for one element, oldest first.
    pub fn versions_for(&self, element_id: Uuid) -> Vec<ContentElementVersion> {
        let mut versions: Vec<_> = self
            .lock()
            .versions
            .iter()
            .filter(|v| v.element_id == element_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version_number);
        versions
    }

    /// Stored image blob for one element.
    pub fn image_for(&self, element_id: Uuid) -> Option<StoredImage> {
        self.lock().images.get(&element_id).cloned()
    }

    /// Number of times the request cache was cleared.
    pub fn cache_clear_count(&self) -> usize {
        self.lock().cache_clears
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn list_active_groups_ordered(&self) -> Result<Vec<ContentGroup>> {
        let mut groups: Vec<_> = self
            .lock()
            .groups
            .iter()
            .filter(|g| !g.is_deleted())
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn list_active_elements_ordered(&self, group_id: Uuid) -> Result<Vec<ContentElement>> {
        let mut elements: Vec<_> = self
            .lock()
            .elements
            .iter()
            .filter(|e| e.group_id == group_id && !e.is_deleted())
            .cloned()
            .collect();
        elements.sort_by_key(|e| (e.position.is_none(), e.position, e.created));
        Ok(elements)
    }

    async fn find_group_by_name(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<ContentGroup>> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|g| g.name == name && (include_deleted || !g.is_deleted()))
            .cloned())
    }

    async fn find_element_by_group_and_name(
        &self,
        group_id: Uuid,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<ContentElement>> {
        let inner = self.lock();
        let mut candidates: Vec<_> = inner
            .elements
            .iter()
            .filter(|e| {
                e.group_id == group_id && e.name == name && (include_deleted || !e.is_deleted())
            })
            .collect();
        // Active row wins over deleted ones, then most recently changed.
        candidates.sort_by_key(|e| (e.is_deleted(), std::cmp::Reverse(e.changed)));
        Ok(candidates.first().map(|e| (*e).clone()))
    }

    async fn create_group(&self, input: CreateGroup) -> Result<ContentGroup> {
        let mut inner = self.lock();
        // Unique regardless of soft-delete state, like the DB index.
        if inner.groups.iter().any(|g| g.name == input.name) {
            bail!("duplicate group name: {}", input.name);
        }

        let group = ContentGroup {
            id: Uuid::now_v7(),
            name: input.name,
            description: input.description,
            author_id: input.author_id,
            deleted_at: None,
            created: now(),
            changed: now(),
        };
        inner.groups.push(group.clone());
        Ok(group)
    }

    async fn update_group(&self, id: Uuid, input: UpdateGroup) -> Result<ContentGroup> {
        let mut inner = self.lock();
        let group = inner
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .with_context(|| format!("group not found: {id}"))?;

        if let Some(description) = input.description {
            group.description = Some(description);
        }
        group.changed = now();
        Ok(group.clone())
    }

    async fn restore_group(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        let group = inner
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .with_context(|| format!("group not found: {id}"))?;
        group.deleted_at = None;
        group.changed = now();
        Ok(())
    }

    async fn soft_delete_group(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        let has_required = inner
            .elements
            .iter()
            .any(|e| e.group_id == id && e.required && !e.is_deleted());
        if has_required {
            bail!("group still owns required elements");
        }

        let group = inner
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .with_context(|| format!("group not found: {id}"))?;
        group.deleted_at = Some(now());
        group.changed = now();
        Ok(())
    }

    async fn create_element(&self, input: CreateElement) -> Result<ContentElement> {
        let mut inner = self.lock();
        let collision = inner
            .elements
            .iter()
            .any(|e| e.group_id == input.group_id && e.name == input.name && !e.is_deleted());
        if collision {
            bail!("duplicate element name in group: {}", input.name);
        }

        let element = ContentElement {
            id: Uuid::now_v7(),
            group_id: input.group_id,
            name: input.name,
            content_type: input.content_type,
            text_content: input.text_content,
            position: input.position,
            required: input.required,
            image_hint: input.image_hint,
            image_filename: None,
            image_mime: None,
            author_id: input.author_id,
            deleted_at: None,
            created: now(),
            changed: now(),
        };
        inner.elements.push(element.clone());
        Ok(element)
    }

    async fn update_element(&self, id: Uuid, input: UpdateElement) -> Result<ContentElement> {
        let mut inner = self.lock();

        let (previous_text, element_id) = {
            let element = inner
                .elements
                .iter()
                .find(|e| e.id == id)
                .with_context(|| format!("element not found: {id}"))?;
            (element.text_content.clone(), element.id)
        };

        if snapshot_required(previous_text.as_deref(), input.text_content.as_deref()) {
            let next_number = inner
                .versions
                .iter()
                .filter(|v| v.element_id == element_id)
                .map(|v| v.version_number)
                .max()
                .unwrap_or(0)
                + 1;
            inner.versions.push(ContentElementVersion {
                id: Uuid::now_v7(),
                element_id,
                version_number: next_number,
                text_content: previous_text,
                author_id: input.author_id,
                created: now(),
            });
        }

        let element = inner
            .elements
            .iter_mut()
            .find(|e| e.id == id)
            .with_context(|| format!("element not found: {id}"))?;

        if let Some(text) = input.text_content {
            element.text_content = Some(text);
        }
        if let Some(position) = input.position {
            element.position = Some(position);
        }
        if let Some(required) = input.required {
            element.required = required;
        }
        if let Some(hint) = input.image_hint {
            element.image_hint = Some(hint);
        }
        if let Some(author_id) = input.author_id {
            element.author_id = Some(author_id);
        }
        element.changed = now();
        Ok(element.clone())
    }

    async fn restore_element(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        let element = inner
            .elements
            .iter_mut()
            .find(|e| e.id == id)
            .with_context(|| format!("element not found: {id}"))?;
        element.deleted_at = None;
        element.changed = now();
        Ok(())
    }

    async fn soft_delete_element(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        let element = inner
            .elements
            .iter_mut()
            .find(|e| e.id == id)
            .with_context(|| format!("element not found: {id}"))?;
        if element.required {
            bail!("element '{}' is required and cannot be deleted", element.name);
        }
        element.deleted_at = Some(now());
        element.changed = now();
        Ok(())
    }

    async fn list_versions(&self, element_id: Uuid) -> Result<Vec<ContentElementVersion>> {
        Ok(self.versions_for(element_id))
    }

    async fn attach_image(
        &self,
        element_id: Uuid,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.images.insert(
            element_id,
            StoredImage {
                bytes: bytes.to_vec(),
                filename: filename.to_string(),
                content_type: content_type.to_string(),
            },
        );

        let element = inner
            .elements
            .iter_mut()
            .find(|e| e.id == element_id)
            .with_context(|| format!("element not found: {element_id}"))?;
        element.image_filename = Some(filename.to_string());
        element.image_mime = Some(content_type.to_string());
        element.changed = now();
        Ok(())
    }

    async fn download_image_bytes(&self, element_id: Uuid) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().images.get(&element_id).map(|i| i.bytes.clone()))
    }

    async fn set_focal_point(&self, key: &FocalKey, point: FocalPoint) -> Result<()> {
        self.lock().focal_points.insert(key.clone(), point);
        Ok(())
    }

    async fn get_focal_point(&self, key: &FocalKey) -> Result<Option<FocalPoint>> {
        Ok(self.lock().focal_points.get(key).copied())
    }

    fn clear_request_cache(&self) {
        self.lock().cache_clears += 1;
    }
}

impl std::fmt::Debug for MemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContentStore").finish()
    }
}
