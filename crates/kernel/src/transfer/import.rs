//! Content importer.
//!
//! Consumes a transfer archive and reconciles it against the store:
//! groups are matched by name and elements by `(group, name)`, in both
//! cases *including* soft-deleted rows so an import resurrects previously
//! deleted content instead of creating a duplicate active row next to a
//! dangling deleted one.
//!
//! Failures come in two tiers. Fatal problems (oversize archive,
//! unreadable container, missing or invalid manifest) abort the whole
//! call with a [`TransferError`]. Everything else — blank names,
//! persistence failures, missing image files, bad focal points — is
//! isolated to the offending item, recorded as a string, and processing
//! continues.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{TransferError, TransferResult};
use crate::focal::{FocalPoint, HasFocalPoint};
use crate::models::{
    ContentElement, ContentGroup, ContentType, CreateElement, CreateGroup, UpdateElement,
    UpdateGroup,
};
use crate::store::ContentStore;
use crate::transfer::manifest::{Manifest, ManifestElement, ManifestFocalPoint, ManifestGroup};
use crate::transfer::{
    MANIFEST_ENTRY, MAX_ARCHIVE_BYTES, MAX_ARCHIVE_ENTRIES, entry_name_is_safe, is_mac_artifact,
    mime_for_extension,
};

/// Result of a completed import.
///
/// Counts combine groups and elements. `errors` holds the per-item
/// problems encountered, in processing order; a non-empty list does not
/// mean the import failed.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportResult {
    pub created: u32,
    pub updated: u32,
    pub restored: u32,
    pub errors: Vec<String>,
}

impl ImportResult {
    /// Total items created, updated, or restored.
    pub fn total_processed(&self) -> u32 {
        self.created + self.updated + self.restored
    }

    /// True when no per-item errors were recorded.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Restored => self.restored += 1,
        }
    }
}

/// How one group or element was reconciled.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Created,
    Updated,
    Restored,
}

/// Service that restores a transfer archive into the store.
pub struct ContentImporter {
    store: Arc<dyn ContentStore>,
    max_archive_bytes: u64,
    max_entries: usize,
}

impl ContentImporter {
    /// Create an importer with the default size and entry caps.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self::with_limits(store, MAX_ARCHIVE_BYTES, MAX_ARCHIVE_ENTRIES)
    }

    /// Create an importer with custom caps.
    pub fn with_limits(
        store: Arc<dyn ContentStore>,
        max_archive_bytes: u64,
        max_entries: usize,
    ) -> Self {
        Self {
            store,
            max_archive_bytes,
            max_entries,
        }
    }

    /// Import an archive from disk.
    ///
    /// The declared file size is checked against the cap before any byte
    /// is read, so an oversize upload never reaches extraction.
    pub async fn import_path(&self, path: &Path) -> TransferResult<ImportResult> {
        let size = fs::metadata(path)
            .with_context(|| format!("failed to stat archive: {}", path.display()))?
            .len();
        if size > self.max_archive_bytes {
            return Err(TransferError::ArchiveTooLarge {
                size,
                max: self.max_archive_bytes,
            });
        }

        let bytes = fs::read(path)
            .with_context(|| format!("failed to read archive: {}", path.display()))?;
        self.import_bytes(&bytes).await
    }

    /// Import an archive already held in memory.
    pub async fn import_bytes(&self, bytes: &[u8]) -> TransferResult<ImportResult> {
        let size = bytes.len() as u64;
        if size > self.max_archive_bytes {
            return Err(TransferError::ArchiveTooLarge {
                size,
                max: self.max_archive_bytes,
            });
        }

        let scratch = TempDir::new().context("failed to create extraction directory")?;

        let mut result = ImportResult::default();
        let run = self.run(bytes, scratch.path(), &mut result).await;

        // Cleanup failures must never mask the primary result.
        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove extraction directory");
        }

        run?;
        Ok(result)
    }

    async fn run(
        &self,
        bytes: &[u8],
        scratch: &Path,
        result: &mut ImportResult,
    ) -> TransferResult<()> {
        self.extract(bytes, scratch, result)?;

        let manifest_path = scratch.join(MANIFEST_ENTRY);
        if !manifest_path.is_file() {
            return Err(TransferError::MissingManifest);
        }

        let manifest_bytes = fs::read(&manifest_path).context("failed to read manifest")?;
        let manifest = Manifest::parse(&manifest_bytes)?;

        info!(
            version = manifest.version,
            groups = manifest.groups.len(),
            source = manifest.source.as_deref().unwrap_or("unknown"),
            "importing content archive"
        );

        for group in &manifest.groups {
            self.import_group(group, scratch, result).await;
        }

        // Imported content replaces whatever request-scoped lookups have
        // cached; a stale miss here is harmless, so best-effort only.
        self.store.clear_request_cache();

        info!(
            created = result.created,
            updated = result.updated,
            restored = result.restored,
            errors = result.errors.len(),
            "import finished"
        );

        Ok(())
    }

    /// Extract safe entries into the scratch directory.
    fn extract(
        &self,
        bytes: &[u8],
        scratch: &Path,
        result: &mut ImportResult,
    ) -> TransferResult<()> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| TransferError::InvalidArchive(e.to_string()))?;

        for i in 0..archive.len() {
            if i >= self.max_entries {
                result.errors.push(format!(
                    "Archive entry limit reached ({}), remaining entries skipped",
                    self.max_entries
                ));
                break;
            }

            let mut file = archive
                .by_index(i)
                .map_err(|e| TransferError::InvalidArchive(e.to_string()))?;
            if !file.is_file() {
                continue;
            }

            let name = file.name().to_string();
            if is_mac_artifact(&name) {
                continue;
            }
            if !entry_name_is_safe(&name) {
                result.errors.push(format!("Unsafe archive entry skipped: {name}"));
                continue;
            }

            // enclosed_name re-checks containment on the decoded path.
            let Some(relative) = file.enclosed_name() else {
                result.errors.push(format!("Unsafe archive entry skipped: {name}"));
                continue;
            };

            let dest = scratch.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).context("failed to create extraction directories")?;
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .with_context(|| format!("failed to read archive entry: {name}"))?;
            fs::write(&dest, contents)
                .with_context(|| format!("failed to extract archive entry: {name}"))?;

            debug!(entry = %name, "archive entry extracted");
        }

        Ok(())
    }

    async fn import_group(
        &self,
        record: &ManifestGroup,
        scratch: &Path,
        result: &mut ImportResult,
    ) {
        let Some(name) = record.name() else {
            result.errors.push("Group missing name, skipped".to_string());
            return;
        };

        let group = match self.upsert_group(name, record).await {
            Ok((group, outcome)) => {
                result.record(outcome);
                group
            }
            Err(e) => {
                result.errors.push(format!("Group '{name}': {e:#}"));
                return;
            }
        };

        for element in &record.elements {
            self.import_element(&group, element, scratch, result).await;
        }
    }

    /// Create, update, or restore a group matched by name (deleted rows
    /// included). Concurrent imports can both miss the find and race to
    /// create; the loser surfaces the unique-constraint violation as a
    /// per-item error through the caller.
    async fn upsert_group(
        &self,
        name: &str,
        record: &ManifestGroup,
    ) -> Result<(ContentGroup, Outcome)> {
        let update = UpdateGroup {
            description: record.description.clone(),
        };

        match self.store.find_group_by_name(name, true).await? {
            Some(existing) if existing.is_deleted() => {
                self.store.restore_group(existing.id).await?;
                let group = self.store.update_group(existing.id, update).await?;
                Ok((group, Outcome::Restored))
            }
            Some(existing) => {
                let group = self.store.update_group(existing.id, update).await?;
                Ok((group, Outcome::Updated))
            }
            None => {
                let group = self
                    .store
                    .create_group(CreateGroup {
                        name: name.to_string(),
                        description: record.description.clone(),
                        author_id: None,
                    })
                    .await?;
                Ok((group, Outcome::Created))
            }
        }
    }

    async fn import_element(
        &self,
        group: &ContentGroup,
        record: &ManifestElement,
        scratch: &Path,
        result: &mut ImportResult,
    ) {
        let Some(name) = record.name() else {
            result
                .errors
                .push(format!("Group '{}': element missing name, skipped", group.name));
            return;
        };

        let element = match self.upsert_element(group, name, record).await {
            Ok((element, outcome)) => {
                result.record(outcome);
                element
            }
            Err(e) => {
                result
                    .errors
                    .push(format!("Group '{}' element '{name}': {e:#}", group.name));
                return;
            }
        };

        if let Some(path) = record.image_path.as_deref() {
            if let Err(e) = self.attach_element_image(&element, path, scratch).await {
                result
                    .errors
                    .push(format!("Group '{}' element '{name}': {e:#}", group.name));
            }
        }

        if let Some(focal) = record.focal_point {
            if let Err(e) = self.apply_focal_point(&element, focal).await {
                result
                    .errors
                    .push(format!("Group '{}' element '{name}': {e:#}", group.name));
            }
        }
    }

    /// Create, update, or restore one element matched by `(group, name)`,
    /// deleted rows included.
    async fn upsert_element(
        &self,
        group: &ContentGroup,
        name: &str,
        record: &ManifestElement,
    ) -> Result<(ContentElement, Outcome)> {
        let existing = self
            .store
            .find_element_by_group_and_name(group.id, name, true)
            .await?;

        match existing {
            Some(element) => {
                if let Some(declared) = record.content_type {
                    if declared != element.content_type {
                        bail!(
                            "content type cannot change (existing {}, manifest {declared})",
                            element.content_type
                        );
                    }
                }

                let was_deleted = element.is_deleted();
                if was_deleted {
                    self.store.restore_element(element.id).await?;
                }

                let updated = self
                    .store
                    .update_element(
                        element.id,
                        UpdateElement {
                            text_content: record.text_content.clone(),
                            position: record.position,
                            required: record.required,
                            image_hint: record.image_hint.clone(),
                            author_id: None,
                        },
                    )
                    .await?;

                let outcome = if was_deleted {
                    Outcome::Restored
                } else {
                    Outcome::Updated
                };
                Ok((updated, outcome))
            }
            None => {
                let content_type = record
                    .content_type
                    .context("content_type is required to create an element")?;
                if content_type == ContentType::Text && record.text_content.is_none() {
                    bail!("text elements require text_content");
                }

                let element = self
                    .store
                    .create_element(CreateElement {
                        group_id: group.id,
                        name: name.to_string(),
                        content_type,
                        text_content: record.text_content.clone(),
                        position: record.position,
                        required: record.required.unwrap_or(false),
                        image_hint: record.image_hint.clone(),
                        author_id: None,
                    })
                    .await?;
                Ok((element, Outcome::Created))
            }
        }
    }

    /// Validate and attach a referenced image file from the scratch
    /// directory.
    async fn attach_element_image(
        &self,
        element: &ContentElement,
        path: &str,
        scratch: &Path,
    ) -> Result<()> {
        if element.content_type != ContentType::Image {
            bail!("image attachment rejected for {} element", element.content_type);
        }
        if !entry_name_is_safe(path) {
            bail!("unsafe image path: {path}");
        }

        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let Some(mime) = extension.as_deref().and_then(mime_for_extension) else {
            bail!("image file missing or unsupported: {path}");
        };

        let full = scratch.join(path);
        if !full.is_file() {
            bail!("image file missing or unsupported: {path}");
        }

        let bytes =
            fs::read(&full).with_context(|| format!("failed to read image file: {path}"))?;

        // Extension checks alone accept renamed non-images; sniff the
        // magic bytes too.
        let looks_like_image = infer::get(&bytes)
            .is_some_and(|kind| kind.mime_type().starts_with("image/"));
        if !looks_like_image {
            bail!("image file missing or unsupported: {path}");
        }

        let filename = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);

        self.store
            .attach_image(element.id, &bytes, filename, mime)
            .await
    }

    async fn apply_focal_point(
        &self,
        element: &ContentElement,
        focal: ManifestFocalPoint,
    ) -> Result<()> {
        if !element.supports_focal_point() {
            bail!("focal point rejected for {} element", element.content_type);
        }

        self.store
            .set_focal_point(&element.focal_key(), FocalPoint::clamped(focal.x, focal.y))
            .await
    }
}

impl std::fmt::Debug for ContentImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentImporter")
            .field("max_archive_bytes", &self.max_archive_bytes)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
