//! Content exporter.
//!
//! Walks the active content tree and packages it into a self-contained
//! ZIP archive: a pretty-printed `content.json` manifest first, then one
//! entry per attached image. Export is a pure read — any store failure
//! aborts the whole run, since a manifest missing data would be silently
//! wrong rather than safely partial.

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;

use crate::focal::HasFocalPoint;
use crate::models::{ContentElement, ContentGroup, ContentType};
use crate::store::ContentStore;
use crate::transfer::manifest::{
    MANIFEST_VERSION, Manifest, ManifestElement, ManifestFocalPoint, ManifestGroup,
};
use crate::transfer::{MANIFEST_ENTRY, mime_for_extension, slugify};

/// Result of a completed export.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExportResult {
    /// The ZIP archive bytes.
    #[serde(skip)]
    pub zip_bytes: Vec<u8>,

    /// Generated archive filename (`cms_content_<YYYYMMDD_HHMMSS>.zip`).
    pub filename: String,

    /// Number of groups included.
    pub group_count: usize,

    /// Number of elements included.
    pub element_count: usize,
}

/// Service that snapshots live content into a transfer archive.
pub struct ContentExporter {
    store: Arc<dyn ContentStore>,
    source_tag: String,
}

impl ContentExporter {
    /// Create an exporter with the default source tag.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self::with_source_tag(store, "fresco")
    }

    /// Create an exporter with a custom source tag for the manifest.
    pub fn with_source_tag(store: Arc<dyn ContentStore>, source_tag: impl Into<String>) -> Self {
        Self {
            store,
            source_tag: source_tag.into(),
        }
    }

    /// Export the full active content tree.
    ///
    /// Groups are ordered by name and elements by their natural order, so
    /// the manifest content is a deterministic function of the live data
    /// (modulo the `exported_at` timestamp).
    pub async fn export(&self) -> Result<ExportResult> {
        let groups = self.store.list_active_groups_ordered().await?;

        let mut manifest_groups = Vec::with_capacity(groups.len());
        let mut images: Vec<(String, Vec<u8>)> = Vec::new();
        let mut element_count = 0;

        for group in &groups {
            let elements = self.store.list_active_elements_ordered(group.id).await?;
            element_count += elements.len();

            let mut records = Vec::with_capacity(elements.len());
            for element in &elements {
                records.push(self.element_record(group, element, &mut images).await?);
            }

            manifest_groups.push(ManifestGroup {
                name: Some(group.name.clone()),
                description: group.description.clone(),
                elements: records,
            });
        }

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            exported_at: Some(chrono::Utc::now().to_rfc3339()),
            source: Some(self.source_tag.clone()),
            groups: manifest_groups,
        };

        let zip_bytes = build_archive(&manifest, &images)?;
        let filename = format!(
            "cms_content_{}.zip",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        );

        info!(
            groups = groups.len(),
            elements = element_count,
            images = images.len(),
            filename = %filename,
            "content exported"
        );

        Ok(ExportResult {
            zip_bytes,
            filename,
            group_count: groups.len(),
            element_count,
        })
    }

    /// Build one element's manifest record, collecting its image bytes
    /// when an attachment exists.
    async fn element_record(
        &self,
        group: &ContentGroup,
        element: &ContentElement,
        images: &mut Vec<(String, Vec<u8>)>,
    ) -> Result<ManifestElement> {
        let mut record = ManifestElement {
            name: Some(element.name.clone()),
            content_type: Some(element.content_type),
            position: element.position,
            text_content: element.text_content.clone(),
            required: Some(element.required),
            image_hint: element.image_hint.clone(),
            image_path: None,
            focal_point: None,
        };

        if element.content_type == ContentType::Image && element.has_image() {
            if let Some(extension) = image_extension(element) {
                let path = format!(
                    "images/{}/{}.{}",
                    slugify(&group.name),
                    slugify(&element.name),
                    extension
                );

                let bytes = self
                    .store
                    .download_image_bytes(element.id)
                    .await?
                    .with_context(|| {
                        format!("attached image has no stored bytes: {}", element.name)
                    })?;

                debug!(element = %element.name, path = %path, size = bytes.len(), "image collected");
                images.push((path.clone(), bytes));
                record.image_path = Some(path);
            }

            if element.supports_focal_point() {
                if let Some(point) = self.store.get_focal_point(&element.focal_key()).await? {
                    record.focal_point = Some(ManifestFocalPoint {
                        x: point.x,
                        y: point.y,
                    });
                }
            }
        }

        Ok(record)
    }
}

/// Archive-path extension for an element's attached image, from its
/// stored filename or, failing that, its MIME type.
fn image_extension(element: &ContentElement) -> Option<String> {
    let from_filename = element
        .image_filename
        .as_deref()
        .and_then(|f| Path::new(f).extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| mime_for_extension(e).is_some());

    from_filename.or_else(|| {
        match element.image_mime.as_deref() {
            Some("image/jpeg") => Some("jpg"),
            Some("image/png") => Some("png"),
            Some("image/gif") => Some("gif"),
            Some("image/webp") => Some("webp"),
            _ => None,
        }
        .map(str::to_string)
    })
}

/// Stream the manifest and image entries into an in-memory ZIP buffer.
fn build_archive(manifest: &Manifest, images: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let json = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;

    zip.start_file(MANIFEST_ENTRY, options)
        .context("failed to start manifest entry")?;
    zip.write_all(json.as_bytes())
        .context("failed to write manifest entry")?;

    for (path, bytes) in images {
        zip.start_file(path, options)
            .with_context(|| format!("failed to start image entry: {path}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write image entry: {path}"))?;
    }

    let cursor = zip.finish().context("failed to finalize archive")?;
    Ok(cursor.into_inner())
}
