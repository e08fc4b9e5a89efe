//! Content transfer pipeline.
//!
//! Serializes the live content tree (groups → elements → attached images)
//! into a portable ZIP+JSON archive, and restores such archives with
//! upsert/restore semantics and per-item error isolation.

pub mod export;
pub mod import;
pub mod manifest;

pub use export::{ContentExporter, ExportResult};
pub use import::{ContentImporter, ImportResult};
pub use manifest::{Manifest, ManifestElement, ManifestFocalPoint, ManifestGroup};

use std::path::{Component, Path};

/// Name of the mandatory manifest entry inside an archive.
pub const MANIFEST_ENTRY: &str = "content.json";

/// Maximum accepted archive size (50 MiB).
pub const MAX_ARCHIVE_BYTES: u64 = 50 * 1024 * 1024;

/// Maximum number of entries extracted from an archive.
pub const MAX_ARCHIVE_ENTRIES: usize = 500;

/// Slug a name for use in archive image paths: lowercase, runs of
/// non-alphanumeric characters collapsed to a single hyphen, leading and
/// trailing hyphens trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Check that an archive entry name cannot escape the extraction
/// directory: relative, and free of `..` segments.
pub fn entry_name_is_safe(name: &str) -> bool {
    if name.starts_with('/') || name.starts_with('\\') {
        return false;
    }

    Path::new(name).components().all(|component| {
        matches!(component, Component::Normal(_) | Component::CurDir)
    })
}

/// Check for macOS resource-fork artifacts (`__MACOSX/` trees and
/// `._`-prefixed files) that Finder-produced archives carry.
pub fn is_mac_artifact(name: &str) -> bool {
    Path::new(name).components().any(|component| {
        if let Component::Normal(part) = component {
            let part = part.to_string_lossy();
            part == "__MACOSX" || part.starts_with("._")
        } else {
            false
        }
    })
}

/// Map a supported image extension to its MIME type.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
