//! Manifest wire format.
//!
//! The manifest is the `content.json` document inside a transfer archive.
//! It is pretty-printed on export but accepted in any valid JSON
//! formatting on import. Per-element fields are all optional on the wire:
//! an omitted field means "leave the existing value untouched" when the
//! element already exists.

use serde::{Deserialize, Serialize};

use crate::error::{TransferError, TransferResult};
use crate::models::ContentType;

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Top-level manifest envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub groups: Vec<ManifestGroup>,
}

/// One group record in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub elements: Vec<ManifestElement>,
}

impl ManifestGroup {
    /// Group name, if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// One element record in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestElement {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub image_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_point: Option<ManifestFocalPoint>,
}

impl ManifestElement {
    /// Element name, if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Focal coordinates on the wire. Clamped into 0..=1 on application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ManifestFocalPoint {
    pub x: f32,
    pub y: f32,
}

impl Manifest {
    /// Parse and validate manifest bytes.
    ///
    /// Schema violations here are fatal: a document that is not JSON, not
    /// an object, or lacks `version` or a `groups` array is not a
    /// recognizable product of this system, so the whole import aborts.
    pub fn parse(bytes: &[u8]) -> TransferResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| TransferError::InvalidManifest(format!("not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| TransferError::InvalidManifest("not a JSON object".to_string()))?;

        if !object.contains_key("version") {
            return Err(TransferError::InvalidManifest(
                "missing required field: version".to_string(),
            ));
        }

        match object.get("groups") {
            Some(groups) if groups.is_array() => {}
            Some(_) => {
                return Err(TransferError::InvalidManifest(
                    "groups must be an array".to_string(),
                ));
            }
            None => {
                return Err(TransferError::InvalidManifest(
                    "missing required field: groups".to_string(),
                ));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| TransferError::InvalidManifest(e.to_string()))
    }
}
