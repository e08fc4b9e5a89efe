//! Content element model.
//!
//! An element is one unit of manageable content — plain text or an image —
//! belonging to exactly one group. Element names are unique per group among
//! non-deleted rows. The content type is fixed at creation and never
//! changes afterwards.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Element content type. Immutable after the row is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    /// Machine name as stored in the database and the manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            other => bail!("unknown content type: {other}"),
        }
    }
}

/// A single piece of content belonging to one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentElement {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Owning group.
    pub group_id: Uuid,

    /// Element name. Unique within the group among rows where
    /// `deleted_at` is null.
    pub name: String,

    /// Fixed content type (text or image).
    pub content_type: ContentType,

    /// Text payload. Required for text elements, meaningless for images.
    pub text_content: Option<String>,

    /// Integer ordering hint within the group.
    pub position: Option<i32>,

    /// A required element blocks deletion of itself and soft-deletion of
    /// its owning group.
    pub required: bool,

    /// Free-text sizing guidance for image elements.
    pub image_hint: Option<String>,

    /// Original filename of the attached image, if any.
    pub image_filename: Option<String>,

    /// MIME type of the attached image, if any.
    pub image_mime: Option<String>,

    /// Author user ID, when attributed.
    pub author_id: Option<Uuid>,

    /// Unix timestamp of soft deletion; None while the element is active.
    pub deleted_at: Option<i64>,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

impl ContentElement {
    /// Check if this element is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Check if an image blob is attached.
    pub fn has_image(&self) -> bool {
        self.image_filename.is_some()
    }
}

/// Input for creating an element.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateElement {
    pub group_id: Uuid,
    pub name: String,
    pub content_type: ContentType,
    pub text_content: Option<String>,
    pub position: Option<i32>,
    pub required: bool,
    pub image_hint: Option<String>,
    pub author_id: Option<Uuid>,
}

/// Input for updating an element. Fields left as None are untouched.
///
/// The content type is deliberately absent: it cannot change after
/// creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateElement {
    pub text_content: Option<String>,
    pub position: Option<i32>,
    pub required: Option<bool>,
    pub image_hint: Option<String>,
    pub author_id: Option<Uuid>,
}
