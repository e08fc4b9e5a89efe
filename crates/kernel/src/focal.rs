//! Focal points for smart image cropping.
//!
//! A focal point is a normalized (0–1) coordinate marking the visually
//! important point of an attached image. Rather than a polymorphic foreign
//! key, any entity that carries a croppable attachment implements the
//! [`HasFocalPoint`] capability; the focal data itself is addressed by a
//! composite `(owner type, owner id, attachment name)` key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContentElement, ContentType};

/// Normalized focal coordinates, both in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    pub x: f32,
    pub y: f32,
}

impl FocalPoint {
    /// Build a focal point, clamping both coordinates into `0.0..=1.0`.
    pub fn clamped(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }
}

/// Composite key addressing one focal point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FocalKey {
    pub owner_type: String,
    pub owner_id: Uuid,
    pub attachment: String,
}

/// Capability for entity types that own a focal-pointable attachment.
pub trait HasFocalPoint {
    /// Machine name of the owning entity type.
    const OWNER_TYPE: &'static str;

    /// Identifier of this owner row.
    fn owner_id(&self) -> Uuid;

    /// Name of the attachment the focal point belongs to.
    fn attachment_name(&self) -> &'static str {
        "image"
    }

    /// Whether this particular row can carry a focal point.
    fn supports_focal_point(&self) -> bool {
        true
    }

    /// Composite key for this owner's focal point.
    fn focal_key(&self) -> FocalKey {
        FocalKey {
            owner_type: Self::OWNER_TYPE.to_string(),
            owner_id: self.owner_id(),
            attachment: self.attachment_name().to_string(),
        }
    }
}

impl HasFocalPoint for ContentElement {
    const OWNER_TYPE: &'static str = "content_element";

    fn owner_id(&self) -> Uuid {
        self.id
    }

    // Only image elements are croppable.
    fn supports_focal_point(&self) -> bool {
        self.content_type == ContentType::Image
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_coordinates() {
        let point = FocalPoint::clamped(1.5, -0.25);
        assert_eq!(point.x, 1.0);
        assert_eq!(point.y, 0.0);

        let inside = FocalPoint::clamped(0.4, 0.6);
        assert_eq!(inside, FocalPoint { x: 0.4, y: 0.6 });
    }

    #[test]
    fn element_focal_capability() {
        let element = ContentElement {
            id: Uuid::now_v7(),
            group_id: Uuid::now_v7(),
            name: "Hero".to_string(),
            content_type: ContentType::Image,
            text_content: None,
            position: None,
            required: false,
            image_hint: None,
            image_filename: None,
            image_mime: None,
            author_id: None,
            deleted_at: None,
            created: 0,
            changed: 0,
        };

        assert!(element.supports_focal_point());
        let key = element.focal_key();
        assert_eq!(key.owner_type, "content_element");
        assert_eq!(key.owner_id, element.id);
        assert_eq!(key.attachment, "image");

        let text = ContentElement {
            content_type: ContentType::Text,
            ..element
        };
        assert!(!text.supports_focal_point());
    }
}
