//! Content models.

pub mod element;
pub mod group;
pub mod version;

pub use element::{ContentElement, ContentType, CreateElement, UpdateElement};
pub use group::{ContentGroup, CreateGroup, UpdateGroup};
pub use version::{ContentElementVersion, snapshot_required};
