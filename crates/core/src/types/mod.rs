//! Shared newtype wrappers.
//!
//! Collections and globals are addressed by slug, documents by UUID. The
//! types here validate those identifiers once at the boundary so the rest
//! of the workspace can pass them around without re-checking.

mod id;
mod slug;

pub use id::DocumentId;
pub use slug::{CollectionName, GlobalSlug, SlugError};
