//! # Formloom Document
//!
//! The single shared record a form edits, and the store that owns it.
//!
//! - [`FieldPath`]: dot/bracket addressing with copy-on-write writes
//! - [`FormDocument`]: versioned `Arc` snapshot of the data
//! - [`DocumentStore`]: controlled/uncontrolled ownership, pending patches,
//!   external change channel

mod document;
mod errors;
mod path;
mod store;

pub use document::FormDocument;
pub use errors::{PathError, StoreError};
pub use path::{FieldPath, PathSegment, MAX_INDEX};
pub use store::{ChangeSender, DocumentStore, InvalidMap, PendingPatch, Rebase, StoreMode};

// Re-export the value type every layer above speaks
pub use serde_json::Value;
