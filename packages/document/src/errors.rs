//! Error types for the document store

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Empty field path")]
    Empty,

    #[error("Invalid field path `{path}`: {reason}")]
    Syntax { path: String, reason: String },

    /// The path exists syntactically but cannot be assigned in this document.
    #[error("Cannot bind `{path}`: {reason}")]
    Binding { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Document is uncontrolled; push external changes through the change channel")]
    Uncontrolled,

    #[error("Document is controlled by the host; use set_document instead")]
    Controlled,

    #[error("Change channel closed")]
    ChannelClosed,

    #[error("Document root must be an object, got {0}")]
    NotAnObject(&'static str),
}
