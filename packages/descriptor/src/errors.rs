//! Error types for descriptor compilation

use formloom_document::PathError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Field `{field}` has an invalid name: {source}")]
    InvalidName {
        field: String,
        #[source]
        source: PathError,
    },

    #[error("Field `{field}` has an invalid validation pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Duplicate field name `{0}` (only radio fields may share a name)")]
    DuplicateName(String),

    #[error("Field `{field}` mixes radio and {kind} fields under one name")]
    MixedRadioName { field: String, kind: &'static str },

    #[error("Descriptor JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
