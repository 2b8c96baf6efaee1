use formloom_descriptor::{CompileError, NodeId};
use formloom_document::{PathError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field {name} does not accept edits")]
    NotEditable { name: String },

    #[error("Form is unmounted")]
    Unmounted,

    #[error(transparent)]
    Binding(#[from] PathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub type Result<T> = std::result::Result<T, FormError>;
