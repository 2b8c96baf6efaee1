//! # Form Document
//!
//! One immutable snapshot of the shared form data plus its version number.
//!
//! The data sits behind an `Arc`, so handing a snapshot to every field
//! runtime during a dispatch is a pointer copy. Replacing the document
//! swaps the `Arc` and bumps the version; snapshots taken earlier keep
//! pointing at the old data.

use crate::{FieldPath, PathError};
use serde_json::Value;
use std::sync::Arc;

/// Versioned, copy-on-write form data
#[derive(Debug, Clone)]
pub struct FormDocument {
    data: Arc<Value>,

    /// Increments every time the data is replaced
    version: u64,
}

impl FormDocument {
    pub fn new(data: Value) -> Self {
        Self {
            data: Arc::new(data),
            version: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Cheap shared handle to the current data
    pub fn snapshot(&self) -> Arc<Value> {
        Arc::clone(&self.data)
    }

    pub fn read(&self, path: &FieldPath) -> Value {
        path.read(&self.data)
    }

    /// Clone the data with `value` written at `path`; `self` is untouched
    pub fn with_value(&self, path: &FieldPath, value: Value) -> Result<Value, PathError> {
        path.set(&self.data, value)
    }

    /// Swap in new data and return the new version
    pub(crate) fn replace(&mut self, next: Value) -> u64 {
        self.data = Arc::new(next);
        self.version += 1;
        self.version
    }
}

impl PartialEq<Value> for FormDocument {
    fn eq(&self, other: &Value) -> bool {
        self.data.as_ref() == other
    }
}
