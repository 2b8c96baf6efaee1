//! Shared closure types carried by descriptors.
//!
//! Every callback receives the form data first and the host payload last.
//! They are `Arc`-backed so cloning a descriptor tree is cheap and the
//! compiled tree can be shared across sessions.

use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

macro_rules! callback {
    ($(#[$meta:meta])* $name:ident, Fn($($arg:ident: $ty:ty),*) $(-> $ret:ty)?) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Arc<dyn Fn($($ty),*) $(-> $ret)? + Send + Sync>);

        impl $name {
            pub fn new(f: impl Fn($($ty),*) $(-> $ret)? + Send + Sync + 'static) -> Self {
                Self(Arc::new(f))
            }

            pub fn call(&self, $($arg: $ty),*) $(-> $ret)? {
                (self.0)($($arg),*)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "(..)"))
            }
        }
    };
}

callback!(
    /// `isVisible` / `isDisabled` / `isReadonly`: (data, payload) → flag
    Predicate,
    Fn(data: &Value, payload: &Value) -> bool
);

callback!(
    /// Payload-only predicate used by `hidden`
    PayloadPredicate,
    Fn(payload: &Value) -> bool
);

callback!(
    /// `isInvalid` / `isIncorrect`: (data, payload) → message
    Check,
    Fn(data: &Value, payload: &Value) -> Option<String>
);

callback!(
    /// `readTransform` / `writeTransform`: (value, data, payload) → value
    Transform,
    Fn(value: Value, data: &Value, payload: &Value) -> Value
);

callback!(
    /// `compute`: (data, payload) → ready value or pending future
    Compute,
    Fn(data: &Value, payload: &Value) -> ComputeResult
);

callback!(
    /// `shouldRecompute`: (previous data, next data, payload) → rerun compute
    Recompute,
    Fn(prev: &Value, next: &Value, payload: &Value) -> bool
);

callback!(
    /// Receives compute failures
    Fallback,
    Fn(error: &ComputeError)
);

/// Result of invoking a `compute` callback
pub enum ComputeResult {
    Ready(Value),
    Pending(LocalBoxFuture<'static, Result<Value, ComputeError>>),
}

impl ComputeResult {
    pub fn pending(
        future: impl std::future::Future<Output = Result<Value, ComputeError>> + 'static,
    ) -> Self {
        ComputeResult::Pending(Box::pin(future))
    }
}

impl fmt::Debug for ComputeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeResult::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            ComputeResult::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    #[error("Compute rejected: {0}")]
    Rejected(String),

    #[error("Compute canceled")]
    Canceled,
}

impl From<String> for ComputeError {
    fn from(s: String) -> Self {
        ComputeError::Rejected(s)
    }
}

impl From<&str> for ComputeError {
    fn from(s: &str) -> Self {
        ComputeError::Rejected(s.to_string())
    }
}
