//! # Formloom Descriptor
//!
//! Declarative field trees and their compiler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ descriptor: FieldDescriptor / FieldKind     │
//! │  - built in code or parsed from JSON        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ compiler: CompiledForm arena                │
//! │  - deep clone, name audit                   │
//! │  - validation rules → isInvalid checks      │
//! │  - flatten, readiness quotas                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ engine: one FieldRuntime per leaf           │
//! └─────────────────────────────────────────────┘
//! ```

mod callbacks;
mod compiler;
mod descriptor;
mod errors;
mod spec;
mod validation;
mod visitor;

pub use callbacks::{
    Check, Compute, ComputeError, ComputeResult, Fallback, PayloadPredicate, Predicate,
    Recompute, Transform,
};
pub use compiler::{compile, CompiledForm, CompiledNode, NodeId};
pub use descriptor::{FieldDescriptor, FieldKind, Hidden, ValueShape};
pub use errors::CompileError;
pub use spec::{parse_fields, DescriptorSpec, KindSpec};
pub use validation::{ValidationRules, MSG_NUMERIC, MSG_PATTERN, MSG_REQUIRED};
pub use visitor::{
    walk_children, walk_children_mut, walk_descriptor, walk_descriptor_mut, walk_fields,
    walk_fields_mut, DescriptorVisitor, DescriptorVisitorMut,
};
