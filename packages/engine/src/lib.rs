//! # Formloom Engine
//!
//! Keeps every field's local value consistent with one shared document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Form                                                 │
//! │  DocumentStore ─── version ───► dispatch (in order)  │
//! │       ▲                              │               │
//! │       │ commit                       ▼               │
//! │  CommitScheduler ◄── edit ──── FieldRuntime × leaves │
//! │   debounce / apply queue       guards, validation,   │
//! │                                compute, readiness    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut form = Form::new(&fields, FormOptions::default())?;
//! let email = form.node_by_name("email").unwrap();
//! form.on_change(email, json!("ada@example.com"))?;
//! form.on_blur(email)?;
//! for event in form.drain_events() { /* ... */ }
//! ```

mod config;
mod errors;
mod events;
mod form;
mod guards;
mod managed;
mod radio;
mod readiness;
mod runtime;
mod scheduler;
mod session;
mod validation;

#[cfg(feature = "async")]
mod driver;

pub use config::FormConfig;
pub use errors::{FormError, Result};
pub use events::{FormEvent, FormStats};
pub use form::{Form, FormOptions};
pub use guards::{Breakpoint, FieldGuards, GuardCache, GuardResolver, NodeGuards};
pub use managed::{FieldHandle, ManagedField};
pub use radio::RadioCoordinator;
pub use readiness::ReadinessCoordinator;
pub use runtime::{FieldRuntime, FieldRuntimeMemory, RuntimeState};
pub use scheduler::{ApplyQueue, CommitScheduler, DueTimer, TimerKind};
pub use session::FormSession;
pub use validation::{FieldProbe, ValidationAggregator, ValidationReport, Verdict};

#[cfg(feature = "async")]
pub use driver::{FormCommand, FormDriver};

pub use formloom_descriptor::{ComputeError, NodeId};
pub use formloom_document::{Rebase, StoreMode};
