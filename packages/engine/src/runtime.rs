//! # Field Runtime
//!
//! The per-leaf state machine that keeps a field's local value consistent
//! with the shared document.
//!
//! ```text
//!            edit                  window / flush
//!   Idle ──────────► Debouncing ───────────────────► Validating
//!    ▲                                                 │     │
//!    │                 rejected (blocking message)     │     │ ok
//!    ├─────────────────────────────────────────────────┘     ▼
//!    └──────────────────── dispatched ◄──────────────── Committing
//! ```
//!
//! Two transitions touch the document:
//!
//! - **Incoming**: a new version arrived. The runtime re-reads its value
//!   (or reruns `compute`), re-resolves its guards and re-checks validity.
//!   `object_update` is raised for the duration.
//! - **Outgoing**: the local value is written into a clone of the document
//!   and validated there before the store adopts it.
//!
//! `input_update` marks a value adopted from the document. A widget that
//! echoes that same value back does not produce a commit.

use crate::guards::FieldGuards;
use crate::session::FormSession;
use crate::validation::{FieldProbe, Verdict};
use crate::FormError;
use formloom_descriptor::{
    CompiledForm, CompiledNode, ComputeError, ComputeResult, NodeId, ValueShape,
};
use formloom_document::PathError;
use futures::future::LocalBoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuntimeState {
    #[default]
    Idle,
    Debouncing,
    Validating,
    Committing,
}

/// Per-field bookkeeping, created on mount and never shared
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRuntimeMemory {
    pub value: Value,
    pub input_update: bool,
    pub object_update: bool,
    pub last_debounced_value: Option<Value>,
    pub is_mounted: bool,
    pub field_readonly: bool,
    pub upper_readonly: bool,
    pub focus_readonly: bool,
    pub invalid: Option<String>,
}

pub(crate) type PendingCompute = LocalBoxFuture<'static, Result<Value, ComputeError>>;

/// What an incoming dispatch changed, for the form to act on
#[derive(Default)]
pub(crate) struct Incoming {
    /// First resolution of this field; counts toward readiness
    pub resolved: bool,
    pub newly_invalid: Option<String>,
    /// Went valid while holding an uncommitted value; needs a commit
    pub healed: bool,
    pub compute: Option<(u64, PendingCompute)>,
}

pub(crate) enum ComputeOutcome {
    Dropped,
    Applied { first: bool },
    Failed { error: ComputeError, first: bool },
}

/// Candidate write produced by an outgoing transition
pub(crate) struct CommitPlan {
    pub written: Value,
    pub next: Value,
    pub verdict: Verdict,
}

#[derive(Debug)]
pub struct FieldRuntime {
    id: NodeId,
    memory: FieldRuntimeMemory,
    state: RuntimeState,
    visible: bool,
    disabled: bool,
    dirty: bool,
    loading: bool,
    incorrect: Option<String>,
    compute_generation: u64,
    last_version: Option<u64>,
    resolved: bool,
    prev_data: Option<Arc<Value>>,
}

impl FieldRuntime {
    pub fn new(node: &CompiledNode) -> Self {
        Self {
            id: node.id,
            memory: FieldRuntimeMemory {
                value: node.kind().initial_value().unwrap_or(Value::Null),
                is_mounted: true,
                ..FieldRuntimeMemory::default()
            },
            state: RuntimeState::Idle,
            visible: true,
            disabled: false,
            dirty: false,
            loading: false,
            incorrect: None,
            compute_generation: 0,
            last_version: None,
            resolved: false,
            prev_data: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn memory(&self) -> &FieldRuntimeMemory {
        &self.memory
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn incorrect(&self) -> Option<&str> {
        self.incorrect.as_deref()
    }

    pub fn has_pending_edit(&self) -> bool {
        self.state == RuntimeState::Debouncing
    }

    /// Composed readonly flag widgets see
    pub fn is_readonly(&self, node: &CompiledNode) -> bool {
        self.memory.upper_readonly
            || self.memory.focus_readonly
            || self.memory.field_readonly
            || node.descriptor.compute.is_some()
    }

    pub(crate) fn check_editable(&self, node: &CompiledNode) -> Result<(), FormError> {
        let editable = self.memory.is_mounted
            && node.path.is_some()
            && node.kind().value_shape() != ValueShape::None
            && node.descriptor.compute.is_none()
            && self.visible
            && !self.disabled
            && !self.memory.upper_readonly
            && !self.memory.field_readonly;

        if editable {
            Ok(())
        } else {
            Err(FormError::NotEditable {
                name: node.name().unwrap_or(node.kind().type_name()).to_string(),
            })
        }
    }

    /// Record a local edit
    pub(crate) fn edit(&mut self, value: Value) {
        let echo = self.memory.input_update && self.memory.value == value;
        if !echo {
            self.memory.input_update = false;
        }
        self.memory.object_update = false;
        self.memory.focus_readonly = false;
        self.memory.value = value;
        self.dirty = true;
        self.state = RuntimeState::Debouncing;
    }

    /// Feedback-loop guard. Returns true when the pending flush must be
    /// dropped because the value came from the document itself.
    pub(crate) fn skip_flush(&mut self) -> bool {
        if !(self.memory.input_update || self.memory.object_update) {
            return false;
        }
        debug!(node = %self.id, "Skipping flush of document-produced value");
        self.memory.input_update = false;
        self.state = RuntimeState::Idle;
        true
    }

    pub(crate) fn set_focus_readonly(&mut self, waiting: bool) {
        self.memory.focus_readonly = waiting;
    }

    /// Outgoing: write the local value into a clone of `data` and validate
    /// the clone
    pub(crate) fn prepare_commit(
        &mut self,
        node: &CompiledNode,
        data: &Value,
        payload: &Value,
    ) -> Result<CommitPlan, PathError> {
        self.state = RuntimeState::Validating;
        let path = node.path.as_ref().ok_or(PathError::Empty)?;

        let written = self.written_value(node, data, payload);
        let next = match path.set(data, written.clone()) {
            Ok(next) => next,
            Err(err) => {
                self.state = RuntimeState::Idle;
                return Err(err);
            }
        };
        let verdict = Verdict::evaluate(&node.descriptor, &next, payload);
        self.memory.last_debounced_value = Some(self.memory.value.clone());
        self.incorrect = verdict.incorrect.clone();

        Ok(CommitPlan {
            written,
            next,
            verdict,
        })
    }

    /// A blocking message withheld the commit; keep the value locally.
    /// Returns true if the message is new.
    pub(crate) fn reject(&mut self, message: String) -> bool {
        self.state = RuntimeState::Idle;
        let fresh = self.memory.invalid.as_ref() != Some(&message);
        self.memory.invalid = Some(message);
        fresh
    }

    /// Clears the blocking message; returns whether there was one
    pub(crate) fn accept(&mut self) -> bool {
        self.memory.invalid.take().is_some()
    }

    /// Pending edit of a field that went hidden: never committed, never
    /// invalid
    pub(crate) fn discard_pending(&mut self, node: &CompiledNode, data: &Value, payload: &Value) {
        if let Some(path) = &node.path {
            self.memory.value = self.read_value(node, path.read(data), data, payload);
        }
        self.memory.invalid = None;
        self.memory.focus_readonly = false;
        self.state = RuntimeState::Idle;
    }

    /// Drop a rejected local value in favour of the document's
    pub(crate) fn revert(&mut self, value: Value) {
        self.memory.value = value;
        self.state = RuntimeState::Idle;
    }

    pub(crate) fn begin_committing(&mut self) {
        self.state = RuntimeState::Committing;
    }

    pub(crate) fn finish(&mut self) {
        if self.state != RuntimeState::Debouncing {
            self.state = RuntimeState::Idle;
        }
    }

    fn written_value(&self, node: &CompiledNode, data: &Value, payload: &Value) -> Value {
        match &node.descriptor.write_transform {
            Some(transform) => transform.call(self.memory.value.clone(), data, payload),
            None => self.memory.value.clone(),
        }
    }

    /// Whether the field holds a value the document does not have
    fn holds_local(&self, doc_value: &Value) -> bool {
        self.state == RuntimeState::Debouncing
            || (self.memory.invalid.is_some() && &self.memory.value != doc_value)
    }

    /// Document the field would produce, when it differs from `data`
    pub(crate) fn candidate<'a>(
        &self,
        node: &CompiledNode,
        data: &'a Value,
        payload: &Value,
    ) -> Option<Cow<'a, Value>> {
        if node.descriptor.compute.is_some() || !self.holds_uncommitted(node, data, payload) {
            return None;
        }
        let path = node.path.as_ref()?;
        let written = self.written_value(node, data, payload);
        match path.set(data, written) {
            Ok(next) => Some(Cow::Owned(next)),
            Err(err) => {
                debug!(node = %self.id, error = %err, "Local value does not bind");
                None
            }
        }
    }

    fn holds_uncommitted(&self, node: &CompiledNode, data: &Value, payload: &Value) -> bool {
        let Some(path) = &node.path else { return false };
        let doc_value = self.read_value(node, path.read(data), data, payload);
        self.holds_local(&doc_value)
    }

    fn read_value(&self, node: &CompiledNode, raw: Value, data: &Value, payload: &Value) -> Value {
        match &node.descriptor.read_transform {
            Some(transform) => transform.call(raw, data, payload),
            None => raw,
        }
    }

    pub(crate) fn probe<'a>(
        &self,
        node: &CompiledNode,
        data: &'a Value,
        payload: &Value,
    ) -> FieldProbe<'a> {
        FieldProbe {
            visible: self.visible && self.memory.is_mounted,
            candidate: self.candidate(node, data, payload),
        }
    }

    /// Incoming transition for document `version`
    pub(crate) fn on_document_version_changed(
        &mut self,
        form: &CompiledForm,
        node: &CompiledNode,
        snapshot: &Arc<Value>,
        version: u64,
        session: &mut FormSession,
        force: bool,
    ) -> Incoming {
        let mut incoming = Incoming::default();
        if !self.memory.is_mounted || (!force && self.last_version == Some(version)) {
            return incoming;
        }
        let first = self.last_version.is_none();
        self.memory.input_update = false;
        self.memory.object_update = true;

        let data = snapshot.as_ref();
        let FieldGuards {
            visible,
            disabled,
            field_readonly,
            upper_readonly,
        } = session.guards(form, self.id, data, version);
        self.visible = visible;
        self.disabled = disabled;
        self.memory.field_readonly = field_readonly;
        self.memory.upper_readonly = upper_readonly;

        let mut adopted = false;
        let descriptor = &node.descriptor;

        if let Some(compute) = &descriptor.compute {
            let payload = session.payload();
            let rerun = match (&self.prev_data, &descriptor.should_recompute) {
                (None, _) => true,
                (Some(_), None) => true,
                (Some(prev), Some(recompute)) => recompute.call(prev, data, payload),
            };
            self.prev_data = Some(Arc::clone(snapshot));

            if rerun {
                // Any result still in flight is now stale
                self.compute_generation += 1;
                match compute.call(data, payload) {
                    ComputeResult::Ready(value) => {
                        self.loading = false;
                        if self.memory.value != value {
                            self.memory.value = value;
                            adopted = true;
                        }
                    }
                    ComputeResult::Pending(future) => {
                        trace!(node = %self.id, generation = self.compute_generation, "Compute pending");
                        self.loading = true;
                        incoming.compute = Some((self.compute_generation, future));
                    }
                }
            }
        } else if let Some(path) = &node.path {
            let raw = path.read(data);
            if descriptor.kind.is_radio() {
                session.radios.reconcile(path.as_str(), &raw);
            }

            let payload = session.payload();
            let doc_value = self.read_value(node, raw, data, payload);
            let mut holding = self.holds_local(&doc_value);
            if holding && !self.visible && self.state != RuntimeState::Debouncing {
                // Hidden fields are never invalid; the rejected value goes
                debug!(node = %self.id, "Hidden field drops its rejected value");
                self.memory.invalid = None;
                holding = false;
            }
            if !holding && self.memory.value != doc_value {
                self.memory.value = doc_value;
                adopted = true;
            }

            let verdict = if self.visible {
                let candidate = if holding { self.candidate(node, data, payload) } else { None };
                Verdict::evaluate(descriptor, candidate.as_deref().unwrap_or(data), payload)
            } else {
                Verdict::default()
            };

            if verdict.invalid != self.memory.invalid {
                match &verdict.invalid {
                    Some(message) => incoming.newly_invalid = Some(message.clone()),
                    None if holding && self.visible && self.state != RuntimeState::Debouncing => {
                        self.state = RuntimeState::Debouncing;
                        incoming.healed = true;
                    }
                    None => {}
                }
            }
            self.memory.invalid = verdict.invalid;
            self.incorrect = verdict.incorrect;
        }

        if !self.resolved && (!self.visible || !self.loading) {
            self.resolved = true;
            incoming.resolved = true;
        }

        self.last_version = Some(version);
        self.memory.object_update = false;
        self.memory.input_update = adopted;
        debug_assert!(!(self.memory.input_update && self.memory.object_update));

        incoming
    }

    /// Apply an async compute result
    pub(crate) fn resolve_compute(
        &mut self,
        generation: u64,
        result: Result<Value, ComputeError>,
    ) -> ComputeOutcome {
        if !self.memory.is_mounted || generation != self.compute_generation {
            debug!(node = %self.id, generation, "Dropping compute result");
            return ComputeOutcome::Dropped;
        }
        self.loading = false;
        let first = !self.resolved;
        self.resolved = true;

        match result {
            Ok(value) => {
                if self.memory.value != value {
                    self.memory.value = value;
                    self.memory.input_update = true;
                }
                ComputeOutcome::Applied { first }
            }
            Err(error) => ComputeOutcome::Failed { error, first },
        }
    }

    pub(crate) fn unmount(&mut self) {
        self.memory.is_mounted = false;
        self.memory.input_update = false;
        self.memory.object_update = false;
        self.state = RuntimeState::Idle;
        self.loading = false;
    }
}
