//! # Form
//!
//! A mounted form: one document store, one runtime per leaf, and the
//! machinery that moves values between them.
//!
//! ## Ordering
//!
//! Every document change is settled the same way:
//!
//! ```text
//! commit ──► store version + 1
//!              │
//!              ├─ 1. drain: flush every other pending edit first
//!              ├─ 2. dispatch: one snapshot, every runtime in declaration
//!              │     order (incoming never commits)
//!              └─ 3. repeat while drains or heals moved the version
//!                        │
//!                        ▼
//!              change event when the whole tree is valid
//! ```
//!
//! ## Time
//!
//! Debounce windows and apply retries run on the scheduler's clock, which
//! only moves on [`Form::advance`]. Async computes are polled on
//! [`Form::pump`] (and after every advance).

use crate::config::FormConfig;
use crate::events::{FormEvent, FormStats};
use crate::guards::Breakpoint;
use crate::managed::{FieldHandle, ManagedField};
use crate::radio::RadioCoordinator;
use crate::readiness::ReadinessCoordinator;
use crate::runtime::{ComputeOutcome, FieldRuntime};
use crate::scheduler::{CommitScheduler, TimerKind};
use crate::session::FormSession;
use crate::validation::{ValidationAggregator, ValidationReport};
use crate::{FormError, Result};
use formloom_descriptor::{
    compile, CompiledForm, CompiledNode, ComputeError, Fallback, FieldDescriptor, FieldKind,
    NodeId,
};
use formloom_document::{
    ChangeSender, DocumentStore, FormDocument, InvalidMap, PendingPatch, Rebase, StoreMode,
};
use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::task::noop_waker_ref;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Rounds of drain + dispatch before settling gives up
const SETTLE_LIMIT: usize = 64;

type ComputeTask = LocalBoxFuture<'static, (NodeId, u64, std::result::Result<Value, ComputeError>)>;

/// How to mount a form
#[derive(Debug, Clone, Default)]
pub struct FormOptions {
    pub config: FormConfig,
    pub mode: StoreMode,

    /// Initial data; missing fields are filled from defaults
    pub document: Value,

    /// Opaque host value passed to every callback
    pub payload: Value,

    pub breakpoint: Breakpoint,

    /// Receives compute failures of fields without their own fallback
    pub fallback: Option<Fallback>,
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: FormConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: StoreMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_document(mut self, document: Value) -> Self {
        self.document = document;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_breakpoint(mut self, breakpoint: Breakpoint) -> Self {
        self.breakpoint = breakpoint;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

pub struct Form {
    compiled: Arc<CompiledForm>,
    config: FormConfig,
    store: DocumentStore,
    session: FormSession,
    runtimes: Vec<FieldRuntime>,
    slots: Vec<Option<usize>>,
    scheduler: CommitScheduler,
    readiness: ReadinessCoordinator,
    computes: FuturesUnordered<ComputeTask>,
    fallback: Option<Fallback>,
    events: Vec<FormEvent>,
    stats: FormStats,
    dispatched: Option<u64>,
    healed: Vec<NodeId>,
    focused: Option<NodeId>,
    changed: bool,
    mounted: bool,
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("version", &self.store.version())
            .field("fields", &self.runtimes.len())
            .field("ready", &self.readiness.is_ready())
            .field("pending_computes", &self.computes.len())
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl Form {
    /// Compile `fields` and mount the result
    pub fn new(fields: &[FieldDescriptor], options: FormOptions) -> Result<Self> {
        Self::mount(Arc::new(compile(fields)?), options)
    }

    #[instrument(skip_all, fields(nodes = compiled.len()))]
    pub fn mount(compiled: Arc<CompiledForm>, options: FormOptions) -> Result<Self> {
        let FormOptions {
            config,
            mode,
            document,
            payload,
            breakpoint,
            fallback,
        } = options;

        let initial = compiled.initial_document(&document)?;
        let store = DocumentStore::new(mode, initial)?;
        let session = FormSession::new(breakpoint, payload, RadioCoordinator::seed(&compiled));

        let mut slots = vec![None; compiled.len()];
        let mut runtimes = Vec::with_capacity(compiled.leaves().len());
        for &id in compiled.leaves() {
            slots[id.index()] = Some(runtimes.len());
            runtimes.push(FieldRuntime::new(compiled.node(id)));
        }

        info!(fields = runtimes.len(), mode = ?mode, "Mounting form");

        let mut form = Self {
            scheduler: CommitScheduler::new(&config),
            readiness: ReadinessCoordinator::new(&compiled),
            compiled,
            config,
            store,
            session,
            runtimes,
            slots,
            computes: FuturesUnordered::new(),
            fallback,
            events: Vec::new(),
            stats: FormStats::default(),
            dispatched: None,
            healed: Vec::new(),
            focused: None,
            changed: false,
            mounted: true,
        };

        form.dispatch(true);
        let compiled = Arc::clone(&form.compiled);
        if form.readiness.mount(&compiled) {
            form.on_ready();
        }

        Ok(form)
    }

    pub fn compiled(&self) -> &Arc<CompiledForm> {
        &self.compiled
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn document(&self) -> &FormDocument {
        self.store.document()
    }

    pub fn data(&self) -> &Value {
        self.store.document().data()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    pub fn mode(&self) -> StoreMode {
        self.store.mode()
    }

    pub fn payload(&self) -> &Value {
        self.session.payload()
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.session.breakpoint()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_valid(&self) -> bool {
        self.store.invalid_map().is_empty()
    }

    /// Field name → blocking message, as of the last dispatch
    pub fn invalid_map(&self) -> &InvalidMap {
        self.store.invalid_map()
    }

    pub fn pending_patches(&self) -> &[PendingPatch] {
        self.store.pending_patches()
    }

    pub fn stats(&self) -> FormStats {
        self.stats
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Earliest debounce or retry deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    pub fn pending_computes(&self) -> usize {
        self.computes.len()
    }

    pub fn drain_events(&mut self) -> Vec<FormEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fresh validation over the current document and held local values
    pub fn validation_report(&self) -> ValidationReport {
        let data = self.store.document().data();
        let payload = self.session.payload();
        ValidationAggregator::aggregate(&self.compiled, data, payload, |id| {
            let slot = self.slots[id.index()]?;
            Some(self.runtimes[slot].probe(self.compiled.node(id), data, payload))
        })
    }

    pub fn field(&self, id: NodeId) -> Option<ManagedField> {
        let node = self.compiled.get(id)?;
        let slot = self.slots[id.index()]?;
        Some(ManagedField::capture(node, &self.runtimes[slot], &self.session))
    }

    /// Every leaf in declaration order
    pub fn fields(&self) -> Vec<ManagedField> {
        self.runtimes
            .iter()
            .map(|runtime| {
                ManagedField::capture(self.compiled.node(runtime.id()), runtime, &self.session)
            })
            .collect()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.compiled.by_name(name).first().copied()
    }

    /// Resolve a field by name; for a radio group, `value` picks the radio
    pub fn target(&self, name: &str, value: Option<&Value>) -> Option<NodeId> {
        let candidates = self.compiled.by_name(name);
        let radio = value.and_then(Value::as_str).and_then(|wanted| {
            candidates.iter().copied().find(|id| {
                matches!(self.compiled.node(*id).kind(), FieldKind::Radio { radio_value } if radio_value == wanted)
            })
        });
        radio.or_else(|| candidates.first().copied())
    }

    pub fn handle(&mut self, id: NodeId) -> Result<FieldHandle<'_>> {
        self.compiled.get(id).ok_or(FormError::UnknownNode(id))?;
        Ok(FieldHandle::new(self, id))
    }

    pub fn field_by_name(&mut self, name: &str) -> Result<FieldHandle<'_>> {
        let id = self
            .node_by_name(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        Ok(FieldHandle::new(self, id))
    }

    /// Widget reported a new local value
    pub fn on_change(&mut self, id: NodeId, value: Value) -> Result<()> {
        self.ensure_mounted()?;
        let compiled = Arc::clone(&self.compiled);
        let node = compiled.get(id).ok_or(FormError::UnknownNode(id))?;
        let slot = self.slot(node)?;
        self.runtimes[slot].check_editable(node)?;

        let value = match (node.kind(), node.name()) {
            // Radios cannot be unchecked directly, only by picking a sibling
            (FieldKind::Radio { .. }, _) if value == Value::Bool(false) => return Ok(()),
            (FieldKind::Radio { radio_value }, Some(group)) => {
                let selected = Value::String(radio_value.clone());
                self.session.radios.select(group, selected.clone());
                selected
            }
            _ => value,
        };

        self.runtimes[slot].edit(value);
        let generation = self.scheduler.edit(id);
        let window = self.config.debounce_for(&node.descriptor);
        trace!(node = %id, generation, window_ms = window.as_millis() as u64, "Edit");

        if window.is_zero() {
            self.flush_field(id, 0)
        } else {
            self.scheduler.arm(id, window);
            Ok(())
        }
    }

    /// Focus moved to `id`: every other field's pending edit is flushed
    pub fn on_focus(&mut self, id: NodeId) -> Result<()> {
        self.ensure_mounted()?;
        self.compiled.get(id).ok_or(FormError::UnknownNode(id))?;
        self.focused = Some(id);

        let mut committed = Vec::new();
        for other in self.drainable() {
            if other != id && self.commit_pending(other, 0)? {
                committed.push(other);
            }
        }
        self.settle(committed)
    }

    /// Focus left `id`: its pending edit is flushed
    pub fn on_blur(&mut self, id: NodeId) -> Result<()> {
        self.ensure_mounted()?;
        self.compiled.get(id).ok_or(FormError::UnknownNode(id))?;
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.flush_field(id, 0)
    }

    /// Flush every pending edit now
    pub fn flush_all(&mut self) -> Result<()> {
        self.ensure_mounted()?;
        let mut committed = Vec::new();
        for id in self.drainable() {
            if self.commit_pending(id, 0)? {
                committed.push(id);
            }
        }
        self.settle(committed)
    }

    pub fn advance(&mut self, by: Duration) -> Result<()> {
        self.advance_to(self.scheduler.now() + by)
    }

    /// Run every timer due up to `at`, then poll computes
    pub fn advance_to(&mut self, at: Duration) -> Result<()> {
        self.ensure_mounted()?;
        while let Some(due) = self.scheduler.pop_due(at) {
            let attempt = match due.kind {
                TimerKind::Debounce => 0,
                TimerKind::ApplyRetry { attempt } => attempt,
            };
            self.flush_field(due.node, attempt)?;
        }
        self.scheduler.set_now(at);
        self.pump()?;
        Ok(())
    }

    /// Apply finished computes and external documents.
    ///
    /// Returns how many compute results were taken.
    pub fn pump(&mut self) -> Result<usize> {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut taken = 0;
        let mut ready = false;

        while let Poll::Ready(Some((id, generation, result))) = self.computes.poll_next_unpin(&mut cx) {
            taken += 1;
            ready |= self.apply_compute(id, generation, result);
        }
        if ready {
            self.on_ready();
        }

        if self.mounted && self.store.mode() == StoreMode::Uncontrolled {
            let external = self.store.drain_changes();
            if external > 0 {
                debug!(external, version = self.store.version(), "External document received");
                self.settle(Vec::new())?;
            }
        }

        Ok(taken)
    }

    /// Sender for external documents (uncontrolled forms)
    pub fn change_sender(&self) -> Result<ChangeSender> {
        Ok(self.store.change_sender()?)
    }

    /// Host hands back its document (controlled forms)
    pub fn set_document(&mut self, document: Value) -> Result<Rebase> {
        self.ensure_mounted()?;
        let rebase = self.store.set_document(document)?;
        debug!(
            acknowledged = rebase.acknowledged.len(),
            replayed = rebase.replayed.len(),
            dropped = rebase.dropped.len(),
            version = rebase.version,
            "Rebased pending patches"
        );

        for &origin in rebase.acknowledged.iter().chain(&rebase.dropped) {
            if self.store.is_pending(origin) {
                continue;
            }
            if let Some(node) = self.compiled.nodes().get(origin) {
                self.scheduler.apply_mut().finish(node.id);
            }
        }

        self.settle(Vec::new())?;
        Ok(rebase)
    }

    /// Host document in either mode: rebased when controlled, otherwise
    /// pushed through the change channel and pumped
    pub fn receive_document(&mut self, document: Value) -> Result<()> {
        match self.store.mode() {
            StoreMode::Controlled => self.set_document(document).map(|_| ()),
            StoreMode::Uncontrolled => {
                self.ensure_mounted()?;
                self.store.change_sender()?.send(document)?;
                self.pump().map(|_| ())
            }
        }
    }

    /// Switch breakpoint and re-resolve every guard
    pub fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> Result<()> {
        self.ensure_mounted()?;
        if self.session.set_breakpoint(breakpoint) {
            debug!(?breakpoint, "Breakpoint changed");
            self.dispatch(true);
            self.settle(Vec::new())?;
        }
        Ok(())
    }

    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        for runtime in &mut self.runtimes {
            runtime.unmount();
        }
        self.session.teardown();
        self.scheduler.clear();
        self.mounted = false;
        info!(pending_computes = self.computes.len(), "Form unmounted");
    }

    fn ensure_mounted(&self) -> Result<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(FormError::Unmounted)
        }
    }

    fn slot(&self, node: &CompiledNode) -> Result<usize> {
        self.slots[node.id.index()].ok_or_else(|| FormError::NotEditable {
            name: node.kind().type_name().to_string(),
        })
    }

    /// Pending edits not waiting on the apply queue
    fn drainable(&self) -> Vec<NodeId> {
        self.runtimes
            .iter()
            .filter(|runtime| {
                runtime.has_pending_edit() && !self.scheduler.is_waiting_retry(runtime.id())
            })
            .map(FieldRuntime::id)
            .collect()
    }

    fn flush_field(&mut self, id: NodeId, attempt: u32) -> Result<()> {
        let committed = self.commit_pending(id, attempt)?;
        self.settle(if committed { vec![id] } else { Vec::new() })
    }

    /// Outgoing transition for one field. Returns true if the store took a
    /// new version.
    #[instrument(level = "debug", skip(self))]
    fn commit_pending(&mut self, id: NodeId, attempt: u32) -> Result<bool> {
        let compiled = Arc::clone(&self.compiled);
        let node = compiled.node(id);
        let Some(slot) = self.slots[id.index()] else {
            return Ok(false);
        };
        if !self.runtimes[slot].has_pending_edit() {
            return Ok(false);
        }
        self.scheduler.cancel(id);

        if self.runtimes[slot].skip_flush() {
            self.stats.skipped_flushes += 1;
            self.restore_radio(node);
            return Ok(false);
        }

        if !self.runtimes[slot].is_visible() {
            debug!(field = ?node.name(), "Field hidden, pending edit discarded");
            let data = self.store.document().snapshot();
            self.runtimes[slot].discard_pending(node, &data, self.session.payload());
            self.restore_radio(node);
            return Ok(false);
        }

        if self.scheduler.apply().is_in_flight(id) {
            if self.scheduler.retry(id, attempt + 1) {
                self.runtimes[slot].set_focus_readonly(true);
                return Ok(false);
            }
            warn!(field = ?node.name(), attempt, "Apply still in flight, committing anyway");
        }

        let data = self.store.document().snapshot();
        let runtime = &mut self.runtimes[slot];
        runtime.set_focus_readonly(false);

        let plan = match runtime.prepare_commit(node, &data, self.session.payload()) {
            Ok(plan) => plan,
            Err(err) => {
                self.restore_radio(node);
                return Err(err.into());
            }
        };

        if let Some(message) = plan.verdict.invalid {
            let fresh = runtime.reject(message.clone());
            self.stats.rejected += 1;
            debug!(field = ?node.name(), %message, "Commit withheld");

            if fresh {
                self.events.push(FormEvent::Invalidity {
                    name: node.name().unwrap_or_default().to_string(),
                    message,
                    payload: self.session.payload().clone(),
                });
            }
            self.restore_radio(node);
            let report = self.validation_report();
            self.store.set_invalid_map(report.invalid);
            return Ok(false);
        }

        // Healing an invalid field commits even when nothing differs
        let was_invalid = runtime.accept();
        if plan.next == *data && !was_invalid {
            runtime.finish();
            self.stats.unchanged += 1;
            trace!(field = ?node.name(), "Nothing to write");
            return Ok(false);
        }

        runtime.begin_committing();
        self.scheduler.apply_mut().begin(id);

        let patch = node
            .path
            .clone()
            .map(|path| (id.index(), path, plan.written));
        let invalid = self.store.invalid_map().clone();
        let version = self.store.change_object(plan.next, invalid, patch);
        self.stats.commits += 1;
        debug!(field = ?node.name(), version, "Committed");

        Ok(true)
    }

    /// Drain then dispatch until the document stops moving
    fn settle(&mut self, mut committed: Vec<NodeId>) -> Result<()> {
        let mut rounds = 0;

        loop {
            let moved = self.dispatched != Some(self.store.version());
            let healed = !std::mem::take(&mut self.healed).is_empty();
            if !moved && !healed {
                break;
            }
            if rounds == SETTLE_LIMIT {
                warn!(rounds, version = self.store.version(), "Document did not settle");
                break;
            }
            rounds += 1;

            for id in self.drainable() {
                if self.commit_pending(id, 0)? {
                    committed.push(id);
                }
            }
            if self.dispatched != Some(self.store.version()) {
                self.dispatch(false);
            }
        }

        if committed.is_empty() {
            return Ok(());
        }

        let controlled = self.store.mode() == StoreMode::Controlled;
        for &id in &committed {
            if let Some(slot) = self.slots[id.index()] {
                self.runtimes[slot].finish();
            }
            if !(controlled && self.store.is_pending(id.index())) {
                self.scheduler.apply_mut().finish(id);
            }
        }

        if self.store.invalid_map().is_empty() {
            self.changed = true;
            self.events.push(FormEvent::Change {
                document: self.store.document().data().clone(),
                initial: false,
            });
        } else {
            debug!(
                invalid = self.store.invalid_map().len(),
                "Change withheld, form has invalid fields"
            );
        }

        Ok(())
    }

    /// Incoming transition for every runtime, in declaration order
    fn dispatch(&mut self, force: bool) {
        let compiled = Arc::clone(&self.compiled);
        let snapshot = self.store.document().snapshot();
        let version = self.store.version();
        let mut ready = false;

        trace!(version, force, "Dispatching document version");

        for runtime in self.runtimes.iter_mut() {
            let node = compiled.node(runtime.id());
            let incoming = runtime.on_document_version_changed(
                &compiled,
                node,
                &snapshot,
                version,
                &mut self.session,
                force,
            );

            if let (Some(message), Some(name)) = (incoming.newly_invalid, node.name()) {
                self.events.push(FormEvent::Invalidity {
                    name: name.to_string(),
                    message,
                    payload: self.session.payload().clone(),
                });
            }
            if incoming.healed {
                debug!(field = ?node.name(), "Field healed, scheduling commit");
                self.healed.push(node.id);
            }
            if let Some((generation, future)) = incoming.compute {
                let id = node.id;
                self.computes
                    .push(async move { (id, generation, future.await) }.boxed_local());
            }
            if incoming.resolved {
                ready |= self.readiness.report(&compiled, node.id);
            }
        }

        self.dispatched = Some(version);
        self.session.settle_version(version);
        let report = self.validation_report();
        self.store.set_invalid_map(report.invalid);

        if ready {
            self.on_ready();
        }
    }

    fn apply_compute(
        &mut self,
        id: NodeId,
        generation: u64,
        result: std::result::Result<Value, ComputeError>,
    ) -> bool {
        let Some(slot) = self.slots[id.index()] else {
            return false;
        };
        let compiled = Arc::clone(&self.compiled);
        let node = compiled.node(id);

        let first = match self.runtimes[slot].resolve_compute(generation, result) {
            ComputeOutcome::Dropped => return false,
            ComputeOutcome::Applied { first } => {
                debug!(field = ?node.name(), generation, "Compute resolved");
                first
            }
            ComputeOutcome::Failed { error, first } => {
                match node.descriptor.fallback.as_ref().or(self.fallback.as_ref()) {
                    Some(fallback) => fallback.call(&error),
                    None => warn!(field = ?node.name(), %error, "Compute failed with no fallback"),
                }
                first
            }
        };

        first && self.readiness.report(&compiled, id)
    }

    fn on_ready(&mut self) {
        self.events.push(FormEvent::Ready);
        if !self.changed && self.store.invalid_map().is_empty() {
            self.changed = true;
            self.events.push(FormEvent::Change {
                document: self.store.document().data().clone(),
                initial: true,
            });
        }
    }

    /// Put a radio group back on the document's value. The radio itself
    /// keeps no local value; its checked state lives in the group.
    fn restore_radio(&mut self, node: &CompiledNode) {
        if !node.kind().is_radio() {
            return;
        }
        let Some(path) = &node.path else { return };
        let current = path.read(self.store.document().data());
        self.session.radios.reconcile(path.as_str(), &current);
        if let Some(slot) = self.slots[node.id.index()] {
            self.runtimes[slot].revert(current);
        }
    }
}
