//! Per-mount context shared by every field runtime.

use crate::guards::{Breakpoint, FieldGuards, GuardCache, GuardResolver};
use crate::radio::RadioCoordinator;
use formloom_descriptor::{CompiledForm, NodeId};
use serde_json::Value;

#[derive(Debug)]
pub struct FormSession {
    breakpoint: Breakpoint,
    payload: Value,
    pub(crate) radios: RadioCoordinator,
    guard_cache: GuardCache,
}

impl FormSession {
    pub fn new(breakpoint: Breakpoint, payload: Value, radios: RadioCoordinator) -> Self {
        Self {
            breakpoint,
            payload,
            radios,
            guard_cache: GuardCache::default(),
        }
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.breakpoint
    }

    /// Switch breakpoint; cached guards no longer apply
    pub fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> bool {
        if self.breakpoint == breakpoint {
            return false;
        }
        self.breakpoint = breakpoint;
        self.guard_cache.clear();
        true
    }

    /// Opaque host value handed to every callback
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn radios(&self) -> &RadioCoordinator {
        &self.radios
    }

    pub fn guards(&mut self, form: &CompiledForm, id: NodeId, data: &Value, version: u64) -> FieldGuards {
        let resolver = GuardResolver {
            form,
            data,
            payload: &self.payload,
            breakpoint: self.breakpoint,
            version,
        };
        resolver.resolve_field(&mut self.guard_cache, id)
    }

    /// Called once a version has been dispatched to every runtime
    pub(crate) fn settle_version(&mut self, version: u64) {
        self.guard_cache.retain_version(version);
    }

    pub(crate) fn teardown(&mut self) {
        self.radios.teardown();
        self.guard_cache.clear();
    }
}
