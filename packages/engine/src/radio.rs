//! Radio group selection.
//!
//! Radios sharing a name form one group no matter where they sit in the
//! tree. The coordinator keeps the selected value per group so every radio
//! can report whether it is checked without walking its siblings. The
//! document always wins: incoming versions overwrite the map.

use formloom_descriptor::CompiledForm;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RadioCoordinator {
    selections: HashMap<String, Value>,
}

impl RadioCoordinator {
    /// Seed every group with its descriptor default
    pub fn seed(form: &CompiledForm) -> Self {
        let mut selections = HashMap::new();
        for &id in form.leaves() {
            let node = form.node(id);
            if !node.kind().is_radio() {
                continue;
            }
            let Some(name) = node.name() else { continue };
            if selections.contains_key(name) {
                continue;
            }
            if let Some(default) = form.radio_default(name) {
                selections.insert(name.to_string(), default.clone());
            }
        }
        Self { selections }
    }

    pub fn selected(&self, group: &str) -> Option<&Value> {
        self.selections.get(group)
    }

    pub fn is_checked(&self, group: &str, radio_value: &str) -> bool {
        matches!(self.selections.get(group), Some(Value::String(s)) if s == radio_value)
    }

    /// Adopt the document's value for a group; returns whether it moved
    pub fn reconcile(&mut self, group: &str, document_value: &Value) -> bool {
        if document_value.is_null() {
            return self.selections.remove(group).is_some();
        }
        if self.selections.get(group) == Some(document_value) {
            return false;
        }
        self.selections
            .insert(group.to_string(), document_value.clone());
        true
    }

    pub fn select(&mut self, group: &str, value: Value) {
        debug!(group, value = %value, "Radio selected");
        self.selections.insert(group.to_string(), value);
    }

    pub fn teardown(&mut self) {
        self.selections.clear();
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}
