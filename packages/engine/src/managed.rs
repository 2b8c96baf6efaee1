//! What a widget renders, and the handle it reports edits through.

use crate::form::Form;
use crate::runtime::{FieldRuntime, RuntimeState};
use crate::session::FormSession;
use crate::Result;
use formloom_descriptor::{CompiledNode, FieldKind, NodeId};
use serde::Serialize;
use serde_json::Value;

/// Snapshot of one field as a widget sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedField {
    #[serde(skip)]
    pub id: NodeId,
    pub name: Option<String>,
    pub kind: &'static str,
    pub value: Value,
    pub visible: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub dirty: bool,
    pub loading: bool,
    pub invalid: Option<String>,
    pub incorrect: Option<String>,
    pub state: RuntimeState,
}

impl ManagedField {
    pub(crate) fn capture(node: &CompiledNode, runtime: &FieldRuntime, session: &FormSession) -> Self {
        // Radios render their own checked state, not the group value
        let value = match (node.kind(), node.name()) {
            (FieldKind::Radio { radio_value }, Some(group)) => {
                Value::Bool(session.radios().is_checked(group, radio_value))
            }
            _ => runtime.memory().value.clone(),
        };

        Self {
            id: node.id,
            name: node.name().map(str::to_string),
            kind: node.kind().type_name(),
            value,
            visible: runtime.is_visible(),
            disabled: runtime.is_disabled(),
            readonly: runtime.is_readonly(node),
            dirty: runtime.is_dirty(),
            loading: runtime.is_loading(),
            invalid: runtime.memory().invalid.clone(),
            incorrect: runtime.incorrect().map(str::to_string),
            state: runtime.state(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid.is_some()
    }
}

/// Widget-facing handle bound to one field
pub struct FieldHandle<'a> {
    form: &'a mut Form,
    id: NodeId,
}

impl<'a> FieldHandle<'a> {
    pub(crate) fn new(form: &'a mut Form, id: NodeId) -> Self {
        Self { form, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn managed(&self) -> Option<ManagedField> {
        self.form.field(self.id)
    }

    pub fn on_change(&mut self, value: Value) -> Result<()> {
        self.form.on_change(self.id, value)
    }

    pub fn on_focus(&mut self) -> Result<()> {
        self.form.on_focus(self.id)
    }

    pub fn on_blur(&mut self) -> Result<()> {
        self.form.on_blur(self.id)
    }
}
