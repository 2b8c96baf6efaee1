//! Edit scripts: a JSON list of widget actions replayed against a form.
//!
//! ```json
//! [
//!   { "step": "change", "field": "email", "value": "ada@example.com" },
//!   { "step": "advance", "ms": 300 },
//!   { "step": "blur", "field": "email" },
//!   { "step": "set", "document": { "email": "host@example.com" } }
//! ]
//! ```

use formloom_engine::{Breakpoint, Form, FormError, FormEvent, FormStats, ManagedField};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum Step {
    Change { field: String, value: Value },
    Focus { field: String },
    Blur { field: String },
    Advance { ms: u64 },
    Flush,
    Set { document: Value },
    Breakpoint { breakpoint: Breakpoint },
}

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Invalid script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Step {index}: no field named '{field}'")]
    UnknownField { index: usize, field: String },

    #[error("Step {index}: {source}")]
    Form {
        index: usize,
        #[source]
        source: FormError,
    },
}

/// Events emitted while one step ran
#[derive(Debug, Clone, Serialize)]
pub struct StepLog {
    pub index: usize,
    pub step: Step,
    pub events: Vec<FormEvent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// Emitted while mounting
    pub mount: Vec<FormEvent>,
    pub steps: Vec<StepLog>,
    pub fields: Vec<ManagedField>,
    pub document: Value,
    pub invalid: std::collections::BTreeMap<String, String>,
    pub stats: FormStats,
}

pub fn parse_script(json: &str) -> Result<Vec<Step>, ScriptError> {
    Ok(serde_json::from_str(json)?)
}

/// Run every step in order; pending edits are flushed at the end
pub fn replay(mut form: Form, steps: Vec<Step>) -> Result<Transcript, ScriptError> {
    let mount = form.drain_events();
    let mut logs = Vec::with_capacity(steps.len());

    for (index, step) in steps.into_iter().enumerate() {
        apply(&mut form, index, &step)?;
        logs.push(StepLog {
            index,
            step,
            events: form.drain_events(),
        });
    }

    form.flush_all()
        .map_err(|source| ScriptError::Form { index: logs.len(), source })?;
    if let Some(last) = logs.last_mut() {
        last.events.extend(form.drain_events());
    }

    Ok(Transcript {
        mount,
        steps: logs,
        fields: form.fields(),
        document: form.data().clone(),
        invalid: form.invalid_map().clone(),
        stats: form.stats(),
    })
}

fn apply(form: &mut Form, index: usize, step: &Step) -> Result<(), ScriptError> {
    let resolve = |form: &Form, field: &str, value: Option<&Value>| {
        form.target(field, value).ok_or_else(|| ScriptError::UnknownField {
            index,
            field: field.to_string(),
        })
    };

    let result = match step {
        Step::Change { field, value } => {
            let id = resolve(form, field, Some(value))?;
            form.on_change(id, value.clone())
        }
        Step::Focus { field } => {
            let id = resolve(form, field, None)?;
            form.on_focus(id)
        }
        Step::Blur { field } => {
            let id = resolve(form, field, None)?;
            form.on_blur(id)
        }
        Step::Advance { ms } => form.advance(Duration::from_millis(*ms)),
        Step::Flush => form.flush_all(),
        Step::Set { document } => form.receive_document(document.clone()),
        Step::Breakpoint { breakpoint } => form.set_breakpoint(*breakpoint),
    };

    result.map_err(|source| ScriptError::Form { index, source })
}
