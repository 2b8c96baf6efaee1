//! # Validation Aggregator
//!
//! Decides whether a document may be committed.
//!
//! Two message kinds come out of a field:
//!
//! - `is_invalid`: blocking. The commit is withheld and the field keeps
//!   the rejected value locally.
//! - `is_incorrect`: advisory. Shown, never blocks.
//!
//! Hidden fields and compute fields never block. The whole form is valid
//! when no visible field reports a blocking message against the document
//! it would produce.

use formloom_descriptor::{CompiledForm, FieldDescriptor, NodeId};
use formloom_document::InvalidMap;
use serde_json::Value;
use std::borrow::Cow;

/// Messages for one field against one candidate document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub invalid: Option<String>,
    pub incorrect: Option<String>,
}

impl Verdict {
    pub fn evaluate(descriptor: &FieldDescriptor, candidate: &Value, payload: &Value) -> Self {
        if descriptor.compute.is_some() {
            return Verdict::default();
        }
        Verdict {
            invalid: descriptor
                .is_invalid
                .as_ref()
                .and_then(|check| check.call(candidate, payload)),
            incorrect: descriptor
                .is_incorrect
                .as_ref()
                .and_then(|check| check.call(candidate, payload)),
        }
    }

    pub fn blocks(&self) -> bool {
        self.invalid.is_some()
    }
}

/// What the aggregator needs to know about a live field
#[derive(Debug, Clone)]
pub struct FieldProbe<'a> {
    pub visible: bool,

    /// Candidate document when the field holds an uncommitted local value
    pub candidate: Option<Cow<'a, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub invalid: InvalidMap,
    pub incorrect: InvalidMap,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

pub struct ValidationAggregator;

impl ValidationAggregator {
    /// Walk every stateful leaf in declaration order
    pub fn aggregate<'a>(
        form: &CompiledForm,
        data: &Value,
        payload: &Value,
        mut probe: impl FnMut(NodeId) -> Option<FieldProbe<'a>>,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();

        for &id in form.leaves() {
            let node = form.node(id);
            let Some(name) = node.name() else { continue };
            let Some(field) = probe(id) else { continue };
            if !field.visible {
                continue;
            }

            let candidate = field.candidate.as_deref().unwrap_or(data);
            let verdict = Verdict::evaluate(&node.descriptor, candidate, payload);
            if let Some(message) = verdict.invalid {
                report.invalid.entry(name.to_string()).or_insert(message);
            }
            if let Some(message) = verdict.incorrect {
                report.incorrect.entry(name.to_string()).or_insert(message);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formloom_descriptor::{compile, Compute, ComputeResult, FieldDescriptor, ValidationRules};
    use serde_json::json;

    fn visible<'a>(_: NodeId) -> Option<FieldProbe<'a>> {
        Some(FieldProbe {
            visible: true,
            candidate: None,
        })
    }

    #[test]
    fn test_blocking_and_advisory() {
        let form = compile(&[
            FieldDescriptor::text("email").with_validation(ValidationRules::required()),
            FieldDescriptor::text("nick").incorrect_when(|data, _| {
                (data["nick"].as_str().map_or(0, str::len) < 3).then(|| "short".to_string())
            }),
        ])
        .unwrap();

        let report =
            ValidationAggregator::aggregate(&form, &json!({"email": "", "nick": "ab"}), &Value::Null, visible);
        assert!(!report.is_valid());
        assert_eq!(report.invalid.get("email").map(String::as_str), Some("required"));
        assert_eq!(report.incorrect.get("nick").map(String::as_str), Some("short"));

        let report = ValidationAggregator::aggregate(
            &form,
            &json!({"email": "a@b.c", "nick": "ab"}),
            &Value::Null,
            visible,
        );
        assert!(report.is_valid());
    }

    #[test]
    fn test_hidden_fields_never_block() {
        let form = compile(&[FieldDescriptor::text("email").with_validation(ValidationRules::required())])
            .unwrap();
        let report = ValidationAggregator::aggregate(&form, &json!({"email": ""}), &Value::Null, |_| {
            Some(FieldProbe {
                visible: false,
                candidate: None,
            })
        });
        assert!(report.is_valid());
    }

    #[test]
    fn test_candidate_document_overrides_data() {
        let form = compile(&[FieldDescriptor::text("email").with_validation(ValidationRules::required())])
            .unwrap();
        let held = json!({"email": ""});
        let report =
            ValidationAggregator::aggregate(&form, &json!({"email": "ok@x.y"}), &Value::Null, |_| {
                Some(FieldProbe {
                    visible: true,
                    candidate: Some(Cow::Borrowed(&held)),
                })
            });
        assert_eq!(report.invalid.len(), 1);
    }

    #[test]
    fn test_compute_fields_skip_validation() {
        let descriptor = FieldDescriptor::text("total")
            .invalid_when(|_, _| Some("never".into()))
            .with_compute(Compute::new(|_, _| ComputeResult::Ready(json!(1))));
        assert_eq!(Verdict::evaluate(&descriptor, &json!({}), &Value::Null), Verdict::default());
    }
}
