//! # JSON Descriptors
//!
//! The declarative subset of [`FieldDescriptor`] that can be written as
//! JSON. Callbacks (predicates, compute, transforms) only exist in code;
//! everything else round-trips through these types.
//!
//! ```json
//! [
//!   { "type": "text", "name": "email", "validation": { "required": true } },
//!   { "type": "group", "fields": [
//!       { "type": "checkbox", "name": "agree" }
//!   ]}
//! ]
//! ```

use crate::descriptor::{FieldDescriptor, FieldKind, Hidden};
use crate::errors::CompileError;
use crate::validation::ValidationRules;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorSpec {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(flatten)]
    pub kind: KindSpec,

    #[serde(default)]
    pub validation: Option<ValidationRules>,

    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub phone_hidden: bool,
    #[serde(default)]
    pub tablet_hidden: bool,
    #[serde(default)]
    pub desktop_hidden: bool,

    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub readonly: bool,

    #[serde(default)]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KindSpec {
    Text {
        #[serde(default)]
        multiline: bool,
        #[serde(default)]
        placeholder: Option<String>,
    },
    Checkbox,
    Switch,
    Radio {
        #[serde(rename = "radioValue")]
        radio_value: String,
    },
    Combo {
        #[serde(default)]
        items: Vec<String>,
    },
    Items {
        #[serde(default)]
        items: Vec<String>,
    },
    Button {
        #[serde(default)]
        title: String,
    },
    Typography {
        #[serde(default)]
        text: String,
    },
    Line {
        #[serde(default)]
        title: String,
    },
    Group {
        #[serde(default)]
        fields: Vec<DescriptorSpec>,
    },
    Paper {
        #[serde(default)]
        fields: Vec<DescriptorSpec>,
    },
    Expansion {
        #[serde(default)]
        title: String,
        #[serde(default)]
        fields: Vec<DescriptorSpec>,
    },
    Fragment {
        #[serde(default)]
        fields: Vec<DescriptorSpec>,
    },
    Condition {
        child: Box<DescriptorSpec>,
    },
}

fn convert_all(specs: Vec<DescriptorSpec>) -> Vec<FieldDescriptor> {
    specs.into_iter().map(FieldDescriptor::from).collect()
}

impl From<KindSpec> for FieldKind {
    fn from(spec: KindSpec) -> Self {
        match spec {
            KindSpec::Text {
                multiline,
                placeholder,
            } => FieldKind::Text {
                multiline,
                placeholder,
            },
            KindSpec::Checkbox => FieldKind::Checkbox,
            KindSpec::Switch => FieldKind::Switch,
            KindSpec::Radio { radio_value } => FieldKind::Radio { radio_value },
            KindSpec::Combo { items } => FieldKind::Combo { items },
            KindSpec::Items { items } => FieldKind::Items { items },
            KindSpec::Button { title } => FieldKind::Button { title },
            KindSpec::Typography { text } => FieldKind::Typography { text },
            KindSpec::Line { title } => FieldKind::Line { title },
            KindSpec::Group { fields } => FieldKind::Group {
                fields: convert_all(fields),
            },
            KindSpec::Paper { fields } => FieldKind::Paper {
                fields: convert_all(fields),
            },
            KindSpec::Expansion { title, fields } => FieldKind::Expansion {
                title,
                fields: convert_all(fields),
            },
            KindSpec::Fragment { fields } => FieldKind::Fragment {
                fields: convert_all(fields),
            },
            KindSpec::Condition { child } => FieldKind::Condition {
                child: Box::new(FieldDescriptor::from(*child)),
            },
        }
    }
}

impl From<DescriptorSpec> for FieldDescriptor {
    fn from(spec: DescriptorSpec) -> Self {
        let mut descriptor = FieldDescriptor::new(spec.kind.into());
        descriptor.name = spec.name;
        descriptor.validation = spec.validation;
        descriptor.hidden = Hidden::from(spec.hidden);
        descriptor.phone_hidden = spec.phone_hidden;
        descriptor.tablet_hidden = spec.tablet_hidden;
        descriptor.desktop_hidden = spec.desktop_hidden;
        descriptor.disabled = spec.disabled;
        descriptor.readonly = spec.readonly;
        descriptor.default_value = spec.default_value;
        descriptor.debounce = spec.debounce_ms.map(Duration::from_millis);
        descriptor
    }
}

/// Parse a JSON array of descriptors
pub fn parse_fields(json: &str) -> Result<Vec<FieldDescriptor>, CompileError> {
    let specs: Vec<DescriptorSpec> = serde_json::from_str(json)?;
    Ok(convert_all(specs))
}
