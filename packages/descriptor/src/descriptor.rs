//! # Field Descriptors
//!
//! Static configuration for one node of a form tree.
//!
//! A descriptor is either a **leaf** (a field a widget binds to) or a
//! **layout** (a container whose children are descriptors themselves). The
//! variant lives in [`FieldKind`]; each variant carries only its own
//! configuration. Everything that applies to all nodes (name, guards,
//! validation, compute) sits on [`FieldDescriptor`].
//!
//! ```rust,ignore
//! let fields = vec![
//!     FieldDescriptor::text("email").with_validation(ValidationRules::required()),
//!     FieldDescriptor::checkbox("agree"),
//!     FieldDescriptor::button("submit", "Submit"),
//! ];
//! ```

use crate::callbacks::{
    Check, Compute, Fallback, PayloadPredicate, Predicate, Recompute, Transform,
};
use crate::validation::ValidationRules;
use serde_json::Value;
use std::time::Duration;

/// Static `hidden` flag or a payload-driven predicate
#[derive(Debug, Clone, Default)]
pub enum Hidden {
    #[default]
    Never,
    Always,
    When(PayloadPredicate),
}

impl Hidden {
    pub fn resolve(&self, payload: &Value) -> bool {
        match self {
            Hidden::Never => false,
            Hidden::Always => true,
            Hidden::When(predicate) => predicate.call(payload),
        }
    }
}

impl From<bool> for Hidden {
    fn from(hidden: bool) -> Self {
        if hidden {
            Hidden::Always
        } else {
            Hidden::Never
        }
    }
}

/// Shape of the value a leaf stores in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// Free text, stored as a string
    Text,
    /// Checkbox / switch, stored as a boolean
    Flag,
    /// Single choice, string or null
    Choice,
    /// Multiple choice, array of strings
    Multi,
    /// Nothing stored
    None,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    // Leaves
    Text {
        multiline: bool,
        placeholder: Option<String>,
    },
    Checkbox,
    Switch,
    Radio {
        radio_value: String,
    },
    Combo {
        items: Vec<String>,
    },
    Items {
        items: Vec<String>,
    },
    Button {
        title: String,
    },
    Typography {
        text: String,
    },
    Line {
        title: String,
    },

    // Layouts
    Group {
        fields: Vec<FieldDescriptor>,
    },
    Paper {
        fields: Vec<FieldDescriptor>,
    },
    Expansion {
        title: String,
        fields: Vec<FieldDescriptor>,
    },
    Fragment {
        fields: Vec<FieldDescriptor>,
    },
    Condition {
        child: Box<FieldDescriptor>,
    },
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Switch => "switch",
            FieldKind::Radio { .. } => "radio",
            FieldKind::Combo { .. } => "combo",
            FieldKind::Items { .. } => "items",
            FieldKind::Button { .. } => "button",
            FieldKind::Typography { .. } => "typography",
            FieldKind::Line { .. } => "line",
            FieldKind::Group { .. } => "group",
            FieldKind::Paper { .. } => "paper",
            FieldKind::Expansion { .. } => "expansion",
            FieldKind::Fragment { .. } => "fragment",
            FieldKind::Condition { .. } => "condition",
        }
    }

    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            FieldKind::Group { .. }
                | FieldKind::Paper { .. }
                | FieldKind::Expansion { .. }
                | FieldKind::Fragment { .. }
                | FieldKind::Condition { .. }
        )
    }

    pub fn is_radio(&self) -> bool {
        matches!(self, FieldKind::Radio { .. })
    }

    pub fn value_shape(&self) -> ValueShape {
        match self {
            FieldKind::Text { .. } => ValueShape::Text,
            FieldKind::Checkbox | FieldKind::Switch => ValueShape::Flag,
            FieldKind::Radio { .. } | FieldKind::Combo { .. } => ValueShape::Choice,
            FieldKind::Items { .. } => ValueShape::Multi,
            _ => ValueShape::None,
        }
    }

    /// Discrete controls commit without a debounce window
    pub fn is_discrete(&self) -> bool {
        !matches!(self.value_shape(), ValueShape::Text | ValueShape::None)
    }

    /// Value written into a fresh document when no default is given
    pub fn initial_value(&self) -> Option<Value> {
        match self.value_shape() {
            ValueShape::Text => Some(Value::String(String::new())),
            ValueShape::Flag => Some(Value::Bool(false)),
            ValueShape::Choice => Some(Value::Null),
            ValueShape::Multi => Some(Value::Array(Vec::new())),
            ValueShape::None => None,
        }
    }

    pub fn children(&self) -> &[FieldDescriptor] {
        match self {
            FieldKind::Group { fields }
            | FieldKind::Paper { fields }
            | FieldKind::Expansion { fields, .. }
            | FieldKind::Fragment { fields } => fields,
            FieldKind::Condition { child } => std::slice::from_ref(child.as_ref()),
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> &mut [FieldDescriptor] {
        match self {
            FieldKind::Group { fields }
            | FieldKind::Paper { fields }
            | FieldKind::Expansion { fields, .. }
            | FieldKind::Fragment { fields } => fields,
            FieldKind::Condition { child } => std::slice::from_mut(child.as_mut()),
            _ => Default::default(),
        }
    }

    /// Move the children out, leaving the layout's own configuration behind
    pub fn take_children(&mut self) -> Vec<FieldDescriptor> {
        match self {
            FieldKind::Group { fields }
            | FieldKind::Paper { fields }
            | FieldKind::Expansion { fields, .. }
            | FieldKind::Fragment { fields } => std::mem::take(fields),
            FieldKind::Condition { child } => {
                let placeholder = FieldDescriptor::new(FieldKind::Fragment { fields: Vec::new() });
                vec![std::mem::replace(child.as_mut(), placeholder)]
            }
            _ => Vec::new(),
        }
    }
}

/// Declarative configuration for one tree node
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Document path; `None` means stateless
    pub name: Option<String>,

    pub kind: FieldKind,

    pub validation: Option<ValidationRules>,

    pub hidden: Hidden,
    pub phone_hidden: bool,
    pub tablet_hidden: bool,
    pub desktop_hidden: bool,

    /// Static guards
    pub disabled: bool,
    pub readonly: bool,

    pub is_visible: Option<Predicate>,
    pub is_disabled: Option<Predicate>,
    pub is_readonly: Option<Predicate>,
    pub is_invalid: Option<Check>,
    pub is_incorrect: Option<Check>,

    pub compute: Option<Compute>,
    pub should_recompute: Option<Recompute>,
    pub fallback: Option<Fallback>,

    pub read_transform: Option<Transform>,
    pub write_transform: Option<Transform>,

    pub default_value: Option<Value>,

    /// Overrides the per-kind debounce window
    pub debounce: Option<Duration>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            name: None,
            kind,
            validation: None,
            hidden: Hidden::Never,
            phone_hidden: false,
            tablet_hidden: false,
            desktop_hidden: false,
            disabled: false,
            readonly: false,
            is_visible: None,
            is_disabled: None,
            is_readonly: None,
            is_invalid: None,
            is_incorrect: None,
            compute: None,
            should_recompute: None,
            fallback: None,
            read_transform: None,
            write_transform: None,
            default_value: None,
            debounce: None,
        }
    }

    pub fn named(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(kind).with_name(name)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::named(
            name,
            FieldKind::Text {
                multiline: false,
                placeholder: None,
            },
        )
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::named(name, FieldKind::Checkbox)
    }

    pub fn switch(name: impl Into<String>) -> Self {
        Self::named(name, FieldKind::Switch)
    }

    pub fn radio(name: impl Into<String>, radio_value: impl Into<String>) -> Self {
        Self::named(
            name,
            FieldKind::Radio {
                radio_value: radio_value.into(),
            },
        )
    }

    pub fn combo(name: impl Into<String>, items: Vec<String>) -> Self {
        Self::named(name, FieldKind::Combo { items })
    }

    pub fn items(name: impl Into<String>, items: Vec<String>) -> Self {
        Self::named(name, FieldKind::Items { items })
    }

    pub fn button(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self::named(
            name,
            FieldKind::Button {
                title: title.into(),
            },
        )
    }

    pub fn typography(text: impl Into<String>) -> Self {
        Self::new(FieldKind::Typography { text: text.into() })
    }

    pub fn group(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(FieldKind::Group { fields })
    }

    pub fn paper(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(FieldKind::Paper { fields })
    }

    pub fn expansion(title: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self::new(FieldKind::Expansion {
            title: title.into(),
            fields,
        })
    }

    pub fn fragment(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(FieldKind::Fragment { fields })
    }

    pub fn condition(child: FieldDescriptor) -> Self {
        Self::new(FieldKind::Condition {
            child: Box::new(child),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_validation(mut self, rules: ValidationRules) -> Self {
        self.validation = Some(rules);
        self
    }

    pub fn with_hidden(mut self, hidden: impl Into<Hidden>) -> Self {
        self.hidden = hidden.into();
        self
    }

    pub fn hidden_when(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.hidden = Hidden::When(PayloadPredicate::new(f));
        self
    }

    pub fn with_breakpoint_hidden(mut self, phone: bool, tablet: bool, desktop: bool) -> Self {
        self.phone_hidden = phone;
        self.tablet_hidden = tablet;
        self.desktop_hidden = desktop;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn visible_when(
        mut self,
        f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_visible = Some(Predicate::new(f));
        self
    }

    pub fn disabled_when(
        mut self,
        f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_disabled = Some(Predicate::new(f));
        self
    }

    pub fn readonly_when(
        mut self,
        f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_readonly = Some(Predicate::new(f));
        self
    }

    pub fn invalid_when(
        mut self,
        f: impl Fn(&Value, &Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.is_invalid = Some(Check::new(f));
        self
    }

    pub fn incorrect_when(
        mut self,
        f: impl Fn(&Value, &Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.is_incorrect = Some(Check::new(f));
        self
    }

    pub fn with_compute(mut self, compute: Compute) -> Self {
        self.compute = Some(compute);
        self
    }

    pub fn with_should_recompute(mut self, recompute: Recompute) -> Self {
        self.should_recompute = Some(recompute);
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_read_transform(mut self, transform: Transform) -> Self {
        self.read_transform = Some(transform);
        self
    }

    pub fn with_write_transform(mut self, transform: Transform) -> Self {
        self.write_transform = Some(transform);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    pub fn is_layout(&self) -> bool {
        self.kind.is_layout()
    }

    /// Named, non-layout nodes own a runtime that reports readiness
    pub fn is_stateful(&self) -> bool {
        self.name.is_some() && !self.kind.is_layout()
    }
}
