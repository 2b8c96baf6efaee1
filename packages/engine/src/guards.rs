//! # Guards
//!
//! Visibility, disabled and readonly flags for every node.
//!
//! A node's flags combine its own configuration with everything inherited
//! from its layout ancestors:
//!
//! - visible: `!hidden(payload)`, not hidden at the active breakpoint,
//!   `is_visible(data, payload)`, and every ancestor visible. A hidden
//!   ancestor wins; the node's own predicates are not even evaluated.
//! - disabled: static flag, `is_disabled`, or any ancestor disabled.
//! - readonly: static flag, `is_readonly`, or any ancestor readonly.
//!
//! Layout results are memoized per `(node, version)` so a wide group is
//! resolved once per document version rather than once per child.

use formloom_descriptor::{CompiledForm, CompiledNode, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Active layout width class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Breakpoint {
    Phone,
    Tablet,
    #[default]
    Desktop,
}

impl std::str::FromStr for Breakpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone" => Ok(Breakpoint::Phone),
            "tablet" => Ok(Breakpoint::Tablet),
            "desktop" => Ok(Breakpoint::Desktop),
            other => Err(format!("unknown breakpoint '{}'", other)),
        }
    }
}

/// Cumulative flags of a layout, ancestors included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeGuards {
    pub visible: bool,
    pub disabled: bool,
    pub readonly: bool,
}

impl NodeGuards {
    const ROOT: NodeGuards = NodeGuards {
        visible: true,
        disabled: false,
        readonly: false,
    };
}

/// Flags of a leaf, split into what it owns and what it inherits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGuards {
    pub visible: bool,
    pub disabled: bool,
    pub field_readonly: bool,
    pub upper_readonly: bool,
}

#[derive(Debug, Default)]
pub struct GuardCache {
    layouts: HashMap<(NodeId, u64), NodeGuards>,
}

impl GuardCache {
    /// Drop entries computed for any version other than `version`
    pub fn retain_version(&mut self, version: u64) {
        self.layouts.retain(|(_, v), _| *v == version);
    }

    pub fn clear(&mut self) {
        self.layouts.clear();
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

pub struct GuardResolver<'a> {
    pub form: &'a CompiledForm,
    pub data: &'a Value,
    pub payload: &'a Value,
    pub breakpoint: Breakpoint,
    pub version: u64,
}

impl GuardResolver<'_> {
    pub fn resolve_field(&self, cache: &mut GuardCache, id: NodeId) -> FieldGuards {
        let node = self.form.node(id);
        let upper = self.inherited(cache, node.parent);

        if !upper.visible {
            return FieldGuards {
                visible: false,
                disabled: upper.disabled,
                field_readonly: false,
                upper_readonly: upper.readonly,
            };
        }

        let visible = self.own_visible(node);
        let disabled = upper.disabled || self.own_disabled(node);
        FieldGuards {
            visible,
            disabled,
            field_readonly: self.own_readonly(node),
            upper_readonly: upper.readonly,
        }
    }

    fn inherited(&self, cache: &mut GuardCache, layout: Option<NodeId>) -> NodeGuards {
        let Some(id) = layout else {
            return NodeGuards::ROOT;
        };
        if let Some(guards) = cache.layouts.get(&(id, self.version)) {
            return *guards;
        }

        let node = self.form.node(id);
        let upper = self.inherited(cache, node.parent);
        let guards = if upper.visible {
            NodeGuards {
                visible: self.own_visible(node),
                disabled: upper.disabled || self.own_disabled(node),
                readonly: upper.readonly || self.own_readonly(node),
            }
        } else {
            NodeGuards {
                visible: false,
                ..upper
            }
        };

        cache.layouts.insert((id, self.version), guards);
        guards
    }

    fn own_visible(&self, node: &CompiledNode) -> bool {
        let descriptor = &node.descriptor;
        let breakpoint_hidden = match self.breakpoint {
            Breakpoint::Phone => descriptor.phone_hidden,
            Breakpoint::Tablet => descriptor.tablet_hidden,
            Breakpoint::Desktop => descriptor.desktop_hidden,
        };
        if breakpoint_hidden || descriptor.hidden.resolve(self.payload) {
            return false;
        }
        descriptor
            .is_visible
            .as_ref()
            .map_or(true, |p| p.call(self.data, self.payload))
    }

    fn own_disabled(&self, node: &CompiledNode) -> bool {
        let descriptor = &node.descriptor;
        descriptor.disabled
            || descriptor
                .is_disabled
                .as_ref()
                .map_or(false, |p| p.call(self.data, self.payload))
    }

    fn own_readonly(&self, node: &CompiledNode) -> bool {
        let descriptor = &node.descriptor;
        descriptor.readonly
            || descriptor
                .is_readonly
                .as_ref()
                .map_or(false, |p| p.call(self.data, self.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formloom_descriptor::{compile, FieldDescriptor};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn resolver<'a>(
        form: &'a CompiledForm,
        data: &'a Value,
        breakpoint: Breakpoint,
        version: u64,
    ) -> GuardResolver<'a> {
        GuardResolver {
            form,
            data,
            payload: &Value::Null,
            breakpoint,
            version,
        }
    }

    #[test]
    fn test_ancestor_hidden_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let form = compile(&[FieldDescriptor::group(vec![FieldDescriptor::text("a")
            .visible_when(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })])
        .with_hidden(true)])
        .unwrap();

        let data = json!({});
        let mut cache = GuardCache::default();
        let guards = resolver(&form, &data, Breakpoint::Desktop, 0)
            .resolve_field(&mut cache, form.by_name("a")[0]);

        assert!(!guards.visible);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disabled_and_readonly_inherit() {
        let form = compile(&[FieldDescriptor::paper(vec![FieldDescriptor::group(vec![
            FieldDescriptor::text("a"),
        ])
        .with_readonly(true)])
        .disabled_when(|data, _| data["lock"] == json!(true))])
        .unwrap();
        let id = form.by_name("a")[0];

        let data = json!({"lock": true});
        let mut cache = GuardCache::default();
        let guards = resolver(&form, &data, Breakpoint::Desktop, 0).resolve_field(&mut cache, id);
        assert!(guards.visible);
        assert!(guards.disabled);
        assert!(guards.upper_readonly);
        assert!(!guards.field_readonly);

        let data = json!({"lock": false});
        let guards = resolver(&form, &data, Breakpoint::Desktop, 1).resolve_field(&mut cache, id);
        assert!(!guards.disabled);
    }

    #[test]
    fn test_breakpoint_hidden() {
        let form = compile(&[FieldDescriptor::text("a").with_breakpoint_hidden(true, false, false)])
            .unwrap();
        let id = form.by_name("a")[0];
        let data = json!({});
        let mut cache = GuardCache::default();

        assert!(!resolver(&form, &data, Breakpoint::Phone, 0).resolve_field(&mut cache, id).visible);
        assert!(resolver(&form, &data, Breakpoint::Tablet, 0).resolve_field(&mut cache, id).visible);
    }

    #[test]
    fn test_layout_guards_memoized_per_version() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let form = compile(&[FieldDescriptor::group(vec![
            FieldDescriptor::text("a"),
            FieldDescriptor::text("b"),
            FieldDescriptor::text("c"),
        ])
        .visible_when(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })])
        .unwrap();

        let data = json!({});
        let mut cache = GuardCache::default();
        for name in ["a", "b", "c"] {
            resolver(&form, &data, Breakpoint::Desktop, 4)
                .resolve_field(&mut cache, form.by_name(name)[0]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.retain_version(5);
        assert!(cache.is_empty());
        resolver(&form, &data, Breakpoint::Desktop, 5).resolve_field(&mut cache, form.by_name("a")[0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_breakpoint() {
        assert_eq!("tablet".parse::<Breakpoint>().unwrap(), Breakpoint::Tablet);
        assert!("watch".parse::<Breakpoint>().is_err());
    }
}
