//! # Descriptor Compiler
//!
//! Turns a descriptor tree into a flat arena the engine can index.
//!
//! ```text
//! &[FieldDescriptor] ──deep clone──► audit names ──► inject validators
//!                                                        │
//!                        CompiledForm { nodes: [..] } ◄──┘ flatten (pre-order)
//! ```
//!
//! Nodes are addressed by [`NodeId`] (their arena index). Ids follow
//! declaration order, so iterating the arena front to back is the
//! deterministic dispatch order. Layout nodes keep their own configuration;
//! their children live in the arena and are linked by id.
//!
//! The compiled form is immutable. Hosts share it behind an `Arc` and mount
//! as many sessions on it as they like.

use crate::descriptor::{FieldDescriptor, FieldKind};
use crate::errors::CompileError;
use crate::validation::{inject, RuleSet};
use crate::visitor::{walk_fields, walk_fields_mut, DescriptorVisitor, DescriptorVisitorMut};
use formloom_document::{FieldPath, PathError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Arena index of a compiled node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CompiledNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,

    /// The node's own configuration; layout children are moved into the arena
    pub descriptor: FieldDescriptor,

    /// Parsed `name`
    pub path: Option<FieldPath>,

    /// Readiness reports this layout waits for (0 for leaves)
    pub ready_quota: usize,

    /// Layout with nothing stateful below it; reports itself on mount
    pub self_reporting: bool,
}

impl CompiledNode {
    pub fn name(&self) -> Option<&str> {
        self.descriptor.name.as_deref()
    }

    pub fn is_layout(&self) -> bool {
        self.descriptor.is_layout()
    }

    pub fn is_stateful(&self) -> bool {
        self.descriptor.is_stateful()
    }

    pub fn kind(&self) -> &FieldKind {
        &self.descriptor.kind
    }
}

#[derive(Debug, Clone)]
pub struct CompiledForm {
    nodes: Vec<CompiledNode>,
    roots: Vec<NodeId>,
    leaves: Vec<NodeId>,
    names: HashMap<String, Vec<NodeId>>,
    root_quota: usize,
    root_self_reporting: bool,
}

/// Compile a descriptor tree; the input is left untouched
pub fn compile(fields: &[FieldDescriptor]) -> Result<CompiledForm, CompileError> {
    let mut fields = fields.to_vec();

    let mut audit = NameAudit::default();
    walk_fields(&mut audit, &fields);
    if let Some(err) = audit.error {
        return Err(err);
    }

    let mut injector = ValidatorInjector::default();
    walk_fields_mut(&mut injector, &mut fields);
    if let Some(err) = injector.error {
        return Err(err);
    }

    let mut nodes = Vec::new();
    let mut roots = Vec::with_capacity(fields.len());
    for field in fields {
        roots.push(flatten(field, None, 0, &mut nodes)?);
    }

    let leaves: Vec<NodeId> = nodes
        .iter()
        .filter(|node| !node.is_layout())
        .map(|node| node.id)
        .collect();

    let mut names: HashMap<String, Vec<NodeId>> = HashMap::new();
    for &id in &leaves {
        if let Some(name) = nodes[id.0].name() {
            names.entry(name.to_string()).or_default().push(id);
        }
    }

    let (root_quota, root_self_reporting) = quota_for(&roots, &nodes);

    debug!(
        nodes = nodes.len(),
        leaves = leaves.len(),
        root_quota,
        "Compiled descriptor tree"
    );

    Ok(CompiledForm {
        nodes,
        roots,
        leaves,
        names,
        root_quota,
        root_self_reporting,
    })
}

fn flatten(
    mut descriptor: FieldDescriptor,
    parent: Option<NodeId>,
    depth: usize,
    nodes: &mut Vec<CompiledNode>,
) -> Result<NodeId, CompileError> {
    let id = NodeId(nodes.len());
    let path = match &descriptor.name {
        Some(name) if !descriptor.is_layout() => Some(parse_name(name)?),
        _ => None,
    };
    let children = descriptor.kind.take_children();

    nodes.push(CompiledNode {
        id,
        parent,
        children: Vec::with_capacity(children.len()),
        depth,
        descriptor,
        path,
        ready_quota: 0,
        self_reporting: false,
    });

    let mut child_ids = Vec::with_capacity(children.len());
    for child in children {
        child_ids.push(flatten(child, Some(id), depth + 1, nodes)?);
    }

    if nodes[id.0].is_layout() {
        let (quota, self_reporting) = quota_for(&child_ids, nodes);
        nodes[id.0].ready_quota = quota;
        nodes[id.0].self_reporting = self_reporting;
    }
    nodes[id.0].children = child_ids;

    Ok(id)
}

/// Stateful children plus child layouts, at least one
fn quota_for(children: &[NodeId], nodes: &[CompiledNode]) -> (usize, bool) {
    let count = children
        .iter()
        .filter(|id| {
            let node = &nodes[id.0];
            node.is_layout() || node.is_stateful()
        })
        .count();

    if count == 0 {
        (1, true)
    } else {
        (count, false)
    }
}

fn parse_name(name: &str) -> Result<FieldPath, CompileError> {
    FieldPath::parse(name).map_err(|source| CompileError::InvalidName {
        field: name.to_string(),
        source,
    })
}

impl CompiledForm {
    pub fn node(&self, id: NodeId) -> &CompiledNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&CompiledNode> {
        self.nodes.get(id.0)
    }

    /// Every node in declaration (pre-order) order
    pub fn nodes(&self) -> &[CompiledNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Non-layout nodes in declaration order
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaves bound to `name` (several only for radio groups)
    pub fn by_name(&self, name: &str) -> &[NodeId] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn root_quota(&self) -> usize {
        self.root_quota
    }

    pub fn root_self_reporting(&self) -> bool {
        self.root_self_reporting
    }

    pub fn stateful_count(&self) -> usize {
        self.leaves
            .iter()
            .filter(|id| self.nodes[id.0].is_stateful())
            .count()
    }

    /// Parent chain, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &CompiledNode> + '_ {
        std::iter::successors(self.nodes[id.0].parent, move |current| {
            self.nodes[current.0].parent
        })
        .map(move |ancestor| &self.nodes[ancestor.0])
    }

    /// The default a radio group contributes: the first radio carrying one
    pub fn radio_default(&self, name: &str) -> Option<&Value> {
        self.by_name(name)
            .iter()
            .map(|id| &self.nodes[id.0].descriptor)
            .filter(|d| d.kind.is_radio())
            .find_map(|d| d.default_value.as_ref())
    }

    /// Fill values missing from `seed` with descriptor defaults.
    ///
    /// Compute fields and value-less kinds (buttons, typography) contribute
    /// nothing. Existing values, including explicit nulls, are kept.
    pub fn initial_document(&self, seed: &Value) -> Result<Value, PathError> {
        let mut document = match seed {
            Value::Object(_) => seed.clone(),
            _ => Value::Object(Map::new()),
        };

        for &id in &self.leaves {
            let node = &self.nodes[id.0];
            let Some(path) = &node.path else { continue };
            let descriptor = &node.descriptor;
            if descriptor.compute.is_some() || path.get(&document).is_some() {
                continue;
            }

            let default = if descriptor.kind.is_radio() {
                self.radio_default(path.as_str()).cloned()
            } else {
                descriptor.default_value.clone()
            };

            if let Some(value) = default.or_else(|| descriptor.kind.initial_value()) {
                path.assign(&mut document, value)?;
            }
        }

        Ok(document)
    }
}

/// Rejects duplicate names; radios may share one
#[derive(Default)]
struct NameAudit {
    seen: HashMap<String, &'static str>,
    error: Option<CompileError>,
}

impl DescriptorVisitor for NameAudit {
    fn visit_leaf(&mut self, leaf: &FieldDescriptor) {
        if self.error.is_some() {
            return;
        }
        let Some(name) = &leaf.name else { return };
        let kind = leaf.kind.type_name();

        match self.seen.get(name) {
            None => {
                self.seen.insert(name.clone(), kind);
            }
            Some(&"radio") if leaf.kind.is_radio() => {}
            Some(&"radio") => {
                self.error = Some(CompileError::MixedRadioName {
                    field: name.clone(),
                    kind,
                });
            }
            Some(&other) if leaf.kind.is_radio() => {
                self.error = Some(CompileError::MixedRadioName {
                    field: name.clone(),
                    kind: other,
                });
            }
            Some(_) => self.error = Some(CompileError::DuplicateName(name.clone())),
        }
    }
}

/// Folds `validation` rules into each leaf's `is_invalid`
#[derive(Default)]
struct ValidatorInjector {
    error: Option<CompileError>,
}

impl DescriptorVisitorMut for ValidatorInjector {
    fn visit_leaf_mut(&mut self, leaf: &mut FieldDescriptor) {
        if self.error.is_some() {
            return;
        }
        let (Some(name), Some(rules)) = (&leaf.name, &leaf.validation) else {
            return;
        };
        if rules.is_empty() {
            return;
        }

        let compiled = parse_name(name).and_then(|path| {
            RuleSet::compile(rules, name).map(|set| (path, set))
        });
        match compiled {
            Ok((path, set)) => {
                leaf.is_invalid = Some(inject(set, path, leaf.is_invalid.take()));
            }
            Err(err) => self.error = Some(err),
        }
    }
}
