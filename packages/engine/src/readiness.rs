//! # Readiness
//!
//! Counts down until every initially visible stateful field has resolved
//! its first value.
//!
//! Each layout waits for its stateful children and child layouts (its
//! `ready_quota`). A stateful leaf reports once; a layout reports to its
//! own parent when its counter reaches zero. Layouts with nothing stateful
//! below them report themselves on mount. The root fires exactly once.
//!
//! ```text
//! root (quota 2) ◄── group (quota 2) ◄── email
//!       ▲                     ◄── agree
//!       └── name
//! ```

use formloom_descriptor::{CompiledForm, NodeId};
use tracing::{debug, info};

#[derive(Debug)]
pub struct ReadinessCoordinator {
    remaining: Vec<usize>,
    reported: Vec<bool>,
    root_remaining: usize,
    fired: bool,
}

impl ReadinessCoordinator {
    pub fn new(form: &CompiledForm) -> Self {
        Self {
            remaining: form.nodes().iter().map(|node| node.ready_quota).collect(),
            reported: vec![false; form.len()],
            root_remaining: form.root_quota(),
            fired: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.fired
    }

    pub fn remaining(&self) -> usize {
        self.root_remaining
    }

    /// Report every self-reporting layout. Returns true if the root fired.
    pub fn mount(&mut self, form: &CompiledForm) -> bool {
        let mut fired = false;

        // Children before parents
        for node in form.nodes().iter().rev() {
            if node.is_layout() && node.self_reporting {
                self.remaining[node.id.index()] = 0;
                fired |= self.report(form, node.id);
            }
        }

        if form.root_self_reporting() && !self.fired {
            self.root_remaining = 0;
            fired |= self.fire();
        }

        fired
    }

    /// Report one node as resolved. Returns true when this report made
    /// the whole form ready.
    pub fn report(&mut self, form: &CompiledForm, id: NodeId) -> bool {
        let Some(node) = form.get(id) else {
            return false;
        };
        if !(node.is_layout() || node.is_stateful()) || self.reported[id.index()] {
            return false;
        }
        self.reported[id.index()] = true;

        match node.parent {
            Some(parent) => {
                let counter = &mut self.remaining[parent.index()];
                *counter = counter.saturating_sub(1);
                if *counter == 0 {
                    debug!(layout = %parent, "Layout ready");
                    self.report(form, parent)
                } else {
                    false
                }
            }
            None => {
                self.root_remaining = self.root_remaining.saturating_sub(1);
                if self.root_remaining == 0 {
                    self.fire()
                } else {
                    false
                }
            }
        }
    }

    fn fire(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        info!("Form ready");
        true
    }
}
