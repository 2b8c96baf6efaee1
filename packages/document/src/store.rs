//! # Document Store
//!
//! Owns the single [`FormDocument`] a form edits.
//!
//! Two ownership modes:
//!
//! - **Uncontrolled**: the store owns the data. Commits replace it directly.
//!   The host pushes whole replacement documents through a [`ChangeSender`],
//!   which the engine drains between ticks.
//! - **Controlled**: the host owns the data. Commits are applied
//!   optimistically and remembered as pending patches until the host hands
//!   back a document through [`DocumentStore::set_document`]. That call
//!   rebases: patches the host document already reflects are acknowledged,
//!   the rest are replayed on top of it.
//!
//! ```text
//! commit ──► change_object(next, invalid) ──► version + 1
//!                    │ (controlled)
//!                    └──► pending patch ──► set_document ──► ack | replay
//! ```

use crate::{path::kind_of, FieldPath, FormDocument, StoreError};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Field name → blocking validation message
pub type InvalidMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreMode {
    Controlled,
    #[default]
    Uncontrolled,
}

/// Commit written optimistically into a controlled document
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPatch {
    /// Opaque id of the committer (the engine uses the field's arena index)
    pub origin: usize,

    pub path: FieldPath,

    pub value: Value,

    /// Document version the commit produced
    pub version: u64,
}

/// Outcome of rebasing pending patches onto a host document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rebase {
    /// Origins whose patches the host document already contains
    pub acknowledged: Vec<usize>,

    /// Origins whose patches were replayed on top of the host document
    pub replayed: Vec<usize>,

    /// Origins whose patches no longer bind against the host document
    pub dropped: Vec<usize>,

    /// Version after the rebase
    pub version: u64,
}

/// Handle for pushing replacement documents into an uncontrolled store
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: UnboundedSender<Value>,
}

impl ChangeSender {
    pub fn send(&self, document: Value) -> Result<(), StoreError> {
        self.tx
            .unbounded_send(document)
            .map_err(|_| StoreError::ChannelClosed)
    }
}

#[derive(Debug)]
pub struct DocumentStore {
    mode: StoreMode,
    document: FormDocument,
    invalid: InvalidMap,
    pending: Vec<PendingPatch>,
    changes_tx: UnboundedSender<Value>,
    changes_rx: UnboundedReceiver<Value>,
}

impl DocumentStore {
    pub fn new(mode: StoreMode, initial: Value) -> Result<Self, StoreError> {
        ensure_object(&initial)?;
        let (changes_tx, changes_rx) = mpsc::unbounded();

        Ok(Self {
            mode,
            document: FormDocument::new(initial),
            invalid: InvalidMap::new(),
            pending: Vec::new(),
            changes_tx,
            changes_rx,
        })
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn document(&self) -> &FormDocument {
        &self.document
    }

    pub fn version(&self) -> u64 {
        self.document.version()
    }

    pub fn invalid_map(&self) -> &InvalidMap {
        &self.invalid
    }

    pub fn pending_patches(&self) -> &[PendingPatch] {
        &self.pending
    }

    /// Whether a committer still has an unacknowledged patch
    pub fn is_pending(&self, origin: usize) -> bool {
        self.pending.iter().any(|p| p.origin == origin)
    }

    /// Store boundary: adopt `next` as the new document version.
    ///
    /// `patch` names the single write that produced `next`; controlled
    /// stores keep it until the host acknowledges it.
    pub fn change_object(
        &mut self,
        next: Value,
        invalid: InvalidMap,
        patch: Option<(usize, FieldPath, Value)>,
    ) -> u64 {
        let version = self.document.replace(next);
        self.invalid = invalid;

        if let (StoreMode::Controlled, Some((origin, path, value))) = (self.mode, patch) {
            debug!(origin, path = %path, version, "Recording pending patch");
            self.pending.push(PendingPatch {
                origin,
                path,
                value,
                version,
            });
        }

        version
    }

    /// Record validation state without producing a new document version
    pub fn set_invalid_map(&mut self, invalid: InvalidMap) {
        self.invalid = invalid;
    }

    /// Host hands back its document (controlled mode only)
    pub fn set_document(&mut self, host: Value) -> Result<Rebase, StoreError> {
        if self.mode == StoreMode::Uncontrolled {
            return Err(StoreError::Uncontrolled);
        }
        ensure_object(&host)?;

        let pending = std::mem::take(&mut self.pending);
        let mut working = host;
        let mut rebase = Rebase::default();

        for patch in pending {
            if patch.path.get(&working) == Some(&patch.value) {
                rebase.acknowledged.push(patch.origin);
                continue;
            }
            match patch.path.assign(&mut working, patch.value.clone()) {
                Ok(()) => {
                    rebase.replayed.push(patch.origin);
                    self.pending.push(patch);
                }
                Err(err) => {
                    debug!(origin = patch.origin, error = %err, "Dropping pending patch");
                    rebase.dropped.push(patch.origin);
                }
            }
        }

        rebase.version = if self.document == working {
            self.document.version()
        } else {
            self.document.replace(working)
        };

        Ok(rebase)
    }

    /// Sender for pushing external documents (uncontrolled mode only)
    pub fn change_sender(&self) -> Result<ChangeSender, StoreError> {
        match self.mode {
            StoreMode::Uncontrolled => Ok(ChangeSender {
                tx: self.changes_tx.clone(),
            }),
            StoreMode::Controlled => Err(StoreError::Controlled),
        }
    }

    /// Apply every document waiting on the change channel.
    ///
    /// Returns how many replacements produced a new version. Non-object
    /// documents are skipped.
    pub fn drain_changes(&mut self) -> usize {
        let mut applied = 0;

        while let Ok(Some(next)) = self.changes_rx.try_next() {
            if let Err(err) = ensure_object(&next) {
                debug!(error = %err, "Ignoring external document");
                continue;
            }
            if self.document == next {
                continue;
            }
            self.document.replace(next);
            applied += 1;
        }

        applied
    }
}

fn ensure_object(value: &Value) -> Result<(), StoreError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotAnObject(kind_of(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            DocumentStore::new(StoreMode::Uncontrolled, json!([1])),
            Err(StoreError::NotAnObject("an array"))
        ));
    }

    #[test]
    fn test_change_object_bumps_version() {
        let mut store = DocumentStore::new(StoreMode::Uncontrolled, json!({"a": 1})).unwrap();
        let v = store.change_object(json!({"a": 2}), InvalidMap::new(), None);
        assert_eq!(v, 1);
        assert_eq!(store.document().data(), &json!({"a": 2}));
        assert!(store.pending_patches().is_empty());
    }

    #[test]
    fn test_uncontrolled_rejects_set_document() {
        let mut store = DocumentStore::new(StoreMode::Uncontrolled, json!({})).unwrap();
        assert!(matches!(
            store.set_document(json!({})),
            Err(StoreError::Uncontrolled)
        ));
    }

    #[test]
    fn test_controlled_rejects_change_sender() {
        let store = DocumentStore::new(StoreMode::Controlled, json!({})).unwrap();
        assert!(matches!(store.change_sender(), Err(StoreError::Controlled)));
    }

    #[test]
    fn test_rebase_acknowledges_and_replays() {
        let mut store =
            DocumentStore::new(StoreMode::Controlled, json!({"a": "", "b": ""})).unwrap();

        store.change_object(
            json!({"a": "x", "b": ""}),
            InvalidMap::new(),
            Some((1, path("a"), json!("x"))),
        );
        store.change_object(
            json!({"a": "x", "b": "y"}),
            InvalidMap::new(),
            Some((2, path("b"), json!("y"))),
        );
        assert!(store.is_pending(1));
        assert!(store.is_pending(2));

        // Host has seen the first commit only
        let rebase = store.set_document(json!({"a": "x", "b": ""})).unwrap();
        assert_eq!(rebase.acknowledged, vec![1]);
        assert_eq!(rebase.replayed, vec![2]);
        assert!(!store.is_pending(1));
        assert!(store.is_pending(2));
        assert_eq!(store.document().data(), &json!({"a": "x", "b": "y"}));
        // Same data as before the rebase: no new version
        assert_eq!(rebase.version, 2);
    }

    #[test]
    fn test_rebase_drops_unbindable_patch() {
        let mut store = DocumentStore::new(StoreMode::Controlled, json!({"a": {}})).unwrap();
        store.change_object(
            json!({"a": {"b": 1}}),
            InvalidMap::new(),
            Some((7, path("a.b"), json!(1))),
        );

        let rebase = store.set_document(json!({"a": 5})).unwrap();
        assert_eq!(rebase.dropped, vec![7]);
        assert_eq!(store.document().data(), &json!({"a": 5}));
        assert_eq!(rebase.version, 2);
    }

    #[test]
    fn test_drain_changes_applies_external_documents() {
        let mut store = DocumentStore::new(StoreMode::Uncontrolled, json!({"a": 1})).unwrap();
        let sender = store.change_sender().unwrap();

        sender.send(json!({"a": 1})).unwrap();
        sender.send(json!("not an object")).unwrap();
        sender.send(json!({"a": 3})).unwrap();

        assert_eq!(store.drain_changes(), 1);
        assert_eq!(store.version(), 1);
        assert_eq!(store.document().data(), &json!({"a": 3}));
        assert_eq!(store.drain_changes(), 0);
    }
}
