//! The DOM Data Store (C2, spec §4.2): side-band `data-parsoid`/`data-mw`
//! bookkeeping and diff marks, keyed indirectly through a node's process id
//! rather than embedded on the node itself.
//!
//! Keeping this data out-of-line mirrors the "DOM nodes refer to side-band
//! data indirectly via node IDs; the store holds the data" design note: it
//! lets a node be cloned/moved/diffed without carrying a borrow into its own
//! bookkeeping, and it gives serialization a single place (`store_data_attribs`)
//! to flush everything back onto the attribute list before emission.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::data_mw::DataMw;
use crate::dom::Handle;
use crate::env::Env;
use crate::parsoid_data::DataParsoid;

/// A DOM diff mark (spec §3.4): records how a subtree differs from a
/// previous version of the same document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DiffMark {
    /// The node itself is new.
    Inserted,
    /// The node was removed; only meaningful on the synthetic
    /// `mw:DiffMarker/deleted` meta the differ inserts in its place.
    Deleted,
    /// The node's child list changed (nodes added, removed, or reordered),
    /// but the node itself is unchanged.
    ChildrenChanged,
    /// Some descendant changed, but this node's own attributes and
    /// immediate children are unchanged.
    SubtreeChanged,
    /// This node is an encapsulation wrapper whose content changed in a way
    /// that could not be attributed to a specific child (spec §4.3's
    /// "opaque" wrapper case).
    ModifiedWrapper,
}

/// The per-node record the store holds (spec §4.2).
#[derive(Clone, Debug, Default)]
pub struct NodeData {
    /// The node's `data-parsoid` bookkeeping.
    pub parsoid: DataParsoid,
    /// The node's `data-mw` payload, if it is an encapsulation wrapper.
    pub mw: Option<DataMw>,
    /// Diff marks accumulated for this node.
    pub diff: HashSet<DiffMark>,
}

/// The DOM Data Store: one per document, holding every node's side-band data
/// for the lifetime of that document.
#[derive(Default)]
pub struct DomDataStore {
    data: RefCell<HashMap<u64, NodeData>>,
}

impl DomDataStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of `node`'s full data record, assigning it an id from
    /// `env` if it doesn't have one yet.
    #[must_use]
    pub fn get_node_data(&self, node: &Handle, env: &dyn Env) -> NodeData {
        let id = node.ensure_id(env);
        self.data.borrow().get(&id).cloned().unwrap_or_default()
    }

    /// Replaces `node`'s full data record.
    pub fn set_node_data(&self, node: &Handle, env: &dyn Env, data: NodeData) {
        let id = node.ensure_id(env);
        self.data.borrow_mut().insert(id, data);
    }

    /// Returns a clone of `node`'s `data-parsoid` bookkeeping, or the default
    /// if none has been loaded.
    #[must_use]
    pub fn data_parsoid(&self, node: &Handle, env: &dyn Env) -> DataParsoid {
        self.get_node_data(node, env).parsoid
    }

    /// Replaces `node`'s `data-parsoid` bookkeeping.
    pub fn set_data_parsoid(&self, node: &Handle, env: &dyn Env, dp: DataParsoid) {
        let id = node.ensure_id(env);
        self.data.borrow_mut().entry(id).or_default().parsoid = dp;
    }

    /// Returns a clone of `node`'s `data-mw` payload, if any.
    #[must_use]
    pub fn data_mw(&self, node: &Handle, env: &dyn Env) -> Option<DataMw> {
        self.get_node_data(node, env).mw
    }

    /// Replaces `node`'s `data-mw` payload.
    pub fn set_data_mw(&self, node: &Handle, env: &dyn Env, mw: Option<DataMw>) {
        let id = node.ensure_id(env);
        self.data.borrow_mut().entry(id).or_default().mw = mw;
    }

    /// Returns a clone of `node`'s accumulated diff marks.
    #[must_use]
    pub fn diff_marks(&self, node: &Handle, env: &dyn Env) -> HashSet<DiffMark> {
        self.get_node_data(node, env).diff
    }

    /// Adds a diff mark to `node`'s record.
    pub fn add_diff_mark(&self, node: &Handle, env: &dyn Env, mark: DiffMark) {
        let id = node.ensure_id(env);
        self.data.borrow_mut().entry(id).or_default().diff.insert(mark);
    }

    /// Returns true if `node` carries `mark`.
    #[must_use]
    pub fn has_diff_mark(&self, node: &Handle, env: &dyn Env, mark: DiffMark) -> bool {
        self.diff_marks(node, env).contains(&mark)
    }

    /// Reads `node`'s `data-parsoid`/`data-mw` attributes, if present, parses
    /// them into the store, and strips them from the node's attribute list.
    /// The counterpart of [`Self::store_data_attribs`], run once per node
    /// when a document is loaded from serialized HTML (spec §4.2).
    pub fn load_data_attribs(&self, node: &Handle, env: &dyn Env) -> crate::error::Result<()> {
        let mut data = NodeData::default();
        if let Some(raw) = node.remove_attr("data-parsoid") {
            data.parsoid = serde_json::from_str(&raw)
                .map_err(|e| crate::error::Error::Malformed(format!("data-parsoid: {e}")))?;
        }
        if let Some(raw) = node.remove_attr("data-mw") {
            data.mw = Some(
                serde_json::from_str(&raw)
                    .map_err(|e| crate::error::Error::Malformed(format!("data-mw: {e}")))?,
            );
        }
        let id = node.ensure_id(env);
        self.data.borrow_mut().insert(id, data);
        Ok(())
    }

    /// Serializes `node`'s `data-parsoid`/`data-mw` record back onto its
    /// attribute list, ready for the XML/HTML5 serializer (C1). `tmp` is
    /// dropped from `data-parsoid` on the way out (SPEC_FULL §B): it is
    /// parser-internal scratch that never survives a round trip.
    pub fn store_data_attribs(&self, node: &Handle, env: &dyn Env) -> crate::error::Result<()> {
        let data = self.get_node_data(node, env);
        let dp = data.parsoid.without_tmp();
        if dp != DataParsoid::default() {
            let raw = serde_json::to_string(&dp)
                .map_err(|e| crate::error::Error::Malformed(format!("data-parsoid: {e}")))?;
            node.set_attr("data-parsoid", raw);
        }
        if let Some(mw) = &data.mw {
            let raw = serde_json::to_string(mw)
                .map_err(|e| crate::error::Error::Malformed(format!("data-mw: {e}")))?;
            node.set_attr("data-mw", raw);
        }
        Ok(())
    }
}
