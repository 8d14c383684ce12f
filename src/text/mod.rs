//! The collaborative text type and its supporting node graph.

mod check;
mod node;
mod rga;

pub use node::{NodeRecord, TextNodeId, TextNodePos};
pub use rga::{NodeView, Nodes};

use std::collections::HashMap;

use crate::error::TextError;
use crate::ticket::{ActorId, Ticket};
use self::rga::RgaTreeSplit;

/// A collaborative plain-text sequence.
///
/// All mutation goes through [`edit`](Text::edit): one call deletes a range
/// and inserts new content atomically, under a single ticket. Concurrent
/// edits from other replicas may be applied in any order that respects
/// causality and every replica converges on the same string.
///
/// The owner must serialize access; the engine holds no locks and never
/// blocks.
#[derive(Debug, Clone)]
pub struct Text {
    rga: RgaTreeSplit,
    created_at: Ticket,
}

impl Text {
    pub fn new(created_at: Ticket) -> Self {
        Text {
            rga: RgaTreeSplit::new(),
            created_at,
        }
    }

    /// The ticket identifying this text object inside its document.
    pub fn created_at(&self) -> Ticket {
        self.created_at
    }

    /// Total visible length in bytes.
    pub fn len(&self) -> usize {
        self.rga.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a visible byte range to a pair of stable positions.
    pub fn find_boundary(
        &mut self,
        from: usize,
        to: usize,
    ) -> Result<(TextNodePos, TextNodePos), TextError> {
        self.rga.find_boundary(from, to)
    }

    /// Delete `[from, to)` and insert `content` in its place.
    ///
    /// `max_created_at_map` is the causal bound the edit's originator had
    /// observed per actor: `None` for a locally-executed edit (deletes
    /// unconditionally), otherwise nodes created after the bound survive.
    /// Returns the caret position after the edit and, per actor, the highest
    /// creation ticket among the nodes actually deleted - which becomes the
    /// causal bound when this edit is replayed elsewhere.
    pub fn edit(
        &mut self,
        from: TextNodePos,
        to: TextNodePos,
        max_created_at_map: Option<&HashMap<ActorId, Ticket>>,
        content: &str,
        edited_at: Ticket,
    ) -> Result<(TextNodePos, HashMap<ActorId, Ticket>), TextError> {
        let (caret, deleted) = self
            .rga
            .edit(from, to, max_created_at_map, content, edited_at)?;
        tracing::debug!(
            actor = %edited_at.actor(),
            lamport = edited_at.lamport(),
            inserted = content.len(),
            deleted_actors = deleted.len(),
            "applied edit"
        );
        Ok((caret, deleted))
    }

    /// Resolve integer offsets and apply a local edit in one step.
    pub fn edit_at(
        &mut self,
        from: usize,
        to: usize,
        content: &str,
        edited_at: Ticket,
    ) -> Result<(TextNodePos, HashMap<ActorId, Ticket>), TextError> {
        let (from_pos, to_pos) = self.find_boundary(from, to)?;
        self.edit(from_pos, to_pos, None, content, edited_at)
    }

    /// The visible string: live content in traversal order.
    pub fn marshal(&self) -> String {
        self.rga.marshal()
    }

    /// The nodes in traversal order, tombstones included.
    pub fn nodes(&self) -> Nodes<'_> {
        self.rga.iter()
    }

    /// Exact-ID lookup of a node, fragments included.
    pub fn find_node(&self, id: TextNodeId) -> Option<NodeView<'_>> {
        self.rga.find_node(id).map(|node| self.rga.view(node))
    }

    /// Debug rendering of the node graph: `[id value]` for live nodes,
    /// `{id value}` for tombstones.
    pub fn annotated_string(&self) -> String {
        self.rga.annotated_string()
    }

    /// An independent copy with the same traversal order, tombstones and
    /// fragment chains, carrying freshly built indices.
    pub fn deep_copy(&self) -> Text {
        // A coherent document always reconstructs from its own records.
        Text::from_records(self.created_at, self.nodes().map(|n| n.to_record())).unwrap()
    }

    /// Rebuild a text from persisted node records, which must be supplied in
    /// traversal order.
    pub fn from_records<I>(created_at: Ticket, records: I) -> Result<Text, TextError>
    where
        I: IntoIterator<Item = NodeRecord>,
    {
        Ok(Text {
            rga: RgaTreeSplit::from_records(records)?,
            created_at,
        })
    }

    /// Validate every internal invariant, panicking on the first violation.
    /// Exported for tests; not part of the API.
    pub fn dbg_check(&self, deep: bool) {
        self.rga.dbg_check(deep);
    }
}
