use std::fmt;

use smartstring::alias::String as SmartString;

use crate::ost::{NodeRef, SplayIdx};
use crate::ticket::Ticket;

/// Identifies one text node: the ticket of the edit that created it, plus a
/// byte offset into that original insert. Offsets other than zero only ever
/// come from splits; the fragments of one insert all share its ticket.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextNodeId {
    created_at: Ticket,
    offset: u32,
}

impl TextNodeId {
    pub const fn new(created_at: Ticket, offset: u32) -> Self {
        TextNodeId { created_at, offset }
    }

    pub(crate) const fn initial() -> Self {
        TextNodeId::new(Ticket::INITIAL, 0)
    }

    pub fn created_at(&self) -> Ticket {
        self.created_at
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The ID a fragment gets when this node is cut at `offset`.
    pub(crate) fn split(&self, offset: u32) -> TextNodeId {
        TextNodeId::new(self.created_at, self.offset + offset)
    }
}

impl fmt::Display for TextNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.created_at, self.offset)
    }
}

impl fmt::Debug for TextNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextNodeId({})", self)
    }
}

/// A character boundary inside the document, named relative to a node that
/// existed when the position was captured. Stable under later splits: the
/// absolute ID `(id.created_at, id.offset + relative_offset)` is re-resolved
/// against whatever fragments exist at use time.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextNodePos {
    id: TextNodeId,
    relative_offset: u32,
}

impl TextNodePos {
    pub const fn new(id: TextNodeId, relative_offset: u32) -> Self {
        TextNodePos {
            id,
            relative_offset,
        }
    }

    pub fn id(&self) -> TextNodeId {
        self.id
    }

    pub fn relative_offset(&self) -> u32 {
        self.relative_offset
    }

    pub(crate) fn absolute_id(&self) -> TextNodeId {
        TextNodeId::new(self.id.created_at(), self.id.offset() + self.relative_offset)
    }
}

impl fmt::Display for TextNodePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.relative_offset)
    }
}

impl fmt::Debug for TextNodePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextNodePos({})", self)
    }
}

/// One run of text in the arena. Tombstoned nodes keep their content and all
/// their links; only `deleted_at` changes.
#[derive(Debug, Clone)]
pub(crate) struct TextNode {
    pub id: TextNodeId,
    pub value: SmartString,
    pub deleted_at: Option<Ticket>,

    /// This node's entry in the splay index.
    pub index_node: SplayIdx,

    // Traversal order.
    pub prev: NodeRef,
    pub next: NodeRef,
    // Insertion-history order: the fragment chain of one original insert.
    pub ins_prev: NodeRef,
    pub ins_next: NodeRef,
}

impl TextNode {
    pub fn new(id: TextNodeId, value: SmartString) -> Self {
        TextNode {
            id,
            value,
            deleted_at: None,
            index_node: SplayIdx::NONE,
            prev: NodeRef::NONE,
            next: NodeRef::NONE,
            ins_prev: NodeRef::NONE,
            ins_next: NodeRef::NONE,
        }
    }

    pub fn content_len(&self) -> usize {
        self.value.len()
    }

    /// Visible length: zero once tombstoned.
    pub fn len(&self) -> usize {
        if self.deleted_at.is_some() {
            0
        } else {
            self.content_len()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn created_at(&self) -> Ticket {
        self.id.created_at()
    }
}

/// Persistence view of one node: everything a store needs to reconstruct the
/// node graph, in traversal order, via [`Text::from_records`].
///
/// [`Text::from_records`]: crate::Text::from_records
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRecord {
    pub id: TextNodeId,
    pub content: SmartString,
    pub deleted_at: Option<Ticket>,
    pub ins_prev_id: Option<TextNodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::ActorId;

    fn ticket(lamport: u64, actor: u8) -> Ticket {
        Ticket::new(lamport, 0, ActorId::from_bytes([actor; 12]))
    }

    #[test]
    fn id_orders_by_ticket_then_offset() {
        let a = TextNodeId::new(ticket(1, 1), 0);
        let b = TextNodeId::new(ticket(1, 1), 3);
        let c = TextNodeId::new(ticket(2, 1), 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn absolute_id_adds_offsets() {
        let pos = TextNodePos::new(TextNodeId::new(ticket(4, 2), 3), 2);
        assert_eq!(pos.absolute_id(), TextNodeId::new(ticket(4, 2), 5));
    }

    #[test]
    fn tombstone_has_no_visible_length() {
        let mut node = TextNode::new(TextNodeId::initial(), "abc".into());
        assert_eq!(node.len(), 3);
        node.deleted_at = Some(ticket(1, 1));
        assert_eq!(node.len(), 0);
        assert_eq!(node.content_len(), 3);
    }
}
