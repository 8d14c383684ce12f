//! Internal-consistency validation of the node graph and both indices.
//! Used by tests and fuzzers after every mutation; not part of the API.

use crate::ost::NodeRef;
use crate::text::node::TextNodeId;
use crate::text::rga::{RgaTreeSplit, HEAD};

impl RgaTreeSplit {
    /// Panic on the first violated invariant. `deep` additionally validates
    /// the trees' own balance invariants and the floor identity on every key.
    pub(crate) fn dbg_check(&self, deep: bool) {
        let mut order: Vec<NodeRef> = Vec::new();
        let mut visible_len = 0usize;
        let mut prev = NodeRef::NONE;
        let mut cur = HEAD;

        while cur.exists() {
            assert!(order.len() < self.nodes.len(), "next chain has a cycle");
            let node = self.node(cur);
            assert_eq!(node.prev, prev, "prev link does not mirror next");

            order.push(cur);
            visible_len += node.len();

            // The ID index resolves every fragment to itself.
            assert_eq!(self.find_node(node.id), Some(cur), "floor identity broken");

            if node.id.offset() > 0 {
                let ins_prev = node.ins_prev;
                assert!(ins_prev.exists(), "fragment is missing ins_prev");
                let left = self.node(ins_prev);
                assert_eq!(left.id.created_at(), node.id.created_at());
                assert!(left.id.offset() < node.id.offset());
            }
            if node.ins_next.exists() {
                assert_eq!(
                    self.node(node.ins_next).ins_prev,
                    cur,
                    "ins chain is not doubly linked"
                );
            }
            if node.ins_prev.exists() {
                assert_eq!(
                    self.node(node.ins_prev).ins_next,
                    cur,
                    "ins chain is not doubly linked"
                );
            }
            if node.is_deleted() {
                assert_eq!(node.len(), 0, "tombstone still has visible length");
            }

            prev = cur;
            cur = node.next;
        }
        assert!(!self.node(HEAD).is_deleted(), "head sentinel was tombstoned");

        // All three views hold exactly the same node set, in the same order.
        assert_eq!(order.len(), self.nodes.len(), "unreachable nodes in arena");
        assert_eq!(self.by_id.len(), self.nodes.len(), "ID index out of sync");
        assert_eq!(
            self.by_index.in_order_values(),
            order,
            "splay order diverged from list order"
        );

        // The visible-length law: root weight == marshalled byte length.
        assert_eq!(self.by_index.total_len(), visible_len);
        assert_eq!(self.marshal().len(), visible_len);

        if deep {
            self.by_index.dbg_check();
            self.by_id.dbg_check();

            // Keys come back sorted, and floor is the identity on each.
            let mut last: Option<TextNodeId> = None;
            for (key, value) in self.by_id.iter() {
                if let Some(prev_key) = last {
                    assert!(prev_key < key, "ID index keys out of order");
                }
                assert_eq!(self.by_id.floor(&key), Some((key, value)));
                last = Some(key);
            }
        }
    }
}
