//! Order-statistics splay tree: maps a visible byte offset to the node that
//! contains it. Each entry carries its own visible length plus the weight
//! (total length) of its subtree.
//!
//! Entries live in an arena and are never freed; a tombstoned node simply has
//! its length set to zero, which makes offset lookups pass straight through
//! it.

use super::{NodeRef, SplayIdx};

#[derive(Debug, Clone)]
struct Entry {
    value: NodeRef,
    len: usize,
    weight: usize,
    parent: SplayIdx,
    left: SplayIdx,
    right: SplayIdx,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SplayTree {
    entries: Vec<Entry>,
    root: SplayIdx,
}

impl SplayTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached entry. It takes part in lookups only once linked in
    /// with `insert` / `insert_after`.
    pub fn alloc(&mut self, value: NodeRef, len: usize) -> SplayIdx {
        let idx = SplayIdx(self.entries.len());
        self.entries.push(Entry {
            value,
            len,
            weight: len,
            parent: SplayIdx::NONE,
            left: SplayIdx::NONE,
            right: SplayIdx::NONE,
        });
        idx
    }

    pub fn total_len(&self) -> usize {
        self.weight(self.root)
    }

    pub fn insert(&mut self, node: SplayIdx) {
        if self.root.exists() {
            let root = self.root;
            self.insert_after(root, node);
        } else {
            self.root = node;
        }
    }

    /// Link `node` immediately after `prev` in traversal order. `prev` is
    /// splayed to the root first; `node` ends up as the new root.
    pub fn insert_after(&mut self, prev: SplayIdx, node: SplayIdx) {
        self.splay(prev);

        let prev_right = self.entries[prev.0].right;
        self.entries[node.0].left = prev;
        self.entries[node.0].right = prev_right;
        self.entries[node.0].parent = SplayIdx::NONE;
        self.entries[prev.0].parent = node;
        self.entries[prev.0].right = SplayIdx::NONE;
        if prev_right.exists() {
            self.entries[prev_right.0].parent = node;
        }
        self.root = node;

        self.update_weight(prev);
        self.update_weight(node);
    }

    /// Change an entry's own length (after a split or a tombstone) and repair
    /// the weights on the path to the root.
    pub fn set_len(&mut self, node: SplayIdx, len: usize) {
        self.entries[node.0].len = len;
        let mut cur = node;
        while cur.exists() {
            self.update_weight(cur);
            cur = self.entries[cur.0].parent;
        }
    }

    /// Resolve a visible offset to `(node, remainder)`.
    ///
    /// Boundaries anchor to the end of the left neighbour: a lookup at the
    /// total length returns the last entry with `remainder == len`. Where
    /// zero-length entries pile up at one offset, the leftmost candidate
    /// wins, so positions captured inside a tombstone run re-anchor in front
    /// of it. The found entry is splayed to the root.
    pub fn find(&mut self, index: usize) -> Option<(NodeRef, usize)> {
        if !self.root.exists() || index > self.total_len() {
            return None;
        }

        let mut node = self.root;
        let mut offset = index;
        loop {
            let left = self.entries[node.0].left;
            let right = self.entries[node.0].right;
            let len = self.entries[node.0].len;

            if left.exists() && offset <= self.weight(left) {
                node = left;
            } else if right.exists() && self.weight(left) + len < offset {
                offset -= self.weight(left) + len;
                node = right;
            } else {
                offset -= self.weight(left);
                break;
            }
        }

        if offset > self.entries[node.0].len {
            return None;
        }

        self.splay(node);
        Some((self.entries[node.0].value, offset))
    }

    pub fn splay(&mut self, node: SplayIdx) {
        loop {
            let parent = self.entries[node.0].parent;
            if !parent.exists() {
                return;
            }
            let grand = self.entries[parent.0].parent;
            if !grand.exists() {
                self.rotate_up(node);
            } else if self.is_left(parent, grand) == self.is_left(node, parent) {
                self.rotate_up(parent);
                self.rotate_up(node);
            } else {
                self.rotate_up(node);
                self.rotate_up(node);
            }
        }
    }

    fn weight(&self, idx: SplayIdx) -> usize {
        if idx.exists() {
            self.entries[idx.0].weight
        } else {
            0
        }
    }

    fn update_weight(&mut self, idx: SplayIdx) {
        let left = self.entries[idx.0].left;
        let right = self.entries[idx.0].right;
        self.entries[idx.0].weight =
            self.entries[idx.0].len + self.weight(left) + self.weight(right);
    }

    fn is_left(&self, child: SplayIdx, parent: SplayIdx) -> bool {
        self.entries[parent.0].left == child
    }

    /// Rotate `x` above its parent, keeping weights correct.
    fn rotate_up(&mut self, x: SplayIdx) {
        let p = self.entries[x.0].parent;
        debug_assert!(p.exists());
        let g = self.entries[p.0].parent;

        if self.is_left(x, p) {
            let b = self.entries[x.0].right;
            self.entries[p.0].left = b;
            if b.exists() {
                self.entries[b.0].parent = p;
            }
            self.entries[x.0].right = p;
        } else {
            let b = self.entries[x.0].left;
            self.entries[p.0].right = b;
            if b.exists() {
                self.entries[b.0].parent = p;
            }
            self.entries[x.0].left = p;
        }
        self.entries[p.0].parent = x;
        self.entries[x.0].parent = g;
        if g.exists() {
            if self.entries[g.0].left == p {
                self.entries[g.0].left = x;
            } else {
                self.entries[g.0].right = x;
            }
        } else {
            self.root = x;
        }

        self.update_weight(p);
        self.update_weight(x);
    }

    /// Linked entries in traversal order. Used by the consistency checker.
    pub fn in_order_values(&self) -> Vec<NodeRef> {
        let mut out = Vec::with_capacity(self.entries.len());
        let mut stack = Vec::new();
        let mut cur = self.root;
        while cur.exists() || !stack.is_empty() {
            while cur.exists() {
                stack.push(cur);
                cur = self.entries[cur.0].left;
            }
            let idx = stack.pop().unwrap();
            out.push(self.entries[idx.0].value);
            cur = self.entries[idx.0].right;
        }
        out
    }

    #[allow(unused)]
    pub fn dbg_check(&self) {
        if !self.root.exists() {
            return;
        }
        assert!(!self.entries[self.root.0].parent.exists());

        let mut stack = vec![self.root];
        let mut visited = 0usize;
        while let Some(idx) = stack.pop() {
            visited += 1;
            let e = &self.entries[idx.0];
            let mut expect = e.len;
            for child in [e.left, e.right] {
                if child.exists() {
                    assert_eq!(self.entries[child.0].parent, idx);
                    expect += self.entries[child.0].weight;
                    stack.push(child);
                }
            }
            assert_eq!(e.weight, expect, "subtree weight out of date");
        }
        // Every allocated entry must be linked into the tree.
        assert_eq!(visited, self.entries.len());
    }
}
