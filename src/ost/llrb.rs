//! Left-leaning red-black tree keyed by node ID. The one query the engine
//! needs beyond exact lookup is `floor`: the greatest key at or below a given
//! ID, which is how absolute positions are resolved to the fragment that
//! contains them.

use std::cmp::Ordering;

use super::NodeRef;
use crate::text::TextNodeId;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Idx(usize);

impl Idx {
    const NONE: Idx = Idx(usize::MAX);

    fn exists(self) -> bool {
        self.0 != usize::MAX
    }
}

#[derive(Debug, Clone)]
struct Entry {
    key: TextNodeId,
    value: NodeRef,
    left: Idx,
    right: Idx,
    red: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct IdTree {
    entries: Vec<Entry>,
    root: Idx,
}

impl Default for IdTree {
    fn default() -> Self {
        IdTree {
            entries: Vec::new(),
            root: Idx::NONE,
        }
    }
}

impl IdTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Idempotent insert: an equal key overwrites the value in place.
    pub fn put(&mut self, key: TextNodeId, value: NodeRef) {
        let root = self.put_at(self.root, key, value);
        self.root = root;
        self.entries[root.0].red = false;
    }

    fn put_at(&mut self, h: Idx, key: TextNodeId, value: NodeRef) -> Idx {
        if !h.exists() {
            let idx = Idx(self.entries.len());
            self.entries.push(Entry {
                key,
                value,
                left: Idx::NONE,
                right: Idx::NONE,
                red: true,
            });
            return idx;
        }

        match key.cmp(&self.entries[h.0].key) {
            Ordering::Less => {
                let left = self.put_at(self.entries[h.0].left, key, value);
                self.entries[h.0].left = left;
            }
            Ordering::Greater => {
                let right = self.put_at(self.entries[h.0].right, key, value);
                self.entries[h.0].right = right;
            }
            Ordering::Equal => {
                self.entries[h.0].value = value;
            }
        }

        let mut h = h;
        if self.is_red(self.right_of(h)) && !self.is_red(self.left_of(h)) {
            h = self.rotate_left(h);
        }
        if self.is_red(self.left_of(h)) && self.is_red(self.left_of(self.left_of(h))) {
            h = self.rotate_right(h);
        }
        if self.is_red(self.left_of(h)) && self.is_red(self.right_of(h)) {
            self.flip_colors(h);
        }
        h
    }

    /// The greatest entry with key <= `key`.
    pub fn floor(&self, key: &TextNodeId) -> Option<(TextNodeId, NodeRef)> {
        let mut best = Idx::NONE;
        let mut cur = self.root;
        while cur.exists() {
            let entry = &self.entries[cur.0];
            match key.cmp(&entry.key) {
                Ordering::Equal => return Some((entry.key, entry.value)),
                Ordering::Less => cur = entry.left,
                Ordering::Greater => {
                    best = cur;
                    cur = entry.right;
                }
            }
        }
        if best.exists() {
            let entry = &self.entries[best.0];
            Some((entry.key, entry.value))
        } else {
            None
        }
    }

    /// Exact lookup.
    pub fn get(&self, key: &TextNodeId) -> Option<NodeRef> {
        match self.floor(key) {
            Some((found, value)) if found == *key => Some(value),
            _ => None,
        }
    }

    /// Keys and values in ascending key order.
    pub fn iter(&self) -> InOrder<'_> {
        let mut iter = InOrder {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left_spine(self.root);
        iter
    }

    fn is_red(&self, idx: Idx) -> bool {
        idx.exists() && self.entries[idx.0].red
    }

    fn left_of(&self, idx: Idx) -> Idx {
        if idx.exists() {
            self.entries[idx.0].left
        } else {
            Idx::NONE
        }
    }

    fn right_of(&self, idx: Idx) -> Idx {
        if idx.exists() {
            self.entries[idx.0].right
        } else {
            Idx::NONE
        }
    }

    fn rotate_left(&mut self, h: Idx) -> Idx {
        let x = self.entries[h.0].right;
        debug_assert!(self.is_red(x));
        self.entries[h.0].right = self.entries[x.0].left;
        self.entries[x.0].left = h;
        self.entries[x.0].red = self.entries[h.0].red;
        self.entries[h.0].red = true;
        x
    }

    fn rotate_right(&mut self, h: Idx) -> Idx {
        let x = self.entries[h.0].left;
        debug_assert!(self.is_red(x));
        self.entries[h.0].left = self.entries[x.0].right;
        self.entries[x.0].right = h;
        self.entries[x.0].red = self.entries[h.0].red;
        self.entries[h.0].red = true;
        x
    }

    fn flip_colors(&mut self, h: Idx) {
        self.entries[h.0].red = true;
        let left = self.entries[h.0].left;
        let right = self.entries[h.0].right;
        self.entries[left.0].red = false;
        self.entries[right.0].red = false;
    }

    #[allow(unused)]
    pub fn dbg_check(&self) {
        if !self.root.exists() {
            return;
        }
        assert!(!self.entries[self.root.0].red, "root must be black");
        let mut last: Option<TextNodeId> = None;
        for (key, _) in self.iter() {
            if let Some(prev) = last {
                assert!(prev < key, "keys out of order");
            }
            last = Some(key);
        }
        self.check_at(self.root);
    }

    // Returns the black height; asserts the left-leaning RB invariants.
    #[allow(unused)]
    fn check_at(&self, h: Idx) -> usize {
        if !h.exists() {
            return 1;
        }
        let entry = &self.entries[h.0];
        assert!(!self.is_red(entry.right), "right-leaning red link");
        if entry.red {
            assert!(!self.is_red(entry.left), "two red links in a row");
        }
        let lh = self.check_at(entry.left);
        let rh = self.check_at(entry.right);
        assert_eq!(lh, rh, "black height mismatch");
        lh + usize::from(!entry.red)
    }
}

pub(crate) struct InOrder<'a> {
    tree: &'a IdTree,
    stack: Vec<Idx>,
}

impl InOrder<'_> {
    fn push_left_spine(&mut self, mut idx: Idx) {
        while idx.exists() {
            self.stack.push(idx);
            idx = self.tree.entries[idx.0].left;
        }
    }
}

impl Iterator for InOrder<'_> {
    type Item = (TextNodeId, NodeRef);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let entry = &self.tree.entries[idx.0];
        self.push_left_spine(entry.right);
        Some((entry.key, entry.value))
    }
}
