//! Arena B-tree keyed by timestamp
//!
//! Classic top-down B-tree: full nodes are split on the way down, so an
//! insert never has to walk back up. Values live in leaves only; internal
//! nodes carry separator keys.
//!
//! When a leaf splits, its median key is copied up as the separator and the
//! median entry stays as the last entry of the left leaf. Every separator is
//! therefore the largest key of its left subtree.

use crate::error::{ResourceError, Result};

/// Maximum children per internal node
pub const ORDER: usize = 64;

/// Maximum keys per node
pub const MAX_KEYS: usize = ORDER - 1;

/// Minimum keys per non-root node
pub const MIN_KEYS: usize = 30;

type NodeId = usize;

/// A (timestamp, row offset) pair stored in a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub key: i64,
    pub value: u64,
}

#[derive(Debug)]
struct Node {
    keys: Vec<i64>,
    /// Back-reference for traversal; never used for cleanup
    parent: Option<NodeId>,
    kind: NodeKind,
}

#[derive(Debug)]
enum NodeKind {
    Leaf { values: Vec<u64> },
    Internal { children: Vec<NodeId> },
}

impl Node {
    fn is_full(&self) -> bool {
        self.keys.len() >= MAX_KEYS
    }
}

/// In-memory B-tree from timestamp to row offset
#[derive(Debug, Default)]
pub struct BTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    len: usize,
}

impl BTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree by inserting every entry in order
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, u64)>,
    {
        let mut tree = Self::new();
        for (key, value) in entries {
            tree.insert(key, value)?;
        }
        Ok(tree)
    }

    /// Number of entries stored in leaves
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, 0 for an empty tree
    pub fn height(&self) -> usize {
        let Some(mut node) = self.root else {
            return 0;
        };
        let mut height = 1;
        while let NodeKind::Internal { children } = &self.nodes[node].kind {
            node = children[0];
            height += 1;
        }
        height
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert a (key, value) pair.
    ///
    /// A full root is split first, growing the tree by one level; then the
    /// descent splits every full child before entering it. Duplicate keys are
    /// kept as separate entries. Fails only when a node cannot be allocated.
    pub fn insert(&mut self, key: i64, value: u64) -> Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => {
                let leaf = self.alloc_node(None, true)?;
                self.root = Some(leaf);
                leaf
            }
        };

        let mut node = if self.nodes[root].is_full() {
            let new_root = self.alloc_node(None, false)?;
            if let NodeKind::Internal { children } = &mut self.nodes[new_root].kind {
                children.push(root);
            }
            self.nodes[root].parent = Some(new_root);
            self.split_child(new_root, 0)?;
            self.root = Some(new_root);
            new_root
        } else {
            root
        };

        loop {
            let mut idx = self.nodes[node].keys.partition_point(|&k| k < key);

            let child = match &self.nodes[node].kind {
                NodeKind::Leaf { .. } => None,
                NodeKind::Internal { children } => Some(children[idx]),
            };
            let Some(child) = child else {
                self.insert_into_leaf(node, key, value);
                return Ok(());
            };

            node = if self.nodes[child].is_full() {
                self.split_child(node, idx)?;
                if key > self.nodes[node].keys[idx] {
                    idx += 1;
                }
                self.child_at(node, idx)
            } else {
                child
            };
        }
    }

    /// Shifted insertion at the binary-search position
    fn insert_into_leaf(&mut self, leaf: NodeId, key: i64, value: u64) {
        let node = &mut self.nodes[leaf];
        let pos = node.keys.partition_point(|&k| k <= key);
        node.keys.insert(pos, key);
        if let NodeKind::Leaf { values } = &mut node.kind {
            values.insert(pos, value);
        }
        self.len += 1;
    }

    /// Split the full child at `idx` of `parent`, inserting the separator
    /// into `parent` (which must have room).
    fn split_child(&mut self, parent: NodeId, idx: usize) -> Result<()> {
        let child = self.child_at(parent, idx);
        let mid = MAX_KEYS / 2;
        let is_leaf = matches!(self.nodes[child].kind, NodeKind::Leaf { .. });

        let sibling = self.alloc_node(Some(parent), is_leaf)?;

        let separator = self.nodes[child].keys[mid];
        let (left, right) = pair_mut(&mut self.nodes, child, sibling);

        let mut moved_children = Vec::new();
        match (&mut left.kind, &mut right.kind) {
            (NodeKind::Leaf { values: lv }, NodeKind::Leaf { values: rv }) => {
                // Median stays on the left; separator is a copy
                right.keys.extend_from_slice(&left.keys[mid + 1..]);
                rv.extend_from_slice(&lv[mid + 1..]);
                left.keys.truncate(mid + 1);
                lv.truncate(mid + 1);
            }
            (NodeKind::Internal { children: lc }, NodeKind::Internal { children: rc }) => {
                // Median moves up
                right.keys.extend_from_slice(&left.keys[mid + 1..]);
                rc.extend_from_slice(&lc[mid + 1..]);
                left.keys.truncate(mid);
                lc.truncate(mid + 1);
                moved_children.extend_from_slice(rc);
            }
            _ => unreachable!("sibling allocated with the child's kind"),
        }

        for grandchild in moved_children {
            self.nodes[grandchild].parent = Some(sibling);
        }

        let parent_node = &mut self.nodes[parent];
        parent_node.keys.insert(idx, separator);
        if let NodeKind::Internal { children } = &mut parent_node.kind {
            children.insert(idx + 1, sibling);
        }

        Ok(())
    }

    fn alloc_node(&mut self, parent: Option<NodeId>, leaf: bool) -> Result<NodeId> {
        let oom = |_| ResourceError::OutOfMemory("btree node");

        self.nodes.try_reserve(1).map_err(oom)?;

        let mut keys = Vec::new();
        keys.try_reserve_exact(MAX_KEYS + 1).map_err(oom)?;

        let kind = if leaf {
            let mut values = Vec::new();
            values.try_reserve_exact(MAX_KEYS + 1).map_err(oom)?;
            NodeKind::Leaf { values }
        } else {
            let mut children = Vec::new();
            children.try_reserve_exact(ORDER + 1).map_err(oom)?;
            NodeKind::Internal { children }
        };

        self.nodes.push(Node { keys, parent, kind });
        Ok(self.nodes.len() - 1)
    }

    fn child_at(&self, node: NodeId, idx: usize) -> NodeId {
        match &self.nodes[node].kind {
            NodeKind::Internal { children } => children[idx],
            NodeKind::Leaf { .. } => unreachable!("leaf has no children"),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Look up the value stored for `key`.
    ///
    /// A hit on an internal separator answers with the last entry of the
    /// predecessor leaf (the rightmost leaf of the separator's left subtree).
    pub fn search(&self, key: i64) -> Option<u64> {
        let mut node = self.root?;
        loop {
            let n = &self.nodes[node];
            match (n.keys.binary_search(&key), &n.kind) {
                (Ok(i), NodeKind::Leaf { values }) => return Some(values[i]),
                (Err(_), NodeKind::Leaf { .. }) => return None,
                (Ok(i), NodeKind::Internal { children }) => {
                    return self.last_value_in(children[i]);
                }
                (Err(i), NodeKind::Internal { children }) => node = children[i],
            }
        }
    }

    /// All leaf entries with `start <= key <= end`, in ascending key order
    pub fn range_query(&self, start: i64, end: i64) -> Vec<IndexEntry> {
        let mut out = Vec::new();
        if start > end {
            return out;
        }
        if let Some(root) = self.root {
            self.collect_range(root, start, end, &mut out);
        }
        out
    }

    fn collect_range(&self, node: NodeId, start: i64, end: i64, out: &mut Vec<IndexEntry>) {
        let n = &self.nodes[node];
        let first = n.keys.partition_point(|&k| k < start);

        match &n.kind {
            NodeKind::Leaf { values } => {
                for i in first..n.keys.len() {
                    if n.keys[i] > end {
                        break;
                    }
                    out.push(IndexEntry {
                        key: n.keys[i],
                        value: values[i],
                    });
                }
            }
            NodeKind::Internal { children } => {
                // Child i holds keys in [keys[i-1], keys[i]]
                for i in first..children.len() {
                    if i > 0 && n.keys[i - 1] > end {
                        break;
                    }
                    self.collect_range(children[i], start, end, out);
                }
            }
        }
    }

    /// Smallest key (first key of the leftmost leaf)
    pub fn min(&self) -> Option<i64> {
        let mut node = self.root?;
        loop {
            match &self.nodes[node].kind {
                NodeKind::Leaf { .. } => return self.nodes[node].keys.first().copied(),
                NodeKind::Internal { children } => node = children[0],
            }
        }
    }

    /// Largest key (last key of the rightmost leaf)
    pub fn max(&self) -> Option<i64> {
        let leaf = self.rightmost_leaf(self.root?);
        self.nodes[leaf].keys.last().copied()
    }

    fn rightmost_leaf(&self, mut node: NodeId) -> NodeId {
        while let NodeKind::Internal { children } = &self.nodes[node].kind {
            node = children[children.len() - 1];
        }
        node
    }

    fn last_value_in(&self, subtree: NodeId) -> Option<u64> {
        match &self.nodes[self.rightmost_leaf(subtree)].kind {
            NodeKind::Leaf { values } => values.last().copied(),
            NodeKind::Internal { .. } => None,
        }
    }

    // =========================================================================
    // Structural Checks
    // =========================================================================

    /// Verify ordering, fill, depth and parent-link invariants.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let Some(root) = self.root else {
            return if self.len == 0 {
                Ok(())
            } else {
                Err(format!("empty tree reports {} entries", self.len))
            };
        };

        if self.nodes[root].parent.is_some() {
            return Err("root has a parent".to_string());
        }

        let mut leaf_depth = None;
        let mut counted = 0;
        self.check_node(root, 0, &mut leaf_depth, &mut counted)?;

        if counted != self.len {
            return Err(format!("counted {} entries, len is {}", counted, self.len));
        }
        Ok(())
    }

    fn check_node(
        &self,
        node: NodeId,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        counted: &mut usize,
    ) -> std::result::Result<(), String> {
        let n = &self.nodes[node];
        let is_root = Some(node) == self.root;

        if n.keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(format!("node {} keys not sorted", node));
        }
        if n.keys.len() > MAX_KEYS {
            return Err(format!("node {} holds {} keys", node, n.keys.len()));
        }
        if !is_root && n.keys.len() < MIN_KEYS {
            return Err(format!("node {} under-full with {} keys", node, n.keys.len()));
        }

        match &n.kind {
            NodeKind::Leaf { values } => {
                if values.len() != n.keys.len() {
                    return Err(format!("leaf {} keys/values mismatch", node));
                }
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(format!("leaf {} at depth {}, expected {}", node, depth, d));
                    }
                    _ => {}
                }
                *counted += values.len();
            }
            NodeKind::Internal { children } => {
                if children.len() != n.keys.len() + 1 {
                    return Err(format!("internal {} has {} children", node, children.len()));
                }
                for (i, &child) in children.iter().enumerate() {
                    if self.nodes[child].parent != Some(node) {
                        return Err(format!("child {} does not point back to {}", child, node));
                    }
                    if i < n.keys.len() {
                        let leaf = self.rightmost_leaf(child);
                        if self.nodes[leaf].keys.last() != Some(&n.keys[i]) {
                            return Err(format!(
                                "separator {} of node {} is not the max of its left subtree",
                                n.keys[i], node
                            ));
                        }
                    }
                    self.check_node(child, depth + 1, leaf_depth, counted)?;
                }
            }
        }
        Ok(())
    }
}

/// Borrow two distinct arena slots mutably
fn pair_mut(nodes: &mut [Node], a: NodeId, b: NodeId) -> (&mut Node, &mut Node) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = nodes.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = nodes.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}
