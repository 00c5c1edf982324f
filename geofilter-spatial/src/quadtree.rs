//! Region quad-tree.
//!
//! The root envelope is split recursively into four quadrants. An entry is
//! stored at the deepest node whose quadrant fully contains its envelope;
//! entries that straddle a quadrant boundary stay at the node where they
//! straddle. Nodes live in an arena addressed by index and the whole
//! arena sits behind one lock.

use geofilter::geometry::Envelope;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::index::{SpatialIndex, SpatialIndexEntry};

/// Default maximum depth of the tree.
pub const DEFAULT_MAX_DEPTH: usize = 25;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug)]
struct QuadNode<T> {
    envelope: Envelope,
    depth: usize,
    entries: Vec<SpatialIndexEntry<T>>,
    children: Option<[NodeId; 4]>,
}

impl<T> QuadNode<T> {
    fn new(envelope: Envelope, depth: usize) -> Self {
        QuadNode {
            envelope,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }
}

/// A region quad-tree over a fixed root envelope.
///
/// The handle is cheap to clone; clones share the same tree.
///
/// ```rust
/// use geofilter::geometry::Envelope;
/// use geofilter_spatial::QuadTree;
///
/// let tree = QuadTree::new(Envelope::new(-5.0, -5.0, 5.0, 5.0), 3);
/// assert!(tree.insert(Envelope::new(1.0, 1.0, 2.0, 2.0), "a"));
/// assert!(!tree.insert(Envelope::new(6.0, 6.0, 7.0, 7.0), "outside"));
/// assert_eq!(tree.query(&Envelope::new(0.0, 0.0, 1.0, 1.0)), vec!["a"]);
/// ```
#[derive(Clone)]
pub struct QuadTree<T> {
    inner: Arc<RwLock<QuadTreeInner<T>>>,
}

struct QuadTreeInner<T> {
    nodes: Vec<QuadNode<T>>,
    root_envelope: Envelope,
    split_threshold: usize,
    max_depth: usize,
    size: usize,
}

impl<T: Clone + PartialEq> QuadTree<T> {
    /// Creates an empty tree. A node splits once it holds more than
    /// `split_threshold` entries.
    pub fn new(root_envelope: Envelope, split_threshold: usize) -> Self {
        Self::with_max_depth(root_envelope, split_threshold, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(root_envelope: Envelope, split_threshold: usize, max_depth: usize) -> Self {
        let split_threshold = if split_threshold == 0 {
            log::warn!("Quad-tree split threshold 0 is not usable, using 1");
            1
        } else {
            split_threshold
        };

        QuadTree {
            inner: Arc::new(RwLock::new(QuadTreeInner {
                nodes: vec![QuadNode::new(root_envelope, 0)],
                root_envelope,
                split_threshold,
                max_depth,
                size: 0,
            })),
        }
    }

    /// Stores `payload` under `envelope`.
    ///
    /// Returns false, storing nothing, when the envelope does not intersect
    /// the root envelope. Envelopes that only partly overlap the root are
    /// kept at the root node.
    pub fn insert(&self, envelope: Envelope, payload: T) -> bool {
        let mut inner = self.inner.write();
        if !inner.root_envelope.intersects(&envelope) {
            log::debug!("Envelope {} is outside the quad-tree root {}", envelope, inner.root_envelope);
            return false;
        }
        inner.insert(SpatialIndexEntry::new(envelope, payload));
        true
    }

    /// Every payload whose envelope intersects `envelope`, boundary inclusive.
    pub fn query(&self, envelope: &Envelope) -> Vec<T> {
        let inner = self.inner.read();
        let mut results = Vec::new();
        let mut stack = vec![NodeId(0)];

        while let Some(id) = stack.pop() {
            let node = &inner.nodes[id.0];
            for entry in &node.entries {
                if entry.envelope.intersects(envelope) {
                    results.push(entry.payload.clone());
                }
            }
            if let Some(children) = node.children {
                // reversed so the pop order is SW, SE, NW, NE
                for child in children.iter().rev() {
                    if inner.nodes[child.0].envelope.intersects(envelope) {
                        stack.push(*child);
                    }
                }
            }
        }
        results
    }

    /// Removes the first entry equal to `payload`, searching depth first.
    pub fn remove(&self, payload: &T) -> bool {
        let mut inner = self.inner.write();
        let mut stack = vec![NodeId(0)];

        while let Some(id) = stack.pop() {
            let node = &mut inner.nodes[id.0];
            match node.entries.iter().position(|e| e.payload == *payload) {
                Some(pos) => {
                    node.entries.remove(pos);
                    inner.size -= 1;
                    return true;
                }
                None => {
                    if let Some(children) = node.children {
                        stack.extend(children.iter().rev());
                    }
                }
            }
        }
        false
    }

    /// All stored payloads, depth first.
    pub fn get_objects(&self) -> Vec<T> {
        let inner = self.inner.read();
        let mut results = Vec::with_capacity(inner.size);
        let mut stack = vec![NodeId(0)];

        while let Some(id) = stack.pop() {
            let node = &inner.nodes[id.0];
            results.extend(node.entries.iter().map(|e| e.payload.clone()));
            if let Some(children) = node.children {
                stack.extend(children.iter().rev());
            }
        }
        results
    }

    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let root = QuadNode::new(inner.root_envelope, 0);
        inner.nodes = vec![root];
        inner.size = 0;
    }

    pub fn root_envelope(&self) -> Envelope {
        self.inner.read().root_envelope
    }

    /// Number of levels below and including the root.
    pub fn depth(&self) -> usize {
        let inner = self.inner.read();
        inner.nodes.iter().map(|n| n.depth + 1).max().unwrap_or(1)
    }
}

impl<T: Clone + PartialEq> QuadTreeInner<T> {
    fn insert(&mut self, entry: SpatialIndexEntry<T>) {
        let mut current = NodeId(0);
        loop {
            match self.nodes[current.0].children {
                Some(children) => match self.fitting_child(&children, &entry.envelope) {
                    Some(child) => current = child,
                    None => {
                        self.nodes[current.0].entries.push(entry);
                        break;
                    }
                },
                None => {
                    self.nodes[current.0].entries.push(entry);
                    self.split_if_needed(current);
                    break;
                }
            }
        }
        self.size += 1;
    }

    fn fitting_child(&self, children: &[NodeId; 4], envelope: &Envelope) -> Option<NodeId> {
        children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].envelope.contains(envelope))
    }

    /// Splits a leaf holding too many entries and moves down every entry that
    /// fits a quadrant. Children that overflow in turn are split as well.
    fn split_if_needed(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];
        if node.children.is_some()
            || node.entries.len() <= self.split_threshold
            || node.depth >= self.max_depth
            || !has_distinct_envelopes(&node.entries)
        {
            return;
        }

        let depth = node.depth + 1;
        let quadrants = node.envelope.quadrants();
        let first = self.nodes.len();
        let children = [NodeId(first), NodeId(first + 1), NodeId(first + 2), NodeId(first + 3)];
        for quadrant in quadrants {
            self.nodes.push(QuadNode::new(quadrant, depth));
        }

        let entries = std::mem::take(&mut self.nodes[id.0].entries);
        let mut straddling = Vec::new();
        for entry in entries {
            match self.fitting_child(&children, &entry.envelope) {
                Some(child) => self.nodes[child.0].entries.push(entry),
                None => straddling.push(entry),
            }
        }
        let node = &mut self.nodes[id.0];
        node.entries = straddling;
        node.children = Some(children);
        log::debug!("Split quad-tree node {} at depth {}", node.envelope, depth - 1);

        for child in children {
            self.split_if_needed(child);
        }
    }
}

fn has_distinct_envelopes<T>(entries: &[SpatialIndexEntry<T>]) -> bool {
    match entries.split_first() {
        Some((first, rest)) => rest.iter().any(|e| e.envelope != first.envelope),
        None => false,
    }
}

impl<T> SpatialIndex<T> for QuadTree<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    fn insert(&self, envelope: Envelope, payload: T) -> bool {
        QuadTree::insert(self, envelope, payload)
    }

    fn query(&self, envelope: &Envelope) -> Vec<T> {
        QuadTree::query(self, envelope)
    }

    fn remove(&self, payload: &T) -> bool {
        QuadTree::remove(self, payload)
    }

    fn get_objects(&self) -> Vec<T> {
        QuadTree::get_objects(self)
    }

    fn size(&self) -> usize {
        QuadTree::size(self)
    }

    fn clear(&self) {
        QuadTree::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn env(x1: f64, y1: f64, x2: f64, y2: f64) -> Envelope {
        Envelope::new(x1, y1, x2, y2)
    }

    fn fixture() -> QuadTree<i32> {
        let entries = [
            (0, env(-5.0, -5.0, -4.0, -4.0)),
            (1, env(-3.0, -3.0, -2.0, -2.0)),
            (2, env(0.0, -4.0, 1.0, -3.0)),
            (3, env(2.0, 1.0, 3.0, 2.0)),
            (4, env(3.0, -2.0, 4.0, -1.0)),
            (5, env(2.0, 1.0, 5.0, 5.0)),
            (6, env(2.5, 1.5, 2.5, 1.5)),
            (7, env(-1.0, -1.0, 1.0, 1.0)),
            (8, env(-4.0, 2.0, -3.0, 3.0)),
            (9, env(1.0, 3.0, 2.0, 4.0)),
            (10, env(-4.5, 0.0, 5.0, 5.0)),
            (11, env(4.6, 4.6, 4.8, 4.8)),
            (12, env(4.6, 4.6, 4.8, 4.8)),
            (13, env(4.6, 4.6, 4.8, 4.8)),
            (14, env(4.6, 4.6, 4.8, 4.8)),
            (15, env(-6.0, -6.0, -4.5, -4.5)),
        ];
        let tree = QuadTree::new(env(-5.0, -5.0, 5.0, 5.0), 3);
        for (id, envelope) in entries {
            assert!(tree.insert(envelope, id), "insert {}", id);
        }
        tree
    }

    fn ids(values: Vec<i32>) -> HashSet<i32> {
        values.into_iter().collect()
    }

    #[test]
    fn test_fixture_queries() {
        let tree = fixture();
        assert_eq!(tree.size(), 16);

        assert_eq!(ids(tree.query(&env(-4.0, 0.5, -3.0, 0.9))), HashSet::from([10]));
        assert_eq!(ids(tree.query(&env(-7.0, -7.0, 6.1, 6.1))), (0..16).collect());
        assert_eq!(
            ids(tree.query(&env(2.49999, 1.49999, 2.50001, 1.50001))),
            HashSet::from([3, 5, 6, 10])
        );
        assert_eq!(
            ids(tree.query(&env(4.5, 4.5, 4.7, 4.7))),
            HashSet::from([5, 10, 11, 12, 13, 14])
        );
    }

    #[test]
    fn test_fixture_splits() {
        let tree = fixture();
        assert!(tree.depth() > 1);
    }

    #[test]
    fn test_insert_outside_root_fails() {
        let tree = fixture();
        assert!(!tree.insert(env(6.0, 6.0, 7.0, 7.0), 99));
        assert_eq!(tree.size(), 16);
        assert!(!tree.get_objects().contains(&99));
    }

    #[test]
    fn test_touching_edges_intersect() {
        let tree = QuadTree::new(env(0.0, 0.0, 10.0, 10.0), 2);
        tree.insert(env(0.0, 0.0, 5.0, 5.0), "sw");
        tree.insert(env(5.0, 5.0, 10.0, 10.0), "ne");
        let mut hits = tree.query(&env(5.0, 5.0, 5.0, 5.0));
        hits.sort();
        assert_eq!(hits, vec!["ne", "sw"]);
    }

    #[test]
    fn test_straddling_entries_found_from_child_window() {
        let tree = QuadTree::new(env(0.0, 0.0, 8.0, 8.0), 1);
        tree.insert(env(3.0, 3.0, 5.0, 5.0), 1);
        tree.insert(env(0.5, 0.5, 1.0, 1.0), 2);
        tree.insert(env(0.2, 0.2, 0.4, 0.4), 3);
        // the window falls entirely inside the SW quadrant
        assert_eq!(ids(tree.query(&env(3.5, 3.5, 3.9, 3.9))), HashSet::from([1]));
    }

    #[test]
    fn test_identical_envelopes_do_not_split_forever() {
        let tree = QuadTree::new(env(0.0, 0.0, 1.0, 1.0), 1);
        for i in 0..10 {
            tree.insert(env(0.1, 0.1, 0.2, 0.2), i);
        }
        assert_eq!(tree.size(), 10);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.query(&env(0.0, 0.0, 0.15, 0.15)).len(), 10);
    }

    #[test]
    fn test_max_depth_bounds_splitting() {
        let tree = QuadTree::with_max_depth(env(0.0, 0.0, 1024.0, 1024.0), 1, 3);
        for i in 0..20 {
            let x = i as f64 * 0.01;
            tree.insert(env(x, x, x + 0.001, x + 0.001), i);
        }
        assert!(tree.depth() <= 4);
        assert_eq!(tree.get_objects().len(), 20);
    }

    #[test]
    fn test_remove_first_match_only() {
        let tree = fixture();
        assert!(tree.remove(&11));
        assert!(!tree.remove(&11));
        assert!(tree.remove(&15));
        assert_eq!(tree.size(), 14);

        let all = ids(tree.query(&env(-7.0, -7.0, 7.0, 7.0)));
        assert!(!all.contains(&11));
        assert!(!all.contains(&15));
        assert!(all.contains(&12));
        assert_eq!(all.len(), 14);
    }

    #[test]
    fn test_remove_duplicates_counted_individually() {
        let tree = QuadTree::new(env(0.0, 0.0, 10.0, 10.0), 4);
        tree.insert(env(1.0, 1.0, 2.0, 2.0), 7);
        tree.insert(env(3.0, 3.0, 4.0, 4.0), 7);
        assert_eq!(tree.size(), 2);
        assert!(tree.remove(&7));
        assert_eq!(tree.get_objects(), vec![7]);
    }

    #[test]
    fn test_clear() {
        let tree = fixture();
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.get_objects().is_empty());
        assert_eq!(tree.root_envelope(), env(-5.0, -5.0, 5.0, 5.0));
        assert!(tree.insert(env(1.0, 1.0, 2.0, 2.0), 1));
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let tree = QuadTree::new(env(0.0, 0.0, 10.0, 10.0), 4);
        let other = tree.clone();
        other.insert(env(1.0, 1.0, 2.0, 2.0), 1);
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_random_inserts_and_removes_match_linear_scan() {
        let mut rng = StdRng::seed_from_u64(7);
        let tree = QuadTree::new(env(0.0, 0.0, 100.0, 100.0), 4);
        let mut reference = Vec::new();

        for id in 0..500 {
            let x = rng.gen_range(-10.0..100.0);
            let y = rng.gen_range(-10.0..100.0);
            let w = rng.gen_range(0.0..15.0);
            let h = rng.gen_range(0.0..15.0);
            let envelope = env(x, y, x + w, y + h);
            if tree.insert(envelope, id) {
                reference.push((id, envelope));
            }
        }
        for id in (0..500).step_by(3) {
            if tree.remove(&id) {
                reference.retain(|(other, _)| *other != id);
            }
        }
        assert_eq!(tree.size(), reference.len());
        assert_eq!(tree.get_objects().len(), reference.len());

        for _ in 0..50 {
            let x = rng.gen_range(0.0..100.0);
            let y = rng.gen_range(0.0..100.0);
            let window = env(x, y, x + rng.gen_range(0.0..30.0), y + rng.gen_range(0.0..30.0));
            let expected: HashSet<i32> = reference
                .iter()
                .filter(|(_, e)| e.intersects(&window))
                .map(|(id, _)| *id)
                .collect();
            assert_eq!(ids(tree.query(&window)), expected);
        }
    }
}
