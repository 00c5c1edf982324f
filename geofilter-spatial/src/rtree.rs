//! In-memory R-tree.
//!
//! A height-balanced tree with fan-out `M`. Inserts descend by least
//! enlargement and split overflowing nodes with Guttman's quadratic split;
//! removals drop emptied nodes and collapse a single-child root but never
//! reinsert orphaned entries. [`RTree::bulk_load`] packs a tree in one pass
//! with Sort-Tile-Recursive.

use geofilter::geometry::Envelope;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::index::{SpatialIndex, SpatialIndexEntry};

/// Default maximum number of entries per node.
pub const DEFAULT_MAX_ENTRIES: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct NodeIdx(usize);

#[derive(Debug)]
enum NodeKind<T> {
    Leaf(Vec<SpatialIndexEntry<T>>),
    Internal(Vec<NodeIdx>),
}

#[derive(Debug)]
struct RNode<T> {
    envelope: Envelope,
    kind: NodeKind<T>,
}

impl<T> RNode<T> {
    fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Internal(children) => children.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An R-tree of payloads keyed by envelope.
///
/// The handle is cheap to clone; clones share the same tree.
///
/// ```rust
/// use geofilter::geometry::Envelope;
/// use geofilter_spatial::RTree;
///
/// let tree = RTree::new(Envelope::new(0.0, 0.0, 200.0, 200.0), 4);
/// tree.insert(Envelope::new(10.0, 10.0, 40.0, 30.0), 8);
/// tree.insert(Envelope::new(125.0, 40.0, 135.0, 95.0), 13);
/// assert_eq!(tree.query(&Envelope::new(0.0, 0.0, 50.0, 50.0)), vec![8]);
/// ```
#[derive(Clone)]
pub struct RTree<T> {
    inner: Arc<RwLock<RTreeInner<T>>>,
}

struct RTreeInner<T> {
    nodes: Vec<RNode<T>>,
    free: Vec<NodeIdx>,
    root: Option<NodeIdx>,
    root_envelope: Envelope,
    max_entries: usize,
    min_entries: usize,
    height: usize,
    size: usize,
}

fn clamp_max_entries(max_entries: usize) -> usize {
    if max_entries < 2 {
        log::warn!("R-tree fan-out {} is below 2, using 2", max_entries);
        2
    } else {
        max_entries
    }
}

/// Minimum fill used by the split: 40% of `M`, at least 2, and never more
/// than half of an overflowing node.
fn min_entries_for(max_entries: usize) -> usize {
    (max_entries * 2 / 5).max(2).min((max_entries + 1) / 2)
}

impl<T: Clone + PartialEq> RTree<T> {
    /// Creates an empty tree. `root_envelope` is the expected domain; entries
    /// outside it are still accepted.
    pub fn new(root_envelope: Envelope, max_entries: usize) -> Self {
        let max_entries = clamp_max_entries(max_entries);
        RTree {
            inner: Arc::new(RwLock::new(RTreeInner {
                nodes: Vec::new(),
                free: Vec::new(),
                root: None,
                root_envelope,
                max_entries,
                min_entries: min_entries_for(max_entries),
                height: 0,
                size: 0,
            })),
        }
    }

    /// Builds a packed tree from `entries` using Sort-Tile-Recursive.
    pub fn bulk_load<I>(root_envelope: Envelope, max_entries: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = SpatialIndexEntry<T>>,
    {
        let tree = Self::new(root_envelope, max_entries);
        {
            let mut inner = tree.inner.write();
            let entries: Vec<_> = entries.into_iter().collect();
            inner.bulk_build(entries);
            log::debug!(
                "Bulk loaded {} entries into an R-tree of height {}",
                inner.size,
                inner.height
            );
        }
        tree
    }

    pub fn insert(&self, envelope: Envelope, payload: T) {
        self.inner.write().insert(SpatialIndexEntry::new(envelope, payload));
    }

    /// Every payload whose envelope intersects `envelope`, boundary inclusive.
    pub fn query(&self, envelope: &Envelope) -> Vec<T> {
        let inner = self.inner.read();
        let root = match inner.root {
            Some(root) => root,
            None => return Vec::new(),
        };
        if !inner.root_envelope.intersects(envelope) && !inner.nodes[root.0].envelope.intersects(envelope) {
            return Vec::new();
        }

        let mut results = Vec::new();
        inner.search(root, envelope, &mut results);
        results
    }

    /// Removes the first entry equal to `payload`.
    pub fn remove(&self, payload: &T) -> bool {
        self.inner.write().remove(payload)
    }

    pub fn get_objects(&self) -> Vec<T> {
        let inner = self.inner.read();
        let mut results = Vec::with_capacity(inner.size);
        if let Some(root) = inner.root {
            inner.collect(root, &mut results);
        }
        results
    }

    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of levels; 0 for an empty tree, 1 when the root is a leaf.
    pub fn height(&self) -> usize {
        self.inner.read().height
    }

    /// Envelope covering every stored entry.
    pub fn bounds(&self) -> Option<Envelope> {
        let inner = self.inner.read();
        inner.root.map(|root| inner.nodes[root.0].envelope)
    }

    pub fn root_envelope(&self) -> Envelope {
        self.inner.read().root_envelope
    }

    pub fn max_entries(&self) -> usize {
        self.inner.read().max_entries
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.nodes.clear();
        inner.free.clear();
        inner.root = None;
        inner.height = 0;
        inner.size = 0;
    }
}

impl<T: Clone + PartialEq> RTreeInner<T> {
    fn allocate(&mut self, node: RNode<T>) -> NodeIdx {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx.0] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                NodeIdx(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, idx: NodeIdx) {
        self.nodes[idx.0].kind = NodeKind::Internal(Vec::new());
        self.free.push(idx);
    }

    fn children_envelope(&self, children: &[NodeIdx]) -> Option<Envelope> {
        children
            .iter()
            .map(|child| self.nodes[child.0].envelope)
            .reduce(|a, b| a.union(&b))
    }

    /// Recomputes the envelope of `idx` from its direct contents.
    fn refresh(&mut self, idx: NodeIdx) {
        let envelope = match &self.nodes[idx.0].kind {
            NodeKind::Leaf(entries) => entries_envelope(entries),
            NodeKind::Internal(children) => self.children_envelope(children),
        };
        if let Some(envelope) = envelope {
            self.nodes[idx.0].envelope = envelope;
        }
    }

    fn insert(&mut self, entry: SpatialIndexEntry<T>) {
        self.size += 1;

        let root = match self.root {
            Some(root) => root,
            None => {
                let envelope = entry.envelope;
                let root = self.allocate(RNode {
                    envelope,
                    kind: NodeKind::Leaf(vec![entry]),
                });
                self.root = Some(root);
                self.height = 1;
                return;
            }
        };

        let mut path = Vec::with_capacity(self.height);
        let leaf = self.choose_leaf(root, &entry.envelope, &mut path);

        let overflow = match &mut self.nodes[leaf.0].kind {
            NodeKind::Leaf(entries) => {
                entries.push(entry);
                entries.len() > self.max_entries
            }
            NodeKind::Internal(_) => false,
        };

        let split = if overflow { Some(self.split_leaf(leaf)) } else { None };
        self.refresh(leaf);
        self.propagate(&path, split);
    }

    /// Descends from `idx` to a leaf, recording the internal nodes visited.
    fn choose_leaf(&self, idx: NodeIdx, envelope: &Envelope, path: &mut Vec<NodeIdx>) -> NodeIdx {
        let mut current = idx;
        loop {
            match &self.nodes[current.0].kind {
                NodeKind::Leaf(_) => return current,
                NodeKind::Internal(children) => {
                    let mut best = children[0];
                    let mut best_enlargement = f64::INFINITY;
                    let mut best_area = f64::INFINITY;

                    for child in children {
                        let child_envelope = &self.nodes[child.0].envelope;
                        let enlargement = child_envelope.enlargement(envelope);
                        let area = child_envelope.area();

                        if enlargement < best_enlargement
                            || (enlargement == best_enlargement && area < best_area)
                        {
                            best_enlargement = enlargement;
                            best_area = area;
                            best = *child;
                        }
                    }

                    path.push(current);
                    current = best;
                }
            }
        }
    }

    /// Walks the insertion path bottom up, re-tightening envelopes and
    /// adding split siblings to their parents. A split that reaches the root
    /// grows the tree by one level.
    fn propagate(&mut self, path: &[NodeIdx], mut split: Option<NodeIdx>) {
        for &parent in path.iter().rev() {
            if let Some(sibling) = split.take() {
                let overflow = match &mut self.nodes[parent.0].kind {
                    NodeKind::Internal(children) => {
                        children.push(sibling);
                        children.len() > self.max_entries
                    }
                    NodeKind::Leaf(_) => false,
                };
                if overflow {
                    split = Some(self.split_internal(parent));
                }
            }
            self.refresh(parent);
        }

        if let Some(sibling) = split {
            if let Some(old_root) = self.root {
                let envelope = self.nodes[old_root.0].envelope.union(&self.nodes[sibling.0].envelope);
                let root = self.allocate(RNode {
                    envelope,
                    kind: NodeKind::Internal(vec![old_root, sibling]),
                });
                self.root = Some(root);
                self.height += 1;
                log::debug!("R-tree root split, height is now {}", self.height);
            }
        }
    }

    /// Splits an overflowing leaf in place and returns the new sibling.
    fn split_leaf(&mut self, idx: NodeIdx) -> NodeIdx {
        let entries = match &mut self.nodes[idx.0].kind {
            NodeKind::Leaf(entries) => std::mem::take(entries),
            NodeKind::Internal(_) => Vec::new(),
        };
        let (kept, moved) = quadratic_split(entries, self.min_entries, |e| e.envelope);

        self.nodes[idx.0].kind = NodeKind::Leaf(kept);
        self.refresh(idx);
        let sibling = self.allocate(RNode {
            envelope: self.nodes[idx.0].envelope,
            kind: NodeKind::Leaf(moved),
        });
        self.refresh(sibling);
        sibling
    }

    fn split_internal(&mut self, idx: NodeIdx) -> NodeIdx {
        let children = match &mut self.nodes[idx.0].kind {
            NodeKind::Internal(children) => std::mem::take(children),
            NodeKind::Leaf(_) => Vec::new(),
        };
        let nodes = &self.nodes;
        let (kept, moved) = quadratic_split(children, self.min_entries, |c| nodes[c.0].envelope);

        self.nodes[idx.0].kind = NodeKind::Internal(kept);
        self.refresh(idx);
        let sibling = self.allocate(RNode {
            envelope: self.nodes[idx.0].envelope,
            kind: NodeKind::Internal(moved),
        });
        self.refresh(sibling);
        sibling
    }

    fn search(&self, idx: NodeIdx, query: &Envelope, results: &mut Vec<T>) {
        match &self.nodes[idx.0].kind {
            NodeKind::Leaf(entries) => {
                for entry in entries {
                    if entry.envelope.intersects(query) {
                        results.push(entry.payload.clone());
                    }
                }
            }
            NodeKind::Internal(children) => {
                for child in children {
                    if self.nodes[child.0].envelope.intersects(query) {
                        self.search(*child, query, results);
                    }
                }
            }
        }
    }

    fn collect(&self, idx: NodeIdx, results: &mut Vec<T>) {
        match &self.nodes[idx.0].kind {
            NodeKind::Leaf(entries) => results.extend(entries.iter().map(|e| e.payload.clone())),
            NodeKind::Internal(children) => {
                for child in children {
                    self.collect(*child, results);
                }
            }
        }
    }

    fn remove(&mut self, payload: &T) -> bool {
        let root = match self.root {
            Some(root) => root,
            None => return false,
        };
        if !self.remove_recursive(root, payload) {
            return false;
        }
        self.size -= 1;

        // collapse the root while it has a single child
        while let Some(current) = self.root {
            let child = match &self.nodes[current.0].kind {
                NodeKind::Internal(children) if children.len() == 1 => children[0],
                _ => break,
            };
            self.release(current);
            self.root = Some(child);
            self.height -= 1;
        }

        if let Some(root) = self.root {
            if self.nodes[root.0].is_empty() {
                self.release(root);
                self.root = None;
                self.height = 0;
            }
        }
        true
    }

    fn remove_recursive(&mut self, idx: NodeIdx, payload: &T) -> bool {
        let children = match &mut self.nodes[idx.0].kind {
            NodeKind::Leaf(entries) => {
                return match entries.iter().position(|e| e.payload == *payload) {
                    Some(pos) => {
                        entries.remove(pos);
                        self.refresh(idx);
                        true
                    }
                    None => false,
                };
            }
            NodeKind::Internal(children) => children.clone(),
        };

        for (i, child) in children.into_iter().enumerate() {
            if self.remove_recursive(child, payload) {
                if self.nodes[child.0].is_empty() {
                    self.release(child);
                    if let NodeKind::Internal(children) = &mut self.nodes[idx.0].kind {
                        children.remove(i);
                    }
                }
                self.refresh(idx);
                return true;
            }
        }
        false
    }

    fn bulk_build(&mut self, mut entries: Vec<SpatialIndexEntry<T>>) {
        self.nodes.clear();
        self.free.clear();
        self.size = entries.len();
        if entries.is_empty() {
            self.root = None;
            self.height = 0;
            return;
        }

        let max_entries = self.max_entries;
        let mut level = Vec::new();
        for tile in str_tiles(&mut entries, max_entries, |e| e.envelope) {
            let chunk: Vec<_> = entries.drain(..tile).collect();
            let envelope = entries_envelope(&chunk).unwrap_or(self.root_envelope);
            level.push(self.allocate(RNode {
                envelope,
                kind: NodeKind::Leaf(chunk),
            }));
        }
        self.height = 1;

        while level.len() > 1 {
            let nodes = &self.nodes;
            let mut parents = Vec::new();
            for tile in str_tiles(&mut level, max_entries, |c| nodes[c.0].envelope) {
                let chunk: Vec<_> = level.drain(..tile).collect();
                parents.push(chunk);
            }
            level = parents
                .into_iter()
                .map(|chunk| {
                    let envelope = self.children_envelope(&chunk).unwrap_or(self.root_envelope);
                    self.allocate(RNode {
                        envelope,
                        kind: NodeKind::Internal(chunk),
                    })
                })
                .collect();
            self.height += 1;
        }
        self.root = level.first().copied();
    }
}

fn entries_envelope<T>(entries: &[SpatialIndexEntry<T>]) -> Option<Envelope> {
    entries.iter().map(|e| e.envelope).reduce(|a, b| a.union(&b))
}

fn center_x(envelope: &Envelope) -> f64 {
    envelope.center().0
}

fn center_y(envelope: &Envelope) -> f64 {
    envelope.center().1
}

/// Orders `items` into Sort-Tile-Recursive tiles and returns the tile sizes
/// in order: items are sorted by x center, cut into vertical slices and each
/// slice sorted by y center, then chunked by `max_entries`.
fn str_tiles<E, F>(items: &mut [E], max_entries: usize, envelope: F) -> Vec<usize>
where
    F: Fn(&E) -> Envelope,
{
    let n = items.len();
    let tiles = n.div_ceil(max_entries);
    let mut slices = 1_usize;
    while slices * slices < tiles {
        slices += 1;
    }

    items.sort_by(|a, b| center_x(&envelope(a)).total_cmp(&center_x(&envelope(b))));
    let slice_size = n.div_ceil(slices).div_ceil(max_entries) * max_entries;

    let mut sizes = Vec::with_capacity(tiles);
    for slice in items.chunks_mut(slice_size) {
        slice.sort_by(|a, b| center_y(&envelope(a)).total_cmp(&center_y(&envelope(b))));
        let mut remaining = slice.len();
        while remaining > 0 {
            let size = remaining.min(max_entries);
            sizes.push(size);
            remaining -= size;
        }
    }
    sizes
}

/// Guttman's quadratic split.
///
/// Seeds are the pair wasting the most area when covered together; the
/// remaining items go, one at a time, to the group they prefer most strongly,
/// unless a group must take everything left to reach `min_entries`.
fn quadratic_split<E, F>(items: Vec<E>, min_entries: usize, envelope: F) -> (Vec<E>, Vec<E>)
where
    F: Fn(&E) -> Envelope,
{
    let envelopes: Vec<Envelope> = items.iter().map(&envelope).collect();
    let mut slots: Vec<Option<E>> = items.into_iter().map(Some).collect();

    let (mut seed_a, mut seed_b) = (0, 1);
    let mut worst = f64::NEG_INFINITY;
    for i in 0..envelopes.len() {
        for j in (i + 1)..envelopes.len() {
            let waste = envelopes[i].union(&envelopes[j]).area() - envelopes[i].area() - envelopes[j].area();
            if waste > worst {
                worst = waste;
                seed_a = i;
                seed_b = j;
            }
        }
    }

    let mut group_a = Vec::new();
    let mut group_b = Vec::new();
    let mut envelope_a = envelopes[seed_a];
    let mut envelope_b = envelopes[seed_b];
    group_a.extend(slots[seed_a].take());
    group_b.extend(slots[seed_b].take());

    let mut remaining: Vec<usize> = (0..envelopes.len()).filter(|&i| i != seed_a && i != seed_b).collect();

    while !remaining.is_empty() {
        if group_a.len() + remaining.len() <= min_entries {
            for i in remaining.drain(..) {
                envelope_a = envelope_a.union(&envelopes[i]);
                group_a.extend(slots[i].take());
            }
            break;
        }
        if group_b.len() + remaining.len() <= min_entries {
            for i in remaining.drain(..) {
                envelope_b = envelope_b.union(&envelopes[i]);
                group_b.extend(slots[i].take());
            }
            break;
        }

        // pick the item with the strongest preference for one group
        let mut pick = 0;
        let mut best_difference = f64::NEG_INFINITY;
        for (pos, &i) in remaining.iter().enumerate() {
            let difference = (envelope_a.enlargement(&envelopes[i]) - envelope_b.enlargement(&envelopes[i])).abs();
            if difference > best_difference {
                best_difference = difference;
                pick = pos;
            }
        }
        let i = remaining.remove(pick);

        let grow_a = envelope_a.enlargement(&envelopes[i]);
        let grow_b = envelope_b.enlargement(&envelopes[i]);
        let to_a = if grow_a != grow_b {
            grow_a < grow_b
        } else if envelope_a.area() != envelope_b.area() {
            envelope_a.area() < envelope_b.area()
        } else {
            group_a.len() <= group_b.len()
        };

        if to_a {
            envelope_a = envelope_a.union(&envelopes[i]);
            group_a.extend(slots[i].take());
        } else {
            envelope_b = envelope_b.union(&envelopes[i]);
            group_b.extend(slots[i].take());
        }
    }

    (group_a, group_b)
}

impl<T> SpatialIndex<T> for RTree<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    fn insert(&self, envelope: Envelope, payload: T) -> bool {
        RTree::insert(self, envelope, payload);
        true
    }

    fn query(&self, envelope: &Envelope) -> Vec<T> {
        RTree::query(self, envelope)
    }

    fn remove(&self, payload: &T) -> bool {
        RTree::remove(self, payload)
    }

    fn get_objects(&self) -> Vec<T> {
        RTree::get_objects(self)
    }

    fn size(&self) -> usize {
        RTree::size(self)
    }

    fn clear(&self) {
        RTree::clear(self)
    }
}
