//! The spatial index abstraction and its configuration.

use geofilter::geometry::Envelope;
use serde::{Deserialize, Serialize};

use crate::errors::{SpatialError, SpatialResult};
use crate::quadtree::{QuadTree, DEFAULT_MAX_DEPTH};
use crate::rtree::{RTree, DEFAULT_MAX_ENTRIES};

/// Default number of entries a quad-tree node holds before it splits.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 8;

/// An envelope with the payload stored under it.
///
/// The payload is opaque to the index; equal payloads stored twice count as
/// two entries.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialIndexEntry<T> {
    pub envelope: Envelope,
    pub payload: T,
}

impl<T> SpatialIndexEntry<T> {
    pub fn new(envelope: Envelope, payload: T) -> Self {
        SpatialIndexEntry { envelope, payload }
    }
}

/// Represents a bounding-box index over payloads of type `T`.
///
/// Implementations guard their state internally, so every method takes
/// `&self` and an index can be shared between threads.
pub trait SpatialIndex<T>: Send + Sync {
    /// Stores `payload` under `envelope`. Returns false when the index
    /// refuses the envelope.
    fn insert(&self, envelope: Envelope, payload: T) -> bool;

    /// Finds every payload whose envelope intersects `envelope`.
    fn query(&self, envelope: &Envelope) -> Vec<T>;

    /// Removes one entry holding `payload`.
    fn remove(&self, payload: &T) -> bool;

    /// Gets every stored payload.
    fn get_objects(&self) -> Vec<T>;

    /// Gets the number of stored entries.
    fn size(&self) -> usize;

    /// Clears all entries.
    fn clear(&self);
}

/// Which tree an [`IndexConfig`] builds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    QuadTree,
    RTree,
}

/// Builder-style configuration for a spatial index.
///
/// ```rust
/// use geofilter::geometry::Envelope;
/// use geofilter_spatial::{IndexConfig, SpatialIndex};
///
/// let index = IndexConfig::r_tree(Envelope::new(0.0, 0.0, 100.0, 100.0))
///     .max_entries(8)
///     .build::<u32>()
///     .unwrap();
/// assert!(index.insert(Envelope::new(1.0, 1.0, 2.0, 2.0), 1));
/// assert_eq!(index.size(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    kind: IndexKind,
    root_envelope: Envelope,
    split_threshold: usize,
    max_depth: usize,
    max_entries: usize,
}

impl IndexConfig {
    pub fn new(kind: IndexKind, root_envelope: Envelope) -> Self {
        IndexConfig {
            kind,
            root_envelope,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn quad_tree(root_envelope: Envelope) -> Self {
        Self::new(IndexKind::QuadTree, root_envelope)
    }

    pub fn r_tree(root_envelope: Envelope) -> Self {
        Self::new(IndexKind::RTree, root_envelope)
    }

    pub fn kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn root_envelope(mut self, root_envelope: Envelope) -> Self {
        self.root_envelope = root_envelope;
        self
    }

    /// Quad-tree only.
    pub fn split_threshold(mut self, split_threshold: usize) -> Self {
        self.split_threshold = split_threshold;
        self
    }

    /// Quad-tree only.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// R-tree only.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn get_kind(&self) -> IndexKind {
        self.kind
    }

    pub fn get_root_envelope(&self) -> Envelope {
        self.root_envelope
    }

    pub fn validate(&self) -> SpatialResult<()> {
        let root = &self.root_envelope;
        let finite = [root.min_x(), root.min_y(), root.max_x(), root.max_y()]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            log::error!("Index root envelope {} is not finite", root);
            return Err(SpatialError::OutOfDomain(root.to_string()));
        }
        if self.kind == IndexKind::QuadTree && self.split_threshold == 0 {
            log::error!("Quad-tree split threshold must be positive");
            return Err(SpatialError::InvalidOperation(
                "Quad-tree split threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the configured tree.
    pub fn build<T>(&self) -> SpatialResult<Box<dyn SpatialIndex<T>>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        self.validate()?;
        Ok(match self.kind {
            IndexKind::QuadTree => Box::new(QuadTree::with_max_depth(
                self.root_envelope,
                self.split_threshold,
                self.max_depth,
            )),
            IndexKind::RTree => Box::new(RTree::new(self.root_envelope, self.max_entries)),
        })
    }
}
