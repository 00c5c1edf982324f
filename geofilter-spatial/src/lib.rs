//! # geofilter spatial
//!
//! Bounding-box indexes for filter evaluation, plus a memory feature store
//! that ties an index to the in-memory evaluator of `geofilter`.
//!
//! ## Features
//!
//! - **Region quad-tree**: fixed root domain, straddling entries kept at the
//!   node where they straddle
//! - **R-tree**: quadratic split, Sort-Tile-Recursive bulk loading
//! - **Thread safe**: one coarse lock per index, shared handles
//! - **Two-phase search**: index prefilter followed by full filter evaluation
//!
//! ## Index API
//!
//! ```rust
//! use geofilter::geometry::Envelope;
//! use geofilter_spatial::{IndexConfig, SpatialIndex};
//!
//! let index = IndexConfig::quad_tree(Envelope::new(-5.0, -5.0, 5.0, 5.0))
//!     .split_threshold(3)
//!     .build::<i32>()
//!     .unwrap();
//! index.insert(Envelope::new(-4.5, 0.0, 5.0, 5.0), 10);
//! index.insert(Envelope::new(-5.0, -5.0, -4.0, -4.0), 0);
//!
//! let hits = index.query(&Envelope::new(-4.0, 0.5, -3.0, 0.9));
//! assert_eq!(hits, vec![10]);
//! ```

pub mod errors;
pub mod index;
pub mod quadtree;
pub mod rtree;
pub mod store;

pub use errors::{SpatialError, SpatialResult};
pub use index::{IndexConfig, IndexKind, SpatialIndex, SpatialIndexEntry};
pub use quadtree::QuadTree;
pub use rtree::RTree;
pub use store::{Feature, FeatureXPathEvaluator, MemoryFeatureStore, PropertyValue, StoreConfig};
