//! # geofilter
//!
//! OGC-style feature filters: an immutable filter tree, an in-memory
//! evaluator that matches it against any object shape, and a compiler that
//! turns it into a parameterised SQL where clause.
//!
//! ```rust
//! use geofilter::filter::{and, property, Filter};
//! use geofilter::geometry::Geometry;
//! use geofilter::sql::{PostGisDialect, TableMapping, TableName, WhereBuilder};
//!
//! let filter: Filter = and(vec![
//!     property("name").like("Main*"),
//!     property("geom").bbox(Geometry::envelope_of(0.0, 0.0, 10.0, 10.0)),
//! ])
//! .into();
//!
//! let mapping = TableMapping::new(TableName::new("roads"))
//!     .column("name", "name")
//!     .geometry_column("geom", "geom", Some(4326));
//! let clause = WhereBuilder::new(&PostGisDialect, &mapping)
//!     .build(&filter, &[])
//!     .unwrap();
//! assert_eq!(clause.parameters.len(), 2);
//! ```
//!
//! Spatial indexes and an in-memory feature store live in the
//! `geofilter-spatial` crate.

pub mod common;
pub mod errors;
pub mod evaluator;
pub mod filter;
pub mod geometry;
pub mod sql;

pub use common::{QualifiedName, SortOrder, TypedValue};
pub use errors::{ErrorKind, GeoFilterError, GeoFilterResult};
pub use evaluator::{FilterEvaluator, XPathEvaluator};
pub use filter::Filter;
pub use geometry::{Envelope, Geometry};
