//! The filter model.
//!
//! A [`Filter`] is either an identifier set or an operator tree. Operators
//! are [`Comparison`]s over [`Expression`]s, [`Logical`] combinations and
//! [`Spatial`] predicates against a literal [`Geometry`](crate::geometry::Geometry).
//! Trees are immutable once built; evaluators and compilers only read them.
//!
//! Trees are usually built through the helpers in [`fluent`]:
//!
//! ```rust
//! use geofilter::filter::{and, property, Filter};
//! use geofilter::geometry::Geometry;
//!
//! let filter: Filter = and(vec![
//!     property("population").gt(10_000),
//!     property("geom").bbox(Geometry::envelope_of(0.0, 0.0, 10.0, 10.0)),
//! ])
//! .into();
//! assert!(filter.validate().is_ok());
//! ```

mod expression;
pub mod fluent;
mod operator;
mod visitor;
mod xpath;

pub use expression::*;
pub use fluent::*;
pub use operator::*;
pub use visitor::*;
pub use xpath::PathStep;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::errors::GeoFilterResult;

/// A predicate matched against candidate objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches objects whose identifier is in the set
    Id(IdFilter),
    /// Matches objects for which the operator tree holds
    Operator(OperatorFilter),
}

impl Filter {
    /// Checks the whole tree for structural errors. Id filters are always
    /// valid.
    pub fn validate(&self) -> GeoFilterResult<()> {
        match self {
            Filter::Id(_) => Ok(()),
            Filter::Operator(filter) => filter.root.validate(),
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Id(filter) => write!(f, "{}", filter),
            Filter::Operator(filter) => write!(f, "{}", filter.root),
        }
    }
}

impl From<Operator> for Filter {
    fn from(root: Operator) -> Self {
        Filter::Operator(OperatorFilter { root })
    }
}

impl From<IdFilter> for Filter {
    fn from(filter: IdFilter) -> Self {
        Filter::Id(filter)
    }
}

/// Identifier set filter. Identifiers are kept sorted so every consumer sees
/// them in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdFilter {
    matching_ids: BTreeSet<String>,
}

impl IdFilter {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IdFilter {
            matching_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matching_ids(&self) -> &BTreeSet<String> {
        &self.matching_ids
    }

    pub fn matches(&self, id: &str) -> bool {
        self.matching_ids.contains(id)
    }
}

impl Display for IdFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ID IN (")?;
        for (i, id) in self.matching_ids.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}'", id)?;
        }
        write!(f, ")")
    }
}

/// Operator tree filter.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorFilter {
    pub root: Operator,
}

impl OperatorFilter {
    pub fn new(root: Operator) -> Self {
        OperatorFilter { root }
    }
}
