//! Compilation of filters into SQL where clauses.
//!
//! A [`WhereBuilder`] resolves every property reference through a
//! [`PropertyNameMapper`], builds a [`SqlExpression`] tree and spells it out
//! with a [`SqlDialect`]. Literals always become bind parameters.
//!
//! Parts of a filter that cannot be expressed in SQL (unmapped properties,
//! functions, spatial operators the dialect lacks) either fail the build or
//! are relaxed, depending on the [`PartialMappingPolicy`]. A relaxed clause
//! matches a superset of the rows the filter matches and carries the
//! original filter in [`WhereClause::post_filter`].

mod dialect;
mod expression;
mod like;
mod mapper;
mod sort;
mod where_builder;

pub use dialect::*;
pub use expression::*;
pub use mapper::*;
pub use sort::*;
pub use where_builder::*;
