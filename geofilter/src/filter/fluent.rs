use std::collections::BTreeMap;

use crate::common::TypedValue;
use crate::geometry::Geometry;

use super::{
    Comparison, ComparisonOp, Expression, Filter, Function, IdFilter, LikeWildcards, Literal,
    Logical, MatchAction, Operator, Spatial, SpatialOp, ValueReference,
};

/// Starts a predicate on the property at `path`.
///
/// ```rust
/// use geofilter::filter::property;
///
/// let op = property("name").ignore_case().like("main*");
/// assert_eq!(op.to_string(), "(name LIKE 'main*')");
/// ```
pub fn property(path: &str) -> PropertyPredicate {
    PropertyPredicate::new(ValueReference::new(path).into())
}

/// Starts a predicate on a prefixed property path, resolving prefixes
/// against `bindings`.
pub fn qualified_property(path: &str, bindings: BTreeMap<String, String>) -> PropertyPredicate {
    PropertyPredicate::new(ValueReference::with_bindings(path, bindings).into())
}

/// Starts a predicate whose left operand is any expression (e.g. a function).
pub fn expression(expr: Expression) -> PropertyPredicate {
    PropertyPredicate::new(expr)
}

/// A literal operand.
pub fn literal<T: Into<TypedValue>>(value: T) -> Expression {
    Literal::new(value).into()
}

/// A function operand.
pub fn function(name: &str, params: Vec<Expression>) -> Expression {
    Function::new(name, params).into()
}

/// Conjunction of the given operators.
pub fn and(children: Vec<Operator>) -> Operator {
    Operator::Logical(Logical::And(children))
}

/// Disjunction of the given operators.
pub fn or(children: Vec<Operator>) -> Operator {
    Operator::Logical(Logical::Or(children))
}

/// Negation of `child`.
pub fn not(child: Operator) -> Operator {
    Operator::Logical(Logical::Not(Box::new(child)))
}

/// A filter matching the given identifiers.
pub fn ids<I, S>(ids: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Filter::Id(IdFilter::new(ids))
}

/// Builder for comparison and spatial operators on one operand.
///
/// Comparisons default to case sensitive matching with [`MatchAction::Any`].
pub struct PropertyPredicate {
    operand: Expression,
    match_case: bool,
    match_action: MatchAction,
}

impl PropertyPredicate {
    fn new(operand: Expression) -> Self {
        PropertyPredicate {
            operand,
            match_case: true,
            match_action: MatchAction::Any,
        }
    }

    /// Compares strings case-insensitively.
    pub fn ignore_case(mut self) -> Self {
        self.match_case = false;
        self
    }

    pub fn match_action(mut self, match_action: MatchAction) -> Self {
        self.match_action = match_action;
        self
    }

    fn comparison(self, op: ComparisonOp, mut rest: Vec<Expression>) -> Operator {
        let mut params = Vec::with_capacity(rest.len() + 1);
        params.push(self.operand);
        params.append(&mut rest);
        Operator::Comparison(Comparison {
            op,
            params,
            match_case: self.match_case,
            match_action: self.match_action,
        })
    }

    fn spatial(self, op: SpatialOp, geometry: Geometry) -> Operator {
        Operator::Spatial(Spatial::new(op, self.operand, geometry))
    }

    #[inline]
    pub fn eq<T: Into<TypedValue>>(self, value: T) -> Operator {
        self.comparison(ComparisonOp::Eq, vec![literal(value)])
    }

    #[inline]
    pub fn ne<T: Into<TypedValue>>(self, value: T) -> Operator {
        self.comparison(ComparisonOp::Ne, vec![literal(value)])
    }

    #[inline]
    pub fn lt<T: Into<TypedValue>>(self, value: T) -> Operator {
        self.comparison(ComparisonOp::Lt, vec![literal(value)])
    }

    #[inline]
    pub fn gt<T: Into<TypedValue>>(self, value: T) -> Operator {
        self.comparison(ComparisonOp::Gt, vec![literal(value)])
    }

    #[inline]
    pub fn le<T: Into<TypedValue>>(self, value: T) -> Operator {
        self.comparison(ComparisonOp::Le, vec![literal(value)])
    }

    #[inline]
    pub fn ge<T: Into<TypedValue>>(self, value: T) -> Operator {
        self.comparison(ComparisonOp::Ge, vec![literal(value)])
    }

    /// A comparison against another expression instead of a literal.
    pub fn compare(self, op: ComparisonOp, other: Expression) -> Operator {
        self.comparison(op, vec![other])
    }

    /// `Like` with the default wildcards `*`, `?` and `\`.
    pub fn like(self, pattern: &str) -> Operator {
        self.like_with(pattern, LikeWildcards::default())
    }

    pub fn like_with(self, pattern: &str, wildcards: LikeWildcards) -> Operator {
        self.comparison(ComparisonOp::Like(wildcards), vec![literal(pattern)])
    }

    pub fn is_null(self) -> Operator {
        self.comparison(ComparisonOp::IsNull, vec![])
    }

    /// Inclusive range test.
    pub fn between<L: Into<TypedValue>, U: Into<TypedValue>>(self, lower: L, upper: U) -> Operator {
        self.comparison(ComparisonOp::Between, vec![literal(lower), literal(upper)])
    }

    pub fn bbox(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::BBox, geometry)
    }

    pub fn intersects(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::Intersects, geometry)
    }

    pub fn within(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::Within, geometry)
    }

    pub fn contains(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::Contains, geometry)
    }

    pub fn disjoint(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::Disjoint, geometry)
    }

    pub fn equals(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::Equals, geometry)
    }

    pub fn touches(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::Touches, geometry)
    }

    pub fn overlaps(self, geometry: Geometry) -> Operator {
        self.spatial(SpatialOp::Overlaps, geometry)
    }

    pub fn dwithin(self, geometry: Geometry, distance: f64) -> Operator {
        self.spatial(SpatialOp::DWithin(distance), geometry)
    }

    pub fn beyond(self, geometry: Geometry, distance: f64) -> Operator {
        self.spatial(SpatialOp::Beyond(distance), geometry)
    }
}
