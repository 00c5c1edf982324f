//! In-memory filter evaluation.
//!
//! The evaluator is generic over the object type a filter is matched
//! against. An [`XPathEvaluator`] supplies the values a [`ValueReference`]
//! selects from an object and the object's identifier; everything else
//! (comparison semantics, `Like` patterns, spatial predicates, functions) is
//! handled here.
//!
//! ```rust
//! use geofilter::common::TypedValue;
//! use geofilter::errors::GeoFilterResult;
//! use geofilter::evaluator::XPathEvaluator;
//! use geofilter::filter::{property, Filter, ValueReference};
//! use std::collections::HashMap;
//!
//! struct Row;
//!
//! impl XPathEvaluator<HashMap<String, TypedValue>> for Row {
//!     fn eval(
//!         &self,
//!         row: &HashMap<String, TypedValue>,
//!         reference: &ValueReference,
//!     ) -> GeoFilterResult<Vec<TypedValue>> {
//!         Ok(vec![row.get(reference.text()).cloned().unwrap_or(TypedValue::Null)])
//!     }
//!
//!     fn get_id(&self, _row: &HashMap<String, TypedValue>) -> Option<String> {
//!         None
//!     }
//! }
//!
//! let mut row = HashMap::new();
//! row.insert("population".to_string(), TypedValue::from(25_000));
//!
//! let filter: Filter = property("population").gt(10_000).into();
//! assert!(filter.evaluate(&row, &Row).unwrap());
//! ```

mod function;
mod like;
mod spatial;

pub use function::{FunctionProvider, FunctionRegistry};
pub use spatial::envelope_predicate;

use itertools::Itertools;
use once_cell::sync::Lazy;
use smallvec::{smallvec, SmallVec};
use std::cmp::Ordering;

use crate::common::TypedValue;
use crate::errors::{ErrorKind, GeoFilterError, GeoFilterResult};
use crate::filter::{
    Comparison, ComparisonOp, Expression, Filter, IdFilter, Logical, MatchAction, Operator,
    Spatial, ValueReference,
};

/// Resolves property paths against objects of type `T`.
pub trait XPathEvaluator<T: ?Sized> {
    /// Values selected by `reference` from `context`.
    ///
    /// A missing property is reported as a single [`TypedValue::Null`]; an
    /// empty result is treated as an evaluation error.
    fn eval(&self, context: &T, reference: &ValueReference) -> GeoFilterResult<Vec<TypedValue>>;

    /// The identifier of `context`, if it has one.
    fn get_id(&self, context: &T) -> Option<String>;
}

type ValueSet = SmallVec<[TypedValue; 2]>;

static DEFAULT_EVALUATOR: Lazy<FilterEvaluator> = Lazy::new(FilterEvaluator::default);

impl Filter {
    /// Matches `context` against the filter with an evaluator that knows no
    /// functions.
    pub fn evaluate<T, X>(&self, context: &T, xpath: &X) -> GeoFilterResult<bool>
    where
        T: ?Sized,
        X: XPathEvaluator<T> + ?Sized,
    {
        DEFAULT_EVALUATOR.evaluate(self, context, xpath)
    }
}

/// Evaluates filters against in-memory objects.
///
/// Evaluation is pure: a filter, an object and a path evaluator always give
/// the same answer, and one evaluator can be shared between threads.
#[derive(Clone, Default)]
pub struct FilterEvaluator {
    functions: FunctionRegistry,
}

impl FilterEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions(functions: FunctionRegistry) -> Self {
        FilterEvaluator { functions }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn evaluate<T, X>(&self, filter: &Filter, context: &T, xpath: &X) -> GeoFilterResult<bool>
    where
        T: ?Sized,
        X: XPathEvaluator<T> + ?Sized,
    {
        match filter {
            Filter::Id(filter) => Ok(self.evaluate_id(filter, context, xpath)),
            Filter::Operator(filter) => self.evaluate_operator(&filter.root, context, xpath),
        }
    }

    fn evaluate_id<T, X>(&self, filter: &IdFilter, context: &T, xpath: &X) -> bool
    where
        T: ?Sized,
        X: XPathEvaluator<T> + ?Sized,
    {
        xpath
            .get_id(context)
            .map(|id| filter.matches(&id))
            .unwrap_or(false)
    }

    pub fn evaluate_operator<T, X>(&self, operator: &Operator, context: &T, xpath: &X) -> GeoFilterResult<bool>
    where
        T: ?Sized,
        X: XPathEvaluator<T> + ?Sized,
    {
        match operator {
            Operator::Comparison(comparison) => self.evaluate_comparison(comparison, context, xpath),
            Operator::Spatial(spatial) => self.evaluate_spatial(spatial, context, xpath),
            Operator::Logical(Logical::And(children)) => {
                for child in children {
                    if !self.evaluate_operator(child, context, xpath)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Operator::Logical(Logical::Or(children)) => {
                for child in children {
                    if self.evaluate_operator(child, context, xpath)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Operator::Logical(Logical::Not(child)) => {
                Ok(!self.evaluate_operator(child, context, xpath)?)
            }
        }
    }

    fn evaluate_comparison<T, X>(&self, comparison: &Comparison, context: &T, xpath: &X) -> GeoFilterResult<bool>
    where
        T: ?Sized,
        X: XPathEvaluator<T> + ?Sized,
    {
        comparison.validate()?;
        let params = &comparison.params;
        let action = comparison.match_action;
        let match_case = comparison.match_case;

        match comparison.op {
            ComparisonOp::IsNull => {
                let values = self.resolve(&params[0], context, xpath)?;
                combine(action, values.iter().map(|v| Ok(v.is_null())))
            }
            ComparisonOp::Between => {
                let values = self.resolve(&params[0], context, xpath)?;
                let lower = self.resolve(&params[1], context, xpath)?;
                let upper = self.resolve(&params[2], context, xpath)?;
                combine(
                    action,
                    values.iter().map(|v| between(v, &lower, &upper, match_case)),
                )
            }
            ComparisonOp::Like(wildcards) => {
                let values = self.resolve(&params[0], context, xpath)?;
                let patterns = self.resolve(&params[1], context, xpath)?;
                let mut matchers = Vec::with_capacity(patterns.len());
                for pattern in patterns.iter() {
                    match pattern.as_text() {
                        Some(text) => matchers.push(like::like_regex(&text, &wildcards, match_case)?),
                        None if pattern.is_null() => {}
                        None => {
                            log::error!("Like pattern must be text, got {}", pattern.type_name());
                            return Err(GeoFilterError::new(
                                &format!("Like pattern must be text, got {}", pattern.type_name()),
                                ErrorKind::TypeMismatch,
                            ));
                        }
                    }
                }
                combine(
                    action,
                    values
                        .iter()
                        .cartesian_product(matchers.iter())
                        .map(|(value, regex)| {
                            Ok(value.as_text().map(|text| regex.is_match(&text)).unwrap_or(false))
                        }),
                )
            }
            op => {
                let lhs = self.resolve(&params[0], context, xpath)?;
                let rhs = self.resolve(&params[1], context, xpath)?;
                combine(
                    action,
                    lhs.iter()
                        .cartesian_product(rhs.iter())
                        .map(|(a, b)| binary(op, a, b, match_case)),
                )
            }
        }
    }

    fn evaluate_spatial<T, X>(&self, spatial: &Spatial, context: &T, xpath: &X) -> GeoFilterResult<bool>
    where
        T: ?Sized,
        X: XPathEvaluator<T> + ?Sized,
    {
        let operand = spatial.geometry.envelope()?;
        let values = self.resolve(&spatial.property, context, xpath)?;
        for value in values.iter() {
            match value {
                TypedValue::Null => {}
                TypedValue::Geometry(geometry) => {
                    if envelope_predicate(spatial.op, &geometry.envelope()?, &operand) {
                        return Ok(true);
                    }
                }
                other => {
                    log::error!(
                        "Spatial operand {} is a {} value, not a geometry",
                        spatial.property,
                        other.type_name()
                    );
                    return Err(GeoFilterError::new(
                        &format!(
                            "Spatial operand {} is a {} value, not a geometry",
                            spatial.property,
                            other.type_name()
                        ),
                        ErrorKind::EvaluationError,
                    ));
                }
            }
        }
        Ok(false)
    }

    fn resolve<T, X>(&self, expression: &Expression, context: &T, xpath: &X) -> GeoFilterResult<ValueSet>
    where
        T: ?Sized,
        X: XPathEvaluator<T> + ?Sized,
    {
        match expression {
            Expression::Literal(literal) => Ok(smallvec![literal.value.clone()]),
            Expression::ValueReference(reference) => {
                let values = xpath.eval(context, reference)?;
                if values.is_empty() {
                    log::error!("Property '{}' resolved to no value", reference);
                    return Err(GeoFilterError::new(
                        &format!("Property '{}' resolved to no value", reference),
                        ErrorKind::EvaluationError,
                    ));
                }
                Ok(SmallVec::from_vec(values))
            }
            Expression::Function(function) => {
                let mut args = Vec::with_capacity(function.params.len());
                for param in &function.params {
                    args.push(self.resolve(param, context, xpath)?.into_vec());
                }
                Ok(SmallVec::from_vec(self.functions.call(&function.name, &args)?))
            }
        }
    }
}

/// Folds pairwise results per match action. Errors stop the fold.
fn combine<I>(action: MatchAction, results: I) -> GeoFilterResult<bool>
where
    I: Iterator<Item = GeoFilterResult<bool>>,
{
    match action {
        MatchAction::Any => {
            for result in results {
                if result? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        MatchAction::All => {
            let mut seen = false;
            for result in results {
                if !result? {
                    return Ok(false);
                }
                seen = true;
            }
            Ok(seen)
        }
        MatchAction::One => {
            let mut count = 0;
            for result in results {
                if result? {
                    count += 1;
                    if count > 1 {
                        return Ok(false);
                    }
                }
            }
            Ok(count == 1)
        }
    }
}

fn binary(op: ComparisonOp, a: &TypedValue, b: &TypedValue, match_case: bool) -> GeoFilterResult<bool> {
    let ordering = match a.compare(b, match_case)? {
        Some(ordering) => ordering,
        // null and NaN never compare
        None => return Ok(false),
    };
    Ok(match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Le => ordering != Ordering::Greater,
        ComparisonOp::Ge => ordering != Ordering::Less,
        ComparisonOp::Like(_) | ComparisonOp::IsNull | ComparisonOp::Between => {
            log::error!("{} is not a binary comparison", op.symbol());
            return Err(GeoFilterError::new(
                &format!("{} is not a binary comparison", op.symbol()),
                ErrorKind::InternalError,
            ));
        }
    })
}

fn between(value: &TypedValue, lower: &[TypedValue], upper: &[TypedValue], match_case: bool) -> GeoFilterResult<bool> {
    for low in lower {
        if !binary(ComparisonOp::Ge, value, low, match_case)? {
            continue;
        }
        for high in upper {
            if binary(ComparisonOp::Le, value, high, match_case)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
