//! Read-only walks over filter trees.

use crate::geometry::{Envelope, Geometry};

use super::{Expression, Filter, Logical, Operator, SpatialOp, ValueReference};

/// Every value reference in the filter, depth first and left to right,
/// including references nested in function parameters. Id filters have none.
pub fn get_property_references(filter: &Filter) -> Vec<ValueReference> {
    let mut references = Vec::new();
    if let Filter::Operator(filter) = filter {
        collect_operator_references(&filter.root, &mut references);
    }
    references
}

fn collect_operator_references(operator: &Operator, out: &mut Vec<ValueReference>) {
    match operator {
        Operator::Comparison(comparison) => {
            for param in &comparison.params {
                collect_expression_references(param, out);
            }
        }
        Operator::Logical(logical) => {
            for child in logical.children() {
                collect_operator_references(child, out);
            }
        }
        Operator::Spatial(spatial) => collect_expression_references(&spatial.property, out),
    }
}

fn collect_expression_references(expression: &Expression, out: &mut Vec<ValueReference>) {
    if let Expression::ValueReference(reference) = expression {
        out.push(reference.clone());
    }
    for param in expression.get_params() {
        collect_expression_references(param, out);
    }
}

/// The literal geometry operand of every spatial operator in the filter,
/// depth first and left to right.
pub fn get_geometries(filter: &Filter) -> Vec<Geometry> {
    let mut geometries = Vec::new();
    if let Filter::Operator(filter) = filter {
        collect_geometries(&filter.root, &mut geometries);
    }
    geometries
}

fn collect_geometries(operator: &Operator, out: &mut Vec<Geometry>) {
    match operator {
        Operator::Comparison(_) => {}
        Operator::Logical(logical) => {
            for child in logical.children() {
                collect_geometries(child, out);
            }
        }
        Operator::Spatial(spatial) => out.push(spatial.geometry.clone()),
    }
}

/// An envelope that every object matching `filter` must intersect, if the
/// filter implies one.
///
/// Stores use it to narrow candidates through a spatial index before
/// evaluating the full filter.
pub fn extract_prefilter_envelope(filter: &Filter) -> Option<Envelope> {
    match filter {
        Filter::Id(_) => None,
        Filter::Operator(filter) => operator_envelope(&filter.root, None),
    }
}

/// Like [`extract_prefilter_envelope`], but only spatial operators on the
/// property with path `property` constrain the result.
pub fn extract_prefilter_envelope_for(filter: &Filter, property: &str) -> Option<Envelope> {
    match filter {
        Filter::Id(_) => None,
        Filter::Operator(filter) => operator_envelope(&filter.root, Some(property)),
    }
}

fn operator_envelope(operator: &Operator, property: Option<&str>) -> Option<Envelope> {
    match operator {
        Operator::Comparison(_) => None,
        Operator::Spatial(spatial) => {
            if let Some(property) = property {
                let reference = spatial.property.as_value_reference()?;
                if reference.text() != property {
                    return None;
                }
            }
            let envelope = spatial.geometry.envelope().ok()?;
            match spatial.op {
                SpatialOp::BBox
                | SpatialOp::Intersects
                | SpatialOp::Within
                | SpatialOp::Contains
                | SpatialOp::Equals
                | SpatialOp::Touches
                | SpatialOp::Overlaps => Some(envelope),
                SpatialOp::DWithin(distance) => Some(envelope.expand_by(distance)),
                SpatialOp::Disjoint | SpatialOp::Beyond(_) => None,
            }
        }
        Operator::Logical(Logical::And(children)) => {
            let mut result: Option<Envelope> = None;
            for env in children.iter().filter_map(|c| operator_envelope(c, property)) {
                result = match result {
                    None => Some(env),
                    // a box meeting two overlapping boxes meets their intersection;
                    // for disjoint ones only the first constraint is kept
                    Some(acc) => Some(acc.intersection(&env).unwrap_or(acc)),
                };
            }
            result
        }
        Operator::Logical(Logical::Or(children)) => {
            let mut result: Option<Envelope> = None;
            for child in children {
                let env = operator_envelope(child, property)?;
                result = Some(match result {
                    None => env,
                    Some(acc) => acc.union(&env),
                });
            }
            result
        }
        Operator::Logical(Logical::Not(_)) => None,
    }
}
