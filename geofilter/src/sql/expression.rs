use itertools::Itertools;

use crate::common::TypedValue;
use crate::filter::SpatialOp;
use crate::geometry::Geometry;

use super::dialect::{SpatialSyntax, SqlDialect, SqlType};
use super::mapper::TableName;

/// Binary SQL comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlComparison {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl SqlComparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            SqlComparison::Eq => "=",
            SqlComparison::Ne => "<>",
            SqlComparison::Lt => "<",
            SqlComparison::Gt => ">",
            SqlComparison::Le => "<=",
            SqlComparison::Ge => ">=",
        }
    }
}

/// A compiled where clause before it is spelled out for a dialect.
///
/// Rendering walks the tree left to right; bind arguments are collected in
/// that order, which matches the order of the `?` placeholders in the text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpression {
    /// Always satisfied
    True,
    Column {
        table: TableName,
        column: String,
    },
    /// A bind parameter
    Argument(TypedValue),
    /// A geometry bind parameter, converted to the column's reference system
    GeometryArgument {
        geometry: Geometry,
        srid: Option<i32>,
    },
    Concat(Box<SqlExpression>, Box<SqlExpression>),
    Cast(Box<SqlExpression>, SqlType),
    CaseFold(Box<SqlExpression>),
    Compare {
        op: SqlComparison,
        left: Box<SqlExpression>,
        right: Box<SqlExpression>,
    },
    Between {
        expr: Box<SqlExpression>,
        lower: Box<SqlExpression>,
        upper: Box<SqlExpression>,
    },
    /// `expr LIKE pattern ESCAPE '\'`, the pattern in SQL wildcard syntax
    Like {
        expr: Box<SqlExpression>,
        pattern: Box<SqlExpression>,
    },
    IsNull(Box<SqlExpression>),
    And(Vec<SqlExpression>),
    Or(Vec<SqlExpression>),
    Not(Box<SqlExpression>),
    Spatial {
        op: SpatialOp,
        syntax: SpatialSyntax,
        column: Box<SqlExpression>,
        geometry: Box<SqlExpression>,
    },
    /// Identifier membership; an empty list is never satisfied
    IdIn {
        id: Box<SqlExpression>,
        ids: Vec<String>,
    },
}

impl SqlExpression {
    pub fn column(table: &TableName, column: &str) -> Self {
        SqlExpression::Column {
            table: table.clone(),
            column: column.to_string(),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, SqlExpression::True)
    }

    /// Tables of every column in the tree, left to right, repeats included.
    pub fn tables(&self) -> Vec<&TableName> {
        let mut tables = Vec::new();
        self.collect_tables(&mut tables);
        tables
    }

    fn collect_tables<'a>(&'a self, out: &mut Vec<&'a TableName>) {
        match self {
            SqlExpression::True | SqlExpression::Argument(_) | SqlExpression::GeometryArgument { .. } => {}
            SqlExpression::Column { table, .. } => out.push(table),
            SqlExpression::Concat(left, right) => {
                left.collect_tables(out);
                right.collect_tables(out);
            }
            SqlExpression::Cast(expr, _)
            | SqlExpression::CaseFold(expr)
            | SqlExpression::IsNull(expr)
            | SqlExpression::Not(expr) => expr.collect_tables(out),
            SqlExpression::Compare { left, right, .. } => {
                left.collect_tables(out);
                right.collect_tables(out);
            }
            SqlExpression::Between { expr, lower, upper } => {
                expr.collect_tables(out);
                lower.collect_tables(out);
                upper.collect_tables(out);
            }
            SqlExpression::Like { expr, pattern } => {
                expr.collect_tables(out);
                pattern.collect_tables(out);
            }
            SqlExpression::And(children) | SqlExpression::Or(children) => {
                for child in children {
                    child.collect_tables(out);
                }
            }
            SqlExpression::Spatial { column, geometry, .. } => {
                column.collect_tables(out);
                geometry.collect_tables(out);
            }
            SqlExpression::IdIn { id, .. } => id.collect_tables(out),
        }
    }

    /// Spells the expression for `dialect`, appending bind arguments to
    /// `params` in placeholder order.
    pub fn render(&self, dialect: &dyn SqlDialect, params: &mut Vec<TypedValue>) -> String {
        match self {
            SqlExpression::True => "1 = 1".to_string(),
            SqlExpression::Column { table, column } => dialect.qualified_column(table, column),
            SqlExpression::Argument(value) => {
                params.push(value.clone());
                "?".to_string()
            }
            SqlExpression::GeometryArgument { geometry, srid } => {
                params.push(TypedValue::Geometry(geometry.clone()));
                dialect.geometry_placeholder(*srid)
            }
            SqlExpression::Concat(left, right) => {
                let left = left.render(dialect, params);
                let right = right.render(dialect, params);
                dialect.string_concat(&left, &right)
            }
            SqlExpression::Cast(expr, sql_type) => {
                let expr = expr.render(dialect, params);
                dialect.cast(&expr, *sql_type)
            }
            SqlExpression::CaseFold(expr) => {
                let expr = expr.render(dialect, params);
                dialect.case_fold(&expr)
            }
            SqlExpression::Compare { op, left, right } => {
                let left = left.render(dialect, params);
                let right = right.render(dialect, params);
                format!("{} {} {}", left, op.symbol(), right)
            }
            SqlExpression::Between { expr, lower, upper } => {
                let expr = expr.render(dialect, params);
                let lower = lower.render(dialect, params);
                let upper = upper.render(dialect, params);
                format!("{} BETWEEN {} AND {}", expr, lower, upper)
            }
            SqlExpression::Like { expr, pattern } => {
                let expr = expr.render(dialect, params);
                let pattern = pattern.render(dialect, params);
                format!("{} LIKE {} ESCAPE '\\'", expr, pattern)
            }
            SqlExpression::IsNull(expr) => format!("{} IS NULL", expr.render(dialect, params)),
            SqlExpression::And(children) => render_group(children, " AND ", dialect, params),
            SqlExpression::Or(children) => render_group(children, " OR ", dialect, params),
            SqlExpression::Not(child) => format!("NOT ({})", child.render(dialect, params)),
            SqlExpression::Spatial {
                op,
                syntax,
                column,
                geometry,
            } => match syntax {
                SpatialSyntax::BoxOperator(symbol) => render_box(symbol, column, geometry, dialect, params),
                SpatialSyntax::NegatedBoxOperator(symbol) => {
                    format!("NOT ({})", render_box(symbol, column, geometry, dialect, params))
                }
                SpatialSyntax::BoxOverlap {
                    intersects,
                    within,
                    contains,
                } => {
                    let intersects = render_box(intersects, column, geometry, dialect, params);
                    let within = render_box(within, column, geometry, dialect, params);
                    let contains = render_box(contains, column, geometry, dialect, params);
                    format!("({}) AND NOT ({}) AND NOT ({})", intersects, within, contains)
                }
                SpatialSyntax::EnvelopeDistance {
                    name,
                    envelope,
                    negated,
                } => {
                    let column = column.render(dialect, params);
                    let geometry = geometry.render(dialect, params);
                    params.push(TypedValue::Double(op.distance().unwrap_or_default()));
                    let call = format!("{}({}({}), {}({}), ?)", name, envelope, column, envelope, geometry);
                    if *negated {
                        format!("NOT {}", call)
                    } else {
                        call
                    }
                }
            },
            SqlExpression::IdIn { id, ids } => {
                if ids.is_empty() {
                    return "1 = 0".to_string();
                }
                let id = id.render(dialect, params);
                params.extend(ids.iter().map(|i| TypedValue::String(i.clone())));
                format!("{} IN ({})", id, ids.iter().map(|_| "?").join(", "))
            }
        }
    }
}

fn render_box(
    symbol: &str,
    column: &SqlExpression,
    geometry: &SqlExpression,
    dialect: &dyn SqlDialect,
    params: &mut Vec<TypedValue>,
) -> String {
    let column = column.render(dialect, params);
    let geometry = geometry.render(dialect, params);
    format!("{} {} {}", column, symbol, geometry)
}

fn render_group(
    children: &[SqlExpression],
    keyword: &str,
    dialect: &dyn SqlDialect,
    params: &mut Vec<TypedValue>,
) -> String {
    children
        .iter()
        .map(|child| format!("({})", child.render(dialect, params)))
        .join(keyword)
}
