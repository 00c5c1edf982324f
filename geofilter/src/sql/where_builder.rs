use indexmap::IndexSet;
use itertools::Itertools;

use crate::common::TypedValue;
use crate::errors::{GeoFilterError, GeoFilterResult};
use crate::filter::{
    Comparison, ComparisonOp, Expression, Filter, IdFilter, Logical, MatchAction, Operator,
    Spatial, ValueReference,
};

use super::dialect::{SqlDialect, SqlType};
use super::expression::{SqlComparison, SqlExpression};
use super::like::to_sql_pattern;
use super::mapper::{ColumnKind, PropertyNameMapper, TableName};
use super::sort::{SortCriterion, SortProperty};

/// What happens when part of a filter cannot be expressed in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialMappingPolicy {
    /// Fail with [`ErrorKind::Unmappable`](crate::errors::ErrorKind::Unmappable)
    #[default]
    Strict,
    /// Drop or widen the constraints that cannot be pushed down and keep the
    /// original filter as a post filter
    BestEffort,
}

/// The result of compiling a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// Where clause text without the `WHERE` keyword
    pub where_sql: String,
    /// Bind parameters in placeholder order
    pub parameters: Vec<TypedValue>,
    /// Tables the clause and the sort keys reference, in first-reference order
    pub tables: Vec<TableName>,
    /// Order by list without the `ORDER BY` keywords
    pub order_by: Option<String>,
    pub expression: SqlExpression,
    /// Filter the caller must still apply to the returned rows; set when
    /// constraints were relaxed
    pub post_filter: Option<Filter>,
    /// Sort the caller must apply to the returned rows; set when a sort
    /// property could not be mapped
    pub post_sort: Vec<SortProperty>,
    /// References that were mapped to columns
    pub mapped_properties: Vec<ValueReference>,
}

impl WhereClause {
    /// True when the database result needs no further filtering or sorting.
    pub fn is_exact(&self) -> bool {
        self.post_filter.is_none() && self.post_sort.is_empty()
    }

    /// Renders a complete `SELECT` statement. An empty column list selects
    /// `*`. The row limit is only applied when the clause is exact and the
    /// dialect supports limiting.
    pub fn to_select(&self, dialect: &dyn SqlDialect, columns: &[&str], limit: Option<usize>) -> String {
        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };
        let mut statement = format!("SELECT {}", projection);
        if !self.tables.is_empty() {
            statement.push_str(" FROM ");
            statement.push_str(&self.tables.iter().map(|t| dialect.table_reference(t)).join(", "));
        }
        statement.push_str(" WHERE ");
        statement.push_str(&self.where_sql);
        if let Some(order_by) = &self.order_by {
            statement.push_str(" ORDER BY ");
            statement.push_str(order_by);
        }

        match limit {
            Some(limit) if self.is_exact() && dialect.supports_row_limit() => {
                dialect.row_limit(&statement, limit)
            }
            Some(_) if !self.is_exact() => {
                log::warn!("Row limit not applied, the result still needs post processing");
                statement
            }
            _ => statement,
        }
    }
}

/// Compiles filters into where clauses for one dialect and mapper.
///
/// ```rust
/// use geofilter::filter::{and, property, Filter};
/// use geofilter::sql::{AnsiDialect, TableMapping, TableName, WhereBuilder};
///
/// let mapping = TableMapping::new(TableName::new("roads"))
///     .column("name", "name")
///     .column("lanes", "lanes");
/// let filter: Filter = and(vec![property("name").eq("Main"), property("lanes").ge(2)]).into();
///
/// let clause = WhereBuilder::new(&AnsiDialect, &mapping).build(&filter, &[]).unwrap();
/// assert_eq!(clause.where_sql, "(\"roads\".\"name\" = ?) AND (\"roads\".\"lanes\" >= ?)");
/// assert_eq!(clause.parameters.len(), 2);
/// ```
pub struct WhereBuilder<'a> {
    dialect: &'a dyn SqlDialect,
    mapper: &'a dyn PropertyNameMapper,
    policy: PartialMappingPolicy,
}

impl<'a> WhereBuilder<'a> {
    pub fn new(dialect: &'a dyn SqlDialect, mapper: &'a dyn PropertyNameMapper) -> Self {
        WhereBuilder {
            dialect,
            mapper,
            policy: PartialMappingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PartialMappingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PartialMappingPolicy {
        self.policy
    }

    pub fn build(&self, filter: &Filter, sort: &[SortCriterion]) -> GeoFilterResult<WhereClause> {
        self.assemble(filter, sort, Vec::new())
    }

    /// Like [`WhereBuilder::build`], resolving sort keys through the mapper.
    ///
    /// Under [`PartialMappingPolicy::BestEffort`] a single unmappable sort
    /// property moves the whole sort to [`WhereClause::post_sort`], since
    /// ordering by the remaining keys alone would be wrong.
    pub fn build_with_sort_properties(&self, filter: &Filter, sort: &[SortProperty]) -> GeoFilterResult<WhereClause> {
        let mut criteria = Vec::with_capacity(sort.len());
        for property in sort {
            match self.mapper.map_property(&property.reference) {
                Some(mapping) => criteria.push(SortCriterion {
                    column: mapping.column,
                    table: mapping.table,
                    ascending: property.order.is_ascending(),
                }),
                None => match self.policy {
                    PartialMappingPolicy::Strict => {
                        log::error!("Unable to map sort property '{}'", property.reference);
                        return Err(GeoFilterError::unmappable(property.reference.text()));
                    }
                    PartialMappingPolicy::BestEffort => {
                        log::debug!(
                            "Sort property '{}' is not mapped, sorting after retrieval",
                            property.reference
                        );
                        return self.assemble(filter, &[], sort.to_vec());
                    }
                },
            }
        }
        self.assemble(filter, &criteria, Vec::new())
    }

    fn assemble(
        &self,
        filter: &Filter,
        sort: &[SortCriterion],
        post_sort: Vec<SortProperty>,
    ) -> GeoFilterResult<WhereClause> {
        filter.validate()?;

        let mut compiler = Compiler {
            dialect: self.dialect,
            mapper: self.mapper,
            policy: self.policy,
            mapped: IndexSet::new(),
        };
        let (expression, relaxed) = match compiler.filter(filter)? {
            Pushdown::Exact(expression) => (expression, false),
            Pushdown::Relaxed(Some(expression)) => (expression, true),
            Pushdown::Relaxed(None) => (SqlExpression::True, true),
        };

        let mut parameters = Vec::new();
        let where_sql = expression.render(self.dialect, &mut parameters);

        let mut tables: IndexSet<TableName> = expression.tables().into_iter().cloned().collect();
        tables.extend(sort.iter().map(|c| c.table.clone()));

        let order_by = if sort.is_empty() {
            None
        } else {
            Some(
                sort.iter()
                    .map(|c| {
                        format!(
                            "{} {}",
                            self.dialect.qualified_column(&c.table, &c.column),
                            c.order().keyword()
                        )
                    })
                    .join(", "),
            )
        };

        Ok(WhereClause {
            where_sql,
            parameters,
            tables: tables.into_iter().collect(),
            order_by,
            expression,
            post_filter: if relaxed { Some(filter.clone()) } else { None },
            post_sort,
            mapped_properties: compiler.mapped.into_iter().collect(),
        })
    }
}

/// Compiles `filter` in one call.
pub fn build(
    dialect: &dyn SqlDialect,
    mapper: &dyn PropertyNameMapper,
    filter: &Filter,
    sort: &[SortCriterion],
    policy: PartialMappingPolicy,
) -> GeoFilterResult<WhereClause> {
    WhereBuilder::new(dialect, mapper)
        .with_policy(policy)
        .build(filter, sort)
}

/// Outcome of compiling a subtree.
enum Pushdown {
    /// Matches exactly the rows the subtree matches
    Exact(SqlExpression),
    /// Matches a superset; `None` means no constraint is left
    Relaxed(Option<SqlExpression>),
}

/// Reference text of the first operand that could not be mapped.
type Mapped<T> = Result<T, String>;

struct Compiler<'a> {
    dialect: &'a dyn SqlDialect,
    mapper: &'a dyn PropertyNameMapper,
    policy: PartialMappingPolicy,
    mapped: IndexSet<ValueReference>,
}

impl Compiler<'_> {
    fn filter(&mut self, filter: &Filter) -> GeoFilterResult<Pushdown> {
        match filter {
            Filter::Id(filter) => match self.id_filter(filter) {
                Ok(expression) => Ok(Pushdown::Exact(expression)),
                Err(reference) => self.unmappable(reference),
            },
            Filter::Operator(filter) => self.operator(&filter.root),
        }
    }

    fn unmappable(&self, reference: String) -> GeoFilterResult<Pushdown> {
        match self.policy {
            PartialMappingPolicy::Strict => {
                log::error!("Unable to map property '{}' to database column", reference);
                Err(GeoFilterError::unmappable(&reference))
            }
            PartialMappingPolicy::BestEffort => {
                log::debug!("Relaxing constraint on unmappable property '{}'", reference);
                Ok(Pushdown::Relaxed(None))
            }
        }
    }

    fn operator(&mut self, operator: &Operator) -> GeoFilterResult<Pushdown> {
        match operator {
            Operator::Logical(logical) => self.logical(logical),
            Operator::Comparison(comparison) => {
                let mark = self.mapped.len();
                match self.comparison(comparison) {
                    Ok(expression) => Ok(Pushdown::Exact(expression)),
                    Err(reference) => {
                        self.mapped.truncate(mark);
                        self.unmappable(reference)
                    }
                }
            }
            Operator::Spatial(spatial) => {
                let mark = self.mapped.len();
                match self.spatial(spatial) {
                    Ok(expression) => Ok(Pushdown::Exact(expression)),
                    Err(reference) => {
                        self.mapped.truncate(mark);
                        self.unmappable(reference)
                    }
                }
            }
        }
    }

    fn logical(&mut self, logical: &Logical) -> GeoFilterResult<Pushdown> {
        match logical {
            Logical::And(children) => {
                let mut kept = Vec::with_capacity(children.len());
                let mut relaxed = false;
                for child in children {
                    match self.operator(child)? {
                        Pushdown::Exact(expression) => kept.push(expression),
                        Pushdown::Relaxed(Some(expression)) => {
                            kept.push(expression);
                            relaxed = true;
                        }
                        Pushdown::Relaxed(None) => relaxed = true,
                    }
                }
                let expression = match kept.len() {
                    0 => None,
                    1 => kept.pop(),
                    _ => Some(SqlExpression::And(kept)),
                };
                Ok(match (expression, relaxed) {
                    (Some(expression), false) => Pushdown::Exact(expression),
                    (expression, _) => Pushdown::Relaxed(expression),
                })
            }
            Logical::Or(children) => {
                let mut branches = Vec::with_capacity(children.len());
                let mut relaxed = false;
                for child in children {
                    match self.operator(child)? {
                        Pushdown::Exact(expression) => branches.push(expression),
                        Pushdown::Relaxed(expression) => {
                            branches.push(expression.unwrap_or(SqlExpression::True));
                            relaxed = true;
                        }
                    }
                }
                let expression = SqlExpression::Or(branches);
                Ok(if relaxed {
                    Pushdown::Relaxed(Some(expression))
                } else {
                    Pushdown::Exact(expression)
                })
            }
            Logical::Not(child) => {
                let mark = self.mapped.len();
                match self.operator(child)? {
                    Pushdown::Exact(expression) => Ok(Pushdown::Exact(SqlExpression::Not(Box::new(expression)))),
                    Pushdown::Relaxed(_) => {
                        // negating a superset would give a subset
                        self.mapped.truncate(mark);
                        log::debug!("Relaxing negation of a relaxed constraint");
                        Ok(Pushdown::Relaxed(None))
                    }
                }
            }
        }
    }

    fn comparison(&mut self, comparison: &Comparison) -> Mapped<SqlExpression> {
        if comparison.match_action != MatchAction::Any {
            log::warn!(
                "Match action {:?} is compiled as Any for {}",
                comparison.match_action,
                comparison.op.symbol()
            );
        }
        let params = &comparison.params;
        let fold = !comparison.match_case && params.iter().all(is_textual);

        let expression = match comparison.op {
            ComparisonOp::IsNull => SqlExpression::IsNull(Box::new(self.operand(&params[0])?)),
            ComparisonOp::Between => SqlExpression::Between {
                expr: Box::new(case_fold(self.operand(&params[0])?, fold)),
                lower: Box::new(case_fold(self.operand(&params[1])?, fold)),
                upper: Box::new(case_fold(self.operand(&params[2])?, fold)),
            },
            ComparisonOp::Like(wildcards) => {
                let expr = SqlExpression::Cast(Box::new(self.operand(&params[0])?), SqlType::Text);
                let pattern = match params[1].as_literal().and_then(|l| l.value.as_str()) {
                    Some(pattern) => to_sql_pattern(pattern, &wildcards),
                    None => return Err(params[1].to_string()),
                };
                let fold = !comparison.match_case;
                SqlExpression::Like {
                    expr: Box::new(case_fold(expr, fold)),
                    pattern: Box::new(case_fold(SqlExpression::Argument(TypedValue::String(pattern)), fold)),
                }
            }
            ComparisonOp::Eq => self.compare(SqlComparison::Eq, params, fold)?,
            ComparisonOp::Ne => self.compare(SqlComparison::Ne, params, fold)?,
            ComparisonOp::Lt => self.compare(SqlComparison::Lt, params, fold)?,
            ComparisonOp::Gt => self.compare(SqlComparison::Gt, params, fold)?,
            ComparisonOp::Le => self.compare(SqlComparison::Le, params, fold)?,
            ComparisonOp::Ge => self.compare(SqlComparison::Ge, params, fold)?,
        };
        Ok(expression)
    }

    fn compare(&mut self, op: SqlComparison, params: &[Expression], fold: bool) -> Mapped<SqlExpression> {
        Ok(SqlExpression::Compare {
            op,
            left: Box::new(case_fold(self.operand(&params[0])?, fold)),
            right: Box::new(case_fold(self.operand(&params[1])?, fold)),
        })
    }

    fn operand(&mut self, expression: &Expression) -> Mapped<SqlExpression> {
        match expression {
            Expression::Literal(literal) => match &literal.value {
                TypedValue::Geometry(_) => Err(expression.to_string()),
                value => Ok(SqlExpression::Argument(value.clone())),
            },
            Expression::ValueReference(reference) => {
                let mapping = self
                    .mapper
                    .map_property(reference)
                    .ok_or_else(|| reference.text().to_string())?;
                self.mapped.insert(reference.clone());
                Ok(SqlExpression::column(&mapping.table, &mapping.column))
            }
            // no function is known to every database
            Expression::Function(_) => Err(self.function_reference(expression)),
        }
    }

    /// Names what makes a function call unmappable: the first nested reference
    /// the mapper rejects, else the first reference it reads, else the call.
    fn function_reference(&self, function: &Expression) -> String {
        let mut references = Vec::new();
        collect_references(function, &mut references);
        references
            .iter()
            .find(|reference| self.mapper.map_property(reference).is_none())
            .or_else(|| references.first())
            .map(|reference| reference.text().to_string())
            .unwrap_or_else(|| function.to_string())
    }

    fn spatial(&mut self, spatial: &Spatial) -> Mapped<SqlExpression> {
        let reference = spatial
            .property
            .as_value_reference()
            .ok_or_else(|| spatial.property.to_string())?;
        let mapping = self
            .mapper
            .map_property(reference)
            .ok_or_else(|| reference.text().to_string())?;
        let srid = match mapping.kind {
            ColumnKind::Geometry { srid } => srid,
            ColumnKind::Primitive => return Err(reference.text().to_string()),
        };
        let syntax = self
            .dialect
            .spatial_predicate(&spatial.op)
            .ok_or_else(|| reference.text().to_string())?;

        self.mapped.insert(reference.clone());
        Ok(SqlExpression::Spatial {
            op: spatial.op,
            syntax,
            column: Box::new(SqlExpression::column(&mapping.table, &mapping.column)),
            geometry: Box::new(SqlExpression::GeometryArgument {
                geometry: spatial.geometry.clone(),
                srid,
            }),
        })
    }

    fn id_filter(&self, filter: &IdFilter) -> Mapped<SqlExpression> {
        let mapping = self.mapper.map_id().ok_or_else(|| "@id".to_string())?;
        let column = SqlExpression::column(&mapping.table, &mapping.column);
        let id = match mapping.prefix {
            Some(prefix) => SqlExpression::Concat(
                Box::new(SqlExpression::Argument(TypedValue::String(prefix))),
                Box::new(SqlExpression::Cast(Box::new(column), SqlType::Text)),
            ),
            None => column,
        };
        Ok(SqlExpression::IdIn {
            id: Box::new(id),
            ids: filter.matching_ids().iter().cloned().collect(),
        })
    }
}

/// Case folding only applies when no operand is a non-text literal.
fn is_textual(expression: &Expression) -> bool {
    match expression {
        Expression::Literal(literal) => matches!(literal.value, TypedValue::String(_)),
        _ => true,
    }
}

fn case_fold(expression: SqlExpression, fold: bool) -> SqlExpression {
    if fold {
        SqlExpression::CaseFold(Box::new(expression))
    } else {
        expression
    }
}

fn collect_references<'a>(expression: &'a Expression, out: &mut Vec<&'a ValueReference>) {
    if let Expression::ValueReference(reference) = expression {
        out.push(reference);
    }
    for param in expression.get_params() {
        collect_references(param, out);
    }
}
