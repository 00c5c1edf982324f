use std::fmt::{Display, Formatter};

use crate::filter::SpatialOp;

use super::mapper::TableName;

/// Column types a dialect can cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Text,
    Integer,
    Double,
    Boolean,
}

impl Display for SqlType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Integer => write!(f, "BIGINT"),
            SqlType::Double => write!(f, "DOUBLE PRECISION"),
            SqlType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// How a dialect spells a spatial predicate.
///
/// Every form compares bounding boxes so the database agrees with in-memory
/// evaluation, which never looks past a geometry's envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialSyntax {
    /// `column <op> geometry`
    BoxOperator(&'static str),
    /// `NOT (column <op> geometry)`
    NegatedBoxOperator(&'static str),
    /// Boxes that share a point while neither holds the other:
    /// `(column <intersects> geometry) AND NOT (column <within> geometry)
    /// AND NOT (column <contains> geometry)`
    BoxOverlap {
        intersects: &'static str,
        within: &'static str,
        contains: &'static str,
    },
    /// `name(envelope(column), envelope(geometry), distance)`, optionally negated
    EnvelopeDistance {
        name: &'static str,
        envelope: &'static str,
        negated: bool,
    },
}

/// The pieces of SQL that differ between databases.
///
/// Every method has an ANSI flavoured default; dialects override what their
/// database spells differently. Spatial support is opt in through
/// [`SqlDialect::spatial_predicate`].
pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &str;

    fn leading_escape_char(&self) -> char {
        '"'
    }

    fn trailing_escape_char(&self) -> char {
        '"'
    }

    /// Quotes an identifier, doubling any embedded closing quote.
    fn quote_identifier(&self, identifier: &str) -> String {
        let trailing = self.trailing_escape_char();
        let mut quoted = String::with_capacity(identifier.len() + 2);
        quoted.push(self.leading_escape_char());
        for c in identifier.chars() {
            if c == trailing {
                quoted.push(c);
            }
            quoted.push(c);
        }
        quoted.push(trailing);
        quoted
    }

    fn table_reference(&self, table: &TableName) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.name)
            ),
            None => self.quote_identifier(&table.name),
        }
    }

    fn qualified_column(&self, table: &TableName, column: &str) -> String {
        format!("{}.{}", self.table_reference(table), self.quote_identifier(column))
    }

    fn string_concat(&self, left: &str, right: &str) -> String {
        format!("({} || {})", left, right)
    }

    fn cast(&self, expr: &str, sql_type: SqlType) -> String {
        format!("CAST({} AS {})", expr, sql_type)
    }

    fn case_fold(&self, expr: &str) -> String {
        format!("LOWER({})", expr)
    }

    /// Aggregate computing the bounding box of a geometry column, if the
    /// database has one.
    fn bbox_aggregate(&self, _column: &str) -> Option<String> {
        None
    }

    fn supports_row_limit(&self) -> bool {
        false
    }

    /// Appends a row limit to `statement`. Only called when
    /// [`SqlDialect::supports_row_limit`] is true.
    fn row_limit(&self, statement: &str, _limit: usize) -> String {
        statement.to_string()
    }

    /// Placeholder for a geometry bind parameter; geometries are bound as
    /// WKT text.
    fn geometry_placeholder(&self, _srid: Option<i32>) -> String {
        "?".to_string()
    }

    /// Syntax for `op`, or `None` if the database cannot evaluate it.
    fn spatial_predicate(&self, _op: &SpatialOp) -> Option<SpatialSyntax> {
        None
    }
}

/// Plain SQL without spatial support.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl SqlDialect for AnsiDialect {
    fn name(&self) -> &str {
        "ansi"
    }
}

/// PostgreSQL with PostGIS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostGisDialect;

impl SqlDialect for PostGisDialect {
    fn name(&self) -> &str {
        "postgis"
    }

    fn cast(&self, expr: &str, sql_type: SqlType) -> String {
        format!("{}::{}", expr, sql_type)
    }

    fn bbox_aggregate(&self, column: &str) -> Option<String> {
        Some(format!("ST_Extent({})::BOX2D", column))
    }

    fn supports_row_limit(&self) -> bool {
        true
    }

    fn row_limit(&self, statement: &str, limit: usize) -> String {
        format!("{} LIMIT {}", statement, limit)
    }

    fn geometry_placeholder(&self, srid: Option<i32>) -> String {
        match srid {
            Some(srid) => format!("ST_GeomFromText(?, {})", srid),
            None => "ST_GeomFromText(?)".to_string(),
        }
    }

    fn spatial_predicate(&self, op: &SpatialOp) -> Option<SpatialSyntax> {
        let syntax = match op {
            SpatialOp::BBox | SpatialOp::Intersects => SpatialSyntax::BoxOperator("&&"),
            SpatialOp::Within => SpatialSyntax::BoxOperator("@"),
            SpatialOp::Contains => SpatialSyntax::BoxOperator("~"),
            SpatialOp::Equals => SpatialSyntax::BoxOperator("~="),
            SpatialOp::Disjoint => SpatialSyntax::NegatedBoxOperator("&&"),
            SpatialOp::Overlaps => SpatialSyntax::BoxOverlap {
                intersects: "&&",
                within: "@",
                contains: "~",
            },
            SpatialOp::DWithin(_) => SpatialSyntax::EnvelopeDistance {
                name: "ST_DWithin",
                envelope: "ST_Envelope",
                negated: false,
            },
            SpatialOp::Beyond(_) => SpatialSyntax::EnvelopeDistance {
                name: "ST_DWithin",
                envelope: "ST_Envelope",
                negated: true,
            },
            // no box operator separates boundary contact from interior overlap
            SpatialOp::Touches => return None,
        };
        Some(syntax)
    }
}
