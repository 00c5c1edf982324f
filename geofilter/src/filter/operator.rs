use std::fmt::{Display, Formatter};

use crate::errors::{ErrorKind, GeoFilterError, GeoFilterResult};
use crate::geometry::Geometry;

use super::expression::Expression;

/// A node of the predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Comparison(Comparison),
    Logical(Logical),
    Spatial(Spatial),
}

impl Operator {
    /// Checks the structural rules the type system does not enforce: operand
    /// counts, logical groups of at least two children, non-negative
    /// distances and geometries with an envelope.
    pub fn validate(&self) -> GeoFilterResult<()> {
        match self {
            Operator::Comparison(comparison) => comparison.validate(),
            Operator::Logical(logical) => logical.validate(),
            Operator::Spatial(spatial) => spatial.validate(),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Comparison(comparison) => write!(f, "{}", comparison),
            Operator::Logical(logical) => write!(f, "{}", logical),
            Operator::Spatial(spatial) => write!(f, "{}", spatial),
        }
    }
}

fn malformed(message: String) -> GeoFilterError {
    log::error!("{}", message);
    GeoFilterError::new(&message, ErrorKind::InvalidFilter)
}

/// Characters with special meaning in a `Like` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeWildcards {
    /// Matches any run of characters, `*` by default
    pub wild_card: char,
    /// Matches exactly one character, `?` by default
    pub single_char: char,
    /// Makes the next character literal, `\` by default
    pub escape_char: char,
}

impl Default for LikeWildcards {
    fn default() -> Self {
        LikeWildcards {
            wild_card: '*',
            single_char: '?',
            escape_char: '\\',
        }
    }
}

impl LikeWildcards {
    /// Splits `pattern` into literal characters and wildcards. An escape
    /// character at the very end is taken literally.
    pub fn tokenize(&self, pattern: &str) -> Vec<LikeToken> {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c == self.escape_char {
                tokens.push(LikeToken::Literal(chars.next().unwrap_or(c)));
            } else if c == self.wild_card {
                tokens.push(LikeToken::AnyRun);
            } else if c == self.single_char {
                tokens.push(LikeToken::OneChar);
            } else {
                tokens.push(LikeToken::Literal(c));
            }
        }
        tokens
    }
}

/// One element of a tokenized `Like` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToken {
    Literal(char),
    /// Any run of characters, possibly empty
    AnyRun,
    /// Exactly one character
    OneChar,
}

/// How a comparison combines the values of a multi-valued operand.
///
/// Every value of the left operand is tested against every value of the
/// right operand; `Any` needs one matching pair, `All` needs every pair to
/// match and `One` needs exactly one matching pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchAction {
    #[default]
    Any,
    All,
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like(LikeWildcards),
    IsNull,
    Between,
}

impl ComparisonOp {
    /// Number of operands the operator takes.
    pub fn arity(&self) -> usize {
        match self {
            ComparisonOp::IsNull => 1,
            ComparisonOp::Between => 3,
            ComparisonOp::Eq
            | ComparisonOp::Ne
            | ComparisonOp::Lt
            | ComparisonOp::Gt
            | ComparisonOp::Le
            | ComparisonOp::Ge
            | ComparisonOp::Like(_) => 2,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
            ComparisonOp::Le => "<=",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Like(_) => "LIKE",
            ComparisonOp::IsNull => "IS NULL",
            ComparisonOp::Between => "BETWEEN",
        }
    }
}

/// A comparison over its operand expressions.
///
/// Operand layout: binary operators and `Like` take `[lhs, rhs]` (the
/// pattern is `rhs`), `IsNull` takes `[expr]`, `Between` takes
/// `[expr, lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub params: Vec<Expression>,
    pub match_case: bool,
    pub match_action: MatchAction,
}

impl Comparison {
    /// A case sensitive comparison with [`MatchAction::Any`].
    pub fn new(op: ComparisonOp, params: Vec<Expression>) -> Self {
        Comparison {
            op,
            params,
            match_case: true,
            match_action: MatchAction::Any,
        }
    }

    pub fn validate(&self) -> GeoFilterResult<()> {
        if self.params.len() != self.op.arity() {
            return Err(malformed(format!(
                "{} expects {} operand(s) but has {}",
                self.op.symbol(),
                self.op.arity(),
                self.params.len()
            )));
        }
        Ok(())
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let p = &self.params;
        match (self.op, p.len()) {
            (ComparisonOp::IsNull, 1) => write!(f, "({} IS NULL)", p[0]),
            (ComparisonOp::Between, 3) => {
                write!(f, "({} BETWEEN {} AND {})", p[0], p[1], p[2])
            }
            (op, 2) => write!(f, "({} {} {})", p[0], op.symbol(), p[1]),
            (op, _) => {
                write!(f, "({}", op.symbol())?;
                for param in p {
                    write!(f, " {}", param)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Boolean combination of operators. `Not` has exactly one child by
/// construction; `And` and `Or` need at least two.
#[derive(Debug, Clone, PartialEq)]
pub enum Logical {
    And(Vec<Operator>),
    Or(Vec<Operator>),
    Not(Box<Operator>),
}

impl Logical {
    /// The child operators in order.
    pub fn children(&self) -> &[Operator] {
        match self {
            Logical::And(children) => children,
            Logical::Or(children) => children,
            Logical::Not(child) => std::slice::from_ref(child.as_ref()),
        }
    }

    pub fn validate(&self) -> GeoFilterResult<()> {
        match self {
            Logical::And(children) | Logical::Or(children) if children.len() < 2 => {
                Err(malformed(format!(
                    "{} needs at least two operands but has {}",
                    self.keyword(),
                    children.len()
                )))
            }
            _ => self.children().iter().try_for_each(Operator::validate),
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Logical::And(_) => "AND",
            Logical::Or(_) => "OR",
            Logical::Not(_) => "NOT",
        }
    }
}

impl Display for Logical {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Logical::Not(child) => write!(f, "NOT {}", child),
            Logical::And(children) | Logical::Or(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", self.keyword())?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Spatial predicates, all decided on bounding boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialOp {
    BBox,
    Intersects,
    Within,
    Contains,
    Disjoint,
    Equals,
    Touches,
    Overlaps,
    /// Within the given distance of the operand geometry
    DWithin(f64),
    /// Farther than the given distance from the operand geometry
    Beyond(f64),
}

impl SpatialOp {
    pub fn name(&self) -> &'static str {
        match self {
            SpatialOp::BBox => "BBOX",
            SpatialOp::Intersects => "INTERSECTS",
            SpatialOp::Within => "WITHIN",
            SpatialOp::Contains => "CONTAINS",
            SpatialOp::Disjoint => "DISJOINT",
            SpatialOp::Equals => "EQUALS",
            SpatialOp::Touches => "TOUCHES",
            SpatialOp::Overlaps => "OVERLAPS",
            SpatialOp::DWithin(_) => "DWITHIN",
            SpatialOp::Beyond(_) => "BEYOND",
        }
    }

    pub fn distance(&self) -> Option<f64> {
        match self {
            SpatialOp::DWithin(d) | SpatialOp::Beyond(d) => Some(*d),
            _ => None,
        }
    }
}

/// A spatial predicate between a property and a literal geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Spatial {
    pub op: SpatialOp,
    pub property: Expression,
    pub geometry: Geometry,
}

impl Spatial {
    pub fn new(op: SpatialOp, property: Expression, geometry: Geometry) -> Self {
        Spatial {
            op,
            property,
            geometry,
        }
    }

    pub fn validate(&self) -> GeoFilterResult<()> {
        if let Some(distance) = self.op.distance() {
            if distance.is_nan() || distance < 0.0 {
                return Err(malformed(format!(
                    "{} distance must be a non-negative number, got {}",
                    self.op.name(),
                    distance
                )));
            }
        }
        self.geometry.envelope().map(|_| ())
    }
}

impl Display for Spatial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.op.distance() {
            Some(d) => write!(
                f,
                "({} {}({}) {})",
                self.property,
                self.op.name(),
                d,
                self.geometry
            ),
            None => write!(f, "({} {} {})", self.property, self.op.name(), self.geometry),
        }
    }
}
