use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::common::{QualifiedName, TypedValue};
use crate::errors::GeoFilterResult;

use super::xpath::{parse_path, parse_qname, PathStep};

/// An operand of a comparison or spatial operator.
///
/// Every variant exposes its children through [`Expression::get_params`], so
/// tree walkers never need to special-case a variant to find nested
/// references.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    ValueReference(ValueReference),
    Function(Function),
}

impl Expression {
    /// Child expressions; empty for literals and references.
    pub fn get_params(&self) -> &[Expression] {
        match self {
            Expression::Literal(_) => &[],
            Expression::ValueReference(_) => &[],
            Expression::Function(function) => &function.params,
        }
    }

    pub fn as_value_reference(&self) -> Option<&ValueReference> {
        match self {
            Expression::ValueReference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expression::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal.value),
            Expression::ValueReference(reference) => write!(f, "{}", reference.text),
            Expression::Function(function) => {
                write!(f, "{}(", function.name)?;
                for (i, param) in function.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Expression::Literal(literal)
    }
}

impl From<ValueReference> for Expression {
    fn from(reference: ValueReference) -> Self {
        Expression::ValueReference(reference)
    }
}

impl From<Function> for Expression {
    fn from(function: Function) -> Self {
        Expression::Function(function)
    }
}

/// A constant operand, optionally tagged with the schema type it was
/// declared as.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: TypedValue,
    pub type_name: Option<QualifiedName>,
}

impl Literal {
    pub fn new<T: Into<TypedValue>>(value: T) -> Self {
        Literal {
            value: value.into(),
            type_name: None,
        }
    }

    pub fn typed<T: Into<TypedValue>>(value: T, type_name: QualifiedName) -> Self {
        Literal {
            value: value.into(),
            type_name: Some(type_name),
        }
    }
}

/// A property path selecting values from the object a filter is matched
/// against.
///
/// When the path is a single child step without predicate (`name` or
/// `prefix:name`) the reference also carries the resolved qualified name,
/// which stores and mappers use for direct field or column lookup.
///
/// Equality and hashing only look at the path text.
#[derive(Debug, Clone)]
pub struct ValueReference {
    text: String,
    namespace_bindings: BTreeMap<String, String>,
    resolved_name: Option<QualifiedName>,
}

impl ValueReference {
    /// A reference without namespace bindings.
    pub fn new(text: &str) -> Self {
        ValueReference::with_bindings(text, BTreeMap::new())
    }

    /// A reference whose prefixes resolve against `namespace_bindings`
    /// (prefix to namespace URI, the empty prefix binds the default namespace).
    pub fn with_bindings(text: &str, namespace_bindings: BTreeMap<String, String>) -> Self {
        let resolved_name = parse_qname(text, &namespace_bindings);
        ValueReference {
            text: text.to_string(),
            namespace_bindings,
            resolved_name,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn namespace_bindings(&self) -> &BTreeMap<String, String> {
        &self.namespace_bindings
    }

    pub fn resolved_name(&self) -> Option<&QualifiedName> {
        self.resolved_name.as_ref()
    }

    /// Parses the path into steps of the supported XPath subset.
    pub fn steps(&self) -> GeoFilterResult<Vec<PathStep>> {
        parse_path(&self.text, &self.namespace_bindings)
    }
}

impl PartialEq for ValueReference {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for ValueReference {}

impl Hash for ValueReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Display for ValueReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A named function applied to parameter expressions.
///
/// The filter model does not know any function; evaluation goes through a
/// [`crate::evaluator::FunctionRegistry`] and fails with
/// [`crate::errors::ErrorKind::NotImplemented`] for unknown names.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Expression>,
}

impl Function {
    pub fn new(name: &str, params: Vec<Expression>) -> Self {
        Function {
            name: name.to_string(),
            params,
        }
    }
}
