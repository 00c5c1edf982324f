use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::errors::{ErrorKind, GeoFilterError, GeoFilterResult};
use crate::geometry::{Envelope, Geometry};

/// Compare two floats, NaN is unordered.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Option<Ordering> {
    a.partial_cmp(&b)
}

/// A typed scalar selected from a feature or carried by a literal.
///
/// Integers and doubles compare numerically with each other. Strings that
/// hold a number compare numerically against numbers, which mirrors how
/// literal text in a filter is interpreted against a numeric property.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypedValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Geometry(Geometry),
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypedValue::Null, TypedValue::Null) => true,
            (TypedValue::Bool(a), TypedValue::Bool(b)) => a == b,
            (TypedValue::Integer(a), TypedValue::Integer(b)) => a == b,
            (TypedValue::Double(a), TypedValue::Double(b)) => a == b,
            (TypedValue::Integer(a), TypedValue::Double(b))
            | (TypedValue::Double(b), TypedValue::Integer(a)) => (*a as f64) == *b,
            (TypedValue::String(a), TypedValue::String(b)) => a == b,
            (TypedValue::Geometry(a), TypedValue::Geometry(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for TypedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypedValue::Null => write!(f, "NULL"),
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Double(d) => write!(f, "{}", d),
            TypedValue::String(s) => write!(f, "'{}'", s),
            TypedValue::Geometry(g) => write!(f, "{}", g),
        }
    }
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, TypedValue::Integer(_) | TypedValue::Double(_))
    }

    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            TypedValue::Geometry(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value; strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Integer(i) => Some(*i as f64),
            TypedValue::Double(d) => Some(*d),
            TypedValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Text form used for pattern matching. `None` for null and geometries.
    pub fn as_text(&self) -> Option<String> {
        match self {
            TypedValue::Null | TypedValue::Geometry(_) => None,
            TypedValue::Bool(b) => Some(b.to_string()),
            TypedValue::Integer(i) => Some(i.to_string()),
            TypedValue::Double(d) => Some(d.to_string()),
            TypedValue::String(s) => Some(s.clone()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Null => "null",
            TypedValue::Bool(_) => "boolean",
            TypedValue::Integer(_) => "integer",
            TypedValue::Double(_) => "double",
            TypedValue::String(_) => "string",
            TypedValue::Geometry(_) => "geometry",
        }
    }

    /// Orders two values for a comparison operator.
    ///
    /// Returns `Ok(None)` when either side is null or a NaN is involved, and
    /// a [`ErrorKind::TypeMismatch`] error when the two values cannot be
    /// compared at all.
    pub fn compare(&self, other: &TypedValue, match_case: bool) -> GeoFilterResult<Option<Ordering>> {
        match (self, other) {
            (TypedValue::Null, _) | (_, TypedValue::Null) => Ok(None),
            (TypedValue::Integer(a), TypedValue::Integer(b)) => Ok(Some(a.cmp(b))),
            (a, b) if a.is_number() && b.is_number() => {
                Ok(num_cmp_float(a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN)))
            }
            (TypedValue::String(a), TypedValue::String(b)) => {
                if match_case {
                    Ok(Some(a.cmp(b)))
                } else {
                    Ok(Some(a.to_lowercase().cmp(&b.to_lowercase())))
                }
            }
            (TypedValue::String(s), n) | (n, TypedValue::String(s)) if n.is_number() => {
                let parsed = s.trim().parse::<f64>().map_err(|_| {
                    type_mismatch(self, other)
                })?;
                let number = n.as_f64().unwrap_or(f64::NAN);
                // keep the operand order of the original call
                if matches!(self, TypedValue::String(_)) {
                    Ok(num_cmp_float(parsed, number))
                } else {
                    Ok(num_cmp_float(number, parsed))
                }
            }
            (TypedValue::Bool(a), TypedValue::Bool(b)) => Ok(Some(a.cmp(b))),
            (TypedValue::Bool(b), TypedValue::String(s)) => {
                let parsed = parse_bool(s).ok_or_else(|| type_mismatch(self, other))?;
                Ok(Some(b.cmp(&parsed)))
            }
            (TypedValue::String(s), TypedValue::Bool(b)) => {
                let parsed = parse_bool(s).ok_or_else(|| type_mismatch(self, other))?;
                Ok(Some(parsed.cmp(b)))
            }
            (TypedValue::Geometry(a), TypedValue::Geometry(b)) => {
                if a == b {
                    Ok(Some(Ordering::Equal))
                } else {
                    Err(type_mismatch(self, other))
                }
            }
            _ => Err(type_mismatch(self, other)),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn type_mismatch(a: &TypedValue, b: &TypedValue) -> GeoFilterError {
    log::error!("Cannot compare {} value {} with {} value {}", a.type_name(), a, b.type_name(), b);
    GeoFilterError::new(
        &format!(
            "Cannot compare {} value {} with {} value {}",
            a.type_name(),
            a,
            b.type_name(),
            b
        ),
        ErrorKind::TypeMismatch,
    )
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Bool(value)
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        TypedValue::Integer(value as i64)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<u32> for TypedValue {
    fn from(value: u32) -> Self {
        TypedValue::Integer(value as i64)
    }
}

impl From<f32> for TypedValue {
    fn from(value: f32) -> Self {
        TypedValue::Double(value as f64)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Double(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<Geometry> for TypedValue {
    fn from(value: Geometry) -> Self {
        TypedValue::Geometry(value)
    }
}

impl From<Envelope> for TypedValue {
    fn from(value: Envelope) -> Self {
        TypedValue::Geometry(Geometry::Envelope(value))
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => TypedValue::Null,
        }
    }
}
