use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for filter evaluation and compilation.
///
/// Each kind names a category of failure so callers can branch on it without
/// parsing messages.
///
/// # Examples
///
/// ```rust
/// use geofilter::errors::{ErrorKind, GeoFilterError, GeoFilterResult};
///
/// fn resolve() -> GeoFilterResult<()> {
///     Err(GeoFilterError::new("no value for 'name'", ErrorKind::EvaluationError))
/// }
/// assert!(resolve().is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A path could not be resolved or a value could not be compared while
    /// evaluating a filter in memory
    EvaluationError,
    /// A property could not be mapped to a column; carries the reference text
    Unmappable(String),
    /// The filter tree is malformed (wrong arity, empty logical group)
    InvalidFilter,
    /// A property path is outside the supported XPath subset
    InvalidPath,
    /// A geometry has no coordinates or an envelope is inverted
    InvalidGeometry,
    /// A function or operation has no implementation
    NotImplemented,
    /// Operands have incompatible types
    TypeMismatch,
    /// Error from an extension crate (e.g. "spatial")
    Extension(String),
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::EvaluationError => write!(f, "Evaluation error"),
            ErrorKind::Unmappable(reference) => write!(f, "Unmappable property '{}'", reference),
            ErrorKind::InvalidFilter => write!(f, "Invalid filter"),
            ErrorKind::InvalidPath => write!(f, "Invalid path"),
            ErrorKind::InvalidGeometry => write!(f, "Invalid geometry"),
            ErrorKind::NotImplemented => write!(f, "Not implemented"),
            ErrorKind::TypeMismatch => write!(f, "Type mismatch"),
            ErrorKind::Extension(name) => write!(f, "{} error", name),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type shared by the filter model, the evaluator and the SQL compiler.
///
/// Carries a message, a kind, an optional cause and the backtrace captured at
/// construction.
///
/// ```rust
/// use geofilter::errors::{ErrorKind, GeoFilterError};
///
/// let cause = GeoFilterError::new("bad step 'a[x]'", ErrorKind::InvalidPath);
/// let err = GeoFilterError::new_with_cause("cannot evaluate", ErrorKind::EvaluationError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct GeoFilterError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<GeoFilterError>>,
    backtrace: Arc<Backtrace>,
}

impl GeoFilterError {
    /// Creates a new error with the given message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        GeoFilterError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new error that wraps `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: GeoFilterError) -> Self {
        GeoFilterError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates the error raised when a property cannot be mapped to a column.
    pub fn unmappable(reference: &str) -> Self {
        GeoFilterError::new(
            &format!("Unable to map property '{}' to database column.", reference),
            ErrorKind::Unmappable(reference.to_string()),
        )
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&GeoFilterError> {
        self.cause.as_deref()
    }

    pub fn is_unmappable(&self) -> bool {
        matches!(self.error_kind, ErrorKind::Unmappable(_))
    }

    /// The reference text of an unmappable error, if this is one.
    pub fn unmappable_reference(&self) -> Option<&str> {
        match &self.error_kind {
            ErrorKind::Unmappable(reference) => Some(reference),
            _ => None,
        }
    }
}

impl Display for GeoFilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for GeoFilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for GeoFilterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, GeoFilterError>`.
pub type GeoFilterResult<T> = Result<T, GeoFilterError>;

impl From<std::fmt::Error> for GeoFilterError {
    fn from(err: std::fmt::Error) -> Self {
        GeoFilterError::new(&format!("Formatting error: {}", err), ErrorKind::InternalError)
    }
}

impl From<std::num::ParseIntError> for GeoFilterError {
    fn from(err: std::num::ParseIntError) -> Self {
        GeoFilterError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::TypeMismatch,
        )
    }
}

impl From<std::num::ParseFloatError> for GeoFilterError {
    fn from(err: std::num::ParseFloatError) -> Self {
        GeoFilterError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::TypeMismatch,
        )
    }
}

impl From<regex::Error> for GeoFilterError {
    fn from(err: regex::Error) -> Self {
        GeoFilterError::new(&format!("Invalid pattern: {}", err), ErrorKind::InvalidFilter)
    }
}

impl From<String> for GeoFilterError {
    fn from(msg: String) -> Self {
        GeoFilterError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for GeoFilterError {
    fn from(msg: &str) -> Self {
        GeoFilterError::new(msg, ErrorKind::InternalError)
    }
}
