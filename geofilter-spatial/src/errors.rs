//! Error types for spatial indexes and the feature store.

use geofilter::errors::{ErrorKind, GeoFilterError};
use thiserror::Error;

/// Errors that can occur while configuring an index or maintaining the
/// feature store. Routine index operations report misses as booleans.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Envelope {0} lies outside the indexed domain")]
    OutOfDomain(String),

    #[error(transparent)]
    Filter(#[from] GeoFilterError),
}

impl From<SpatialError> for GeoFilterError {
    fn from(err: SpatialError) -> Self {
        match err {
            SpatialError::InvalidOperation(msg) => {
                GeoFilterError::new(&msg, ErrorKind::Extension("spatial".to_string()))
            }
            SpatialError::OutOfDomain(envelope) => GeoFilterError::new(
                &format!("Envelope {} lies outside the indexed domain", envelope),
                ErrorKind::InvalidGeometry,
            ),
            SpatialError::Filter(err) => err,
        }
    }
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;
