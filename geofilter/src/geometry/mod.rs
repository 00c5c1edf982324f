//! Geometry values used as spatial operands.
//!
//! Geometries here are plain coordinate containers. Every spatial test in the
//! crate works on their [`Envelope`], so the only operation a geometry must
//! support is [`Geometry::envelope`]. Coordinate reference systems are not
//! modelled; SRIDs live on geometry column mappings in [`crate::sql`].

mod envelope;

pub use envelope::Envelope;

use std::fmt::{self, Display};

use crate::errors::{ErrorKind, GeoFilterError, GeoFilterResult};

/// A 2D coordinate (x, y).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

/// A geometry value.
///
/// `MultiGeometry` holds homogeneous members (multi-point, multi-polygon, ...)
/// while `Composite` holds members forming one connected geometry (composite
/// curve, composite surface). Both are collections for every operation in
/// this crate, each handled by its own match arm.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    Point(Coordinate),
    LineString(Vec<Coordinate>),
    Polygon {
        exterior: Vec<Coordinate>,
        interiors: Vec<Vec<Coordinate>>,
    },
    Envelope(Envelope),
    MultiGeometry(Vec<Geometry>),
    Composite(Vec<Geometry>),
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point(Coordinate::new(x, y))
    }

    pub fn line_string(coordinates: Vec<Coordinate>) -> Self {
        Geometry::LineString(coordinates)
    }

    /// A polygon without holes.
    pub fn polygon(exterior: Vec<Coordinate>) -> Self {
        Geometry::Polygon {
            exterior,
            interiors: Vec::new(),
        }
    }

    pub fn envelope_of(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Geometry::Envelope(Envelope::new(min_x, min_y, max_x, max_y))
    }

    pub fn multi(members: Vec<Geometry>) -> Self {
        Geometry::MultiGeometry(members)
    }

    pub fn composite(members: Vec<Geometry>) -> Self {
        Geometry::Composite(members)
    }

    /// The bounding box of this geometry.
    ///
    /// Fails with [`ErrorKind::InvalidGeometry`] for geometries without any
    /// coordinate (empty rings, empty collections).
    pub fn envelope(&self) -> GeoFilterResult<Envelope> {
        match self {
            Geometry::Point(c) => Ok(Envelope::point(c.x, c.y)),
            Geometry::LineString(coordinates) => coordinates_envelope(coordinates),
            // holes lie inside the exterior ring
            Geometry::Polygon { exterior, .. } => coordinates_envelope(exterior),
            Geometry::Envelope(envelope) => Ok(*envelope),
            Geometry::MultiGeometry(members) => members_envelope(members),
            Geometry::Composite(members) => members_envelope(members),
        }
    }

    pub fn is_collection(&self) -> bool {
        match self {
            Geometry::Point(_)
            | Geometry::LineString(_)
            | Geometry::Polygon { .. }
            | Geometry::Envelope(_) => false,
            Geometry::MultiGeometry(_) => true,
            Geometry::Composite(_) => true,
        }
    }

    /// Member geometries of a collection; empty for primitives.
    pub fn members(&self) -> &[Geometry] {
        match self {
            Geometry::Point(_)
            | Geometry::LineString(_)
            | Geometry::Polygon { .. }
            | Geometry::Envelope(_) => &[],
            Geometry::MultiGeometry(members) => members,
            Geometry::Composite(members) => members,
        }
    }
}

impl From<Envelope> for Geometry {
    fn from(envelope: Envelope) -> Self {
        Geometry::Envelope(envelope)
    }
}

fn coordinates_envelope(coordinates: &[Coordinate]) -> GeoFilterResult<Envelope> {
    let mut iter = coordinates.iter();
    let first = match iter.next() {
        Some(c) => c,
        None => {
            log::error!("Geometry without coordinates has no envelope");
            return Err(GeoFilterError::new(
                "Geometry without coordinates has no envelope",
                ErrorKind::InvalidGeometry,
            ));
        }
    };
    Ok(iter.fold(Envelope::point(first.x, first.y), |env, c| {
        env.union(&Envelope::point(c.x, c.y))
    }))
}

fn members_envelope(members: &[Geometry]) -> GeoFilterResult<Envelope> {
    let mut result: Option<Envelope> = None;
    for member in members {
        let env = member.envelope()?;
        result = Some(match result {
            Some(acc) => acc.union(&env),
            None => env,
        });
    }
    result.ok_or_else(|| {
        log::error!("Empty geometry collection has no envelope");
        GeoFilterError::new(
            "Empty geometry collection has no envelope",
            ErrorKind::InvalidGeometry,
        )
    })
}

fn write_ring(f: &mut fmt::Formatter<'_>, ring: &[Coordinate]) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in ring.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", c)?;
    }
    write!(f, ")")
}

fn write_members(f: &mut fmt::Formatter<'_>, members: &[Geometry]) -> fmt::Result {
    if members.is_empty() {
        return write!(f, "GEOMETRYCOLLECTION EMPTY");
    }
    write!(f, "GEOMETRYCOLLECTION (")?;
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", member)?;
    }
    write!(f, ")")
}

/// Well-known text.
impl Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Geometry::Point(c) => write!(f, "POINT ({})", c),
            Geometry::LineString(coordinates) if coordinates.is_empty() => {
                write!(f, "LINESTRING EMPTY")
            }
            Geometry::LineString(coordinates) => {
                write!(f, "LINESTRING ")?;
                write_ring(f, coordinates)
            }
            Geometry::Polygon { exterior, .. } if exterior.is_empty() => {
                write!(f, "POLYGON EMPTY")
            }
            Geometry::Polygon { exterior, interiors } => {
                write!(f, "POLYGON (")?;
                write_ring(f, exterior)?;
                for ring in interiors {
                    write!(f, ", ")?;
                    write_ring(f, ring)?;
                }
                write!(f, ")")
            }
            Geometry::Envelope(env) => write!(
                f,
                "POLYGON (({minx} {miny}, {maxx} {miny}, {maxx} {maxy}, {minx} {maxy}, {minx} {miny}))",
                minx = env.min_x(),
                miny = env.min_y(),
                maxx = env.max_x(),
                maxy = env.max_y()
            ),
            Geometry::MultiGeometry(members) => write_members(f, members),
            Geometry::Composite(members) => write_members(f, members),
        }
    }
}
