use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use crate::errors::{ErrorKind, GeoFilterError, GeoFilterResult};

/// An axis-aligned 2D bounding box.
///
/// `Envelope` is the primitive every spatial test in this crate is reduced to.
/// Intersection and containment are boundary inclusive: two envelopes that
/// only share an edge or a corner intersect.
///
/// # Examples
///
/// ```rust
/// use geofilter::geometry::Envelope;
///
/// let a = Envelope::new(0.0, 0.0, 10.0, 10.0);
/// let b = Envelope::new(10.0, 10.0, 20.0, 20.0);
/// assert!(a.intersects(&b));
/// assert_eq!(a.union(&b), Envelope::new(0.0, 0.0, 20.0, 20.0));
/// ```
#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Envelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Eq for Envelope {}

impl Hash for Envelope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min_x.to_bits().hash(state);
        self.min_y.to_bits().hash(state);
        self.max_x.to_bits().hash(state);
        self.max_y.to_bits().hash(state);
    }
}

impl Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ENVELOPE({} {}, {} {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl Envelope {
    /// Creates an envelope from two corners. Swapped coordinates are
    /// normalised so that the min/max invariant always holds.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Envelope {
        Envelope {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Creates an envelope, rejecting NaN coordinates and inverted corners.
    pub fn try_new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> GeoFilterResult<Envelope> {
        if [min_x, min_y, max_x, max_y].iter().any(|v| v.is_nan()) {
            log::error!("Envelope coordinates must not be NaN");
            return Err(GeoFilterError::new(
                "Envelope coordinates must not be NaN",
                ErrorKind::InvalidGeometry,
            ));
        }
        if min_x > max_x || min_y > max_y {
            log::error!(
                "Inverted envelope ({}, {}, {}, {})",
                min_x,
                min_y,
                max_x,
                max_y
            );
            return Err(GeoFilterError::new(
                &format!(
                    "Inverted envelope ({}, {}, {}, {})",
                    min_x, min_y, max_x, max_y
                ),
                ErrorKind::InvalidGeometry,
            ));
        }
        Ok(Envelope {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// A degenerate envelope covering a single point.
    pub fn point(x: f64, y: f64) -> Envelope {
        Envelope::new(x, y, x, y)
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// True if `other` lies completely inside this envelope (edges included).
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// True if the envelopes overlap on both axes, touching included.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        Some(Envelope {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Area this envelope must grow by to also cover `other`.
    pub fn enlargement(&self, other: &Envelope) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Smallest Euclidean distance between the two envelopes, zero when they
    /// intersect.
    pub fn distance(&self, other: &Envelope) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Grows the envelope by `distance` on every side.
    pub fn expand_by(&self, distance: f64) -> Envelope {
        Envelope::new(
            self.min_x - distance,
            self.min_y - distance,
            self.max_x + distance,
            self.max_y + distance,
        )
    }

    /// The four quadrants in SW, SE, NW, NE order.
    pub fn quadrants(&self) -> [Envelope; 4] {
        let (cx, cy) = self.center();
        [
            Envelope::new(self.min_x, self.min_y, cx, cy),
            Envelope::new(cx, self.min_y, self.max_x, cy),
            Envelope::new(self.min_x, cy, cx, self.max_y),
            Envelope::new(cx, cy, self.max_x, self.max_y),
        ]
    }
}
