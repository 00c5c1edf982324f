use crate::filter::SpatialOp;
use crate::geometry::Envelope;

/// Decides a spatial operator on bounding boxes.
///
/// `value` is the envelope of the property value, `operand` the envelope of
/// the literal geometry in the filter.
pub fn envelope_predicate(op: SpatialOp, value: &Envelope, operand: &Envelope) -> bool {
    match op {
        SpatialOp::BBox | SpatialOp::Intersects => value.intersects(operand),
        SpatialOp::Within => operand.contains(value),
        SpatialOp::Contains => value.contains(operand),
        SpatialOp::Disjoint => !value.intersects(operand),
        SpatialOp::Equals => value == operand,
        SpatialOp::Touches => value.intersects(operand) && !interiors_overlap(value, operand),
        SpatialOp::Overlaps => {
            value.intersects(operand) && !value.contains(operand) && !operand.contains(value)
        }
        SpatialOp::DWithin(distance) => value.distance(operand) <= distance,
        SpatialOp::Beyond(distance) => value.distance(operand) > distance,
    }
}

/// Strict overlap on both axes: the boxes share more than boundary.
fn interiors_overlap(a: &Envelope, b: &Envelope) -> bool {
    a.min_x() < b.max_x() && a.max_x() > b.min_x() && a.min_y() < b.max_y() && a.max_y() > b.min_y()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(x1: f64, y1: f64, x2: f64, y2: f64) -> Envelope {
        Envelope::new(x1, y1, x2, y2)
    }

    #[test]
    fn test_intersects_is_inclusive() {
        let a = env(0.0, 0.0, 1.0, 1.0);
        let b = env(1.0, 1.0, 2.0, 2.0);
        assert!(envelope_predicate(SpatialOp::BBox, &a, &b));
        assert!(envelope_predicate(SpatialOp::Intersects, &a, &b));
        assert!(!envelope_predicate(SpatialOp::Disjoint, &a, &b));
    }

    #[test]
    fn test_within_and_contains() {
        let small = env(1.0, 1.0, 2.0, 2.0);
        let large = env(0.0, 0.0, 5.0, 5.0);
        assert!(envelope_predicate(SpatialOp::Within, &small, &large));
        assert!(!envelope_predicate(SpatialOp::Within, &large, &small));
        assert!(envelope_predicate(SpatialOp::Contains, &large, &small));
        assert!(!envelope_predicate(SpatialOp::Contains, &small, &large));
    }

    #[test]
    fn test_touches_needs_boundary_contact_only() {
        let a = env(0.0, 0.0, 1.0, 1.0);
        assert!(!envelope_predicate(SpatialOp::Touches, &a, &Envelope::point(0.5, 0.5)));
        assert!(envelope_predicate(SpatialOp::Touches, &a, &Envelope::point(1.0, 0.5)));
        assert!(envelope_predicate(SpatialOp::Touches, &a, &env(1.0, 0.0, 2.0, 1.0)));
        assert!(!envelope_predicate(SpatialOp::Touches, &a, &env(0.5, 0.0, 2.0, 1.0)));
        assert!(!envelope_predicate(SpatialOp::Touches, &a, &env(3.0, 3.0, 4.0, 4.0)));
    }

    #[test]
    fn test_overlaps_excludes_containment() {
        let a = env(0.0, 0.0, 2.0, 2.0);
        assert!(envelope_predicate(SpatialOp::Overlaps, &a, &env(1.0, 1.0, 3.0, 3.0)));
        assert!(!envelope_predicate(SpatialOp::Overlaps, &a, &env(0.5, 0.5, 1.0, 1.0)));
        assert!(!envelope_predicate(SpatialOp::Overlaps, &a, &env(5.0, 5.0, 6.0, 6.0)));
    }

    #[test]
    fn test_equals() {
        let a = env(0.0, 0.0, 2.0, 2.0);
        assert!(envelope_predicate(SpatialOp::Equals, &a, &env(2.0, 2.0, 0.0, 0.0)));
        assert!(!envelope_predicate(SpatialOp::Equals, &a, &env(0.0, 0.0, 2.0, 3.0)));
    }

    #[test]
    fn test_distance_operators() {
        let origin = Envelope::point(0.0, 0.0);
        let p = Envelope::point(3.0, 4.0);
        assert!(envelope_predicate(SpatialOp::DWithin(5.0), &p, &origin));
        assert!(!envelope_predicate(SpatialOp::DWithin(4.9), &p, &origin));
        assert!(envelope_predicate(SpatialOp::Beyond(4.9), &p, &origin));
        assert!(!envelope_predicate(SpatialOp::Beyond(5.0), &p, &origin));
    }
}
