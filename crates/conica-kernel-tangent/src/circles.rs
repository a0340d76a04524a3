//! Circles of a given radius touching two curves.

use conica_kernel_geom::{intersect_curves, Curve2d};

use crate::{push_unique, touching_foot, TangentCircle, TangentSettings};

/// All circles of `radius` touching both `a` and `b`.
///
/// Candidate centers are the crossings of the offsets of `a` and `b` by
/// `±radius`; a candidate is kept when both curves have an in-range
/// perpendicular foot at distance `radius` from it.
pub fn tangent_circles(
    a: &dyn Curve2d,
    b: &dyn Curve2d,
    radius: f64,
    settings: &TangentSettings,
) -> Vec<TangentCircle> {
    if !(radius > settings.tolerance) {
        return Vec::new();
    }
    let tol = settings.tolerance;
    let mut out = Vec::new();
    for sa in [1.0, -1.0] {
        let Some(oa) = a.offset(sa * radius) else {
            continue;
        };
        for sb in [1.0, -1.0] {
            let Some(ob) = b.offset(sb * radius) else {
                continue;
            };
            for hit in intersect_curves(oa.as_ref(), ob.as_ref(), tol) {
                let center = hit.point;
                let (Some((_, pa)), Some((_, pb))) = (
                    touching_foot(a, &center, radius, tol),
                    touching_foot(b, &center, radius, tol),
                ) else {
                    continue;
                };
                push_unique(
                    &mut out,
                    TangentCircle {
                        center,
                        radius,
                        touch_points: vec![pa, pb],
                    },
                    tol * 10.0,
                );
            }
        }
    }
    tracing::debug!(count = out.len(), radius, "tangent circles");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use conica_kernel_geom::{Circle2d, Line2d};
    use conica_kernel_math::Point2;

    #[test]
    fn test_crossing_lines() {
        let a = Line2d::from_points(Point2::new(-5.0, 0.0), Point2::new(5.0, 0.0));
        let b = Line2d::from_points(Point2::new(0.0, -5.0), Point2::new(0.0, 5.0));
        let circles = tangent_circles(&a, &b, 1.0, &TangentSettings::default());
        assert_eq!(circles.len(), 4);
        for c in &circles {
            assert_relative_eq!(c.center.x.abs(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(c.center.y.abs(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(c.touch_points[0].y, 0.0, epsilon = 1e-12);
            assert_relative_eq!(c.touch_points[1].x, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_circle_and_segment() {
        let a = Circle2d::new(Point2::new(0.0, 2.5), 1.0);
        let b = Line2d::from_points(Point2::new(-5.0, 0.0), Point2::new(5.0, 0.0));
        let circles = tangent_circles(&a, &b, 1.0, &TangentSettings::default());
        assert_eq!(circles.len(), 2);
        let x = 1.75f64.sqrt();
        for c in &circles {
            assert_relative_eq!(c.center.y, 1.0, epsilon = 1e-9);
            assert_relative_eq!(c.center.x.abs(), x, epsilon = 1e-9);
            assert_relative_eq!((c.touch_points[0] - a.center).norm(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_short_segment_rejects_far_centers() {
        let a = Line2d::from_points(Point2::new(-5.0, 0.0), Point2::new(5.0, 0.0));
        // the offsets of this stub stop short of y = ±1
        let b = Line2d::from_points(Point2::new(0.0, 3.0), Point2::new(0.0, 5.0));
        assert!(tangent_circles(&a, &b, 1.0, &TangentSettings::default()).is_empty());
        assert!(tangent_circles(&a, &a, 0.0, &TangentSettings::default()).is_empty());
    }
}
