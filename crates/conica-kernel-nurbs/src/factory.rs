//! Default curve factory backed by [`NurbsCurve`].

use conica_kernel_geom::{Curve3d, CurveFactory};
use conica_kernel_math::Point3;

use crate::NurbsCurve3;

/// Builds lines, circles, and ellipses as analytic curves and conic arcs
/// and splines as NURBS.
#[derive(Debug, Clone, Copy, Default)]
pub struct NurbsCurveFactory;

impl CurveFactory for NurbsCurveFactory {
    fn conic_arc(&self, start: Point3, apex: Point3, end: Point3, weight: f64) -> Box<dyn Curve3d> {
        Box::new(NurbsCurve3::conic_arc(start.coords, apex.coords, end.coords, weight))
    }

    fn spline_through(&self, points: &[Point3], params: &[f64], degree: usize) -> Option<Box<dyn Curve3d>> {
        let coords: Vec<_> = points.iter().map(|p| p.coords).collect();
        let curve = NurbsCurve3::interpolate(&coords, params, degree)?;
        Some(Box::new(curve))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conica_kernel_geom::CurveKind;
    use conica_kernel_math::Vec3;

    #[test]
    fn test_factory_builds_analytic_and_rational() {
        let f = NurbsCurveFactory;
        let line = f.line(Point3::origin(), Point3::new(2.0, 0.0, 0.0));
        assert_eq!(line.curve_type(), CurveKind::Line);
        assert!((line.evaluate(0.5).x - 1.0).abs() < 1e-12);

        let circle = f.circle(Point3::origin(), Vec3::x(), Vec3::y(), 2.0, (0.0, 1.0));
        assert_eq!(circle.curve_type(), CurveKind::Circle);

        let arc = f.conic_arc(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            std::f64::consts::FRAC_1_SQRT_2,
        );
        assert_eq!(arc.curve_type(), CurveKind::Nurbs);
        assert!((arc.evaluate(0.5).coords.norm() - 1.0).abs() < 1e-12);
        assert!((arc.end_point() - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_factory_spline() {
        let f = NurbsCurveFactory;
        let pts: Vec<Point3> = (0..5).map(|i| Point3::new(i as f64, (i * i) as f64, 0.0)).collect();
        let params = [0.0, 1.0, 2.0, 3.0, 4.0];
        let spline = f.spline_through(&pts, &params, 3).unwrap();
        assert!((spline.evaluate(2.0) - pts[2]).norm() < 1e-9);
        assert!(f.spline_through(&pts[..1], &params[..1], 3).is_none());
    }
}
