//! Shape kinds the engine can draw and hit-test.
//!
//! A [`Shape`] is a closed set of geometry kinds wrapping kurbo primitives.
//! Closed shapes answer containment by winding; open shapes (segments, arcs,
//! curves) contain only points lying on the curve itself, within a hairline
//! tolerance. Compound paths are ordered part lists traced into a single
//! contour, with a sub-path restart wherever consecutive parts do not touch.

use kurbo::{BezPath, Circle, CubicBez, Line, ParamCurveNearest, Point, QuadBez, Rect};
use kurbo::Shape as KurboShape;

/// Contiguity tolerance when assembling compound paths.
pub(crate) const EPSILON: f64 = 1e-9;

/// Distance within which a point counts as lying on an open curve.
const ON_CURVE_TOLERANCE: f64 = 1e-6;

/// Accuracy passed to kurbo nearest-point queries.
const NEAREST_ACCURACY: f64 = 1e-9;

/// Error tolerance when approximating arcs with cubic segments.
const ARC_TOLERANCE: f64 = 0.1;

/// A drawable, hit-testable geometry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned box.
    Box(Rect),
    Circle(Circle),
    /// Straight line segment.
    Segment(Line),
    /// Elliptical arc, circular in the common case.
    Arc(kurbo::Arc),
    /// Quadratic Bézier curve.
    Quadratic(QuadBez),
    /// Cubic Bézier curve.
    Bezier(CubicBez),
    /// Compound path of segment-like parts.
    Path(Path),
}

/// An ordered list of segment-like parts forming one traced contour.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub parts: Vec<Shape>,
    /// Close the final contour back to its start (polygon semantics).
    pub closed: bool,
}

impl Shape {
    pub fn circle(center: impl Into<Point>, radius: f64) -> Self {
        Shape::Circle(Circle::new(center, radius))
    }

    pub fn segment(p0: impl Into<Point>, p1: impl Into<Point>) -> Self {
        Shape::Segment(Line::new(p0, p1))
    }

    /// A circular arc starting at `start_angle`, spanning `sweep_angle`
    /// radians (negative sweeps run counterclockwise).
    pub fn arc(center: impl Into<Point>, radius: f64, start_angle: f64, sweep_angle: f64) -> Self {
        Shape::Arc(kurbo::Arc::new(
            center,
            (radius, radius),
            start_angle,
            sweep_angle,
            0.0,
        ))
    }

    pub fn quadratic(p0: impl Into<Point>, p1: impl Into<Point>, p2: impl Into<Point>) -> Self {
        Shape::Quadratic(QuadBez::new(p0.into(), p1.into(), p2.into()))
    }

    pub fn bezier(
        p0: impl Into<Point>,
        p1: impl Into<Point>,
        p2: impl Into<Point>,
        p3: impl Into<Point>,
    ) -> Self {
        Shape::Bezier(CubicBez::new(p0.into(), p1.into(), p2.into(), p3.into()))
    }

    /// An open compound path.
    pub fn path(parts: Vec<Shape>) -> Self {
        Shape::Path(Path {
            parts,
            closed: false,
        })
    }

    /// A closed compound path.
    pub fn polygon(parts: Vec<Shape>) -> Self {
        Shape::Path(Path {
            parts,
            closed: true,
        })
    }

    /// Whether `point` (in the shape's own coordinate space) hits the shape.
    pub fn contains(&self, point: Point) -> bool {
        match self {
            Shape::Box(rect) => rect.contains(point),
            Shape::Circle(circle) => point.distance(circle.center) <= circle.radius,
            Shape::Segment(line) => {
                line.nearest(point, NEAREST_ACCURACY).distance_sq
                    <= ON_CURVE_TOLERANCE * ON_CURVE_TOLERANCE
            }
            Shape::Arc(arc) => arc_contains(arc, point),
            Shape::Quadratic(quad) => {
                quad.nearest(point, NEAREST_ACCURACY).distance_sq
                    <= ON_CURVE_TOLERANCE * ON_CURVE_TOLERANCE
            }
            Shape::Bezier(cubic) => {
                cubic.nearest(point, NEAREST_ACCURACY).distance_sq
                    <= ON_CURVE_TOLERANCE * ON_CURVE_TOLERANCE
            }
            Shape::Path(path) => path.to_bez_path().contains(point),
        }
    }

    /// Start point, for part-like shapes and paths.
    pub fn start(&self) -> Option<Point> {
        match self {
            Shape::Segment(line) => Some(line.p0),
            Shape::Arc(arc) => Some(arc_point(arc, arc.start_angle)),
            Shape::Quadratic(quad) => Some(quad.p0),
            Shape::Bezier(cubic) => Some(cubic.p0),
            Shape::Path(path) => path.parts.first().and_then(Shape::start),
            Shape::Box(_) | Shape::Circle(_) => None,
        }
    }

    /// End point, for part-like shapes and paths.
    pub fn end(&self) -> Option<Point> {
        match self {
            Shape::Segment(line) => Some(line.p1),
            Shape::Arc(arc) => Some(arc_point(arc, arc.start_angle + arc.sweep_angle)),
            Shape::Quadratic(quad) => Some(quad.p2),
            Shape::Bezier(cubic) => Some(cubic.p3),
            Shape::Path(path) => path.parts.last().and_then(Shape::end),
            Shape::Box(_) | Shape::Circle(_) => None,
        }
    }
}

impl From<Rect> for Shape {
    fn from(rect: Rect) -> Self {
        Shape::Box(rect)
    }
}

impl From<Circle> for Shape {
    fn from(circle: Circle) -> Self {
        Shape::Circle(circle)
    }
}

impl From<Line> for Shape {
    fn from(line: Line) -> Self {
        Shape::Segment(line)
    }
}

impl From<kurbo::Arc> for Shape {
    fn from(arc: kurbo::Arc) -> Self {
        Shape::Arc(arc)
    }
}

impl From<QuadBez> for Shape {
    fn from(quad: QuadBez) -> Self {
        Shape::Quadratic(quad)
    }
}

impl From<CubicBez> for Shape {
    fn from(cubic: CubicBez) -> Self {
        Shape::Bezier(cubic)
    }
}

impl Path {
    /// Assemble the parts into a kurbo path for winding queries, applying
    /// the same contiguity rule the renderer uses when tracing.
    pub(crate) fn to_bez_path(&self) -> BezPath {
        let mut bez = BezPath::new();
        let mut last: Option<Point> = None;
        for part in &self.parts {
            let start = part_start(part);
            match last {
                None => bez.move_to(start),
                Some(prev) if !points_touch(prev, start) => {
                    bez.close_path();
                    bez.move_to(start);
                }
                Some(_) => {}
            }
            match part {
                Shape::Segment(line) => bez.line_to(line.p1),
                Shape::Arc(arc) => {
                    arc.to_cubic_beziers(ARC_TOLERANCE, |c1, c2, p| bez.curve_to(c1, c2, p));
                }
                Shape::Quadratic(quad) => bez.quad_to(quad.p1, quad.p2),
                Shape::Bezier(cubic) => bez.curve_to(cubic.p1, cubic.p2, cubic.p3),
                other => unsupported_part(other),
            }
            last = part.end();
        }
        if self.closed {
            bez.close_path();
        }
        bez
    }
}

/// Start point of a compound-path part.
///
/// # Panics
///
/// Panics when the part kind cannot appear inside a compound path.
pub(crate) fn part_start(part: &Shape) -> Point {
    match part.start() {
        Some(point) => point,
        None => unsupported_part(part),
    }
}

pub(crate) fn unsupported_part(part: &Shape) -> ! {
    let kind = match part {
        Shape::Box(_) => "box",
        Shape::Circle(_) => "circle",
        Shape::Path(_) => "path",
        _ => "shape",
    };
    panic!("unsupported shape kind in compound path: {kind}");
}

pub(crate) fn points_touch(a: Point, b: Point) -> bool {
    (a - b).hypot2() <= EPSILON * EPSILON
}

/// Point on an (possibly elliptical, possibly rotated) arc at `angle`.
fn arc_point(arc: &kurbo::Arc, angle: f64) -> Point {
    let (sin_rot, cos_rot) = arc.x_rotation.sin_cos();
    let x = arc.radii.x * angle.cos();
    let y = arc.radii.y * angle.sin();
    Point::new(
        arc.center.x + x * cos_rot - y * sin_rot,
        arc.center.y + x * sin_rot + y * cos_rot,
    )
}

fn arc_contains(arc: &kurbo::Arc, point: Point) -> bool {
    let v = point - arc.center;
    let (sin_rot, cos_rot) = arc.x_rotation.sin_cos();
    // Into the arc's frame, normalized onto the unit circle.
    let x = (v.x * cos_rot + v.y * sin_rot) / arc.radii.x;
    let y = (-v.x * sin_rot + v.y * cos_rot) / arc.radii.y;
    let radius = x.hypot(y);
    let scale = arc.radii.x.max(arc.radii.y);
    if (radius - 1.0).abs() * scale > ON_CURVE_TOLERANCE {
        return false;
    }
    angle_in_sweep(y.atan2(x), arc.start_angle, arc.sweep_angle)
}

fn angle_in_sweep(angle: f64, start: f64, sweep: f64) -> bool {
    use std::f64::consts::TAU;
    let travelled = if sweep >= 0.0 {
        (angle - start).rem_euclid(TAU)
    } else {
        (start - angle).rem_euclid(TAU)
    };
    travelled <= sweep.abs() + EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_box_contains_is_half_open() {
        let shape = Shape::from(Rect::new(10.0, 10.0, 20.0, 20.0));
        assert!(shape.contains(Point::new(10.0, 10.0)));
        assert!(shape.contains(Point::new(15.0, 19.0)));
        assert!(!shape.contains(Point::new(20.0, 20.0)));
        assert!(!shape.contains(Point::new(9.0, 15.0)));
    }

    #[test]
    fn test_circle_contains_boundary() {
        let shape = Shape::circle((100.0, 100.0), 10.0);
        assert!(shape.contains(Point::new(100.0, 100.0)));
        assert!(shape.contains(Point::new(110.0, 100.0)));
        assert!(!shape.contains(Point::new(110.1, 100.0)));
    }

    #[test]
    fn test_segment_contains_only_points_on_the_line() {
        let shape = Shape::segment((0.0, 0.0), (10.0, 10.0));
        assert!(shape.contains(Point::new(5.0, 5.0)));
        assert!(shape.contains(Point::new(0.0, 0.0)));
        assert!(!shape.contains(Point::new(5.0, 6.0)));
        assert!(!shape.contains(Point::new(11.0, 11.0)));
    }

    #[test]
    fn test_arc_endpoints() {
        let shape = Shape::arc((0.0, 0.0), 5.0, 0.0, FRAC_PI_2);
        let start = shape.start().unwrap();
        let end = shape.end().unwrap();
        assert!((start.x - 5.0).abs() < 1e-9 && start.y.abs() < 1e-9);
        assert!(end.x.abs() < 1e-9 && (end.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_arc_contains_respects_sweep() {
        let shape = Shape::arc((0.0, 0.0), 5.0, 0.0, FRAC_PI_2);
        let on_sweep = Point::new(5.0 * (PI / 4.0).cos(), 5.0 * (PI / 4.0).sin());
        let off_sweep = Point::new(-5.0, 0.0);
        assert!(shape.contains(on_sweep));
        assert!(!shape.contains(off_sweep));
        assert!(!shape.contains(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_curves_contain_their_endpoints() {
        // Control points of mixed types; each parameter converts on its own.
        let quad = Shape::quadratic(Point::new(0.0, 0.0), (5.0, 10.0), (10.0, 0.0));
        let cubic = Shape::bezier((0.0, 0.0), (3.0, 9.0), (7.0, 9.0), Point::new(10.0, 0.0));
        assert!(quad.contains(Point::new(0.0, 0.0)));
        assert!(quad.contains(Point::new(10.0, 0.0)));
        assert!(!quad.contains(Point::new(5.0, 9.0)));
        assert!(cubic.contains(Point::new(10.0, 0.0)));
        assert!(!cubic.contains(Point::new(5.0, 0.0)));
    }

    #[test]
    fn test_polygon_contains_interior() {
        let shape = Shape::polygon(vec![
            Shape::segment((0.0, 0.0), (10.0, 0.0)),
            Shape::segment((10.0, 0.0), (10.0, 10.0)),
            Shape::segment((10.0, 10.0), (0.0, 10.0)),
        ]);
        assert!(shape.contains(Point::new(5.0, 5.0)));
        assert!(!shape.contains(Point::new(15.0, 5.0)));
    }

    #[test]
    fn test_path_endpoints_come_from_parts() {
        let shape = Shape::path(vec![
            Shape::segment((0.0, 0.0), (10.0, 0.0)),
            Shape::segment((10.0, 0.0), (10.0, 10.0)),
        ]);
        assert_eq!(shape.start(), Some(Point::new(0.0, 0.0)));
        assert_eq!(shape.end(), Some(Point::new(10.0, 10.0)));
    }

    #[test]
    #[should_panic(expected = "unsupported shape kind")]
    fn test_circle_part_in_path_panics() {
        let shape = Shape::path(vec![Shape::circle((0.0, 0.0), 5.0)]);
        shape.contains(Point::new(0.0, 0.0));
    }
}
