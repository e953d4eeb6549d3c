use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

use crate::models::{BoundingRect, Contour, Shape};

/// Polygon approximation tolerance as a fraction of the contour perimeter.
pub const APPROX_EPSILON_FACTOR: f64 = 0.04;
/// Bounding-box aspect ratios treated as square (inclusive).
pub const SQUARE_ASPECT_RANGE: (f64, f64) = (0.95, 1.05);
/// Circularity above which a many-sided outline counts as a circle.
pub const CIRCULARITY_THRESHOLD: f64 = 0.75;

/// Classify a closed contour by the vertex count of its polygon approximation
pub fn classify(contour: &Contour) -> Shape {
    let epsilon = APPROX_EPSILON_FACTOR * contour.perimeter();
    let approx = approximate_polygon(&contour.points, epsilon);
    classify_approximation(contour, &approx)
}

/// Label a contour given its already computed polygon approximation.
pub fn classify_approximation(contour: &Contour, approx: &[Point<i32>]) -> Shape {
    match approx.len() {
        3 => Shape::Triangle,
        4 => {
            let aspect = BoundingRect::of(approx)
                .map(|r| r.aspect_ratio())
                .unwrap_or(0.0);
            let (low, high) = SQUARE_ASPECT_RANGE;
            if (low..=high).contains(&aspect) {
                Shape::Square
            } else {
                Shape::Rectangle
            }
        }
        n if n > 4 => {
            // circularity is measured on the raw outline, not the approximation
            let area = contour.area();
            let perimeter = contour.perimeter();
            if area <= 0.0 || perimeter == 0.0 {
                return Shape::Unknown;
            }
            if contour.circularity() > CIRCULARITY_THRESHOLD {
                Shape::Circle
            } else {
                Shape::EllipsePolygon
            }
        }
        _ => Shape::Unknown,
    }
}

/// Douglas-Peucker simplification of a closed curve.
///
/// Wraps imageproc's closed-curve approximation, which panics on empty input
/// and on a non-positive epsilon. Such curves are returned unchanged. A
/// closing point that repeats the first one is dropped before simplifying.
pub fn approximate_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let points = match points {
        [first, rest @ .., last] if !rest.is_empty() && first == last => {
            &points[..points.len() - 1]
        }
        _ => points,
    };
    if points.len() < 3 || epsilon.is_nan() || epsilon <= 0.0 {
        return points.to_vec();
    }
    approximate_polygon_dp(points, epsilon, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_curves_are_returned_as_is() {
        let pts = vec![Point::new(0, 0), Point::new(4, 4)];
        assert_eq!(approximate_polygon(&pts, 1.0), pts);
        assert!(approximate_polygon(&[], 1.0).is_empty());
    }

    #[test]
    fn test_zero_epsilon_does_not_panic() {
        let pts = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(approximate_polygon(&pts, 0.0).len(), 4);
        assert_eq!(approximate_polygon(&pts, f64::NAN).len(), 4);
    }

    #[test]
    fn test_repeated_closing_point_is_dropped() {
        let pts = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(0, 0),
        ];
        assert_eq!(approximate_polygon(&pts, 0.0).len(), 4);
    }
}
