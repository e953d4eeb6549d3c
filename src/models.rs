use std::fmt;
use std::str::FromStr;

use imageproc::geometry::arc_length;
use imageproc::point::Point;
use serde::Serialize;

use crate::error::SpecInputError;

/// Silhouette label produced by the shape classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Shape {
    Triangle,
    Square,
    Rectangle,
    Circle,
    #[serde(rename = "Ellipse/Polygon")]
    EllipsePolygon,
    Unknown,
}

impl Shape {
    /// Shapes an operator can pick as the expected silhouette.
    pub const SELECTABLE: [Shape; 5] = [
        Shape::Triangle,
        Shape::Square,
        Shape::Rectangle,
        Shape::Circle,
        Shape::EllipsePolygon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Triangle => "Triangle",
            Shape::Square => "Square",
            Shape::Rectangle => "Rectangle",
            Shape::Circle => "Circle",
            Shape::EllipsePolygon => "Ellipse/Polygon",
            Shape::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = SpecInputError;

    // French operator labels are accepted too. `Unknown` is a classifier
    // output only and never a valid target.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "triangle" => Ok(Shape::Triangle),
            "square" | "carre" | "carré" => Ok(Shape::Square),
            "rectangle" => Ok(Shape::Rectangle),
            "circle" | "cercle" => Ok(Shape::Circle),
            "ellipse/polygon" | "ellipse/polygone" | "ellipse" | "polygon" => {
                Ok(Shape::EllipsePolygon)
            }
            _ => Err(SpecInputError::UnknownShape(s.to_string())),
        }
    }
}

/// Outcome of comparing a detection against the expected specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Good,
    Bad,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Good => "Good",
            Verdict::Bad => "Bad",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned bounding rectangle, inclusive of both edge pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingRect {
    pub fn of(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Closed outer boundary of a candidate part silhouette.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Enclosed area (shoelace), always non-negative.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    fn signed_area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        self.edges().map(|(a, b)| cross(a, b)).sum::<f64>() / 2.0
    }

    /// Length of the closed polyline, including the closing segment.
    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    /// Roundness score `4π·area/perimeter²`; 1.0 for a perfect circle.
    pub fn circularity(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter == 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * (self.area() / (perimeter * perimeter))
    }

    pub fn bounding_rect(&self) -> Option<BoundingRect> {
        BoundingRect::of(&self.points)
    }

    /// Centroid from the polygon's first moments, `None` for zero-area contours.
    pub fn centroid(&self) -> Option<(i32, i32)> {
        let m00 = self.signed_area();
        if m00 == 0.0 {
            return None;
        }
        let (mut m10, mut m01) = (0.0, 0.0);
        for (a, b) in self.edges() {
            let c = cross(a, b);
            m10 += (a.x + b.x) as f64 * c;
            m01 += (a.y + b.y) as f64 * c;
        }
        m10 /= 6.0;
        m01 /= 6.0;
        Some(((m10 / m00) as i32, (m01 / m00) as i32))
    }

    fn edges(&self) -> impl Iterator<Item = (Point<i32>, Point<i32>)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }
}

fn cross(a: Point<i32>, b: Point<i32>) -> f64 {
    a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64
}

/// The single part silhouette selected in a frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub shape: Shape,
    pub area: f64,
    pub centroid: (i32, i32),
    pub contour: Contour,
}

impl Detection {
    pub fn label(&self) -> String {
        format!("{} | Area: {} px²", self.shape, self.area as i64)
    }
}
