use serde::{Deserialize, Serialize};

/// Screen position in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Axis-aligned rectangle spanned by two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    min: Point,
    max: Point,
}

impl Rectangle {
    /// Corners may be given in any order.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self::new(
            center.offset(-width / 2.0, -height / 2.0),
            center.offset(width / 2.0, height / 2.0),
        )
    }

    /// Edges count as inside.
    pub fn contains(&self, p: Point) -> bool {
        (self.min.x..=self.max.x).contains(&p.x) && (self.min.y..=self.max.y).contains(&p.y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn left(&self) -> f64 {
        self.min.x
    }

    pub fn right(&self) -> f64 {
        self.max.x
    }

    pub fn top(&self) -> f64 {
        self.min.y
    }

    pub fn bottom(&self) -> f64 {
        self.max.y
    }
}

/// Clickable screen region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    Rectangle(Rectangle),
    Circle { center: Point, radius: f64 },
}

impl Boundary {
    pub fn contains(&self, p: Point) -> bool {
        match self {
            Boundary::Rectangle(r) => r.contains(p),
            Boundary::Circle { center, radius } => center.distance(p) <= *radius,
        }
    }

    pub fn center(&self) -> Point {
        match self {
            Boundary::Rectangle(r) => r.center(),
            Boundary::Circle { center, .. } => *center,
        }
    }

    pub fn as_rectangle(&self) -> Option<&Rectangle> {
        match self {
            Boundary::Rectangle(r) => Some(r),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Boundary::Rectangle(_) => "rectangle",
            Boundary::Circle { .. } => "circle",
        }
    }
}

impl From<Rectangle> for Boundary {
    fn from(r: Rectangle) -> Self {
        Boundary::Rectangle(r)
    }
}

/// Display size plus the pixels-per-degree factor for the viewing distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub px_per_degree: f64,
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32, px_per_degree: f64) -> Self {
        Self {
            width,
            height,
            px_per_degree,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    pub fn deg_to_px(&self, degrees: f64) -> f64 {
        degrees * self.px_per_degree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_normalizes_corners() {
        let r = Rectangle::new(Point::new(700.0, 420.0), Point::new(300.0, 380.0));
        assert_eq!(r.left(), 300.0);
        assert_eq!(r.width(), 400.0);
        assert_eq!(r.height(), 40.0);
        assert_eq!(r.center(), Point::new(500.0, 400.0));
    }

    #[test]
    fn rectangle_contains_its_edges() {
        let r = Rectangle::new(Point::new(300.0, 380.0), Point::new(700.0, 420.0));
        assert!(r.contains(Point::new(300.0, 400.0)));
        assert!(r.contains(Point::new(700.0, 420.0)));
        assert!(!r.contains(Point::new(150.0, 400.0)));
        assert!(!r.contains(Point::new(500.0, 421.0)));
    }

    #[test]
    fn circle_boundary_hit_test() {
        let b = Boundary::Circle {
            center: Point::new(0.0, 0.0),
            radius: 5.0,
        };
        assert!(b.contains(Point::new(3.0, 4.0)));
        assert!(!b.contains(Point::new(4.0, 4.0)));
        assert!(b.as_rectangle().is_none());
    }

    #[test]
    fn degrees_scale_with_density() {
        let screen = ScreenGeometry::new(1920, 1080, 40.0);
        assert_eq!(screen.deg_to_px(5.0), 200.0);
        assert_eq!(screen.center(), Point::new(960.0, 540.0));
    }
}
