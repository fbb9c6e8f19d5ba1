use crate::condition::Side;
use crate::geometry::{Point, Rectangle};

pub type Rgba = [u8; 4];

pub const WHITE: Rgba = [255, 255, 255, 255];
pub const BLACK: Rgba = [0, 0, 0, 255];
pub const GREY: Rgba = [45, 45, 45, 255];

/// Where the eyes of a gaze cue look.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gaze {
    Straight,
    Averted(Side),
}

/// One drawable item of a frame. Positions are centers unless noted.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneElement {
    FixationCross {
        at: Point,
        size: f64,
        thickness: f64,
        color: Rgba,
    },
    /// Fixation cross rotated by 45 degrees.
    XCross {
        at: Point,
        size: f64,
        thickness: f64,
        color: Rgba,
    },
    Circle {
        at: Point,
        diameter: f64,
        fill: Rgba,
        stroke: Option<(f64, Rgba)>,
    },
    Line {
        from: Point,
        to: Point,
        thickness: f64,
        color: Rgba,
    },
    Face {
        at: Point,
        diameter: f64,
        gaze: Gaze,
        color: Rgba,
    },
    Rect {
        rect: Rectangle,
        fill: Rgba,
        stroke: Option<(f64, Rgba)>,
    },
    Text {
        at: Point,
        content: String,
        size: f64,
        color: Rgba,
    },
}

/// A complete frame: background fill plus elements in paint order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub background: Rgba,
    pub elements: Vec<SceneElement>,
}

impl Scene {
    pub fn new(background: Rgba) -> Self {
        Self {
            background,
            elements: Vec::with_capacity(8),
        }
    }

    pub fn push(&mut self, element: SceneElement) -> &mut Self {
        self.elements.push(element);
        self
    }

    pub fn with(mut self, element: SceneElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Circles drawn at `at`, in paint order.
    pub fn circles_at(&self, at: Point) -> impl Iterator<Item = &SceneElement> {
        self.elements
            .iter()
            .filter(move |e| matches!(e, SceneElement::Circle { at: p, .. } if *p == at))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(BLACK)
    }
}
