//! What the experiment needs from the window system.

use anyhow::Result;

use crate::condition::Side;
use crate::geometry::{Point, ScreenGeometry};
use crate::stimulus::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Response(Side),
    Continue,
    Other,
}

/// Input drained from the platform queue, stamped with the experiment timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerRelease { at: Point, timestamp_ms: f64 },
    KeyPress { key: Key, timestamp_ms: f64 },
    /// Escape or window close.
    Quit,
}

impl InputEvent {
    pub fn is_quit(&self) -> bool {
        matches!(self, InputEvent::Quit)
    }
}

pub trait Display {
    fn screen(&self) -> ScreenGeometry;

    /// Composes `scene` and presents it. Blocks until the frame is queued.
    fn render(&mut self, scene: &Scene) -> Result<()>;
}

pub trait PointerHost {
    /// Drains pending platform events.
    fn pump_events(&mut self) -> Result<Vec<InputEvent>>;

    /// Drops anything queued so far.
    fn clear_events(&mut self) -> Result<()> {
        self.pump_events().map(drop)
    }

    fn cursor_hidden(&self) -> bool;

    fn show_cursor(&mut self);

    fn hide_cursor(&mut self);

    fn warp_pointer(&mut self, to: Point) -> Result<()>;
}

pub trait Host: Display + PointerHost {}

impl<T: Display + PointerHost + ?Sized> Host for T {}
