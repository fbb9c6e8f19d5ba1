//! Deterministic host for exercising the polling loops without a window.

use std::collections::VecDeque;

use anyhow::{Result, bail};
use ilm_core::{Display, InputEvent, Point, PointerHost, Scene, ScreenGeometry};
use ilm_timing::{ManualTimer, Timer};

type Trigger = Box<dyn FnMut(&Scene, f64) -> Option<(f64, InputEvent)>>;

/// Renders advance the clock by one frame and pumping by one millisecond.
pub struct ScriptedHost<'t> {
    timer: &'t ManualTimer,
    screen: ScreenGeometry,
    frame_ms: f64,
    queue: VecDeque<(f64, InputEvent)>,
    triggers: Vec<Trigger>,
    cursor_hidden: bool,
    warps: Vec<Point>,
    warp_fails: bool,
    rendered: usize,
    last_scene: Option<Scene>,
}

impl<'t> ScriptedHost<'t> {
    pub fn new(timer: &'t ManualTimer) -> Self {
        Self {
            timer,
            screen: ScreenGeometry::new(1920, 1080, 40.0),
            frame_ms: 16.0,
            queue: VecDeque::new(),
            triggers: Vec::new(),
            cursor_hidden: true,
            warps: Vec::new(),
            warp_fails: false,
            rendered: 0,
            last_scene: None,
        }
    }

    /// Delivers `event` once the clock reaches `at_ms`.
    pub fn queue_at(&mut self, at_ms: f64, event: InputEvent) {
        let pos = self.queue.partition_point(|(t, _)| *t <= at_ms);
        self.queue.insert(pos, (at_ms, event));
    }

    /// Inspects every rendered scene; a returned `(delay_ms, event)` is queued
    /// `delay_ms` after that frame.
    pub fn on_scene<F>(&mut self, trigger: F)
    where
        F: FnMut(&Scene, f64) -> Option<(f64, InputEvent)> + 'static,
    {
        self.triggers.push(Box::new(trigger));
    }

    pub fn set_cursor_hidden(&mut self, hidden: bool) {
        self.cursor_hidden = hidden;
    }

    /// Every later `warp_pointer` call fails.
    pub fn fail_warps(&mut self) {
        self.warp_fails = true;
    }

    pub fn warps(&self) -> &[Point] {
        &self.warps
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn last_scene(&self) -> Option<&Scene> {
        self.last_scene.as_ref()
    }

    fn due(&mut self) -> Vec<InputEvent> {
        let now = self.timer.now_ms();
        let mut out = Vec::new();
        while self.queue.front().is_some_and(|(t, _)| *t <= now) {
            if let Some((_, e)) = self.queue.pop_front() {
                out.push(e);
            }
        }
        out
    }
}

impl Display for ScriptedHost<'_> {
    fn screen(&self) -> ScreenGeometry {
        self.screen
    }

    fn render(&mut self, scene: &Scene) -> Result<()> {
        let now = self.timer.now_ms();
        let fired: Vec<(f64, InputEvent)> = self
            .triggers
            .iter_mut()
            .filter_map(|trigger| trigger(scene, now))
            .collect();
        for (delay, event) in fired {
            self.queue_at(now + delay, event);
        }
        self.rendered += 1;
        self.last_scene = Some(scene.clone());
        self.timer.advance(self.frame_ms);
        Ok(())
    }
}

impl PointerHost for ScriptedHost<'_> {
    fn pump_events(&mut self) -> Result<Vec<InputEvent>> {
        let events = self.due();
        self.timer.advance(1.0);
        Ok(events)
    }

    fn clear_events(&mut self) -> Result<()> {
        self.due();
        Ok(())
    }

    fn cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    fn show_cursor(&mut self) {
        self.cursor_hidden = false;
    }

    fn hide_cursor(&mut self) {
        self.cursor_hidden = true;
    }

    fn warp_pointer(&mut self, to: Point) -> Result<()> {
        if self.warp_fails {
            bail!("pointer warp refused");
        }
        self.warps.push(to);
        Ok(())
    }
}
