use ilm_core::{Boundary, Display, Host, InputEvent, Point, PointerHost, Rectangle};
use ilm_timing::Timer;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("scale bounds must be a rectangle, got a {0}")]
    NotRectangle(&'static str),

    #[error("scale rectangle has no width")]
    ZeroWidth,

    #[error("response collection aborted")]
    Aborted,

    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

/// Normalized position on the scale and the time it took to get there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleResponse {
    /// 0 at the left edge, 1 at the right edge.
    pub value: Option<f64>,
    pub latency_ms: f64,
}

impl ScaleResponse {
    /// Returned when collection times out.
    pub const NONE: ScaleResponse = ScaleResponse {
        value: None,
        latency_ms: -1.0,
    };

    pub fn is_none(&self) -> bool {
        self.value.is_none()
    }
}

pub type FrameCallback<'a> = Box<dyn FnMut(&mut dyn Display) -> anyhow::Result<()> + 'a>;

/// Collects one pointer release on a horizontal scale.
pub struct ScaleListener<'a> {
    bounds: Rectangle,
    start_pos: Point,
    timeout_ms: Option<f64>,
    callback: Option<FrameCallback<'a>>,
    was_hidden: Option<bool>,
    start_ms: Option<f64>,
}

impl<'a> ScaleListener<'a> {
    /// The pointer starts at `screen_center` unless `with_start_pos` says
    /// otherwise.
    pub fn new(bounds: Boundary, screen_center: Point) -> Result<Self, ScaleError> {
        let rect = *bounds
            .as_rectangle()
            .ok_or(ScaleError::NotRectangle(bounds.kind()))?;
        if !(rect.width() > 0.0) {
            return Err(ScaleError::ZeroWidth);
        }
        Ok(Self {
            bounds: rect,
            start_pos: screen_center,
            timeout_ms: None,
            callback: None,
            was_hidden: None,
            start_ms: None,
        })
    }

    pub fn with_start_pos(mut self, pos: Point) -> Self {
        self.start_pos = pos;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<f64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Called once per polling iteration, before events are inspected.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut dyn Display) -> anyhow::Result<()> + 'a,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn bounds(&self) -> &Rectangle {
        &self.bounds
    }

    pub fn is_listening(&self) -> bool {
        self.start_ms.is_some()
    }

    /// Prepares the pointer and starts the latency clock. A second call
    /// before `cleanup` does nothing.
    pub fn init<H, T>(&mut self, host: &mut H, timer: &T) -> anyhow::Result<()>
    where
        H: PointerHost + ?Sized,
        T: Timer + ?Sized,
    {
        if self.start_ms.is_some() {
            return Ok(());
        }
        self.was_hidden = Some(host.cursor_hidden());
        host.show_cursor();
        host.warp_pointer(self.start_pos)?;
        host.clear_events()?;
        self.start_ms = Some(timer.now_ms());
        Ok(())
    }

    /// First release inside the scale, in arrival order. Returns `None`
    /// when nothing qualifies or `init` has not run.
    pub fn listen(&self, events: &[InputEvent]) -> Option<ScaleResponse> {
        let start = self.start_ms?;
        events.iter().find_map(|event| match *event {
            InputEvent::PointerRelease { at, timestamp_ms } if self.bounds.contains(at) => {
                Some(ScaleResponse {
                    value: Some((at.x - self.bounds.left()) / self.bounds.width()),
                    latency_ms: timestamp_ms - start,
                })
            }
            InputEvent::PointerRelease { at, .. } => {
                debug!(x = at.x, y = at.y, "release outside scale ignored");
                None
            }
            _ => None,
        })
    }

    /// Ends a collection; the cursor is hidden again only if it was hidden
    /// before `init`.
    pub fn cleanup<H>(&mut self, host: &mut H)
    where
        H: PointerHost + ?Sized,
    {
        self.start_ms = None;
        if self.was_hidden.take() == Some(true) {
            host.hide_cursor();
        }
    }

    /// Runs `init`, polls until a qualifying release, a quit request or the
    /// timeout, then `cleanup`.
    pub fn collect<H, T>(&mut self, host: &mut H, timer: &T) -> Result<ScaleResponse, ScaleError>
    where
        H: Host,
        T: Timer + ?Sized,
    {
        if let Err(e) = self.init(host, timer) {
            self.cleanup(host);
            return Err(e.into());
        }
        let outcome = self.poll(host, timer);
        self.cleanup(host);

        match &outcome {
            Ok(r) if r.is_none() => info!(timeout_ms = ?self.timeout_ms, "scale response timed out"),
            Ok(r) => debug!(value = ?r.value, latency_ms = r.latency_ms, "scale response"),
            Err(e) => debug!(error = %e, "scale collection ended early"),
        }
        outcome
    }

    fn poll<H, T>(&mut self, host: &mut H, timer: &T) -> Result<ScaleResponse, ScaleError>
    where
        H: Host,
        T: Timer + ?Sized,
    {
        let start = self.start_ms.unwrap_or_else(|| timer.now_ms());
        loop {
            let events = host.pump_events()?;
            if let Some(callback) = self.callback.as_mut() {
                callback(&mut *host)?;
            }
            // whichever of a quit or a qualifying release arrived first decides
            for event in &events {
                if event.is_quit() {
                    return Err(ScaleError::Aborted);
                }
                if let Some(response) = self.listen(std::slice::from_ref(event)) {
                    return Ok(response);
                }
            }
            if let Some(limit) = self.timeout_ms {
                if timer.elapsed_ms(start) > limit {
                    return Ok(ScaleResponse::NONE);
                }
            }
        }
    }
}

impl std::fmt::Debug for ScaleListener<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaleListener")
            .field("bounds", &self.bounds)
            .field("start_pos", &self.start_pos)
            .field("timeout_ms", &self.timeout_ms)
            .field("has_callback", &self.callback.is_some())
            .field("start_ms", &self.start_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHost;
    use approx::assert_relative_eq;
    use ilm_core::Key;
    use ilm_timing::ManualTimer;

    fn scale() -> Boundary {
        Rectangle::new(Point::new(300.0, 380.0), Point::new(700.0, 420.0)).into()
    }

    fn release(x: f64, timestamp_ms: f64) -> InputEvent {
        InputEvent::PointerRelease {
            at: Point::new(x, 400.0),
            timestamp_ms,
        }
    }

    fn listening(timer: &ManualTimer) -> ScaleListener<'static> {
        let mut host = ScriptedHost::new(timer);
        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0)).unwrap();
        listener.init(&mut host, timer).unwrap();
        listener
    }

    #[test]
    fn value_is_position_across_width() {
        let timer = ManualTimer::starting_at(1_000.0);
        let listener = listening(&timer);

        let at = |x| listener.listen(&[release(x, 1_250.0)]).unwrap();
        assert_relative_eq!(at(300.0).value.unwrap(), 0.0);
        assert_relative_eq!(at(700.0).value.unwrap(), 1.0);
        assert_relative_eq!(at(500.0).value.unwrap(), 0.5);
        assert_relative_eq!(at(500.0).latency_ms, 250.0);
    }

    #[test]
    fn releases_outside_are_ignored() {
        let timer = ManualTimer::starting_at(0.0);
        let listener = listening(&timer);

        assert_eq!(listener.listen(&[release(150.0, 100.0)]), None);
        let r = listener
            .listen(&[release(150.0, 100.0), release(450.0, 180.0)])
            .unwrap();
        assert_relative_eq!(r.value.unwrap(), 0.375);
        assert_relative_eq!(r.latency_ms, 180.0);
    }

    #[test]
    fn first_qualifying_release_wins() {
        let timer = ManualTimer::new();
        let listener = listening(&timer);
        let r = listener
            .listen(&[
                InputEvent::KeyPress {
                    key: Key::Continue,
                    timestamp_ms: 5.0,
                },
                release(400.0, 10.0),
                release(600.0, 20.0),
            ])
            .unwrap();
        assert_relative_eq!(r.value.unwrap(), 0.25);
        assert_relative_eq!(r.latency_ms, 10.0);
    }

    #[test]
    fn listen_before_init_yields_nothing() {
        let listener = ScaleListener::new(scale(), Point::new(0.0, 0.0)).unwrap();
        assert_eq!(listener.listen(&[release(500.0, 10.0)]), None);
    }

    #[test]
    fn non_rectangular_bounds_are_rejected() {
        let circle = Boundary::Circle {
            center: Point::new(500.0, 400.0),
            radius: 50.0,
        };
        let err = ScaleListener::new(circle, Point::new(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ScaleError::NotRectangle("circle")));

        let flat = Rectangle::new(Point::new(300.0, 0.0), Point::new(300.0, 40.0));
        assert!(matches!(
            ScaleListener::new(flat.into(), Point::new(0.0, 0.0)),
            Err(ScaleError::ZeroWidth)
        ));
    }

    #[test]
    fn init_prepares_pointer_once() {
        let timer = ManualTimer::starting_at(42.0);
        let mut host = ScriptedHost::new(&timer);
        host.set_cursor_hidden(true);
        host.queue_at(0.0, release(500.0, 0.0));

        let mut listener = ScaleListener::new(scale(), Point::new(960.0, 540.0))
            .unwrap()
            .with_start_pos(Point::new(500.0, 400.0));
        listener.init(&mut host, &timer).unwrap();
        assert!(!host.cursor_hidden());
        assert_eq!(host.warps(), &[Point::new(500.0, 400.0)]);
        assert_eq!(host.pending(), 0, "stale events are cleared");

        timer.advance(100.0);
        listener.init(&mut host, &timer).unwrap();
        assert_eq!(host.warps().len(), 1);
        let r = listener.listen(&[release(500.0, 142.0)]).unwrap();
        assert_relative_eq!(r.latency_ms, 100.0);
    }

    #[test]
    fn collect_times_out_with_sentinel() {
        let timer = ManualTimer::new();
        let mut host = ScriptedHost::new(&timer);
        host.queue_at(100.0, release(150.0, 100.0));

        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0))
            .unwrap()
            .with_timeout_ms(Some(500.0));
        let r = listener.collect(&mut host, &timer).unwrap();
        assert_eq!(r, ScaleResponse::NONE);
        assert_eq!(r.latency_ms, -1.0);
        assert!(timer.now_ms() > 500.0);
        assert!(!listener.is_listening());
    }

    #[test]
    fn collect_returns_first_release_inside_and_renders_each_iteration() {
        let timer = ManualTimer::new();
        let mut host = ScriptedHost::new(&timer);
        host.queue_at(50.0, release(150.0, 50.0));
        host.queue_at(120.0, release(450.0, 120.0));

        let mut frames = 0usize;
        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0))
            .unwrap()
            .with_timeout_ms(Some(5_000.0))
            .with_callback(|display| {
                frames += 1;
                display.render(&ilm_core::Scene::default())
            });
        let r = listener.collect(&mut host, &timer).unwrap();
        drop(listener);

        assert_relative_eq!(r.value.unwrap(), 0.375);
        assert_relative_eq!(r.latency_ms, 120.0);
        assert!(frames > 0);
        assert_eq!(host.rendered(), frames);
    }

    #[test]
    fn cleanup_restores_hidden_cursor_only_if_it_was_hidden() {
        let timer = ManualTimer::new();

        let mut hidden = ScriptedHost::new(&timer);
        hidden.set_cursor_hidden(true);
        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0)).unwrap();
        listener.init(&mut hidden, &timer).unwrap();
        assert!(!hidden.cursor_hidden());
        listener.cleanup(&mut hidden);
        assert!(hidden.cursor_hidden());

        let mut visible = ScriptedHost::new(&timer);
        visible.set_cursor_hidden(false);
        listener.init(&mut visible, &timer).unwrap();
        listener.cleanup(&mut visible);
        assert!(!visible.cursor_hidden());
    }

    #[test]
    fn quit_aborts_collection_and_still_cleans_up() {
        let timer = ManualTimer::new();
        let mut host = ScriptedHost::new(&timer);
        host.set_cursor_hidden(true);
        host.queue_at(30.0, InputEvent::Quit);

        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0)).unwrap();
        let err = listener.collect(&mut host, &timer).unwrap_err();
        assert!(matches!(err, ScaleError::Aborted));
        assert!(host.cursor_hidden());
    }

    #[test]
    fn release_before_quit_in_one_batch_is_kept() {
        let timer = ManualTimer::new();
        let mut host = ScriptedHost::new(&timer);
        host.queue_at(40.0, release(500.0, 40.0));
        host.queue_at(40.0, InputEvent::Quit);

        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0)).unwrap();
        let r = listener.collect(&mut host, &timer).unwrap();
        assert_relative_eq!(r.value.unwrap(), 0.5);
        assert_relative_eq!(r.latency_ms, 40.0);
    }

    #[test]
    fn quit_before_release_in_one_batch_aborts() {
        let timer = ManualTimer::new();
        let mut host = ScriptedHost::new(&timer);
        host.queue_at(40.0, InputEvent::Quit);
        host.queue_at(40.0, release(500.0, 40.0));

        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0)).unwrap();
        let err = listener.collect(&mut host, &timer).unwrap_err();
        assert!(matches!(err, ScaleError::Aborted));
    }

    #[test]
    fn failed_init_still_restores_cursor() {
        let timer = ManualTimer::new();
        let mut host = ScriptedHost::new(&timer);
        host.set_cursor_hidden(true);
        host.fail_warps();

        let mut listener = ScaleListener::new(scale(), Point::new(500.0, 300.0)).unwrap();
        let err = listener.collect(&mut host, &timer).unwrap_err();
        assert!(matches!(err, ScaleError::Host(_)));
        assert!(host.cursor_hidden());
        assert!(!listener.is_listening());
    }
}
