use anyhow::{Result, anyhow, bail};
use ilm_core::{Display, InputEvent, Key, Point, PointerHost, Scene, ScreenGeometry, Side};
use ilm_render::{FontVec, SkiaRenderer};
use ilm_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    error::ExternalError,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window, WindowId},
};

const STATS_EVERY_FRAMES: usize = 600;

/// Maps a pressed key to the event the experiment sees.
pub fn key_event(code: KeyCode, timestamp_ms: f64) -> InputEvent {
    let key = match code {
        KeyCode::Escape => return InputEvent::Quit,
        KeyCode::KeyZ => Key::Response(Side::Left),
        KeyCode::Slash => Key::Response(Side::Right),
        KeyCode::Space | KeyCode::Enter => Key::Continue,
        _ => Key::Other,
    };
    InputEvent::KeyPress { key, timestamp_ms }
}

/// Window-side state fed by winit callbacks.
struct App<'t> {
    timer: &'t HighPrecisionTimer,
    font: Option<FontVec>,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    size: PhysicalSize<u32>,
    cursor: Point,
    pending: Vec<InputEvent>,
    error: Option<anyhow::Error>,
    exited: bool,
}

impl App<'_> {
    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;
        let refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Gaze ILM")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale_factor = window.scale_factor(),
            ?refresh_rate,
            "display configured"
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let mut renderer = SkiaRenderer::new(physical_size.width, physical_size.height)?;
        if let Some(font) = self.font.take() {
            renderer = renderer.with_font(font);
        }
        self.renderer = Some(renderer);
        self.size = physical_size;
        self.cursor = Point::new(
            physical_size.width as f64 / 2.0,
            physical_size.height as f64 / 2.0,
        );

        window.set_cursor_visible(false);
        self.window = Some(window);
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize canvas");
            }
        }
        info!(width = new_size.width, height = new_size.height, "display resized");
    }
}

impl ApplicationHandler for App<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.error = Some(e.context("creating window and surface"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.pending.push(InputEvent::Quit),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.pending.push(key_event(code, self.timer.now_ms()));
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Point::new(position.x, position.y);
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => self.pending.push(InputEvent::PointerRelease {
                at: self.cursor,
                timestamp_ms: self.timer.now_ms(),
            }),
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }
}

/// Fullscreen window driven synchronously: the experiment pumps events and
/// presents frames from its own loops instead of handing control to winit.
pub struct WinitHost<'t> {
    event_loop: EventLoop<()>,
    app: App<'t>,
    px_per_degree: f64,
    cursor_hidden: bool,
    frame_timer: HighPrecisionTimer,
    last_present_ms: Option<f64>,
    frames: usize,
}

impl<'t> WinitHost<'t> {
    /// Opens the window; input is stamped with `timer`.
    pub fn new(timer: &'t HighPrecisionTimer, px_per_degree: f64, font: Option<FontVec>) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        let mut host = Self {
            event_loop,
            app: App {
                timer,
                font,
                window: None,
                pixels: None,
                renderer: None,
                size: PhysicalSize::new(0, 0),
                cursor: Point::new(0.0, 0.0),
                pending: Vec::new(),
                error: None,
                exited: false,
            },
            px_per_degree,
            cursor_hidden: true,
            frame_timer: HighPrecisionTimer::new(),
            last_present_ms: None,
            frames: 0,
        };
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "opening experiment window"
        );

        while host.app.window.is_none() {
            host.pump()?;
            if host.app.exited {
                bail!("event loop exited before the window opened");
            }
        }
        if !host.app.renderer.as_ref().is_some_and(SkiaRenderer::has_font) {
            warn!("no font_path configured, instructions will not be shown");
        }
        host.app.pending.clear();
        Ok(host)
    }

    fn pump(&mut self) -> Result<()> {
        if self.app.exited {
            return Ok(());
        }
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.app)
        {
            debug!(code, "event loop exited");
            self.app.exited = true;
            self.app.pending.push(InputEvent::Quit);
        }
        match self.app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn window(&self) -> Result<&Arc<Window>> {
        self.app.window.as_ref().ok_or_else(|| anyhow!("window is not open"))
    }

    pub fn log_frame_stats(&self) {
        let stats = self.frame_timer.frame_stats();
        info!(
            frames = self.frames,
            mean_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            min_ms = stats.min_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            fps = stats.effective_fps,
            "frame timing"
        );
    }
}

impl Display for WinitHost<'_> {
    fn screen(&self) -> ScreenGeometry {
        ScreenGeometry::new(self.app.size.width, self.app.size.height, self.px_per_degree)
    }

    fn render(&mut self, scene: &Scene) -> Result<()> {
        let app = &mut self.app;
        let (Some(pixels), Some(renderer)) = (app.pixels.as_mut(), app.renderer.as_mut()) else {
            bail!("window is not open");
        };
        let stats = renderer.render_frame(scene, pixels.frame_mut(), app.timer)?;
        pixels.render()?;

        let now = app.timer.now_ms();
        if let Some(last) = self.last_present_ms.replace(now) {
            self.frame_timer
                .record_frame(Duration::from_secs_f64((now - last).max(0.0) / 1e3));
        }
        self.frames += 1;
        trace!(
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            elements = stats.elements,
            "frame"
        );
        if self.frames % STATS_EVERY_FRAMES == 0 {
            self.log_frame_stats();
        }
        Ok(())
    }
}

impl PointerHost for WinitHost<'_> {
    fn pump_events(&mut self) -> Result<Vec<InputEvent>> {
        self.pump()?;
        Ok(std::mem::take(&mut self.app.pending))
    }

    fn cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    fn show_cursor(&mut self) {
        if let Some(window) = &self.app.window {
            window.set_cursor_visible(true);
        }
        self.cursor_hidden = false;
    }

    fn hide_cursor(&mut self) {
        if let Some(window) = &self.app.window {
            window.set_cursor_visible(false);
        }
        self.cursor_hidden = true;
    }

    fn warp_pointer(&mut self, to: Point) -> Result<()> {
        match self.window()?.set_cursor_position(PhysicalPosition::new(to.x, to.y)) {
            Ok(()) => {}
            // Wayland cannot move the pointer
            Err(ExternalError::NotSupported(_)) => warn!("pointer warp not supported here"),
            Err(e) => return Err(e.into()),
        }
        self.app.cursor = to;
        Ok(())
    }
}

impl Drop for WinitHost<'_> {
    fn drop(&mut self) {
        if let Some(window) = &self.app.window {
            window.set_cursor_visible(true);
        }
        debug!("window resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_keys_map_to_sides() {
        assert_eq!(
            key_event(KeyCode::KeyZ, 12.0),
            InputEvent::KeyPress {
                key: Key::Response(Side::Left),
                timestamp_ms: 12.0
            }
        );
        assert_eq!(
            key_event(KeyCode::Slash, 3.0),
            InputEvent::KeyPress {
                key: Key::Response(Side::Right),
                timestamp_ms: 3.0
            }
        );
    }

    #[test]
    fn escape_quits_and_space_continues() {
        assert!(key_event(KeyCode::Escape, 0.0).is_quit());
        assert!(matches!(
            key_event(KeyCode::Space, 0.0),
            InputEvent::KeyPress {
                key: Key::Continue,
                ..
            }
        ));
        assert!(matches!(
            key_event(KeyCode::KeyA, 0.0),
            InputEvent::KeyPress { key: Key::Other, .. }
        ));
    }
}
