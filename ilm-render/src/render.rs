use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, bail};
use ilm_core::{Gaze, Point, Rectangle, Rgba, Scene, SceneElement};
use ilm_timing::{FrameStats, HighPrecisionTimer, Timer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{
    Color, FillRule, LineCap, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Stroke,
    Transform,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    content: String,
    size_bits: u32,
    color: Rgba,
}

/// Rasterized strings, keyed by content, size and color. Message screens
/// are redrawn every frame, so each string is laid out once.
struct TextCache {
    font: FontVec,
    map: HashMap<TextKey, Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: FontVec) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, content: &str, size_px: f32, color: Rgba) -> Option<Arc<Pixmap>> {
        let key = TextKey {
            content: content.to_string(),
            size_bits: size_px.to_bits(),
            color,
        };
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(content, size_px, &self.font, color)?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }
}

pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

/// Lays `text` out on one line and rasterizes it into a tight, transparent
/// premultiplied pixmap. `None` when nothing in `text` has an outline.
pub fn render_text_pixmap<F: Font>(text: &str, font_size: f32, font: &F, color: Rgba) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i64;
            let iy = (y as f32 + b.min.y - min_y).floor() as i64;
            if ix < 0 || iy < 0 || ix >= w as i64 || iy >= h as i64 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // premultiply by coverage * alpha, then source-over
            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let bg = dst[i];
            let inv = 1.0 - a;
            let over = |s: u8, d: u8| ((s as f32 * a) as u8).saturating_add((d as f32 * inv) as u8);
            let (r, g, b_, al) = (
                over(color[0], bg.red()),
                over(color[1], bg.green()),
                over(color[2], bg.blue()),
                sa.saturating_add((bg.alpha() as f32 * inv) as u8),
            );
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(al), g.min(al), b_.min(al), al) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

/// Per-frame timings of `SkiaRenderer::render_frame`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub elements: usize,
}

/// Software renderer: draws a `Scene` into an offscreen canvas and copies
/// it into an RGBA frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    canvas: Pixmap,
    text_cache: Option<TextCache>,
    warned_no_font: bool,
    component_timers: HashMap<&'static str, HighPrecisionTimer>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let canvas = Pixmap::new(width, height).context("canvas size must be non-zero")?;
        Ok(Self {
            width,
            height,
            canvas,
            text_cache: None,
            warned_no_font: false,
            component_timers: ["draw", "copy", "total"]
                .iter()
                .map(|&k| (k, HighPrecisionTimer::new()))
                .collect(),
        })
    }

    /// Text elements are skipped until a font is set.
    pub fn with_font(mut self, font: FontVec) -> Self {
        self.text_cache = Some(TextCache::new(font));
        self
    }

    pub fn has_font(&self) -> bool {
        self.text_cache.is_some()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width, new_height).context("canvas size must be non-zero")?;
        self.width = new_width;
        self.height = new_height;
        Ok(())
    }

    /// Rolling frame statistics for "draw", "copy" or "total".
    pub fn component_stats(&self, component: &str) -> Option<FrameStats> {
        self.component_timers.get(component).map(HighPrecisionTimer::frame_stats)
    }

    /// Draws `scene` and copies it into `frame_buffer`, which must be the
    /// canvas size in RGBA8.
    pub fn render_frame(
        &mut self,
        scene: &Scene,
        frame_buffer: &mut [u8],
        timer: &HighPrecisionTimer,
    ) -> Result<RenderStats> {
        let expected = self.canvas.data().len();
        if frame_buffer.len() != expected {
            bail!(
                "frame buffer is {} bytes, canvas {}x{} needs {expected}",
                frame_buffer.len(),
                self.width,
                self.height
            );
        }

        let t = timer.now_ms();
        self.draw_scene(scene);
        let draw = ms_to_duration(timer.elapsed_ms(t));

        // background is opaque, so premultiplied and straight RGBA agree
        let t = timer.now_ms();
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = ms_to_duration(timer.elapsed_ms(t));

        let total = draw + copy;
        for (name, d) in [("draw", draw), ("copy", copy), ("total", total)] {
            if let Some(timer) = self.component_timers.get_mut(name) {
                timer.record_frame(d);
            }
        }

        Ok(RenderStats {
            draw,
            copy,
            total,
            elements: scene.len(),
        })
    }

    /// Clears to the scene background and paints elements in order.
    pub fn draw_scene(&mut self, scene: &Scene) {
        self.canvas.fill(color(scene.background));
        for element in &scene.elements {
            self.draw_element(element, scene.background);
        }
    }

    fn draw_element(&mut self, element: &SceneElement, background: Rgba) {
        match element {
            SceneElement::FixationCross {
                at,
                size,
                thickness,
                color: c,
            } => self.draw_cross(*at, *size, *thickness, *c, Transform::identity()),
            SceneElement::XCross {
                at,
                size,
                thickness,
                color: c,
            } => {
                let rotate = Transform::from_rotate_at(45.0, at.x as f32, at.y as f32);
                self.draw_cross(*at, *size, *thickness, *c, rotate)
            }
            SceneElement::Circle {
                at,
                diameter,
                fill,
                stroke,
            } => self.draw_circle(*at, *diameter / 2.0, Some(*fill), *stroke),
            SceneElement::Line {
                from,
                to,
                thickness,
                color: c,
            } => self.draw_line(*from, *to, *thickness, *c),
            SceneElement::Face {
                at,
                diameter,
                gaze,
                color: c,
            } => self.draw_face(*at, *diameter, *gaze, *c, background),
            SceneElement::Rect { rect, fill, stroke } => self.draw_rect(rect, *fill, *stroke),
            SceneElement::Text {
                at,
                content,
                size,
                color: c,
            } => self.draw_text(*at, content, *size, *c),
        }
    }

    fn draw_cross(&mut self, at: Point, size: f64, thickness: f64, c: Rgba, transform: Transform) {
        let paint = paint(c);
        let (x, y, s, t) = (at.x as f32, at.y as f32, size as f32, thickness as f32);
        let bars = [
            Rect::from_xywh(x - s / 2.0, y - t / 2.0, s, t),
            Rect::from_xywh(x - t / 2.0, y - s / 2.0, t, s),
        ];
        for bar in bars.into_iter().flatten() {
            self.canvas.fill_rect(bar, &paint, transform, None);
        }
    }

    fn draw_circle(&mut self, at: Point, radius: f64, fill: Option<Rgba>, stroke: Option<(f64, Rgba)>) {
        let Some(path) = PathBuilder::from_circle(at.x as f32, at.y as f32, radius as f32) else {
            return;
        };
        if let Some(fill) = fill {
            self.canvas
                .fill_path(&path, &paint(fill), FillRule::Winding, Transform::identity(), None);
        }
        if let Some((width, c)) = stroke {
            let stroke = Stroke {
                width: width as f32,
                ..Stroke::default()
            };
            self.canvas
                .stroke_path(&path, &paint(c), &stroke, Transform::identity(), None);
        }
    }

    fn draw_line(&mut self, from: Point, to: Point, thickness: f64, c: Rgba) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.x as f32, from.y as f32);
        pb.line_to(to.x as f32, to.y as f32);
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width: thickness as f32,
            line_cap: LineCap::Butt,
            ..Stroke::default()
        };
        self.canvas
            .stroke_path(&path, &paint(c), &stroke, Transform::identity(), None);
    }

    /// Outline head, two eyes whose pupils shift toward the gazed side, and
    /// a flat mouth.
    fn draw_face(&mut self, at: Point, diameter: f64, gaze: Gaze, c: Rgba, background: Rgba) {
        let d = diameter;
        self.draw_circle(at, d / 2.0, None, Some(((d * 0.04).max(1.0), c)));

        let shift = match gaze {
            Gaze::Straight => 0.0,
            Gaze::Averted(side) => side.sign() * d * 0.06,
        };
        for dx in [-0.2 * d, 0.2 * d] {
            let eye = at.offset(dx, -0.12 * d);
            self.draw_circle(eye, d * 0.11, Some(c), None);
            self.draw_circle(eye.offset(shift, 0.0), d * 0.05, Some(background), None);
        }
        self.draw_line(
            at.offset(-0.18 * d, 0.25 * d),
            at.offset(0.18 * d, 0.25 * d),
            (d * 0.04).max(1.0),
            c,
        );
    }

    fn draw_rect(&mut self, rect: &Rectangle, fill: Rgba, stroke: Option<(f64, Rgba)>) {
        let Some(r) = Rect::from_xywh(
            rect.left() as f32,
            rect.top() as f32,
            rect.width() as f32,
            rect.height() as f32,
        ) else {
            return;
        };
        self.canvas.fill_rect(r, &paint(fill), Transform::identity(), None);
        if let Some((width, c)) = stroke {
            let path = PathBuilder::from_rect(r);
            let stroke = Stroke {
                width: width as f32,
                ..Stroke::default()
            };
            self.canvas
                .stroke_path(&path, &paint(c), &stroke, Transform::identity(), None);
        }
    }

    fn draw_text(&mut self, at: Point, content: &str, size: f64, c: Rgba) {
        let Some(cache) = self.text_cache.as_mut() else {
            if !self.warned_no_font {
                warn!("no font loaded, text elements are not drawn");
                self.warned_no_font = true;
            }
            return;
        };
        match cache.get_or_render(content, size as f32, c) {
            Some(pm) => blit_centered(&mut self.canvas, &pm, at),
            None => debug!(content, "text has no visible glyphs"),
        }
    }
}

/// Source-over blit of a premultiplied pixmap centered on `at`, clipped to
/// the canvas.
pub fn blit_centered(canvas: &mut Pixmap, src: &Pixmap, at: Point) {
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x0 = (at.x - sw as f64 / 2.0).floor() as i64;
    let y0 = (at.y - sh as f64 / 2.0).floor() as i64;

    let (dx0, dy0) = (x0.max(0), y0.max(0));
    let (dx1, dy1) = ((x0 + sw).min(cw), (y0 + sh).min(ch));
    if dx1 <= dx0 || dy1 <= dy0 {
        return;
    }

    let src_px: &[[u8; 4]] = bytemuck::cast_slice(src.data());
    let dst_px: &mut [[u8; 4]] = bytemuck::cast_slice_mut(canvas.data_mut());
    for y in dy0..dy1 {
        for x in dx0..dx1 {
            let s = src_px[((y - y0) * sw + (x - x0)) as usize];
            let d = &mut dst_px[(y * cw + x) as usize];
            let inv = 255 - s[3] as u32;
            for k in 0..4 {
                d[k] = (s[k] as u32 + (d[k] as u32 * inv + 127) / 255).min(255) as u8;
            }
        }
    }
}

fn ms_to_duration(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1e3)
}

fn color(c: Rgba) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}

fn paint(c: Rgba) -> Paint<'static> {
    let mut p = Paint::default();
    p.set_color(color(c));
    p.anti_alias = true;
    p
}
