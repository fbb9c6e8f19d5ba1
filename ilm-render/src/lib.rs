//! Software rendering of experiment scenes with tiny-skia.

mod render;

pub use ab_glyph::FontVec;
pub use render::{RenderStats, SkiaRenderer, blit_centered, load_font, render_text_pixmap};
