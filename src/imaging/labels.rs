use image::{Pixel, Rgba, RgbaImage};
use parley::layout::{Alignment, GlyphRun, Layout, PositionedLayoutItem};
use parley::style::{FontStack, StyleProperty};
use parley::{FontContext, LayoutContext};
use peniko::Color;
use swash::scale::image::{Content, Image as SwashImage};
use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::zeno::{Format, Vector};
use swash::{FontRef, GlyphId, NormalizedCoord};

/// Ordered font preference for panel labels. Resolution walks the list and
/// ends at a generic family, so a machine without the preferred fonts still
/// renders (and a machine with no usable fonts at all yields an empty layout
/// rather than an error).
const LABEL_FONT_STACK: &str = "Roboto, DejaVu Sans, sans-serif";

/// Lays out label text with parley and rasterizes it into an `RgbaImage`
/// with swash. The contexts cache font data and scratch space, so one
/// renderer is built per compositor rather than per label.
pub struct LabelRenderer {
    font_cx: FontContext,
    layout_cx: LayoutContext<Color>,
    scale_cx: ScaleContext,
}

impl LabelRenderer {
    pub fn new() -> Self {
        LabelRenderer {
            font_cx: FontContext::default(),
            layout_cx: LayoutContext::new(),
            scale_cx: ScaleContext::new(),
        }
    }

    fn layout(&mut self, text: &str, font_size: f32) -> Layout<Color> {
        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, text, 1.0);
        builder.push_default(StyleProperty::Brush(Color::rgb8(0, 0, 0)));
        builder.push_default(StyleProperty::FontStack(FontStack::Source(
            std::borrow::Cow::Borrowed(LABEL_FONT_STACK),
        )));
        builder.push_default(StyleProperty::FontSize(font_size));
        let mut layout: Layout<Color> = builder.build(text);
        layout.break_all_lines(None);
        layout.align(None, Alignment::Start);
        layout
    }

    /// Measured advance width of the laid-out text, used for centering.
    /// Bounding-box measurement, not a character-count estimate.
    pub fn text_width(&mut self, text: &str, font_size: f32) -> u32 {
        self.layout(text, font_size).width().ceil() as u32
    }

    /// Draw `text` with its top-left corner at `(origin_x, origin_y)`.
    /// Glyphs falling outside the canvas are clipped, never a panic.
    pub fn draw(
        &mut self,
        img: &mut RgbaImage,
        text: &str,
        font_size: f32,
        origin_x: i32,
        origin_y: i32,
    ) {
        let layout = self.layout(text, font_size);
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                render_glyph_run(&mut self.scale_cx, &glyph_run, img, origin_x, origin_y);
            }
        }
    }
}

impl Default for LabelRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn blend_pixel(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= img.width() || y >= img.height() {
        return;
    }
    img.get_pixel_mut(x, y).blend(&color);
}

fn render_glyph_run(
    scale_cx: &mut ScaleContext,
    glyph_run: &GlyphRun<Color>,
    img: &mut RgbaImage,
    origin_x: i32,
    origin_y: i32,
) {
    let mut run_x = glyph_run.offset();
    let run_y = glyph_run.baseline();
    let color = glyph_run.style().brush;

    let run = glyph_run.run();
    let font = run.font();
    let font_size = run.font_size();
    let normalized_coords = run.normalized_coords();

    let Some(font_ref) = FontRef::from_index(font.data.as_ref(), font.index as usize) else {
        return;
    };

    for glyph in glyph_run.glyphs() {
        let glyph_id: GlyphId = glyph.id;
        let glyph_x = run_x + glyph.x;
        let glyph_y = run_y - glyph.y;
        run_x += glyph.advance;

        let Some(rendered) = render_glyph(
            scale_cx,
            &font_ref,
            font_size,
            normalized_coords,
            glyph_id,
            glyph_x.fract(),
            glyph_y.fract(),
        ) else {
            continue;
        };

        let glyph_width = rendered.placement.width as usize;
        let glyph_height = rendered.placement.height as usize;
        let glyph_origin_x = glyph_x.floor() as i32 + rendered.placement.left + origin_x;
        let glyph_origin_y = glyph_y.floor() as i32 - rendered.placement.top + origin_y;

        match rendered.content {
            Content::Mask => {
                let mut i = 0;
                for off_y in 0..glyph_height as i32 {
                    for off_x in 0..glyph_width as i32 {
                        let alpha = rendered.data[i];
                        i += 1;
                        if alpha == 0 {
                            continue;
                        }
                        blend_pixel(
                            img,
                            glyph_origin_x + off_x,
                            glyph_origin_y + off_y,
                            Rgba([color.r, color.g, color.b, alpha]),
                        );
                    }
                }
            }
            Content::Color => {
                for (off_y, row) in rendered.data.chunks_exact(glyph_width * 4).enumerate() {
                    for (off_x, pixel) in row.chunks_exact(4).enumerate() {
                        let &[r, g, b, a] = pixel else { continue };
                        if a == 0 {
                            continue;
                        }
                        blend_pixel(
                            img,
                            glyph_origin_x + off_x as i32,
                            glyph_origin_y + off_y as i32,
                            Rgba([r, g, b, a]),
                        );
                    }
                }
            }
            Content::SubpixelMask => {}
        }
    }
}

fn render_glyph(
    scale_cx: &mut ScaleContext,
    font: &FontRef,
    font_size: f32,
    normalized_coords: &[NormalizedCoord],
    glyph_id: GlyphId,
    x: f32,
    y: f32,
) -> Option<SwashImage> {
    let mut scaler = scale_cx
        .builder(*font)
        .size(font_size)
        .hint(true)
        .normalized_coords(normalized_coords)
        .build();

    let offset = Vector::new(x.fract(), y.fract());

    Render::new(&[
        Source::ColorOutline(0),
        Source::ColorBitmap(StrikeWith::BestFit),
        Source::Outline,
    ])
    .format(Format::Alpha)
    .offset(offset)
    .render(&mut scaler, glyph_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawing_clips_instead_of_panicking_at_canvas_edges() {
        let mut renderer = LabelRenderer::new();
        let mut img = RgbaImage::new(16, 16);
        renderer.draw(&mut img, "1. Person", 60.0, -40, -40);
        renderer.draw(&mut img, "1. Person", 60.0, 12, 12);
    }

    #[test]
    fn measurement_is_monotonic_in_text_length() {
        let mut renderer = LabelRenderer::new();
        let short = renderer.text_width("1.", 60.0);
        let long = renderer.text_width("1. Lower Body", 60.0);
        // With no fonts installed both are zero; otherwise longer text is wider.
        assert!(long >= short);
    }
}
