use anyhow::{ensure, Result};
use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

use crate::imaging::labels::LabelRenderer;

/// Every panel is resampled to this height; width follows the aspect ratio.
pub const TARGET_HEIGHT: u32 = 512;
/// Band above the panels reserved for the numbered labels.
pub const LABEL_HEIGHT: u32 = 100;
/// Gap before, between, and after panels, and the top/bottom margins.
pub const PADDING: u32 = 20;
pub const PANEL_COUNT: u32 = 4;

const LABEL_FONT_SIZE: f32 = 60.0;
const DIVIDER_WIDTH: u32 = 2;
const DIVIDER_COLOR: Rgba<u8> = Rgba([0, 0, 0, 64]);

/// Fixed slot order; the generation prompt refers to panels by these numbers.
const PANEL_LABELS: [&str; PANEL_COUNT as usize] =
    ["1. Person", "2. Shoes", "3. Lower Body", "4. Upper Body"];

/// Resized width of a panel: `round(TARGET_HEIGHT * w / h)`.
pub fn panel_width(width: u32, height: u32) -> u32 {
    (TARGET_HEIGHT as f64 * width as f64 / height as f64).round() as u32
}

pub fn canvas_height() -> u32 {
    TARGET_HEIGHT + LABEL_HEIGHT + 2 * PADDING
}

/// Assembles the four-panel reference collage. Holds the label renderer so
/// font and glyph caches survive across compositing calls.
pub struct Compositor {
    labels: LabelRenderer,
}

impl Compositor {
    pub fn new() -> Self {
        Compositor {
            labels: LabelRenderer::new(),
        }
    }

    /// Compose the labeled reference collage in fixed slot order. All four
    /// images are required and must already be background-cleaned; this
    /// never calls the background remover. The whole canvas is rebuilt on
    /// every call.
    pub fn compose(
        &mut self,
        person: &RgbaImage,
        shoes: &RgbaImage,
        lower: &RgbaImage,
        upper: &RgbaImage,
    ) -> Result<RgbaImage> {
        let panels = [person, shoes, lower, upper];
        for (label, panel) in PANEL_LABELS.iter().zip(panels.iter()) {
            ensure!(
                panel.width() > 0 && panel.height() > 0,
                "collage panel '{label}' has no pixels"
            );
        }

        let resized: Vec<RgbaImage> = panels
            .iter()
            .map(|panel| {
                imageops::resize(
                    *panel,
                    panel_width(panel.width(), panel.height()),
                    TARGET_HEIGHT,
                    FilterType::Lanczos3,
                )
            })
            .collect();

        let total_width: u32 =
            resized.iter().map(|panel| panel.width()).sum::<u32>() + PADDING * (PANEL_COUNT + 1);
        let total_height = canvas_height();

        // RgbaImage::new zero-fills, so the canvas starts fully transparent.
        let mut canvas = RgbaImage::new(total_width, total_height);

        let mut x = PADDING;
        for (index, panel) in resized.iter().enumerate() {
            let label = PANEL_LABELS[index];
            let text_width = self.labels.text_width(label, LABEL_FONT_SIZE);
            let text_x = x as i32 + (panel.width() as i32 - text_width as i32) / 2;
            self.labels
                .draw(&mut canvas, label, LABEL_FONT_SIZE, text_x, PADDING as i32);

            // The panel's own alpha is the paste mask: transparent garment
            // background never overwrites canvas transparency.
            imageops::overlay(
                &mut canvas,
                panel,
                x as i64,
                (PADDING + LABEL_HEIGHT) as i64,
            );

            if index + 1 < resized.len() {
                let line_x = x + panel.width() + PADDING / 2;
                draw_divider(&mut canvas, line_x);
            }

            x += panel.width() + PADDING;
        }

        Ok(canvas)
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

/// 2 px low-opacity vertical rule spanning the full canvas height.
fn draw_divider(canvas: &mut RgbaImage, line_x: u32) {
    for dx in 0..DIVIDER_WIDTH {
        let x = line_x + dx;
        if x >= canvas.width() {
            continue;
        }
        for y in 0..canvas.height() {
            canvas.get_pixel_mut(x, y).blend(&DIVIDER_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    fn compose_four(width: u32, height: u32) -> RgbaImage {
        let mut compositor = Compositor::new();
        compositor
            .compose(
                &opaque(width, height, [255, 0, 0]),
                &opaque(width, height, [0, 255, 0]),
                &opaque(width, height, [0, 0, 255]),
                &opaque(width, height, [255, 255, 0]),
            )
            .unwrap()
    }

    #[test]
    fn canvas_dimensions_follow_the_fixed_formula() {
        // Four 400x600 panels resize to round(512 * 400/600) = 341 wide.
        let collage = compose_four(400, 600);
        assert_eq!(collage.width(), 341 * 4 + PADDING * 5);
        assert_eq!(collage.width(), 1464);
        assert_eq!(collage.height(), 652);
    }

    #[test]
    fn panel_resize_preserves_aspect_ratio() {
        for (w, h) in [(400u32, 600u32), (1000, 250), (512, 512), (33, 777)] {
            let resized_w = panel_width(w, h);
            let original = w as f64 / h as f64;
            let resized = resized_w as f64 / TARGET_HEIGHT as f64;
            assert!(
                (original - resized).abs() < 1.0 / TARGET_HEIGHT as f64,
                "aspect drifted for {w}x{h}: {original} vs {resized}"
            );
        }
    }

    #[test]
    fn panels_all_start_at_the_same_vertical_offset() {
        let collage = compose_four(256, 512);
        let panel_w = panel_width(256, 512);
        let top = PADDING + LABEL_HEIGHT;

        let mut x = PADDING;
        for _ in 0..PANEL_COUNT {
            // Probe the horizontal middle of each panel: opaque at the panel
            // top, transparent one row above (labels sit higher in the band).
            let mid = x + panel_w / 2;
            assert_eq!(collage.get_pixel(mid, top).0[3], 255);
            assert_eq!(collage.get_pixel(mid, top - 1).0[3], 0);
            x += panel_w + PADDING;
        }
    }

    #[test]
    fn dividers_sit_between_panels_but_not_after_the_last() {
        let collage = compose_four(512, 512);
        let panel_w = panel_width(512, 512);

        // Three dividers, each centered in the gap after panels 1..3.
        for i in 0..3u32 {
            let line_x = PADDING + (i + 1) * panel_w + i * PADDING + PADDING / 2;
            let pixel = collage.get_pixel(line_x, 0).0;
            assert_eq!(pixel, [0, 0, 0, 64], "divider {i} missing at x={line_x}");
            assert_eq!(collage.get_pixel(line_x, collage.height() - 1).0[3], 64);
        }

        // The gap after the final panel stays clear.
        let after_last = collage.width() - PADDING / 2;
        assert_eq!(collage.get_pixel(after_last, 0).0[3], 0);
    }

    #[test]
    fn transparent_panel_pixels_do_not_overwrite_canvas_transparency() {
        let mut compositor = Compositor::new();
        // Person panel fully transparent; the canvas must stay transparent
        // underneath it rather than turning opaque black.
        let transparent = RgbaImage::new(512, 512);
        let collage = compositor
            .compose(
                &transparent,
                &opaque(512, 512, [1, 2, 3]),
                &opaque(512, 512, [4, 5, 6]),
                &opaque(512, 512, [7, 8, 9]),
            )
            .unwrap();

        let top = PADDING + LABEL_HEIGHT;
        let mid = PADDING + panel_width(512, 512) / 2;
        assert_eq!(collage.get_pixel(mid, top).0[3], 0);
    }

    #[test]
    fn empty_panels_are_a_hard_failure() {
        let mut compositor = Compositor::new();
        let empty = RgbaImage::new(0, 0);
        let ok = opaque(100, 100, [1, 1, 1]);
        let err = compositor.compose(&ok, &empty, &ok, &ok).unwrap_err();
        assert!(err.to_string().contains("2. Shoes"));
    }
}
