/// Location caption overlay
///
/// Draws the location label in the bottom-right corner of a photo:
/// white text on a half-transparent black box, 10px from the edges.
/// Rasterization is done with fontdue from a TrueType file on disk.
/// When no font can be loaded, the caption is left to the UI toolkit
/// (see `ui::frame`).

use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Gap between the text and the image edge
const PADDING: i64 = 10;
/// Extra margin of the background box around the text
const BOX_PADDING: i64 = 5;
/// Background box opacity (0-255)
const BOX_ALPHA: u8 = 128;
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const BOX_COLOR: [u8; 3] = [0, 0, 0];

/// A TrueType font loaded for captions
pub struct CaptionFont {
    font: Font,
    path: PathBuf,
}

impl std::fmt::Debug for CaptionFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionFont")
            .field("path", &self.path)
            .finish()
    }
}

impl CaptionFont {
    /// Load the first usable font from `candidates`
    ///
    /// Returns `None` if none of them can be read and parsed.
    pub fn load(candidates: &[PathBuf]) -> Option<Self> {
        for path in candidates {
            match Self::load_file(path) {
                Ok(font) => {
                    info!("🔤 Caption font: {}", path.display());
                    return Some(font);
                }
                Err(e) => debug!("Skipping caption font {}: {}", path.display(), e),
            }
        }

        warn!("⚠️  No caption font could be loaded, falling back to the default UI font");
        None
    }

    fn load_file(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| e.to_string())?;
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    /// Width of `text` at `px`, and the line's ascent and descent
    /// (descent is negative, below the baseline)
    fn measure(&self, text: &str, px: f32) -> (f32, f32, f32) {
        let width = text
            .chars()
            .map(|c| self.font.metrics(c, px).advance_width)
            .sum();

        match self.font.horizontal_line_metrics(px) {
            Some(line) => (width, line.ascent, line.descent),
            None => (width, px, 0.0),
        }
    }
}

/// Caption size scales with the image: width / 40, kept within 12..=24 px
pub fn font_size(image_width: u32) -> f32 {
    (image_width / 40).clamp(12, 24) as f32
}

/// Axis-aligned rectangle in image coordinates, end-exclusive.
/// May extend past the image; drawing clips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

/// Where the text (top-left corner) and its background box go for a
/// text block of `text_w` x `text_h` on a `width` x `height` image
pub fn caption_layout(width: u32, height: u32, text_w: u32, text_h: u32) -> ((i64, i64), Rect) {
    let x = width as i64 - text_w as i64 - PADDING;
    let y = height as i64 - text_h as i64 - PADDING;

    let background = Rect {
        x0: x - BOX_PADDING,
        y0: y - BOX_PADDING,
        x1: x + text_w as i64 + BOX_PADDING,
        y1: y + text_h as i64 + BOX_PADDING,
    };

    ((x, y), background)
}

/// Draw `text` in the bottom-right corner of `image`
///
/// Returns false if there was nothing to draw.
pub fn draw_caption(image: &mut RgbaImage, text: &str, font: &CaptionFont) -> bool {
    let text = text.trim();
    if text.is_empty() || image.width() == 0 || image.height() == 0 {
        return false;
    }

    let px = font_size(image.width());
    let (text_w, ascent, descent) = font.measure(text, px);
    let text_w = text_w.ceil() as u32;
    let text_h = (ascent - descent).ceil() as u32;

    let ((x, y), background) = caption_layout(image.width(), image.height(), text_w, text_h);
    fill_rect(image, background, BOX_COLOR, BOX_ALPHA);

    let baseline = y + ascent.round() as i64;
    let mut pen_x = x as f32;

    for c in text.chars() {
        let (metrics, coverage) = font.font.rasterize(c, px);
        let glyph_x = (pen_x + metrics.xmin as f32).round() as i64;
        let glyph_y = baseline - metrics.height as i64 - metrics.ymin as i64;

        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let alpha = coverage[row * metrics.width + col];
                if alpha > 0 {
                    blend_at(image, glyph_x + col as i64, glyph_y + row as i64, TEXT_COLOR, alpha);
                }
            }
        }

        pen_x += metrics.advance_width;
    }

    true
}

/// Alpha-blend a solid color over `rect`, clipped to the image
pub fn fill_rect(image: &mut RgbaImage, rect: Rect, color: [u8; 3], alpha: u8) {
    let x0 = rect.x0.clamp(0, image.width() as i64);
    let x1 = rect.x1.clamp(0, image.width() as i64);
    let y0 = rect.y0.clamp(0, image.height() as i64);
    let y1 = rect.y1.clamp(0, image.height() as i64);

    for y in y0..y1 {
        for x in x0..x1 {
            blend(image.get_pixel_mut(x as u32, y as u32), color, alpha);
        }
    }
}

fn blend_at(image: &mut RgbaImage, x: i64, y: i64, color: [u8; 3], alpha: u8) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    blend(image.get_pixel_mut(x as u32, y as u32), color, alpha);
}

fn blend(pixel: &mut Rgba<u8>, color: [u8; 3], alpha: u8) {
    let a = alpha as u32;
    for i in 0..3 {
        pixel[i] = ((color[i] as u32 * a + pixel[i] as u32 * (255 - a) + 127) / 255) as u8;
    }
    pixel[3] = pixel[3].max(alpha);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameConfig;

    const GREY: Rgba<u8> = Rgba([200, 200, 200, 255]);

    #[test]
    fn test_font_size_bounds() {
        assert_eq!(font_size(100), 12.0);
        assert_eq!(font_size(800), 20.0);
        assert_eq!(font_size(3840), 24.0);
    }

    #[test]
    fn test_caption_layout_bottom_right() {
        let ((x, y), background) = caption_layout(800, 600, 100, 20);

        assert_eq!((x, y), (690, 570));
        assert_eq!(
            background,
            Rect { x0: 685, y0: 565, x1: 795, y1: 595 }
        );
    }

    #[test]
    fn test_fill_rect_blends_half() {
        let mut image = RgbaImage::from_pixel(4, 4, GREY);
        fill_rect(&mut image, Rect { x0: 2, y0: 2, x1: 4, y1: 4 }, BOX_COLOR, BOX_ALPHA);

        assert_eq!(*image.get_pixel(0, 0), GREY);
        assert_eq!(*image.get_pixel(3, 3), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut image = RgbaImage::from_pixel(4, 4, GREY);
        fill_rect(&mut image, Rect { x0: -10, y0: -10, x1: 100, y1: 1 }, BOX_COLOR, 255);

        assert_eq!(*image.get_pixel(3, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(3, 1), GREY);
    }

    #[test]
    fn test_missing_fonts() {
        let candidates = vec![PathBuf::from("/nonexistent/font.ttf")];
        assert!(CaptionFont::load(&candidates).is_none());
    }

    fn system_font() -> CaptionFont {
        CaptionFont::load(&FrameConfig::default().font_paths)
            .expect("DejaVu Sans Bold is not installed")
    }

    #[test]
    #[ignore = "needs DejaVu Sans Bold installed; run with --ignored"]
    fn test_draw_caption_touches_bottom_right_only() {
        let font = system_font();

        let mut image = RgbaImage::from_pixel(400, 300, GREY);
        assert!(draw_caption(&mut image, "Big Sur", &font));

        assert_eq!(*image.get_pixel(0, 0), GREY);
        assert_eq!(*image.get_pixel(10, 290), GREY);
        assert_ne!(*image.get_pixel(385, 285), GREY);

        assert!(!draw_caption(&mut image, "   ", &font));
    }

    #[test]
    #[ignore = "needs DejaVu Sans Bold installed; run with --ignored"]
    fn test_draw_caption_on_tiny_image() {
        let font = system_font();

        // Text is wider than the image; drawing must clip, not panic
        let mut image = RgbaImage::from_pixel(8, 8, GREY);
        assert!(draw_caption(&mut image, "A Very Long Location Name", &font));
    }
}
