/// Fit a photo to the window and caption it
///
/// Runs on the blocking pool: Lanczos resampling a multi-megapixel photo
/// takes long enough to stall the UI.

use image::{imageops::FilterType, RgbaImage};

use super::overlay::{self, CaptionFont};
use super::Photo;

/// How the caption ended up on the frame
#[derive(Debug, Clone, PartialEq)]
pub enum Caption {
    /// Drawn into the pixels
    Burned,
    /// No TrueType font available; the UI draws this text itself
    Fallback(String),
    /// Nothing to show
    None,
}

/// A photo ready to hand to the UI
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub image: RgbaImage,
    pub caption: Caption,
}

/// Scale `image` to fit inside `max_width` x `max_height`
///
/// Aspect ratio is preserved and images are never enlarged.
pub fn fit_within(image: &RgbaImage, max_width: u32, max_height: u32) -> RgbaImage {
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);
    let (width, height) = image.dimensions();

    if width <= max_width && height <= max_height {
        return image.clone();
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_height);

    image::imageops::resize(image, new_width, new_height, FilterType::Lanczos3)
}

/// Fit `photo` to a `width` x `height` window and add its location caption
pub fn compose(photo: &Photo, width: u32, height: u32, font: Option<&CaptionFont>) -> RenderedFrame {
    let mut image = fit_within(&photo.image, width, height);

    let caption = if photo.location.trim().is_empty() {
        Caption::None
    } else {
        match font {
            Some(font) if overlay::draw_caption(&mut image, &photo.location, font) => Caption::Burned,
            _ => Caption::Fallback(photo.location.clone()),
        }
    };

    RenderedFrame { image, caption }
}
