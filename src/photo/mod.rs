/// Photo pipeline module
///
/// This module handles:
/// - Fetching random photos from the HTTP endpoint (api.rs)
/// - The bounded prefetch queue and its worker thread (cache.rs)
/// - Fitting photos to the window (render.rs)
/// - Drawing the location caption (overlay.rs)

pub mod api;
pub mod cache;
pub mod overlay;
pub mod render;

use image::RgbaImage;
use std::sync::Arc;

/// A decoded photo and where it was taken
///
/// The pixel buffer is shared, so cloning a `Photo` is cheap. The buffer
/// is freed as soon as the last slot holding it (queue entry, current
/// photo, in-flight render) lets go.
#[derive(Debug, Clone)]
pub struct Photo {
    pub image: Arc<RgbaImage>,
    pub location: String,
}

impl Photo {
    pub fn new(image: RgbaImage, location: impl Into<String>) -> Self {
        Self {
            image: Arc::new(image),
            location: location.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Size of the decoded pixel buffer in bytes
    pub fn byte_size(&self) -> usize {
        self.image.as_raw().len()
    }
}
