/// Random photo endpoint client
///
/// The endpoint answers with a small JSON document pointing at the full
/// resolution image and naming the place it was taken:
///
/// ```json
/// { "fullUrl": "https://.../IMG_0042.jpg", "place": "new_york-city" }
/// ```
///
/// Fetching a photo is two requests: the JSON, then the image itself.

use image::{imageops::FilterType, RgbaImage};
use log::{info, warn};
use serde::Deserialize;

use super::Photo;
use crate::config::FrameConfig;
use crate::error::{FrameError, Result};

/// Label used when the endpoint does not say where a photo was taken
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Raw endpoint payload. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct PhotoInfo {
    #[serde(rename = "fullUrl")]
    full_url: Option<String>,
    place: Option<String>,
}

/// Where to download the image from, and the caption to show with it
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoSource {
    pub url: String,
    pub location: String,
}

/// HTTP client for the random photo endpoint
#[derive(Debug, Clone)]
pub struct PhotoApi {
    client: reqwest::Client,
    endpoint: String,
    max_dimension: u32,
}

impl PhotoApi {
    pub fn new(config: &FrameConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("photo-frame/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_dimension: config.max_image_dimension,
        })
    }

    /// Fetch, download and decode one random photo
    ///
    /// Failures are logged here; callers only decide when to retry.
    pub async fn fetch_photo(&self) -> Result<Photo> {
        info!("🌐 Fetching random photo from {}", self.endpoint);

        match self.try_fetch_photo().await {
            Ok(photo) => {
                info!(
                    "📸 Fetched {}x{} photo - Location: {}",
                    photo.width(),
                    photo.height(),
                    photo.location
                );
                Ok(photo)
            }
            Err(e) => {
                warn!("⚠️  Error fetching photo: {}", e);
                Err(e)
            }
        }
    }

    async fn try_fetch_photo(&self) -> Result<Photo> {
        let response = self.client.get(&self.endpoint).send().await?;
        let body = check_status(response)?.bytes().await?;
        let source = parse_photo_info(&body)?;

        let response = self.client.get(&source.url).send().await?;
        let bytes = check_status(response)?.bytes().await?;

        // Decoding a full resolution JPEG is CPU-bound, keep it off the async threads
        let max_dimension = self.max_dimension;
        let image = tokio::task::spawn_blocking(move || decode_photo(&bytes, max_dimension))
            .await
            .map_err(|e| FrameError::Worker(format!("Task join error: {}", e)))??;

        Ok(Photo::new(image, source.location))
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FrameError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

/// Parse the endpoint JSON into an image URL and a formatted location
pub fn parse_photo_info(body: &[u8]) -> Result<PhotoSource> {
    let info: Option<PhotoInfo> = serde_json::from_slice(body)
        .map_err(|e| FrameError::InvalidResponse(format!("not a photo document: {}", e)))?;

    let info = info.ok_or_else(|| FrameError::InvalidResponse("empty response".into()))?;

    let url = match info.full_url {
        Some(url) if !url.trim().is_empty() => url,
        _ => return Err(FrameError::InvalidResponse("missing 'fullUrl'".into())),
    };

    let place = info.place.unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

    Ok(PhotoSource {
        url,
        location: format_location(&place),
    })
}

/// Decode image bytes into RGBA, downscaling so neither side exceeds `max_dimension`
pub fn decode_photo(bytes: &[u8], max_dimension: u32) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes)?;

    let img = if img.width() > max_dimension || img.height() > max_dimension {
        // resize() keeps the aspect ratio; the full size buffer is dropped right after
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    Ok(img.into_rgba8())
}

/// Turn an endpoint place slug into a caption
///
/// Underscores and dashes become spaces, and every word is title-cased:
/// `"new_york-city"` becomes `"New York City"`.
pub fn format_location(place: &str) -> String {
    let mut formatted = String::with_capacity(place.len());
    let mut previous_is_letter = false;

    for c in place.chars() {
        let c = if c == '_' || c == '-' { ' ' } else { c };

        if c.is_alphabetic() {
            if previous_is_letter {
                formatted.extend(c.to_lowercase());
            } else {
                formatted.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            formatted.push(c);
            previous_is_letter = false;
        }
    }

    formatted
}
