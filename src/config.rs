/// Photo frame configuration
///
/// All settings live in a single TOML file. Every field is optional;
/// anything missing falls back to the defaults below, which match the
/// behaviour of the frame out of the box.
///
/// Default file location:
/// - Linux: ~/.config/photo-frame/config.toml
/// - macOS: ~/Library/Application Support/photo-frame/config.toml
/// - Windows: %APPDATA%\photo-frame\config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FrameError, Result};

/// Endpoint returning `{ "fullUrl": ..., "place": ... }`
pub const DEFAULT_ENDPOINT: &str = "https://keatondalquist.com/api/random-photo-info";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    // ========== Source ==========

    /// Random photo endpoint (http:// or https://)
    pub endpoint: String,

    /// Timeout for each HTTP request, in seconds
    pub request_timeout_secs: u64,

    // ========== Slideshow ==========

    /// Time between photo changes, in seconds
    pub update_interval_secs: u64,

    /// Window resize events are coalesced for this long before re-rendering
    pub resize_debounce_ms: u64,

    // ========== Prefetch cache ==========

    /// Maximum number of decoded photos waiting in the queue
    pub cache_size: usize,

    /// Once the queue has been full, the worker waits until it drains
    /// to this many photos before fetching again
    pub prefetch_threshold: usize,

    /// Worker back-off after a failed fetch, in seconds
    pub retry_delay_secs: u64,

    /// Worker polling period while the queue is full, in seconds
    pub full_cache_poll_secs: u64,

    // ========== Memory ==========

    /// Decoded photos are downscaled so neither side exceeds this
    pub max_image_dimension: u32,

    /// How often resident memory is probed and logged, in seconds
    pub memory_probe_secs: u64,

    /// Resident memory ceiling in MB. When exceeded, queued photos
    /// are dropped down to `prefetch_threshold`.
    pub memory_limit_mb: Option<u64>,

    // ========== Display ==========

    pub window_width: u32,
    pub window_height: u32,
    pub fullscreen: bool,

    /// TrueType fonts tried in order for the location caption.
    /// If none load, the caption is drawn with the UI default font.
    pub font_paths: Vec<PathBuf>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 10,
            update_interval_secs: 60,
            resize_debounce_ms: 100,
            cache_size: 15,
            prefetch_threshold: 5,
            retry_delay_secs: 5,
            full_cache_poll_secs: 30,
            max_image_dimension: 3840,
            memory_probe_secs: 300,
            memory_limit_mb: None,
            window_width: 800,
            window_height: 600,
            fullscreen: true,
            font_paths: vec![
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
                PathBuf::from("/usr/share/fonts/TTF/DejaVuSans-Bold.ttf"),
                PathBuf::from("/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf"),
            ],
        }
    }
}

impl FrameConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FrameError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load the config from the default location, or defaults if the
    /// file does not exist
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse from a TOML string and validate
    pub fn from_toml_str(content: &str, source_name: &str) -> Result<Self> {
        let config: FrameConfig = toml::from_str(content).map_err(|e| FrameError::ConfigParse {
            source_name: source_name.to_string(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the path where the config file is expected
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("photo-frame");
        path.push("config.toml");
        Some(path)
    }

    /// Check semantic constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(FrameError::ConfigInvalid(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if self.cache_size == 0 {
            return Err(FrameError::ConfigInvalid("cache_size must be at least 1".into()));
        }

        if self.prefetch_threshold >= self.cache_size {
            return Err(FrameError::ConfigInvalid(format!(
                "prefetch_threshold ({}) must be below cache_size ({})",
                self.prefetch_threshold, self.cache_size
            )));
        }

        let intervals = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("update_interval_secs", self.update_interval_secs),
            ("resize_debounce_ms", self.resize_debounce_ms),
            ("retry_delay_secs", self.retry_delay_secs),
            ("full_cache_poll_secs", self.full_cache_poll_secs),
            ("memory_probe_secs", self.memory_probe_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(FrameError::ConfigInvalid(format!("{} must be greater than 0", name)));
            }
        }

        if self.window_width == 0 || self.window_height == 0 || self.max_image_dimension == 0 {
            return Err(FrameError::ConfigInvalid(
                "window and image dimensions must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn full_cache_poll(&self) -> Duration {
        Duration::from_secs(self.full_cache_poll_secs)
    }

    pub fn memory_probe_interval(&self) -> Duration {
        Duration::from_secs(self.memory_probe_secs)
    }

    /// Memory ceiling in bytes, if one is configured
    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_mb.map(|mb| mb * 1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = FrameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.update_interval(), Duration::from_secs(60));
        assert_eq!(config.cache_size, 15);
        assert_eq!(config.prefetch_threshold, 5);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = FrameConfig::from_toml_str(
            "update_interval_secs = 30\nfullscreen = false\n",
            "inline",
        )
        .unwrap();

        assert_eq!(config.update_interval_secs, 30);
        assert!(!config.fullscreen);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.cache_size, 15);
    }

    #[test]
    fn test_rejects_threshold_above_capacity() {
        let result = FrameConfig::from_toml_str("cache_size = 3\nprefetch_threshold = 3\n", "inline");
        assert!(matches!(result, Err(FrameError::ConfigInvalid(_))));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = FrameConfig::from_toml_str("update_interval_secs = 0\n", "inline");
        assert!(matches!(result, Err(FrameError::ConfigInvalid(_))));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let result = FrameConfig::from_toml_str("endpoint = \"ftp://example.com\"\n", "inline");
        assert!(matches!(result, Err(FrameError::ConfigInvalid(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = FrameConfig::from_toml_str("cache_size = \"many\"", "inline");
        assert!(matches!(result, Err(FrameError::ConfigParse { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = \"http://localhost:8080/random\"").unwrap();
        writeln!(file, "memory_limit_mb = 256").unwrap();

        let config = FrameConfig::load(file.path()).unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080/random");
        assert_eq!(config.memory_limit_bytes(), Some(256 * 1024 * 1024));
    }

    #[test]
    fn test_load_missing_file() {
        let result = FrameConfig::load(Path::new("/nonexistent/photo-frame.toml"));
        assert!(matches!(result, Err(FrameError::Io { .. })));
    }
}
