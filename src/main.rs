use clap::Parser;
use iced::{keyboard, time, window, Element, Size, Subscription, Task, Theme};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod error;
mod memory;
mod photo;
mod ui;

use config::FrameConfig;
use memory::{MemoryProbe, MemoryStatus};
use photo::api::PhotoApi;
use photo::cache::{PhotoCache, Prefetcher, WorkerSettings};
use photo::overlay::CaptionFont;
use photo::{render, Photo};
use ui::DisplayFrame;

/// Command line overrides for the config file
#[derive(Parser, Debug)]
#[command(name = "photo-frame", version, about = "Full-screen random photo frame")]
struct Cli {
    /// Config file (default: <config dir>/photo-frame/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Random photo endpoint
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Seconds between photos
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Number of photos to prefetch
    #[arg(long, value_name = "N")]
    cache_size: Option<usize>,

    /// Stay in a window instead of going full-screen
    #[arg(long)]
    windowed: bool,
}

impl Cli {
    fn load_config(&self) -> error::Result<FrameConfig> {
        let mut config = match &self.config {
            Some(path) => FrameConfig::load(path)?,
            None => FrameConfig::load_default()?,
        };

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(interval) = self.interval {
            config.update_interval_secs = interval;
        }
        if let Some(cache_size) = self.cache_size {
            config.cache_size = cache_size;
            // Keep the threshold valid for small caches
            config.prefetch_threshold = config.prefetch_threshold.min(cache_size.saturating_sub(1));
        }
        if self.windowed {
            config.fullscreen = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Main application state
struct PhotoFrame {
    config: FrameConfig,
    /// Client for immediate fetches when the cache is empty
    api: PhotoApi,
    prefetcher: Prefetcher,
    /// None when no TrueType font could be loaded
    font: Option<Arc<CaptionFont>>,
    memory: MemoryProbe,
    /// Photo on screen; kept at full size so resizes re-render from it
    current: Option<Photo>,
    /// `current` rendered for the window
    frame: Option<DisplayFrame>,
    window_size: Size,
    render_generation: u64,
    resize_generation: u64,
    /// Bumped when a cached photo is shown, so a slower immediate fetch
    /// started before it does not replace it
    fetch_generation: u64,
    fetch_in_flight: bool,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Time to show the next photo
    Tick,
    /// Immediate fetch started at the given generation finished (cache was empty)
    Fetched(u64, Result<Photo, String>),
    /// Background render finished for the given generation
    Rendered(u64, Result<DisplayFrame, String>),
    WindowResized(Size),
    /// Debounce timer for the given resize expired
    ResizeSettled(u64),
    ProbeMemory,
    Exit,
}

impl PhotoFrame {
    /// Create the application and start prefetching
    fn new(config: FrameConfig) -> error::Result<Self> {
        let mut frame = Self::assemble(config)?;
        frame.prefetcher.start(PhotoApi::new(&frame.config)?)?;
        Ok(frame)
    }

    /// Build the state without starting the worker thread
    fn assemble(config: FrameConfig) -> error::Result<Self> {
        let api = PhotoApi::new(&config)?;
        let cache = Arc::new(PhotoCache::new(config.cache_size));
        let prefetcher = Prefetcher::new(cache, WorkerSettings::from(&config));
        let font = CaptionFont::load(&config.font_paths).map(Arc::new);
        let memory = MemoryProbe::new(config.memory_limit_bytes());
        let window_size = Size::new(config.window_width as f32, config.window_height as f32);

        Ok(Self {
            config,
            api,
            prefetcher,
            font,
            memory,
            current: None,
            frame: None,
            window_size,
            render_generation: 0,
            resize_generation: 0,
            fetch_generation: 0,
            fetch_in_flight: false,
        })
    }

    /// Initial tasks: show a photo right away, go full-screen if configured
    fn boot(self) -> (Self, Task<Message>) {
        let mut tasks = vec![Task::done(Message::Tick)];

        if self.config.fullscreen {
            tasks.push(
                window::get_latest()
                    .and_then(|id| window::change_mode(id, window::Mode::Fullscreen)),
            );
        }

        (self, Task::batch(tasks))
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => self.advance(),
            Message::Fetched(generation, result) => {
                self.fetch_in_flight = false;
                if generation != self.fetch_generation {
                    debug!("Discarding fetch {} superseded by a cached photo", generation);
                    return Task::none();
                }
                match result {
                    Ok(photo) => self.show(photo),
                    Err(e) => {
                        // Keep whatever is on screen until the next tick
                        warn!("⚠️  Failed to get photo from cache or API: {}", e);
                        Task::none()
                    }
                }
            }
            Message::Rendered(generation, result) => {
                if generation != self.render_generation {
                    debug!("Discarding stale render {} (current {})", generation, self.render_generation);
                    return Task::none();
                }
                match result {
                    // Replacing the frame releases the previous texture buffer
                    Ok(frame) => self.frame = Some(frame),
                    Err(e) => warn!("⚠️  Error displaying image: {}", e),
                }
                Task::none()
            }
            Message::WindowResized(size) => {
                if size == self.window_size {
                    return Task::none();
                }
                self.window_size = size;
                if self.current.is_none() {
                    return Task::none();
                }

                self.resize_generation += 1;
                let generation = self.resize_generation;
                let delay = self.config.resize_debounce();
                Task::perform(async move { tokio::time::sleep(delay).await }, move |_| {
                    Message::ResizeSettled(generation)
                })
            }
            Message::ResizeSettled(generation) => {
                if generation == self.resize_generation {
                    self.render_current()
                } else {
                    Task::none()
                }
            }
            Message::ProbeMemory => {
                self.probe_memory();
                Task::none()
            }
            Message::Exit => {
                self.prefetcher.stop();
                let cache = self.prefetcher.cache();
                if !cache.is_empty() {
                    debug!("Released {} cached photos", cache.clear());
                }
                iced::exit()
            }
        }
    }

    /// Next photo: from the cache if one is waiting, otherwise fetch now
    fn advance(&mut self) -> Task<Message> {
        if let Some(photo) = self.prefetcher.cache().take_photo() {
            if self.fetch_in_flight {
                self.fetch_generation += 1;
            }
            return self.show(photo);
        }

        if self.fetch_in_flight {
            info!("⏳ Previous fetch still running, waiting for it");
            return Task::none();
        }

        self.fetch_in_flight = true;
        let generation = self.fetch_generation;
        let api = self.api.clone();
        Task::perform(
            async move { api.fetch_photo().await.map_err(|e| e.to_string()) },
            move |result| Message::Fetched(generation, result),
        )
    }

    fn show(&mut self, photo: Photo) -> Task<Message> {
        info!("🖼️  Using photo with location: {}", photo.location);
        // The previous photo is dropped here
        self.current = Some(photo);
        self.render_current()
    }

    /// Render the current photo for the current window size, off the UI thread
    fn render_current(&mut self) -> Task<Message> {
        let Some(photo) = self.current.clone() else {
            return Task::none();
        };

        self.render_generation += 1;
        let generation = self.render_generation;
        let width = self.window_size.width.round() as u32;
        let height = self.window_size.height.round() as u32;
        let font = self.font.clone();

        Task::perform(render_frame(photo, width, height, font), move |result| {
            Message::Rendered(generation, result)
        })
    }

    fn probe_memory(&self) {
        let cache = self.prefetcher.cache();
        let status = self.memory.probe();
        info!(
            "📊 Queue holds {} photos ({:.1} MB decoded)",
            cache.len(),
            memory::mb(cache.byte_size() as u64)
        );

        match status {
            MemoryStatus::OverLimit { .. } => {
                // The worker holds the queue at the threshold until the next reading is under the limit
                cache.set_memory_constrained(true);
                let dropped = cache.trim_to(self.config.prefetch_threshold);
                if dropped > 0 {
                    warn!("🧹 Dropped {} cached photos to reclaim memory", dropped);
                }
            }
            MemoryStatus::Ok { .. } | MemoryStatus::Unknown => {
                if cache.is_memory_constrained() {
                    info!("✅ Memory back under the limit, prefetch resumes");
                    cache.set_memory_constrained(false);
                }
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            time::every(self.config.update_interval()).map(|_| Message::Tick),
            time::every(self.config.memory_probe_interval()).map(|_| Message::ProbeMemory),
            window::resize_events().map(|(_id, size)| Message::WindowResized(size)),
            keyboard::on_key_press(handle_key),
        ])
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        ui::frame::view(self.frame.as_ref())
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Escape quits; Space or Right arrow skips to the next photo
fn handle_key(key: keyboard::Key, _modifiers: keyboard::Modifiers) -> Option<Message> {
    use keyboard::key::Named;

    match key {
        keyboard::Key::Named(Named::Escape) => Some(Message::Exit),
        keyboard::Key::Named(Named::Space | Named::ArrowRight) => Some(Message::Tick),
        _ => None,
    }
}

/// Fit, caption and upload a photo on the blocking pool
async fn render_frame(
    photo: Photo,
    width: u32,
    height: u32,
    font: Option<Arc<CaptionFont>>,
) -> Result<DisplayFrame, String> {
    tokio::task::spawn_blocking(move || {
        DisplayFrame::from(render::compose(&photo, width, height, font.as_deref()))
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    info!(
        "🎨 Photo Frame starting: {} every {}s, caching {} photos",
        config.endpoint, config.update_interval_secs, config.cache_size
    );

    let window_size = Size::new(config.window_width as f32, config.window_height as f32);
    let app = PhotoFrame::new(config)?;

    iced::application("Photo Frame", PhotoFrame::update, PhotoFrame::view)
        .subscription(PhotoFrame::subscription)
        .theme(PhotoFrame::theme)
        .window_size(window_size)
        .centered()
        .run_with(move || app.boot())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn test_frame() -> PhotoFrame {
        let config = FrameConfig {
            endpoint: "http://127.0.0.1:1/random-photo-info".to_string(),
            font_paths: Vec::new(),
            ..FrameConfig::default()
        };
        PhotoFrame::assemble(config).unwrap()
    }

    fn photo(location: &str) -> Photo {
        Photo::new(RgbaImage::from_pixel(40, 30, Rgba([1, 2, 3, 255])), location)
    }

    fn display_frame() -> DisplayFrame {
        DisplayFrame::from(render::compose(&photo("Big Sur"), 40, 30, None))
    }

    #[test]
    fn test_failed_fetch_keeps_current_photo() {
        let mut app = test_frame();
        let _ = app.show(photo("Big Sur"));
        app.fetch_in_flight = true;

        let _ = app.update(Message::Fetched(0, Err("connection refused".to_string())));

        assert!(!app.fetch_in_flight);
        assert_eq!(app.current.as_ref().unwrap().location, "Big Sur");
    }

    #[test]
    fn test_tick_uses_cached_photo() {
        let mut app = test_frame();
        app.prefetcher.cache().push(photo("Yosemite")).unwrap();

        let _ = app.update(Message::Tick);

        assert_eq!(app.current.as_ref().unwrap().location, "Yosemite");
        assert!(app.prefetcher.cache().is_empty());
        assert!(!app.fetch_in_flight);
    }

    #[test]
    fn test_empty_cache_fetches_once() {
        let mut app = test_frame();

        let _ = app.update(Message::Tick);
        assert!(app.fetch_in_flight);

        // A second tick while the first fetch is running does not start another
        let _ = app.update(Message::Tick);
        assert!(app.fetch_in_flight);
        assert!(app.current.is_none());
    }

    #[test]
    fn test_successful_fetch_replaces_photo() {
        let mut app = test_frame();
        let _ = app.show(photo("Big Sur"));
        let generation = app.render_generation;

        let _ = app.update(Message::Fetched(0, Ok(photo("Yosemite"))));

        assert_eq!(app.current.as_ref().unwrap().location, "Yosemite");
        assert_eq!(app.render_generation, generation + 1);
    }

    #[test]
    fn test_cached_photo_wins_over_pending_fetch() {
        let mut app = test_frame();

        // Empty cache: an immediate fetch starts at generation 0
        let _ = app.update(Message::Tick);
        assert!(app.fetch_in_flight);

        // The worker delivers first and a key press shows its photo
        app.prefetcher.cache().push(photo("Yosemite")).unwrap();
        let _ = app.update(Message::Tick);
        assert_eq!(app.current.as_ref().unwrap().location, "Yosemite");

        // The older fetch completes and is dropped
        let _ = app.update(Message::Fetched(0, Ok(photo("Big Sur"))));
        assert_eq!(app.current.as_ref().unwrap().location, "Yosemite");
        assert!(!app.fetch_in_flight);

        // A fetch started after that is shown normally
        let _ = app.update(Message::Tick);
        let generation = app.fetch_generation;
        let _ = app.update(Message::Fetched(generation, Ok(photo("Zion"))));
        assert_eq!(app.current.as_ref().unwrap().location, "Zion");
    }

    #[test]
    fn test_exit_releases_cached_photos() {
        let mut app = test_frame();
        app.prefetcher.cache().push(photo("Yosemite")).unwrap();

        let _ = app.update(Message::Exit);

        assert!(app.prefetcher.cache().is_empty());
    }

    #[test]
    fn test_stale_render_is_discarded() {
        let mut app = test_frame();
        let _ = app.show(photo("Big Sur"));
        let _ = app.show(photo("Yosemite"));

        let _ = app.update(Message::Rendered(app.render_generation - 1, Ok(display_frame())));
        assert!(app.frame.is_none());

        let _ = app.update(Message::Rendered(app.render_generation, Ok(display_frame())));
        assert!(app.frame.is_some());
    }

    #[test]
    fn test_resize_is_debounced() {
        let mut app = test_frame();
        let _ = app.show(photo("Big Sur"));
        let generation = app.render_generation;

        let _ = app.update(Message::WindowResized(Size::new(1024.0, 768.0)));
        let _ = app.update(Message::WindowResized(Size::new(1280.0, 720.0)));
        assert_eq!(app.resize_generation, 2);

        // Only the last resize re-renders
        let _ = app.update(Message::ResizeSettled(1));
        assert_eq!(app.render_generation, generation);
        let _ = app.update(Message::ResizeSettled(2));
        assert_eq!(app.render_generation, generation + 1);

        // Same size again is ignored
        let _ = app.update(Message::WindowResized(Size::new(1280.0, 720.0)));
        assert_eq!(app.resize_generation, 2);
    }

    #[test]
    fn test_memory_over_limit_trims_cache() {
        let mut app = test_frame();
        // Any running process is over a 1 byte ceiling
        app.memory = MemoryProbe::new(Some(1));
        for i in 0..10 {
            app.prefetcher.cache().push(photo(&format!("Photo {}", i))).unwrap();
        }

        let _ = app.update(Message::ProbeMemory);

        if memory::resident_bytes().is_some() {
            assert_eq!(app.prefetcher.cache().len(), app.config.prefetch_threshold);
            assert!(app.prefetcher.cache().is_memory_constrained());

            // A reading under the ceiling lifts the constraint
            app.memory = MemoryProbe::new(None);
            let _ = app.update(Message::ProbeMemory);
            assert!(!app.prefetcher.cache().is_memory_constrained());
        }
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "photo-frame",
            "--config",
            "/nonexistent/config.toml",
        ]);
        assert!(cli.load_config().is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"update_interval_secs = 120\n").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = Cli::parse_from([
            "photo-frame",
            "--config",
            path.as_str(),
            "--interval",
            "15",
            "--cache-size",
            "3",
            "--windowed",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.update_interval_secs, 15);
        assert_eq!(config.cache_size, 3);
        assert_eq!(config.prefetch_threshold, 2);
        assert!(!config.fullscreen);
    }

    #[test]
    fn test_escape_exits() {
        let escape = keyboard::Key::Named(keyboard::key::Named::Escape);
        assert!(matches!(
            handle_key(escape, keyboard::Modifiers::default()),
            Some(Message::Exit)
        ));
        assert!(handle_key(keyboard::Key::Character("q".into()), keyboard::Modifiers::default()).is_none());
    }
}
