/// Prefetch cache
///
/// A bounded FIFO of decoded photos kept topped up by a single background
/// worker thread, so the UI never waits on the network when the slideshow
/// advances. The UI is the only consumer.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::api::PhotoApi;
use super::Photo;
use crate::config::FrameConfig;
use crate::error::{FrameError, Result};

/// How often a sleeping worker checks the stop flag
const STOP_POLL: Duration = Duration::from_millis(100);

/// Bounded FIFO queue of photos waiting to be shown
#[derive(Debug)]
pub struct PhotoCache {
    queue: Mutex<VecDeque<Photo>>,
    capacity: usize,
    /// Set while resident memory is over the ceiling; the worker
    /// then fills no further than the prefetch threshold
    memory_constrained: AtomicBool,
}

impl PhotoCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            memory_constrained: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn is_memory_constrained(&self) -> bool {
        self.memory_constrained.load(Ordering::SeqCst)
    }

    pub fn set_memory_constrained(&self, constrained: bool) {
        self.memory_constrained.store(constrained, Ordering::SeqCst);
    }

    /// Append a photo. Returns the new queue length, or hands the photo
    /// back if the queue is full.
    pub fn push(&self, photo: Photo) -> std::result::Result<usize, Photo> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            return Err(photo);
        }
        queue.push_back(photo);
        Ok(queue.len())
    }

    /// Consumer side of the slideshow: the next cached photo, or `None`
    /// when the caller has to fetch one itself
    pub fn take_photo(&self) -> Option<Photo> {
        let mut queue = self.queue.lock();
        match queue.pop_front() {
            Some(photo) => {
                info!("📦 Retrieved cached photo. Queue size: {}", queue.len());
                Some(photo)
            }
            None => {
                info!("📭 Cache empty, fetching photo immediately");
                None
            }
        }
    }

    /// Drop the oldest photos until at most `keep` remain.
    /// Returns how many were dropped.
    pub fn trim_to(&self, keep: usize) -> usize {
        // Collect under the lock, free the buffers after releasing it
        let dropped: Vec<Photo> = {
            let mut queue = self.queue.lock();
            let excess = queue.len().saturating_sub(keep);
            queue.drain(..excess).collect()
        };
        dropped.len()
    }

    pub fn clear(&self) -> usize {
        self.trim_to(0)
    }

    /// Decoded bytes currently held by the queue
    pub fn byte_size(&self) -> usize {
        self.queue.lock().iter().map(Photo::byte_size).sum()
    }
}

/// Worker timing, taken from the config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerSettings {
    pub prefetch_threshold: usize,
    pub retry_delay: Duration,
    pub full_cache_poll: Duration,
}

impl From<&FrameConfig> for WorkerSettings {
    fn from(config: &FrameConfig) -> Self {
        Self {
            prefetch_threshold: config.prefetch_threshold,
            retry_delay: config.retry_delay(),
            full_cache_poll: config.full_cache_poll(),
        }
    }
}

/// What the worker does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Fetch,
    Wait,
}

/// Refill decision with hysteresis: once the queue has filled up, the
/// worker waits until it drains to the threshold before fetching again.
/// While memory is constrained the queue counts as full at the threshold.
/// Returns the step and the new `refilling` state.
fn next_step(
    len: usize,
    capacity: usize,
    threshold: usize,
    refilling: bool,
    constrained: bool,
) -> (Step, bool) {
    let limit = if constrained { threshold.min(capacity) } else { capacity };

    if len >= limit {
        (Step::Wait, false)
    } else if refilling || len <= threshold {
        (Step::Fetch, true)
    } else {
        (Step::Wait, false)
    }
}

/// Owns the background worker that keeps a [`PhotoCache`] filled
pub struct Prefetcher {
    cache: Arc<PhotoCache>,
    stop: Arc<AtomicBool>,
    settings: WorkerSettings,
    handle: Option<JoinHandle<()>>,
}

impl Prefetcher {
    pub fn new(cache: Arc<PhotoCache>, settings: WorkerSettings) -> Self {
        Self {
            cache,
            stop: Arc::new(AtomicBool::new(false)),
            settings,
            handle: None,
        }
    }

    pub fn cache(&self) -> &Arc<PhotoCache> {
        &self.cache
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the worker thread. Does nothing if it is already running.
    ///
    /// The worker gets its own `PhotoApi`: reqwest connection pools are
    /// tied to the runtime that opened them.
    pub fn start(&mut self, api: PhotoApi) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        self.stop.store(false, Ordering::SeqCst);
        let cache = Arc::clone(&self.cache);
        let stop = Arc::clone(&self.stop);
        let settings = self.settings;

        let handle = thread::Builder::new()
            .name("photo-prefetch".into())
            .spawn(move || run_worker(api, cache, stop, settings))
            .map_err(|e| FrameError::Worker(format!("Failed to spawn prefetch thread: {}", e)))?;

        info!("🚀 Prefetch worker started (capacity {})", self.cache.capacity());
        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the worker to stop. It exits after its current request;
    /// the thread is never joined from the caller.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(api: PhotoApi, cache: Arc<PhotoCache>, stop: Arc<AtomicBool>, settings: WorkerSettings) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("❌ Prefetch worker could not start a runtime: {}", e);
            return;
        }
    };

    runtime.block_on(worker_loop(api, cache, stop, settings));
    info!("🛑 Prefetch worker stopped");
}

async fn worker_loop(api: PhotoApi, cache: Arc<PhotoCache>, stop: Arc<AtomicBool>, settings: WorkerSettings) {
    let mut refilling = true;

    while !stop.load(Ordering::SeqCst) {
        let len = cache.len();
        let constrained = cache.is_memory_constrained();
        let (step, now_refilling) = next_step(
            len,
            cache.capacity(),
            settings.prefetch_threshold,
            refilling,
            constrained,
        );

        if refilling && !now_refilling {
            if constrained {
                info!("🧹 Memory over limit, holding prefetch at {} photos", len);
            } else {
                info!("💤 Cache full ({} photos), pausing prefetch", len);
            }
        } else if !refilling && now_refilling {
            info!("🔄 Cache down to {} photos, resuming prefetch", len);
        }
        refilling = now_refilling;

        if step == Step::Wait {
            sleep_unless_stopped(settings.full_cache_poll, &stop).await;
            continue;
        }

        match api.fetch_photo().await {
            Ok(photo) => match cache.push(photo) {
                Ok(len) => info!("💾 Cached photo. Queue size: {}", len),
                // The UI cannot add to the queue, so this only happens after a config mismatch
                Err(_) => debug!("Queue filled up during fetch, discarding photo"),
            },
            Err(_) => {
                warn!("⚠️  Failed to fetch photo for cache, retrying in {:?}", settings.retry_delay);
                sleep_unless_stopped(settings.retry_delay, &stop).await;
            }
        }
    }
}

/// Sleep for `duration`, waking early if the stop flag is raised
async fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let mut remaining = duration;
    while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
        let slice = remaining.min(STOP_POLL);
        tokio::time::sleep(slice).await;
        remaining -= slice;
    }
}
