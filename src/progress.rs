//! Progress notifications for the compression and upload phases.
//!
//! Both phases run at the same time on different threads, so every reporter
//! is `Send + Sync` and tolerates interleaved calls from either phase.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;

use crate::constants::PROGRESS_LOG_STEP_PERCENT;

/// Receiver of start/update/finish notifications for both phases.
///
/// `update_*` receives the number of newly processed bytes, not a running
/// total. `finish_*` is called exactly once per phase, also on failure, and
/// implementations must treat repeated calls as no-ops.
pub trait ProgressReporter: Send + Sync {
    fn start_compression(&self, total_bytes: u64);
    fn update_compression(&self, delta: u64);
    fn finish_compression(&self);
    fn start_upload(&self, total_bytes: u64, initial_bytes: u64);
    fn update_upload(&self, delta: u64);
    fn finish_upload(&self);
}

/// Shared byte counter that never loses concurrent updates.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter {
    bytes: Arc<AtomicU64>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` and return the new total.
    pub fn add(&self, delta: u64) -> u64 {
        self.bytes.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn get(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: u64) {
        self.bytes.store(value, Ordering::SeqCst);
    }
}

/// Reporter that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressReporter;

impl ProgressReporter for NoopProgressReporter {
    fn start_compression(&self, _total_bytes: u64) {}
    fn update_compression(&self, _delta: u64) {}
    fn finish_compression(&self) {}
    fn start_upload(&self, _total_bytes: u64, _initial_bytes: u64) {}
    fn update_upload(&self, _delta: u64) {}
    fn finish_upload(&self) {}
}

const COMPRESS_LABEL: &str = "Compressing";
const UPLOAD_LABEL: &str = "Uploading  ";

/// Terminal progress bars, one per phase, stacked with [`MultiProgress`].
pub struct BarProgressReporter {
    multi: MultiProgress,
    compression: Mutex<Option<ProgressBar>>,
    upload: Mutex<Option<ProgressBar>>,
}

impl BarProgressReporter {
    /// Bars drawn on stderr.
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Bars that track positions but never draw.
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            compression: Mutex::new(None),
            upload: Mutex::new(None),
        }
    }

    /// Position of the running compression bar, if there is one.
    pub fn compression_position(&self) -> Option<u64> {
        lock(&self.compression).as_ref().map(ProgressBar::position)
    }

    /// Position of the running upload bar, if there is one.
    pub fn upload_position(&self) -> Option<u64> {
        lock(&self.upload).as_ref().map(ProgressBar::position)
    }

    fn start(&self, slot: &Mutex<Option<ProgressBar>>, label: &'static str, total: u64, initial: u64) {
        let bar = if total > 0 {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            bar
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{prefix:.bold} {spinner} {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        bar.set_prefix(label);
        bar.set_position(initial);
        let bar = self.multi.add(bar);

        if let Some(previous) = lock(slot).replace(bar) {
            previous.finish();
        }
    }

    fn update(slot: &Mutex<Option<ProgressBar>>, delta: u64) {
        if let Some(bar) = lock(slot).as_ref() {
            bar.inc(delta);
        }
    }

    fn finish(slot: &Mutex<Option<ProgressBar>>) {
        if let Some(bar) = lock(slot).take() {
            bar.finish();
        }
    }
}

impl Default for BarProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarProgressReporter {
    fn start_compression(&self, total_bytes: u64) {
        self.start(&self.compression, COMPRESS_LABEL, total_bytes, 0);
    }

    fn update_compression(&self, delta: u64) {
        Self::update(&self.compression, delta);
    }

    fn finish_compression(&self) {
        Self::finish(&self.compression);
    }

    fn start_upload(&self, total_bytes: u64, initial_bytes: u64) {
        self.start(&self.upload, UPLOAD_LABEL, total_bytes, initial_bytes);
    }

    fn update_upload(&self, delta: u64) {
        Self::update(&self.upload, delta);
    }

    fn finish_upload(&self) {
        Self::finish(&self.upload);
    }
}

/// Reporter that logs a line every time a phase advances by a few percent.
pub struct LogProgressReporter {
    compression: Mutex<PhaseLog>,
    upload: Mutex<PhaseLog>,
}

#[derive(Default)]
struct PhaseLog {
    total: u64,
    done: u64,
    last_percentage: u64,
    started: Option<Instant>,
}

impl PhaseLog {
    fn start(&mut self, total: u64, initial: u64) {
        *self = PhaseLog {
            total,
            done: initial,
            last_percentage: 0,
            started: Some(Instant::now()),
        };
    }

    fn percentage(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        (self.done.saturating_mul(100) / self.total).min(100)
    }

    fn update(&mut self, label: &str, delta: u64) {
        let Some(started) = self.started else {
            return;
        };
        self.done += delta;

        let percentage = self.percentage();
        if percentage >= self.last_percentage + PROGRESS_LOG_STEP_PERCENT {
            let elapsed = started.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 { self.done as f64 / elapsed / 1024.0 / 1024.0 } else { 0.0 };

            info!(
                "{} progress: {}% ({}/{} bytes, {:.2} MB/s)",
                label.trim_end(),
                percentage,
                self.done,
                self.total,
                speed
            );
            self.last_percentage = percentage;
        }
    }

    fn finish(&mut self, label: &str) {
        if let Some(started) = self.started.take() {
            info!(
                "{} finished: {} bytes in {:.1?}",
                label.trim_end(),
                self.done,
                started.elapsed()
            );
        }
    }
}

impl LogProgressReporter {
    pub fn new() -> Self {
        Self {
            compression: Mutex::new(PhaseLog::default()),
            upload: Mutex::new(PhaseLog::default()),
        }
    }

    pub fn compressed_bytes(&self) -> u64 {
        lock(&self.compression).done
    }

    pub fn uploaded_bytes(&self) -> u64 {
        lock(&self.upload).done
    }
}

impl Default for LogProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for LogProgressReporter {
    fn start_compression(&self, total_bytes: u64) {
        lock(&self.compression).start(total_bytes, 0);
    }

    fn update_compression(&self, delta: u64) {
        lock(&self.compression).update(COMPRESS_LABEL, delta);
    }

    fn finish_compression(&self) {
        lock(&self.compression).finish(COMPRESS_LABEL);
    }

    fn start_upload(&self, total_bytes: u64, initial_bytes: u64) {
        lock(&self.upload).start(total_bytes, initial_bytes);
    }

    fn update_upload(&self, delta: u64) {
        lock(&self.upload).update(UPLOAD_LABEL, delta);
    }

    fn finish_upload(&self) {
        lock(&self.upload).finish(UPLOAD_LABEL);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
