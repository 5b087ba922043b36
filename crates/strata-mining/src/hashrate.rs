//! Hash-rate telemetry.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Shared hash-rate state published by searchers.
pub struct HashMeter {
    rate: Mutex<f64>,
    threads: AtomicUsize,
    total_hashes: AtomicU64,
    last_log: Mutex<Option<Instant>>,
    log_interval: Duration,
}

impl HashMeter {
    pub fn new(log_interval: Duration) -> Self {
        Self {
            rate: Mutex::new(0.0),
            threads: AtomicUsize::new(0),
            total_hashes: AtomicU64::new(0),
            last_log: Mutex::new(None),
            log_interval,
        }
    }

    /// Record a searcher's latest per-thread rate in hashes per second.
    pub fn publish(&self, rate: f64) {
        *self.rate.lock() = rate;
    }

    /// Estimated total rate: the per-thread rate times the thread count.
    pub fn hash_rate(&self) -> f64 {
        let rate = *self.rate.lock();
        let threads = self.threads.load(Ordering::Relaxed);
        if threads > 1 {
            rate * threads as f64
        } else {
            rate
        }
    }

    /// Overwrite the per-thread rate.
    pub fn set_hash_rate(&self, rate: f64) {
        self.publish(rate);
    }

    pub fn set_threads(&self, threads: usize) {
        self.threads.store(threads, Ordering::Relaxed);
    }

    pub fn add_hashes(&self, count: u64) {
        self.total_hashes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn total_hashes(&self) -> u64 {
        self.total_hashes.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        *self.rate.lock() = 0.0;
        self.threads.store(0, Ordering::Relaxed);
    }

    /// Log the hashmeter line if the log interval has passed. Returns whether it logged.
    pub fn maybe_log(&self) -> bool {
        let mut last = self.last_log.lock();
        if let Some(at) = *last {
            if at.elapsed() < self.log_interval {
                return false;
            }
        }
        *last = Some(Instant::now());
        let rate = self.hash_rate();
        if rate > 0.0 {
            info!(rate, "hashmeter {:6.3} khash/s", rate / 1000.0);
        }
        true
    }
}

/// One searcher's counting window.
#[derive(Debug)]
pub struct RateWindow {
    started: Instant,
    count: u64,
    window: Duration,
}

impl RateWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            started: Instant::now(),
            count: 0,
            window,
        }
    }

    /// Count `hashes`; once the window has elapsed return the rate and restart.
    pub fn record(&mut self, hashes: u64) -> Option<f64> {
        self.count += hashes;
        let elapsed = self.started.elapsed();
        if elapsed < self.window {
            return None;
        }
        let millis = elapsed.as_millis().max(1) as f64;
        let rate = 1000.0 * self.count as f64 / millis;
        self.started = Instant::now();
        self.count = 0;
        Some(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_scales_with_threads() {
        let meter = HashMeter::new(Duration::from_secs(30));
        meter.publish(100.0);
        assert_eq!(meter.hash_rate(), 100.0);
        meter.set_threads(4);
        assert_eq!(meter.hash_rate(), 400.0);
        meter.reset();
        assert_eq!(meter.hash_rate(), 0.0);
    }

    #[test]
    fn test_log_rate_limited() {
        let meter = HashMeter::new(Duration::from_secs(3600));
        assert!(meter.maybe_log());
        assert!(!meter.maybe_log());
    }

    #[test]
    fn test_window_reports_after_elapsed() {
        let mut window = RateWindow::new(Duration::ZERO);
        let rate = window.record(500).unwrap();
        assert!(rate > 0.0);

        let mut window = RateWindow::new(Duration::from_secs(3600));
        assert!(window.record(500).is_none());
    }

    #[test]
    fn test_total_hashes() {
        let meter = HashMeter::new(Duration::from_secs(30));
        meter.add_hashes(10);
        meter.add_hashes(5);
        assert_eq!(meter.total_hashes(), 15);
    }
}
