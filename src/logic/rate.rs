//! Rate Meter - windowed throughput accumulator
//!
//! Counts bytes for the current window and turns them into a bytes/second
//! rate once per interval. One lock guards both the counter and the window
//! start, so a flush can never interleave with a record.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Elapsed time is clamped to at least this many seconds
pub const MIN_ELAPSED_SECS: f64 = 1e-6;

/// Rates emitted on the throughput channel (bytes/second)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub sent: f64,
    /// Receive-side counting is not wired; always 0
    pub received: f64,
}

#[derive(Debug)]
struct RateWindow {
    accumulated_bytes: u64,
    window_start: Instant,
}

/// Owned throughput meter, injected into the ingestion gateway
#[derive(Debug)]
pub struct RateMeter {
    window: Mutex<RateWindow>,
    interval: Duration,
}

impl RateMeter {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            window: Mutex::new(RateWindow {
                accumulated_bytes: 0,
                window_start: start,
            }),
            interval,
        }
    }

    /// Add bytes to the current window
    pub fn record(&self, bytes: u64) {
        let mut window = self.window.lock();
        window.accumulated_bytes = window.accumulated_bytes.saturating_add(bytes);
    }

    /// Close the window if the interval has elapsed.
    ///
    /// Returns `None` and leaves the window untouched otherwise.
    pub fn maybe_flush(&self, now: Instant) -> Option<Throughput> {
        let mut window = self.window.lock();

        let elapsed = now.saturating_duration_since(window.window_start);
        if elapsed < self.interval {
            return None;
        }

        let secs = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
        let sent = window.accumulated_bytes as f64 / secs;

        window.accumulated_bytes = 0;
        window.window_start = now;

        Some(Throughput { sent, received: 0.0 })
    }

    /// Bytes in the open window
    pub fn pending_bytes(&self) -> u64 {
        self.window.lock().accumulated_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_no_flush_before_interval() {
        let start = Instant::now();
        let meter = RateMeter::starting_at(Duration::from_secs(1), start);

        meter.record(500);
        meter.record(700);

        assert!(meter.maybe_flush(start + Duration::from_millis(400)).is_none());
        assert_eq!(meter.pending_bytes(), 1200);
    }

    #[test]
    fn test_flush_reports_rate_and_resets() {
        let start = Instant::now();
        let meter = RateMeter::starting_at(Duration::from_secs(1), start);

        meter.record(1000);
        meter.record(3000);

        let rates = meter.maybe_flush(start + Duration::from_secs(2)).unwrap();
        assert!((rates.sent - 2000.0).abs() < 1e-9);
        assert_eq!(rates.received, 0.0);
        assert_eq!(meter.pending_bytes(), 0);

        // New window starts at the flush time
        assert!(meter.maybe_flush(start + Duration::from_millis(2500)).is_none());
    }

    #[test]
    fn test_zero_interval_never_divides_by_zero() {
        let start = Instant::now();
        let meter = RateMeter::starting_at(Duration::ZERO, start);
        meter.record(10);

        let rates = meter.maybe_flush(start).unwrap();
        assert!(rates.sent.is_finite());
    }

    #[test]
    fn test_clock_going_backwards_does_not_flush() {
        let start = Instant::now() + Duration::from_secs(5);
        let meter = RateMeter::starting_at(Duration::from_secs(1), start);
        meter.record(10);

        assert!(meter.maybe_flush(Instant::now()).is_none());
        assert_eq!(meter.pending_bytes(), 10);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let start = Instant::now();
        let meter = Arc::new(RateMeter::starting_at(Duration::from_secs(1), start));
        let writers = 16;
        let per_writer = 1000;
        let bytes = 64;

        let handles: Vec<_> = (0..writers)
            .map(|_| {
                let meter = Arc::clone(&meter);
                std::thread::spawn(move || {
                    for _ in 0..per_writer {
                        meter.record(bytes);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let total = (writers * per_writer) as u64 * bytes;
        let rates = meter.maybe_flush(start + Duration::from_secs(1)).unwrap();
        assert!((rates.sent - total as f64).abs() < 1e-6);
    }
}
