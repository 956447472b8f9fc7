//! Lightweight interval counters for observability.
//!
//! Counters aggregate values per property and report them through `tracing`
//! once per interval. They never influence control flow.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default reporting interval.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Aggregate for one property within the current interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PropertyStats {
    pub count: u64,
    pub sum: f64,
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    properties: HashMap<&'static str, PropertyStats>,
}

impl Window {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            properties: HashMap::new(),
        }
    }
}

/// Named counter that logs per-interval aggregates.
#[derive(Debug)]
pub struct IntervalCounter {
    name: String,
    interval: Duration,
    window: Mutex<Window>,
}

impl IntervalCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_interval(name, DEFAULT_REPORT_INTERVAL)
    }

    pub fn with_interval(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            window: Mutex::new(Window::new()),
        }
    }

    /// Counts one occurrence of `property`.
    pub fn add(&self, property: &'static str) {
        self.add_value(property, 1.0);
    }

    /// Adds `value` to `property` and reports the window if the interval elapsed.
    pub fn add_value(&self, property: &'static str, value: f64) {
        let mut window = self.window.lock();
        let stats = window.properties.entry(property).or_default();
        stats.count += 1;
        stats.sum += value;

        let elapsed = window.started_at.elapsed();
        if elapsed >= self.interval {
            let secs = elapsed.as_secs_f64();
            for (property, stats) in &window.properties {
                debug!(
                    counter = %self.name,
                    property,
                    count = stats.count,
                    sum = stats.sum,
                    per_second = stats.sum / secs,
                    "Interval report"
                );
            }
            *window = Window::new();
        }
    }

    /// Aggregate for `property` in the current window.
    pub fn snapshot(&self, property: &str) -> Option<PropertyStats> {
        self.window.lock().properties.get(property).copied()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_within_window() {
        let counter = IntervalCounter::new("emit counter");
        counter.add_value("audio_emit", 0.02);
        counter.add_value("audio_emit", 0.02);
        counter.add("video_emit");

        let audio = counter.snapshot("audio_emit").unwrap();
        assert_eq!(audio.count, 2);
        assert!((audio.sum - 0.04).abs() < 1e-9);
        assert_eq!(counter.snapshot("video_emit").unwrap().count, 1);
        assert!(counter.snapshot("missing").is_none());
    }

    #[test]
    fn test_window_resets_after_interval() {
        let counter = IntervalCounter::with_interval("emit counter", Duration::ZERO);
        counter.add("video_emit");
        assert!(counter.snapshot("video_emit").is_none());
        assert_eq!(counter.name(), "emit counter");
    }
}
