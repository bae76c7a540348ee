//! Fixed-duration rolling log of latency samples.
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Slack kept at the window edge so a sample taken exactly one period ago
/// survives clock granularity.
const EDGE_SLACK: Duration = Duration::from_secs(1);

const NANOS_PER_MS: u64 = 1_000_000;

/// One successful probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub taken_at: Instant,
    pub latency_ms: f64,
}

impl Sample {
    pub fn new(taken_at: Instant, latency_ms: f64) -> Self {
        Self {
            taken_at,
            latency_ms,
        }
    }

    // Whole nanoseconds, the resolution samplers measure in, so the running
    // total never drifts on eviction.
    fn nanos(&self) -> u64 {
        (self.latency_ms.max(0.0) * NANOS_PER_MS as f64).round() as u64
    }
}

/// Rolling buffer of samples younger than `window`, with a running total.
#[derive(Debug, Clone)]
pub struct SlidingWindowLog {
    samples: VecDeque<Sample>,
    total_nanos: u64,
    window: Duration,
}

impl SlidingWindowLog {
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            total_nanos: 0,
            window,
        }
    }

    pub fn minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes * 60))
    }

    /// Appends `sample` and evicts everything older than the window,
    /// measured from the new sample's timestamp.
    pub fn add(&mut self, sample: Sample) {
        self.total_nanos += sample.nanos();
        self.samples.push_back(sample);

        let limit = self.window.saturating_sub(EDGE_SLACK);
        while let Some(front) = self.samples.front() {
            if sample.taken_at.saturating_duration_since(front.taken_at) <= limit {
                break;
            }
            self.total_nanos -= front.nanos();
            self.samples.pop_front();
        }
    }

    /// Mean latency in whole milliseconds, truncated. `None` when empty.
    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.total_nanos / self.samples.len() as u64 / NANOS_PER_MS)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.total_nanos = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
