//! Connectivity state machine with per-segment latency statistics.
//!
//! Statistics always describe the current connectivity segment only: a
//! failure while up discards the windows and extrema, and the first success
//! after an outage seeds min and max from that one sample.
use std::time::{Duration, Instant};

use super::window::{Sample, SlidingWindowLog};
use crate::probe::ProbeOutcome;

/// Horizons of the three rolling averages, in minutes.
pub const WINDOW_MINUTES: [u64; 3] = [1, 5, 15];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Up { since: Instant },
    Down { since: Instant },
}

impl ConnectionState {
    pub fn kind(&self) -> StateKind {
        match self {
            ConnectionState::Up { .. } => StateKind::Up,
            ConnectionState::Down { .. } => StateKind::Down,
        }
    }

    pub fn since(&self) -> Instant {
        match self {
            ConnectionState::Up { since } | ConnectionState::Down { since } => *since,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, ConnectionState::Up { .. })
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.since())
    }
}

/// A change of connectivity, carrying the final duration of the segment it
/// ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StateKind,
    pub to: StateKind,
    pub lasted: Duration,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub outcome: ProbeOutcome,
    pub transition: Option<Transition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSummary {
    pub minutes: u64,
    pub average: Option<u64>,
    pub sample_count: usize,
}

/// Read-only view of a tracker, taken after a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub target: String,
    pub state: StateKind,
    pub elapsed: Duration,
    pub last_latency: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub one: WindowSummary,
    pub five: WindowSummary,
    pub fifteen: WindowSummary,
}

impl ConnectionSnapshot {
    pub fn is_up(&self) -> bool {
        self.state == StateKind::Up
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    target: String,
    state: ConnectionState,
    last_latency: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    one: SlidingWindowLog,
    five: SlidingWindowLog,
    fifteen: SlidingWindowLog,
}

impl ConnectionTracker {
    pub fn new(target: impl Into<String>) -> Self {
        Self::new_at(target, Instant::now())
    }

    pub fn new_at(target: impl Into<String>, now: Instant) -> Self {
        let [one, five, fifteen] = WINDOW_MINUTES;
        Self {
            target: target.into(),
            state: ConnectionState::Down { since: now },
            last_latency: None,
            min: None,
            max: None,
            one: SlidingWindowLog::minutes(one),
            five: SlidingWindowLog::minutes(five),
            fifteen: SlidingWindowLog::minutes(fifteen),
        }
    }

    pub fn tick(&mut self, outcome: ProbeOutcome) -> TickReport {
        self.tick_at(outcome, Instant::now())
    }

    /// Applies one probe outcome observed at `now`.
    pub fn tick_at(&mut self, outcome: ProbeOutcome, now: Instant) -> TickReport {
        let transition = match outcome {
            ProbeOutcome::Success(latency_ms) => self.record_success(latency_ms, now),
            ProbeOutcome::Failure => self.record_failure(now),
        };
        TickReport {
            outcome,
            transition,
        }
    }

    fn record_success(&mut self, latency_ms: f64, now: Instant) -> Option<Transition> {
        let transition = match self.state {
            ConnectionState::Up { .. } => {
                self.min = Some(self.min.map_or(latency_ms, |min| min.min(latency_ms)));
                self.max = Some(self.max.map_or(latency_ms, |max| max.max(latency_ms)));
                None
            }
            ConnectionState::Down { since } => {
                self.state = ConnectionState::Up { since: now };
                self.min = Some(latency_ms);
                self.max = Some(latency_ms);
                Some(Transition {
                    from: StateKind::Down,
                    to: StateKind::Up,
                    lasted: now.saturating_duration_since(since),
                    at: now,
                })
            }
        };

        let sample = Sample::new(now, latency_ms);
        self.one.add(sample);
        self.five.add(sample);
        self.fifteen.add(sample);
        self.last_latency = Some(latency_ms);
        transition
    }

    fn record_failure(&mut self, now: Instant) -> Option<Transition> {
        self.last_latency = None;
        match self.state {
            ConnectionState::Down { .. } => None,
            ConnectionState::Up { since } => {
                self.state = ConnectionState::Down { since: now };
                self.reset_statistics();
                Some(Transition {
                    from: StateKind::Up,
                    to: StateKind::Down,
                    lasted: now.saturating_duration_since(since),
                    at: now,
                })
            }
        }
    }

    fn reset_statistics(&mut self) {
        self.one = SlidingWindowLog::new(self.one.window());
        self.five = SlidingWindowLog::new(self.five.window());
        self.fifteen = SlidingWindowLog::new(self.fifteen.window());
        self.min = None;
        self.max = None;
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> ConnectionSnapshot {
        ConnectionSnapshot {
            target: self.target.clone(),
            state: self.state.kind(),
            elapsed: self.state.elapsed(now),
            last_latency: self.last_latency,
            min: self.min,
            max: self.max,
            one: summarize(&self.one),
            five: summarize(&self.five),
            fifteen: summarize(&self.fifteen),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_latency(&self) -> Option<f64> {
        self.last_latency
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn one(&self) -> &SlidingWindowLog {
        &self.one
    }

    pub fn five(&self) -> &SlidingWindowLog {
        &self.five
    }

    pub fn fifteen(&self) -> &SlidingWindowLog {
        &self.fifteen
    }
}

fn summarize(log: &SlidingWindowLog) -> WindowSummary {
    WindowSummary {
        minutes: log.window().as_secs() / 60,
        average: log.average(),
        sample_count: log.sample_count(),
    }
}
