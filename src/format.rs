//! Text rendering of connection snapshots. Nothing here touches the tracker.
use chrono::{DateTime, Local};
use std::fmt::Write;
use std::time::Duration;

use crate::connection::lightspeed::{CABLE_VELOCITY_FRACTION, distance_km, lightspeed_percent};
use crate::connection::{ConnectionSnapshot, WindowSummary};

pub const ERROR_MESSAGE: &str = "Connection error";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DistanceMode {
    #[default]
    Off,
    /// Upper bound on cable distance at `fraction` of light speed.
    Estimate { fraction: f64 },
    /// Fraction of light speed needed to reach a host `km` away.
    KnownDistance { km: f64 },
}

impl DistanceMode {
    pub fn estimate() -> Self {
        DistanceMode::Estimate {
            fraction: CABLE_VELOCITY_FRACTION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOptions {
    pub show_statistics: bool,
    pub distance: DistanceMode,
}

/// Status line for the current state.
pub fn render(snapshot: &ConnectionSnapshot, options: &RenderOptions) -> String {
    if snapshot.is_up() {
        render_status(snapshot, options)
    } else {
        render_down(snapshot)
    }
}

/// `target: 15|5|1m avg. a|b|cms (up H:MM:SS) [<Nkm |~P%c ][min <= ]msms[ <= max] `
pub fn render_status(snapshot: &ConnectionSnapshot, options: &RenderOptions) -> String {
    let mut legend = String::new();
    let mut averages = String::new();
    if shows_longer(&snapshot.fifteen, &snapshot.five) {
        legend.push_str("15|");
        let _ = write!(averages, "{}|", average_text(&snapshot.fifteen));
    }
    if shows_longer(&snapshot.five, &snapshot.one) {
        legend.push_str("5|");
        let _ = write!(averages, "{}|", average_text(&snapshot.five));
    }
    let _ = write!(averages, "{}ms", average_text(&snapshot.one));

    let mut message = format!(
        "{}: {legend}1m avg. {averages} (up {}) ",
        snapshot.target,
        format_elapsed(snapshot.elapsed)
    );
    if let Some(bound) = distance_text(snapshot, options.distance) {
        message.push_str(&bound);
        message.push(' ');
    }
    let current = latency_text(snapshot.last_latency);
    if options.show_statistics {
        let _ = write!(
            message,
            "{} <= {current}ms <= {} ",
            latency_text(snapshot.min),
            latency_text(snapshot.max)
        );
    } else {
        let _ = write!(message, "{current}ms ");
    }
    message
}

/// Short multi-line form for the full-screen display.
pub fn render_compact(snapshot: &ConnectionSnapshot, options: &RenderOptions) -> String {
    if !snapshot.is_up() {
        return render_down(snapshot);
    }
    let mut message = format!("{}ms ", latency_text(snapshot.last_latency));
    if let Some(bound) = distance_text(snapshot, options.distance) {
        let _ = write!(message, "\n{bound} ");
    } else if options.show_statistics {
        let _ = write!(
            message,
            "\n>={}ms\n<={}ms",
            latency_text(snapshot.min),
            latency_text(snapshot.max)
        );
    } else {
        let _ = write!(message, "\n{}", average_text(&snapshot.one));
        if shows_longer(&snapshot.five, &snapshot.one) {
            let _ = write!(message, "|{}", average_text(&snapshot.five));
        }
        if shows_longer(&snapshot.fifteen, &snapshot.five) {
            let _ = write!(message, "|{}", average_text(&snapshot.fifteen));
        }
        message.push_str("ms");
    }
    message
}

pub fn render_down(snapshot: &ConnectionSnapshot) -> String {
    format!("{ERROR_MESSAGE}: down {} ", format_elapsed(snapshot.elapsed))
}

/// Timestamp prefix used by the file log and the record marker.
pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("%d/%m/%y %H:%M").to_string()
}

/// `H:MM:SS`, prefixed with `N day(s), ` past 24 hours. Sub-second parts are
/// dropped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

// A longer window is only worth showing once it holds more history.
fn shows_longer(longer: &WindowSummary, shorter: &WindowSummary) -> bool {
    longer.sample_count > shorter.sample_count
}

fn average_text(window: &WindowSummary) -> String {
    window
        .average
        .map_or_else(|| "-".to_string(), |avg| avg.to_string())
}

fn latency_text(latency: Option<f64>) -> String {
    latency.map_or_else(|| "-".to_string(), |ms| ms.to_string())
}

fn distance_text(snapshot: &ConnectionSnapshot, mode: DistanceMode) -> Option<String> {
    let min = snapshot.min?;
    match mode {
        DistanceMode::Off => None,
        DistanceMode::Estimate { fraction } => Some(format!("<{}km", distance_km(min, fraction))),
        DistanceMode::KnownDistance { km } => {
            lightspeed_percent(min, km).map(|percent| format!("~{percent:.1}%c"))
        }
    }
}
