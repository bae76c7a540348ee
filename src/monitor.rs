//! The tick loop: probe, update the tracker, render, write, sleep.
//!
//! A single task owns the tracker and awaits each probe before issuing the
//! next, so outcomes are applied strictly in the order they were requested.
use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::audio::{self, TonePlayer};
use crate::config::{DisplayMode, MonitorSettings};
use crate::connection::{ConnectionSnapshot, ConnectionTracker, TickReport};
use crate::format::{self, RenderOptions};
use crate::output::{CompactDisplay, FileLog, Screen};
use crate::probe::{ProbeOutcome, Sampler};

/// Where rendered text goes on the terminal.
pub enum Console<W: Write> {
    Line(Screen<W>),
    Compact(CompactDisplay<W>),
    Quiet,
}

impl Console<io::Stdout> {
    pub fn for_mode(mode: DisplayMode) -> Self {
        match mode {
            DisplayMode::Line => Console::Line(Screen::stdout()),
            DisplayMode::Compact => Console::Compact(CompactDisplay::stdout()),
            DisplayMode::Quiet => Console::Quiet,
        }
    }
}

impl<W: Write> Console<W> {
    fn show(
        &mut self,
        snapshot: &ConnectionSnapshot,
        line: &str,
        options: &RenderOptions,
    ) -> io::Result<()> {
        match self {
            Console::Line(screen) => screen.print(line),
            Console::Compact(display) => display.show(&format::render_compact(snapshot, options)),
            Console::Quiet => Ok(()),
        }
    }

    fn mark(&mut self, suffix: &str) -> io::Result<()> {
        match self {
            Console::Line(screen) => screen.mark(suffix),
            _ => Ok(()),
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        match self {
            Console::Line(screen) => screen.finish(),
            Console::Compact(display) => display.finish(),
            Console::Quiet => Ok(()),
        }
    }
}

pub struct Monitor<W: Write> {
    tracker: ConnectionTracker,
    sampler: Box<dyn Sampler>,
    settings: MonitorSettings,
    console: Console<W>,
    history: Option<FileLog>,
    player: Option<Arc<dyn TonePlayer>>,
    last_line: Option<String>,
}

impl<W: Write> Monitor<W> {
    pub fn new(
        settings: MonitorSettings,
        sampler: Box<dyn Sampler>,
        console: Console<W>,
        player: Option<Arc<dyn TonePlayer>>,
    ) -> Self {
        Self {
            tracker: ConnectionTracker::new(settings.target.clone()),
            history: settings.history_file.clone().map(FileLog::new),
            sampler,
            settings,
            console,
            player,
            last_line: None,
        }
    }

    /// Runs until `shutdown_rx` fires (or its sender is dropped), then
    /// flushes the final status.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<()>) {
        info!(
            target_host = %self.settings.target,
            sampler = self.sampler.name(),
            interval_ms = self.settings.interval.as_millis() as u64,
            "Monitor started."
        );
        loop {
            // Dropping an in-flight probe on shutdown also reaps any ping child.
            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                outcome = self.sampler.probe(&self.settings.target) => outcome,
            };

            self.apply(outcome).await;

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
        self.finish().await;
    }

    /// Applies one probe outcome and writes the result to every sink.
    pub async fn apply(&mut self, outcome: ProbeOutcome) -> TickReport {
        let report = self.tracker.tick(outcome);
        let snapshot = self.tracker.snapshot();
        let line = format::render(&snapshot, &self.settings.render);

        if let Some(transition) = report.transition {
            info!(
                target_host = %self.settings.target,
                from = ?transition.from,
                to = ?transition.to,
                lasted_secs = transition.lasted.as_secs(),
                "Connection state changed."
            );
            if let Some(previous) = self.last_line.take() {
                let now = Local::now();
                if self.settings.record {
                    let result = self.console.mark(&format!("@ {}", format::timestamp(now)));
                    self.check_console(result);
                }
                self.record(previous, now).await;
            }
        }

        self.play(outcome).await;

        let result = self.console.show(&snapshot, &line, &self.settings.render);
        self.check_console(result);
        self.last_line = Some(line);
        report
    }

    async fn play(&self, outcome: ProbeOutcome) {
        let Some(player) = self.player.clone() else {
            return;
        };
        let tones = audio::plan(outcome, &self.settings.audio);
        if tones.is_empty() {
            return;
        }
        if let Err(e) = tokio::task::spawn_blocking(move || player.play(&tones)).await {
            warn!(error = %e, "Tone playback task failed.");
        }
    }

    fn check_console(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            error!(error = %e, "Failed to write to the terminal; continuing without display.");
            self.console = Console::Quiet;
        }
    }

    /// Appends `line` to the history file on the blocking pool.
    async fn record(&mut self, line: String, now: DateTime<Local>) {
        let Some(mut history) = self.history.take() else {
            return;
        };
        match tokio::task::spawn_blocking(move || {
            history.append(&line, now);
            history
        })
        .await
        {
            Ok(history) => self.history = Some(history),
            Err(e) => error!(error = %e, "History write task failed; no further lines will be recorded."),
        }
    }

    async fn finish(&mut self) {
        let snapshot = self.tracker.snapshot();
        let line = format::render(&snapshot, &self.settings.render);
        self.record(line, Local::now()).await;
        let result = self.console.finish();
        self.check_console(result);
        info!(target_host = %self.settings.target, "Monitor stopped.");
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn history(&self) -> Option<&FileLog> {
        self.history.as_ref()
    }

    pub fn into_console(self) -> Console<W> {
        self.console
    }
}
