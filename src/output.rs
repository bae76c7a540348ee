//! Output sinks for rendered text: the overwriting status line, the
//! full-screen compact display and the append-only history file.
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::SinkError;
use crate::format::timestamp;

/// Rewrites a single terminal line in place.
pub struct Screen<W: Write> {
    out: W,
    printed: usize,
}

impl Screen<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Screen<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    /// Overwrites the previous line, blanking any leftover characters.
    pub fn print(&mut self, message: &str) -> io::Result<()> {
        let length = message.chars().count();
        let padding = self.printed.saturating_sub(length);
        write!(self.out, "\r{message}{}", " ".repeat(padding))?;
        self.printed = length;
        self.out.flush()
    }

    /// Ends the current line with `suffix`, so the last status stays on
    /// screen above the next one.
    pub fn mark(&mut self, suffix: &str) -> io::Result<()> {
        writeln!(self.out, "{suffix}")?;
        self.printed = 0;
        self.out.flush()
    }

    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.printed = 0;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Clears the terminal and redraws a short block of text each tick.
pub struct CompactDisplay<W: Write> {
    out: W,
}

impl CompactDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> CompactDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn show(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "\x1b[2J\x1b[H{text}")?;
        self.out.flush()
    }

    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Appends timestamped lines to a history file. The first write error is
/// reported and the log disables itself; the monitor keeps running.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    disabled: bool,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            disabled: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn append(&mut self, line: &str, now: DateTime<Local>) {
        if self.disabled {
            return;
        }
        if let Err(e) = self.try_append(line, now) {
            error!(error = %e, "History file is unwritable; no further lines will be recorded.");
            self.disabled = true;
        }
    }

    fn try_append(&self, line: &str, now: DateTime<Local>) -> Result<(), SinkError> {
        let to_sink_error = |source| SinkError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(to_sink_error)?;
        writeln!(file, "{}: {}", timestamp(now), line.trim_end()).map_err(to_sink_error)?;
        info!(path = ?self.path, "Recorded connection history line.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn written(screen: Screen<Vec<u8>>) -> String {
        String::from_utf8(screen.into_inner()).unwrap()
    }

    #[test]
    fn test_screen_pads_shorter_message() {
        let mut screen = Screen::new(Vec::new());
        screen.print("long message").unwrap();
        screen.print("short").unwrap();
        assert_eq!(written(screen), "\rlong message\rshort       ");
    }

    #[test]
    fn test_screen_finish_ends_line() {
        let mut screen = Screen::new(Vec::new());
        screen.print("abc").unwrap();
        screen.finish().unwrap();
        screen.print("de").unwrap();
        assert_eq!(written(screen), "\rabc\n\rde");
    }

    #[test]
    fn test_screen_mark_keeps_previous_status() {
        let mut screen = Screen::new(Vec::new());
        screen.print("host: 1m avg. 10ms (up 0:01:00) 10ms ").unwrap();
        screen.mark("@ 09/03/18 07:05").unwrap();
        screen.print("Connection error: down 0:00:00 ").unwrap();
        assert_eq!(
            written(screen),
            "\rhost: 1m avg. 10ms (up 0:01:00) 10ms @ 09/03/18 07:05\n\rConnection error: down 0:00:00 "
        );
    }

    #[test]
    fn test_compact_display_clears_screen() {
        let mut display = CompactDisplay::new(Vec::new());
        display.show("12ms \n11ms").unwrap();
        let out = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(out, "\x1b[2J\x1b[H12ms \n11ms");
    }

    #[test]
    fn test_file_log_appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.log");
        let mut log = FileLog::new(&path);
        let when = Local.with_ymd_and_hms(2018, 3, 9, 7, 5, 0).unwrap();
        log.append("8.8.8.8: 1m avg. 14ms (up 0:00:10) 12ms ", when);
        log.append("Connection error: down 0:00:04 ", when);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "09/03/18 07:05: 8.8.8.8: 1m avg. 14ms (up 0:00:10) 12ms\n\
             09/03/18 07:05: Connection error: down 0:00:04\n"
        );
        assert!(!log.is_disabled());
    }

    #[test]
    fn test_file_log_disables_itself_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("history.log");
        let mut log = FileLog::new(&path);
        log.append("line", Local::now());
        assert!(log.is_disabled());
        log.append("line", Local::now());
        assert!(!path.exists());
    }
}
