use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;
use tracing::{error, info};

use crate::audio::AudioSettings;
use crate::error::ConfigError;
use crate::format::{DistanceMode, RenderOptions};
use crate::probe::ProbeKind;

pub const DEFAULT_DESTINATION: &str = "8.8.8.8";
pub const DEFAULT_PAUSE_SECONDS: f64 = 2.0;
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 2.0;
pub const DEFAULT_VOLUME: f32 = 0.1;

/// An uptime/top inspired version of ping.
///
/// Displays average ping speeds for 15m, 5m and 1m, the connection time,
/// optional distance and min/max statistics, and the current ping.
/// CTRL-C to exit.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "upping", version = crate::version::VERSION, about, long_about = None)]
pub struct Cli {
    /// Network destination IP or address [default: 8.8.8.8]
    pub destination: Option<String>,

    /// Pause seconds between ping requests [default: 2]
    #[arg(short, long, value_name = "SECONDS")]
    pub pause: Option<f64>,

    /// Display minimum & maximum statistics
    #[arg(short, long)]
    pub statistics: bool,

    /// Estimate distance in km with 2/3 lightspeed
    #[arg(short, long)]
    pub distance: bool,

    /// Calculate speed as a fraction of lightspeed for a host this many km away
    #[arg(short, long)]
    pub km: Option<f64>,

    /// Record connection history to file
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Generate an audio tone for pings under 1000ms
    #[arg(short, long)]
    pub audio: bool,

    /// Chirp on connection error
    #[arg(short, long)]
    pub error: bool,

    /// Audio volume, 0 to 1 [default: 0.1]
    #[arg(short, long)]
    pub volume: Option<f32>,

    /// Quiet mode: no display
    #[arg(short, long)]
    pub quiet: bool,

    /// Display dis/connection history record
    #[arg(short, long)]
    pub record: bool,

    /// Simple full-screen ping display
    #[arg(short, long)]
    pub graphical: bool,

    /// How to probe the destination [default: system]
    #[arg(long, value_enum)]
    pub probe: Option<ProbeKind>,

    /// Seconds to wait for each probe [default: 2]
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// TOML file with default settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for daily rotated JSON diagnostics
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Defaults read from `--config`. Command-line values take precedence.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub destination: Option<String>,
    pub pause: Option<f64>,
    pub statistics: bool,
    pub distance: bool,
    pub km: Option<f64>,
    pub file: Option<PathBuf>,
    pub audio: bool,
    pub error: bool,
    pub volume: Option<f32>,
    pub quiet: bool,
    pub record: bool,
    pub graphical: bool,
    pub probe: Option<ProbeKind>,
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Line,
    Compact,
    Quiet,
}

/// Validated settings for one monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub target: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub probe: ProbeKind,
    pub render: RenderOptions,
    pub display: DisplayMode,
    pub record: bool,
    pub history_file: Option<PathBuf>,
    pub audio: AudioSettings,
}

pub fn load_file_config(config_path: &Path) -> Result<FileConfig, ConfigError> {
    info!(path = ?config_path, "Attempting to load config.");

    let config_str = fs::read_to_string(config_path).map_err(|source| {
        error!(path = ?config_path, error = %source, "Failed to read config file.");
        ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        }
    })?;

    let file_config: FileConfig = toml::from_str(&config_str).map_err(|source| {
        error!(path = ?config_path, error = %source, "Failed to parse config file.");
        ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        }
    })?;

    info!(config = ?file_config, "Loaded config successfully.");
    Ok(file_config)
}

/// Reads the optional config file and merges it under the command line.
pub fn load_settings(cli: &Cli) -> Result<MonitorSettings, ConfigError> {
    let file_config = match &cli.config {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };
    resolve(cli, &file_config)
}

pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<MonitorSettings, ConfigError> {
    let target = cli
        .destination
        .clone()
        .or_else(|| file.destination.clone())
        .unwrap_or_else(|| DEFAULT_DESTINATION.to_string());
    let target = target.trim().to_string();
    if target.is_empty() {
        return Err(ConfigError::EmptyDestination);
    }

    let pause = cli.pause.or(file.pause).unwrap_or(DEFAULT_PAUSE_SECONDS);
    let interval = positive_seconds(pause).ok_or(ConfigError::InvalidPause(pause))?;
    let timeout_secs = cli.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    let timeout = positive_seconds(timeout_secs).ok_or(ConfigError::InvalidTimeout(timeout_secs))?;

    let probe = cli.probe.or(file.probe).unwrap_or_default();
    if probe == ProbeKind::Tcp && !has_port(&target) {
        return Err(ConfigError::MissingPort(target));
    }

    let distance = if cli.distance || file.distance {
        DistanceMode::estimate()
    } else if let Some(km) = cli.km.or(file.km) {
        if !(km.is_finite() && km > 0.0) {
            return Err(ConfigError::InvalidDistance(km));
        }
        DistanceMode::KnownDistance { km }
    } else {
        DistanceMode::Off
    };

    let volume = cli.volume.or(file.volume).unwrap_or(DEFAULT_VOLUME);
    if !(0.0..=1.0).contains(&volume) {
        return Err(ConfigError::InvalidVolume(volume as f64));
    }

    let display = if cli.quiet || file.quiet {
        DisplayMode::Quiet
    } else if cli.graphical || file.graphical {
        DisplayMode::Compact
    } else {
        DisplayMode::Line
    };

    Ok(MonitorSettings {
        target,
        interval,
        timeout,
        probe,
        render: RenderOptions {
            show_statistics: cli.statistics || file.statistics,
            distance,
        },
        display,
        record: cli.record || file.record,
        history_file: cli.file.clone().or_else(|| file.file.clone()),
        audio: AudioSettings {
            latency_tone: cli.audio || file.audio,
            error_chirp: cli.error || file.error,
            volume,
        },
    })
}

fn positive_seconds(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}

fn has_port(target: &str) -> bool {
    target
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("upping").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = resolve(&parse(&[]), &FileConfig::default()).unwrap();
        assert_eq!(settings.target, "8.8.8.8");
        assert_eq!(settings.interval, Duration::from_secs(2));
        assert_eq!(settings.timeout, Duration::from_secs(2));
        assert_eq!(settings.probe, ProbeKind::System);
        assert_eq!(settings.display, DisplayMode::Line);
        assert_eq!(settings.render, RenderOptions::default());
        assert_eq!(settings.history_file, None);
        assert!(!settings.audio.is_enabled());
        assert_eq!(settings.audio.volume, DEFAULT_VOLUME);
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&["-s", "-d", "-p", "0.5", "-f", "up.log", "-r", "-a", "-e", "-v", "0.4", "1.1.1.1"]);
        let settings = resolve(&cli, &FileConfig::default()).unwrap();
        assert_eq!(settings.target, "1.1.1.1");
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert!(settings.render.show_statistics);
        assert_eq!(settings.render.distance, DistanceMode::estimate());
        assert_eq!(settings.history_file, Some(PathBuf::from("up.log")));
        assert!(settings.record);
        assert!(settings.audio.latency_tone && settings.audio.error_chirp);
        assert_eq!(settings.audio.volume, 0.4);
    }

    #[test]
    fn test_distance_flag_wins_over_known_distance() {
        let settings = resolve(&parse(&["-d", "-k", "5000"]), &FileConfig::default()).unwrap();
        assert_eq!(settings.render.distance, DistanceMode::estimate());
        let settings = resolve(&parse(&["-k", "5000"]), &FileConfig::default()).unwrap();
        assert_eq!(settings.render.distance, DistanceMode::KnownDistance { km: 5000.0 });
    }

    #[test]
    fn test_quiet_beats_graphical() {
        let settings = resolve(&parse(&["-q", "-g"]), &FileConfig::default()).unwrap();
        assert_eq!(settings.display, DisplayMode::Quiet);
        let settings = resolve(&parse(&["-g"]), &FileConfig::default()).unwrap();
        assert_eq!(settings.display, DisplayMode::Compact);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let file = FileConfig::default();
        assert!(matches!(resolve(&parse(&["-p", "0"]), &file), Err(ConfigError::InvalidPause(_))));
        assert!(matches!(resolve(&parse(&["--pause=-3"]), &file), Err(ConfigError::InvalidPause(_))));
        assert!(matches!(resolve(&parse(&["--timeout", "0"]), &file), Err(ConfigError::InvalidTimeout(_))));
        assert!(matches!(resolve(&parse(&["-k", "0"]), &file), Err(ConfigError::InvalidDistance(_))));
        assert!(matches!(resolve(&parse(&["-v", "2"]), &file), Err(ConfigError::InvalidVolume(_))));
        assert!(matches!(resolve(&parse(&[" "]), &file), Err(ConfigError::EmptyDestination)));
        assert!(matches!(
            resolve(&parse(&["--probe", "tcp", "example.org"]), &file),
            Err(ConfigError::MissingPort(_))
        ));
    }

    #[test]
    fn test_tcp_probe_accepts_host_and_port() {
        let settings = resolve(&parse(&["--probe", "tcp", "example.org:443"]), &FileConfig::default()).unwrap();
        assert_eq!(settings.probe, ProbeKind::Tcp);
    }

    #[test]
    fn test_command_line_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            destination = "9.9.9.9"
            pause = 5.0
            statistics = true
            probe = "icmp"
            "#,
        )
        .unwrap();
        let settings = resolve(&parse(&["-p", "1"]), &file).unwrap();
        assert_eq!(settings.target, "9.9.9.9");
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert!(settings.render.show_statistics);
        assert_eq!(settings.probe, ProbeKind::Icmp);
    }

    #[test]
    fn test_load_file_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(load_file_config(&missing), Err(ConfigError::Read { .. })));

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "pause = \"soon\"\n").unwrap();
        assert!(matches!(load_file_config(&bad), Err(ConfigError::Parse { .. })));

        let good = dir.path().join("good.toml");
        fs::write(&good, "destination = \"1.1.1.1\"\nrecord = true\n").unwrap();
        let config = load_file_config(&good).unwrap();
        assert_eq!(config.destination.as_deref(), Some("1.1.1.1"));
        assert!(config.record);
    }
}
