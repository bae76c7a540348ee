use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Destination must not be empty")]
    EmptyDestination,
    #[error("Pause must be a positive number of seconds, got {0}")]
    InvalidPause(f64),
    #[error("Probe timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
    #[error("Known distance must be a positive number of km, got {0}")]
    InvalidDistance(f64),
    #[error("Volume must be between 0 and 1, got {0}")]
    InvalidVolume(f64),
    #[error("TCP probe target must be host:port, got '{0}'")]
    MissingPort(String),
    #[error("Failed to set up {kind} probe: {source}")]
    ProbeSetup {
        kind: &'static str,
        #[source]
        source: ProbeError,
    },
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to run ping: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Socket error: {0}")]
    Socket(#[source] std::io::Error),
    #[error("ping exited with {0}")]
    ExitStatus(std::process::ExitStatus),
    #[error("No round-trip time in ping output")]
    Unparsable,
    #[error("Probe timed out")]
    Timeout,
    #[error("Failed to resolve '{0}'")]
    Resolve(String),
    #[error("ICMP error: {0}")]
    Icmp(#[from] surge_ping::SurgeError),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
