//! Reachability probes.
//!
//! Every sampler collapses its own errors into [`ProbeOutcome::Failure`]; the
//! error detail only goes to the debug log.
use async_trait::async_trait;
use clap::ValueEnum;
use rand::random;
use serde::Deserialize;
use std::future::Future;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::ProbeError;

/// Result of a single probe. Any `Success`, including 0 ms, means reachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    Success(f64),
    Failure,
}

impl ProbeOutcome {
    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            ProbeOutcome::Success(ms) => Some(*ms),
            ProbeOutcome::Failure => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_))
    }
}

impl From<Result<f64, ProbeError>> for ProbeOutcome {
    fn from(result: Result<f64, ProbeError>) -> Self {
        match result {
            Ok(ms) => ProbeOutcome::Success(ms),
            Err(e) => {
                debug!(error = %e, "Probe failed.");
                ProbeOutcome::Failure
            }
        }
    }
}

#[async_trait]
pub trait Sampler: Send + Sync {
    async fn probe(&self, target: &str) -> ProbeOutcome;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Run the system `ping` binary once per probe
    #[default]
    System,
    /// Send ICMP echo requests directly (needs a raw or ping socket)
    Icmp,
    /// Time a TCP connect to host:port
    Tcp,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::System => "system",
            ProbeKind::Icmp => "icmp",
            ProbeKind::Tcp => "tcp",
        }
    }
}

pub fn build_sampler(kind: ProbeKind, timeout: Duration) -> Result<Box<dyn Sampler>, ProbeError> {
    Ok(match kind {
        ProbeKind::System => Box::new(SystemPing::new(timeout)),
        ProbeKind::Icmp => Box::new(IcmpPing::new(timeout)?),
        ProbeKind::Tcp => Box::new(TcpConnect::new(timeout)),
    })
}

/// Extracts the round-trip time from `ping` output, e.g. `time=12.3 ms` or
/// `time<1ms`.
pub fn parse_round_trip(output: &str) -> Option<f64> {
    let start = output.find("time=").or_else(|| output.find("time<"))? + "time=".len();
    let rest = output[start..].trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok()
}

/// Shells out to the platform `ping` for a single echo request.
#[derive(Debug, Clone)]
pub struct SystemPing {
    timeout: Duration,
}

impl SystemPing {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, target: &str) -> Result<f64, ProbeError> {
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        // kill_on_drop reaps the child if the timeout or a shutdown drops us.
        let child = tokio::process::Command::new("ping")
            .args([count_flag, "1", target])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(ProbeError::Spawn)?;
        if !output.status.success() {
            return Err(ProbeError::ExitStatus(output.status));
        }
        parse_round_trip(&String::from_utf8_lossy(&output.stdout)).ok_or(ProbeError::Unparsable)
    }
}

#[async_trait]
impl Sampler for SystemPing {
    async fn probe(&self, target: &str) -> ProbeOutcome {
        self.run(target).await.into()
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// ICMP echo through surge-ping, resolving the target on every probe.
pub struct IcmpPing {
    v4: surge_ping::Client,
    v6: Option<surge_ping::Client>,
    timeout: Duration,
    sequence: AtomicU16,
}

impl IcmpPing {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let v4 = surge_ping::Client::new(&surge_ping::Config::default())
            .map_err(ProbeError::Socket)?;
        // Hosts without IPv6 still get an IPv4 pinger.
        let v6 = surge_ping::Client::new(
            &surge_ping::Config::builder()
                .kind(surge_ping::ICMP::V6)
                .build(),
        )
        .ok();
        Ok(Self {
            v4,
            v6,
            timeout,
            sequence: AtomicU16::new(0),
        })
    }

    async fn run(&self, target: &str) -> Result<f64, ProbeError> {
        let start_time = Instant::now();
        let addr = with_timeout(self.timeout, resolve(target)).await?;
        let client = match addr {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => self.v6.as_ref().ok_or(ProbeError::Resolve(target.to_string()))?,
        };
        let mut pinger = client
            .pinger(addr, surge_ping::PingIdentifier(random()))
            .await;
        pinger.timeout(self.timeout.saturating_sub(start_time.elapsed()));
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let (_reply, rtt) = pinger
            .ping(surge_ping::PingSequence(sequence), &[0; 56])
            .await
            .map_err(|e| match e {
                surge_ping::SurgeError::Timeout { .. } => ProbeError::Timeout,
                other => ProbeError::Icmp(other),
            })?;
        Ok(rtt.as_secs_f64() * 1000.0)
    }
}

#[async_trait]
impl Sampler for IcmpPing {
    async fn probe(&self, target: &str) -> ProbeOutcome {
        self.run(target).await.into()
    }

    fn name(&self) -> &'static str {
        "icmp"
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    step: impl Future<Output = Result<T, ProbeError>>,
) -> Result<T, ProbeError> {
    tokio::time::timeout(timeout, step)
        .await
        .map_err(|_| ProbeError::Timeout)?
}

async fn resolve(target: &str) -> Result<IpAddr, ProbeError> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }
    let host = target.to_string();
    let resolved = tokio::task::spawn_blocking(move || {
        use std::net::ToSocketAddrs;
        format!("{host}:0").to_socket_addrs()
    })
    .await;
    match resolved {
        Ok(Ok(mut addrs)) => addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| ProbeError::Resolve(target.to_string())),
        _ => Err(ProbeError::Resolve(target.to_string())),
    }
}

/// Measures how long a TCP handshake with `host:port` takes.
#[derive(Debug, Clone)]
pub struct TcpConnect {
    timeout: Duration,
}

impl TcpConnect {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, target: &str) -> Result<f64, ProbeError> {
        let start_time = Instant::now();
        let _stream = tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(target))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(ProbeError::Socket)?;
        Ok(start_time.elapsed().as_secs_f64() * 1000.0)
    }
}

#[async_trait]
impl Sampler for TcpConnect {
    async fn probe(&self, target: &str) -> ProbeOutcome {
        self.run(target).await.into()
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linux_ping_output() {
        let output = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\
                      64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.3 ms\n";
        assert_eq!(parse_round_trip(output), Some(12.3));
    }

    #[test]
    fn test_parse_windows_ping_output() {
        let output = "Reply from 8.8.8.8: bytes=32 time=9ms TTL=117";
        assert_eq!(parse_round_trip(output), Some(9.0));
        let output = "Reply from 127.0.0.1: bytes=32 time<1ms TTL=128";
        assert_eq!(parse_round_trip(output), Some(1.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_round_trip(""), None);
        assert_eq!(parse_round_trip("Request timeout for icmp_seq 0"), None);
        assert_eq!(parse_round_trip("time=abc ms"), None);
    }

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(ProbeOutcome::from(Ok(0.0)), ProbeOutcome::Success(0.0));
        assert_eq!(ProbeOutcome::from(Err(ProbeError::Timeout)), ProbeOutcome::Failure);
        assert_eq!(ProbeOutcome::Success(0.0).latency_ms(), Some(0.0));
        assert!(!ProbeOutcome::Failure.is_success());
    }

    #[tokio::test]
    async fn test_resolve_accepts_ip_literal() {
        let addr = resolve("127.0.0.1").await.unwrap();
        assert_eq!(addr, IpAddr::from([127, 0, 0, 1]));
    }

    #[tokio::test]
    async fn test_unresolvable_host_collapses_to_failure() {
        let result = with_timeout(Duration::from_secs(2), resolve("bad\0host")).await;
        assert!(matches!(result, Err(ProbeError::Resolve(_))));
        assert_eq!(ProbeOutcome::from(result.map(|_| 0.0)), ProbeOutcome::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_lookup_gives_up_at_timeout() {
        let hung = std::future::pending::<Result<IpAddr, ProbeError>>();
        let result = with_timeout(Duration::from_secs(2), hung).await;
        assert!(matches!(result, Err(ProbeError::Timeout)));
        assert_eq!(ProbeOutcome::from(result.map(|_| 0.0)), ProbeOutcome::Failure);
    }

    #[tokio::test]
    async fn test_tcp_connect_to_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let sampler = TcpConnect::new(Duration::from_secs(2));
        let outcome = sampler.probe(&addr.to_string()).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_tcp_connect_failure_collapses_to_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let sampler = TcpConnect::new(Duration::from_secs(2));
        assert_eq!(sampler.probe(&addr.to_string()).await, ProbeOutcome::Failure);
    }
}
