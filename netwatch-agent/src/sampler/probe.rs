//! Reachability probes
//!
//! Runs the system `ping` with a fixed packet count under a hard timeout and
//! parses its summary lines:
//! - `N% packet loss`
//! - `rtt min/avg/max/mdev = a/b/c/d ms` (Linux) or
//!   `round-trip min/avg/max/stddev = ...` (BSD/macOS)

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Round-trip statistics of one probe burst
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeStats {
    pub min_latency: f64,
    pub avg_latency: f64,
    pub max_latency: f64,
    pub packet_loss: f64,
}

impl ProbeStats {
    /// Spread of the burst: max minus min round-trip time
    pub fn jitter(&self) -> f64 {
        (self.max_latency - self.min_latency).max(0.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to spawn probe: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("Probe exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("Unparsable probe output: {0}")]
    Unparsable(String),
}

/// Probe executor consumed by the network sampler
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn probe(&self, address: &str, count: u32) -> Result<ProbeStats, ProbeError>;
}

/// `ping`-backed executor
pub struct PingExecutor {
    timeout: Duration,
}

impl PingExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeExecutor for PingExecutor {
    async fn probe(&self, address: &str, count: u32) -> Result<ProbeStats, ProbeError> {
        let start_time = Instant::now();
        debug!("Probing {} ({} packets, timeout: {:?})", address, count, self.timeout);

        let output = tokio::time::timeout(
            self.timeout,
            AsyncCommand::new("ping")
                .args(["-c", &count.to_string(), address])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ProbeError::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(
            "Probe output for {} after {}ms: {}",
            address,
            start_time.elapsed().as_millis(),
            stdout
        );

        if !output.status.success() {
            return Err(ProbeError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_ping_output(&stdout)
    }
}

fn loss_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)% packet loss").expect("valid packet loss pattern"))
}

fn rtt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = (\d+(?:\.\d+)?)/(\d+(?:\.\d+)?)/(\d+(?:\.\d+)?)")
            .expect("valid rtt pattern")
    })
}

/// Extract loss and min/avg/max round-trip times from `ping` output
pub fn parse_ping_output(output: &str) -> Result<ProbeStats, ProbeError> {
    let loss = loss_pattern()
        .captures(output)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .ok_or_else(|| ProbeError::Unparsable("missing packet loss".to_string()))?;

    let rtt = rtt_pattern()
        .captures(output)
        .ok_or_else(|| ProbeError::Unparsable("missing rtt summary".to_string()))?;
    let field = |idx: usize| {
        rtt[idx]
            .parse::<f64>()
            .map_err(|e| ProbeError::Unparsable(format!("rtt field {}: {}", idx, e)))
    };

    let stats = ProbeStats {
        min_latency: field(1)?,
        avg_latency: field(2)?,
        max_latency: field(3)?,
        packet_loss: loss,
    };

    if stats.min_latency > stats.max_latency {
        return Err(ProbeError::Unparsable(format!(
            "min rtt {} above max rtt {}",
            stats.min_latency, stats.max_latency
        )));
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_OUTPUT: &str = "\
PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=14.2 ms
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=18.9 ms

--- 8.8.8.8 ping statistics ---
10 packets transmitted, 9 received, 10% packet loss, time 9012ms
rtt min/avg/max/mdev = 12.104/15.377/21.950/2.811 ms
";

    const MACOS_OUTPUT: &str = "\
--- 1.1.1.1 ping statistics ---
4 packets transmitted, 4 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 9.011/10.250/11.900/1.010 ms
";

    #[test]
    fn test_parse_linux_summary() {
        let stats = parse_ping_output(LINUX_OUTPUT).unwrap();
        assert_eq!(stats.min_latency, 12.104);
        assert_eq!(stats.avg_latency, 15.377);
        assert_eq!(stats.max_latency, 21.950);
        assert_eq!(stats.packet_loss, 10.0);
        assert!((stats.jitter() - 9.846).abs() < 1e-9);
    }

    #[test]
    fn test_parse_bsd_summary() {
        let stats = parse_ping_output(MACOS_OUTPUT).unwrap();
        assert_eq!(stats.packet_loss, 0.0);
        assert_eq!(stats.avg_latency, 10.25);
        assert!(stats.jitter() >= 0.0);
    }

    #[test]
    fn test_jitter_is_never_negative() {
        let outputs = [LINUX_OUTPUT, MACOS_OUTPUT];
        for output in outputs {
            let stats = parse_ping_output(output).unwrap();
            assert_eq!(stats.jitter(), stats.max_latency - stats.min_latency);
            assert!(stats.jitter() >= 0.0);
        }
    }

    #[test]
    fn test_unparsable_outputs_are_rejected() {
        assert!(matches!(
            parse_ping_output("ping: unknown host nowhere.invalid"),
            Err(ProbeError::Unparsable(_))
        ));
        // Total loss prints no rtt line
        let all_lost = "10 packets transmitted, 0 received, 100% packet loss, time 9200ms\n";
        assert!(matches!(parse_ping_output(all_lost), Err(ProbeError::Unparsable(_))));

        let inverted = "0% packet loss\nrtt min/avg/max/mdev = 30.0/20.0/10.0/1.0 ms\n";
        assert!(matches!(parse_ping_output(inverted), Err(ProbeError::Unparsable(_))));
    }

    #[tokio::test]
    async fn test_probe_of_unresolvable_host_fails() {
        let executor = PingExecutor::new(Duration::from_secs(5));
        // Either ping is missing (spawn error), exits non-zero, or times out
        let result = executor.probe("host.invalid", 1).await;
        assert!(result.is_err());
    }
}
