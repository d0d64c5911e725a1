//! Probe Engine: periodically measures RTT and reachability to every peer
//! and exposes smoothed per-peer metrics.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sdwan_common::models::Metric;

use crate::sliding_window::SlidingWindowBuffer;

/// The outcome of a single probe attempt against one peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub rtt_ms: Option<f64>,
    pub loss: f64,
}

impl ProbeOutcome {
    fn timeout() -> Self {
        Self {
            rtt_ms: None,
            loss: 1.0,
        }
    }

    fn success(rtt_ms: f64) -> Self {
        Self {
            rtt_ms: Some(rtt_ms),
            loss: 0.0,
        }
    }
}

/// Abstracts the concrete echo transport so the engine is testable without
/// real ICMP sockets. The production implementation shells out to the
/// system `ping` binary with a one-shot count and a hard timeout.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: &str, timeout: Duration) -> ProbeOutcome;
}

/// Shells out to `ping -c 1 -W <timeout> <addr>` and parses the reported
/// RTT. Any non-zero exit, parse failure, or timeout is classified as loss.
pub struct PingProber;

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, addr: &str, timeout: Duration) -> ProbeOutcome {
        let timeout_s = timeout.as_secs().max(1).to_string();
        let addr = addr.to_string();
        let result = tokio::task::spawn_blocking(move || {
            std::process::Command::new("ping")
                .args(["-c", "1", "-W", &timeout_s, &addr])
                .output()
        })
        .await;

        let output = match result {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(_)) => return ProbeOutcome::timeout(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to spawn ping");
                return ProbeOutcome::timeout();
            }
            Err(e) => {
                tracing::warn!(error = %e, "ping task panicked");
                return ProbeOutcome::timeout();
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_ping_rtt(&stdout) {
            Some(rtt) => ProbeOutcome::success(rtt),
            None => ProbeOutcome::timeout(),
        }
    }
}

fn parse_ping_rtt(stdout: &str) -> Option<f64> {
    // Looks for the "time=12.3 ms" token in ping's single-reply output.
    for token in stdout.split_whitespace() {
        if let Some(rest) = token.strip_prefix("time=") {
            return rest.parse::<f64>().ok();
        }
    }
    None
}

struct PeerBuffers {
    rtt: SlidingWindowBuffer,
    loss: SlidingWindowBuffer,
}

/// Owns per-peer sliding windows and drives the probe cycle.
pub struct ProbeEngine {
    peers: Vec<String>,
    timeout: Duration,
    window_size: usize,
    buffers: HashMap<String, PeerBuffers>,
    prober: Box<dyn Prober>,
}

impl ProbeEngine {
    pub fn new(
        peers: Vec<String>,
        timeout: Duration,
        window_size: usize,
        prober: Box<dyn Prober>,
    ) -> Self {
        let mut buffers = HashMap::new();
        for peer in &peers {
            buffers.insert(
                peer.clone(),
                PeerBuffers {
                    rtt: SlidingWindowBuffer::new(window_size)
                        .expect("window_size validated at config load"),
                    loss: SlidingWindowBuffer::new(window_size)
                        .expect("window_size validated at config load"),
                },
            );
        }
        Self {
            peers,
            timeout,
            window_size: window_size.max(1),
            buffers,
            prober,
        }
    }

    async fn probe_once(&self, addr: &str) -> ProbeOutcome {
        self.prober.probe(addr, self.timeout).await
    }

    async fn probe_all(&mut self) {
        for peer in self.peers.clone() {
            let outcome = self.probe_once(&peer).await;
            let entry = self.buffers.entry(peer).or_insert_with(|| PeerBuffers {
                rtt: SlidingWindowBuffer::new(self.window_size).expect("nonzero window"),
                loss: SlidingWindowBuffer::new(self.window_size).expect("nonzero window"),
            });
            entry.loss.append(outcome.loss);
            if let Some(rtt) = outcome.rtt_ms {
                entry.rtt.append(rtt);
            }
        }
    }

    fn smoothed_metrics(&self) -> Vec<Metric> {
        self.peers
            .iter()
            .map(|peer| {
                let buffers = self
                    .buffers
                    .get(peer)
                    .expect("every configured peer has a buffer entry");
                // The original probe behavior reports loss = 0.0 when no
                // samples have been collected yet, rather than leaving it
                // absent.
                let loss_rate = buffers.loss.mean().unwrap_or(0.0);
                Metric {
                    target_ip: peer.clone(),
                    rtt_ms: buffers.rtt.mean(),
                    loss_rate,
                }
            })
            .collect()
    }

    /// Runs one probe cycle against every peer and returns the resulting
    /// smoothed metrics.
    pub async fn run_once(&mut self) -> Vec<Metric> {
        self.probe_all().await;
        self.smoothed_metrics()
    }
}
