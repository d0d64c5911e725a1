//! Wire types exchanged between agent and controller.
//!
//! These are the JSON shapes for the two HTTP endpoints: telemetry ingest
//! and route fetch. Validation lives alongside the types so both the
//! agent (before sending) and the controller (after receiving) can share
//! the same rules.

use serde::{Deserialize, Serialize};

use crate::error::SdwanError;

// ── Telemetry ───────────────────────────────────────────────────────

/// A single peer's smoothed link quality, as observed by the reporting agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub target_ip: String,
    /// Absent when every recent probe to this peer timed out.
    pub rtt_ms: Option<f64>,
    /// Fraction of recent probes that timed out, in `[0, 1]`.
    pub loss_rate: f64,
}

impl Metric {
    pub fn validate(&self) -> Result<(), SdwanError> {
        if self.target_ip.trim().is_empty() {
            return Err(SdwanError::InvalidArgument(
                "metric target_ip must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(SdwanError::InvalidArgument(format!(
                "loss_rate {} out of range [0, 1]",
                self.loss_rate
            )));
        }
        if let Some(rtt) = self.rtt_ms {
            if rtt < 0.0 || !rtt.is_finite() {
                return Err(SdwanError::InvalidArgument(format!(
                    "rtt_ms {rtt} must be a non-negative finite value"
                )));
            }
        }
        Ok(())
    }
}

/// What an agent sends once per sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub agent_id: String,
    pub timestamp: i64,
    pub metrics: Vec<Metric>,
}

impl TelemetryReport {
    pub fn validate(&self) -> Result<(), SdwanError> {
        if self.agent_id.trim().is_empty() {
            return Err(SdwanError::InvalidArgument(
                "agent_id must not be empty".into(),
            ));
        }
        if self.timestamp <= 0 {
            return Err(SdwanError::InvalidArgument(
                "timestamp must be positive".into(),
            ));
        }
        if self.metrics.is_empty() {
            return Err(SdwanError::InvalidArgument(
                "metrics must contain at least one entry".into(),
            ));
        }
        for metric in &self.metrics {
            metric.validate()?;
        }
        Ok(())
    }
}

// ── Routes ──────────────────────────────────────────────────────────

/// Why the solver chose this next-hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// Direct underlay path is already the cheapest.
    Default,
    /// A one-hop relay beat the direct path by the hysteresis margin.
    OptimizedPath,
}

/// The sentinel next-hop meaning "use the underlay's default forwarding".
pub const DIRECT: &str = "direct";

/// A single host route the agent should install (or leave as direct).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub dst_cidr: String,
    pub next_hop: String,
    pub reason: RouteReason,
}

impl Route {
    pub fn is_direct(&self) -> bool {
        self.next_hop == DIRECT
    }
}

/// Response body for `GET /api/v1/routes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
}
