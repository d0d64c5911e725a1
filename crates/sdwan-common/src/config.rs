//! Typed configuration for the agent and controller binaries.
//!
//! Both configs are loaded from a TOML file with `serde` defaults filling
//! in anything the operator didn't set explicitly. Required fields with
//! no sensible default (agent id, controller URL, peer list) fail fast
//! with a named field in the error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SdwanError;

fn default_probe_interval_s() -> u64 {
    5
}

fn default_probe_timeout_s() -> u64 {
    2
}

fn default_window_size() -> usize {
    10
}

fn default_sync_interval_s() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_s() -> Vec<u64> {
    vec![1, 2, 4]
}

fn default_controller_timeout_s() -> u64 {
    5
}

fn default_interface() -> String {
    "wg0".into()
}

fn default_subnet() -> String {
    "10.254.0.0/24".into()
}

fn default_penalty_factor() -> f64 {
    100.0
}

fn default_hysteresis_fraction() -> f64 {
    0.15
}

fn default_stale_threshold_s() -> u64 {
    60
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}

// ── Agent config ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeSection {
    #[serde(default = "default_probe_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_probe_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            interval_s: default_probe_interval_s(),
            timeout_s: default_probe_timeout_s(),
            window_size: default_window_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncSection {
    #[serde(default = "default_sync_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_s")]
    pub retry_backoff_s: Vec<u64>,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_s: default_sync_interval_s(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_s: default_retry_backoff_s(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkSection {
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_subnet")]
    pub subnet: String,
    pub peer_ips: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerSection {
    pub url: String,
    #[serde(default = "default_controller_timeout_s")]
    pub timeout_s: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub controller: ControllerSection,
    pub network: NetworkSection,
    #[serde(default)]
    pub probe: ProbeSection,
    #[serde(default)]
    pub sync: SyncSection,
}

impl AgentConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SdwanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SdwanError::InvalidArgument(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: AgentConfig = toml::from_str(&text)
            .map_err(|e| SdwanError::InvalidArgument(format!("invalid agent config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SdwanError> {
        if self.agent_id.trim().is_empty() {
            return Err(SdwanError::InvalidArgument("agent_id is required".into()));
        }
        if self.controller.url.trim().is_empty() {
            return Err(SdwanError::InvalidArgument(
                "controller.url is required".into(),
            ));
        }
        if self.network.peer_ips.is_empty() {
            return Err(SdwanError::InvalidArgument(
                "network.peer_ips must list at least one peer".into(),
            ));
        }
        if self.network.subnet.parse::<SubnetMask>().is_err() {
            return Err(SdwanError::InvalidArgument(format!(
                "network.subnet {} is not a valid CIDR",
                self.network.subnet
            )));
        }
        if self.probe.window_size == 0 {
            return Err(SdwanError::InvalidArgument(
                "probe.window_size must be greater than zero".into(),
            ));
        }
        if self.sync.retry_backoff_s.is_empty() {
            return Err(SdwanError::InvalidArgument(
                "sync.retry_backoff_s must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// ── Controller config ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlgorithmSection {
    #[serde(default = "default_penalty_factor")]
    pub penalty_factor: f64,
    #[serde(default = "default_hysteresis_fraction")]
    pub hysteresis_fraction: f64,
}

impl Default for AlgorithmSection {
    fn default() -> Self {
        Self {
            penalty_factor: default_penalty_factor(),
            hysteresis_fraction: default_hysteresis_fraction(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopologySection {
    #[serde(default = "default_stale_threshold_s")]
    pub stale_threshold_s: u64,
}

impl Default for TopologySection {
    fn default() -> Self {
        Self {
            stale_threshold_s: default_stale_threshold_s(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub algorithm: AlgorithmSection,
    #[serde(default)]
    pub topology: TopologySection,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            algorithm: AlgorithmSection::default(),
            topology: TopologySection::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SdwanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SdwanError::InvalidArgument(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: ControllerConfig = toml::from_str(&text)
            .map_err(|e| SdwanError::InvalidArgument(format!("invalid controller config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SdwanError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(SdwanError::InvalidArgument(format!(
                "listen_addr {} is not a valid socket address",
                self.listen_addr
            )));
        }
        if !(0.0..1.0).contains(&self.algorithm.hysteresis_fraction) {
            return Err(SdwanError::InvalidArgument(
                "algorithm.hysteresis_fraction must be in [0, 1)".into(),
            ));
        }
        Ok(())
    }
}

/// Minimal CIDR parser used only to sanity-check the configured subnet at
/// load time; the actual containment check lives with the reconciler.
struct SubnetMask;

impl std::str::FromStr for SubnetMask {
    type Err = SdwanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| SdwanError::InvalidArgument("missing prefix length".into()))?;
        addr.parse::<std::net::Ipv4Addr>()
            .map_err(|e| SdwanError::InvalidArgument(e.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| SdwanError::InvalidArgument("prefix length must be numeric".into()))?;
        if prefix > 32 {
            return Err(SdwanError::InvalidArgument("prefix length out of range".into()));
        }
        Ok(SubnetMask)
    }
}
