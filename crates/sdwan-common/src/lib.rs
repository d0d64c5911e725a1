//! Shared types for the sdwan overlay routing control plane.
//!
//! This crate contains:
//! - **Error taxonomy** — the `SdwanError` enum shared by the agent and controller
//! - **Data models** — telemetry reports, routes, and the wire formats between them
//! - **Configuration** — typed, TOML-backed config for both binaries

pub mod config;
pub mod error;
pub mod models;

pub use error::{SdwanError, SdwanResult};
