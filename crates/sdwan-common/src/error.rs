//! Error taxonomy shared by the agent and controller.

use thiserror::Error;

/// The kinds of failure the control plane needs to distinguish.
///
/// Variants map to the handling described for each component: some are
/// recovered locally (`TransportFailure` behind a retry loop), some flip
/// the agent into fallback (`RetryExhausted`), and some are rejected at a
/// boundary and logged without aborting the calling loop.
#[derive(Debug, Error)]
pub enum SdwanError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("retry exhausted after {attempts} attempts: {operation}")]
    RetryExhausted { operation: String, attempts: u32 },

    #[error("subnet violation: {address} is outside the allowed overlay subnet")]
    SubnetViolation { address: String },

    #[error("forwarding command failed: {0}")]
    ForwardingCommandFailure(String),

    #[error("no path to destination: {destination}")]
    NoPath { destination: String },
}

pub type SdwanResult<T> = Result<T, SdwanError>;
