use thiserror::Error;

/// Failures surfaced by the connection supervisor and top-level [`crate::Probe`]
/// setup. Per-check failures never reach this type — they're folded into a
/// [`crate::check::CheckOutcome`] and shipped to AgentCore as a result dump.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection attempt failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out waiting for a response")]
    RequestTimeout,

    #[error("link to agentcore is down")]
    ConnectionLost,

    #[error("startup configuration failed: {0}")]
    StartupConfig(String),
}
