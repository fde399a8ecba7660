//! Error types for cycinc-node.

use thiserror::Error;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that can stop a chain run.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Node construction or protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] cycinc_protocols::Error),

    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] cycinc_protocols::ConfigError),

    /// Topology lookup failed.
    #[error("topology error: {0}")]
    Topology(#[from] cycinc_topology::TopologyError),

    /// Link setup failed.
    #[error("link error: {0}")]
    Link(#[from] cycinc_link::LinkError),

    /// A node task panicked or was cancelled.
    #[error("task error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// An environment override could not be parsed.
    #[error("invalid {var}: {value:?}")]
    Env { var: &'static str, value: String },

    /// The runner needs an observer to detect the end of the run.
    #[error("no observer configured")]
    NoObserver,
}
