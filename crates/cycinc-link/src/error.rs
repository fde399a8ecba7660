//! Error types for cycinc-link.

use cycinc_topology::NodeId;
use thiserror::Error;

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors from attaching to the mesh.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Another endpoint already owns this identity.
    #[error("node {0} is already attached")]
    AlreadyAttached(NodeId),

    /// A probability outside `0.0..=1.0`.
    #[error("invalid loss probability {0}")]
    BadProbability(f64),
}
