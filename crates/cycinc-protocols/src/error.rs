//! Error types for cycinc-protocols.

use cycinc_model::ModelError;
use cycinc_topology::{NodeId, TopologyError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::message::DecodeError;

/// Result type for cycinc-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Model evaluation failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Topology lookup failed.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Only the origin node may start the chain.
    #[error("node {0} is not the chain origin")]
    NotOrigin(NodeId),
}
