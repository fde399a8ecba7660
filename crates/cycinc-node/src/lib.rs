//! Cycinc Node - Runtime for chain nodes
//!
//! Glues the per-node handler from `cycinc-protocols` to the in-process
//! link from `cycinc-link`:
//!
//! - [`NodeRuntime`]: event loop for one node (warm-up, bootstrap, relay)
//! - [`Observer`]: passive sink logging every relayed message
//! - [`run_chain`]: spawns a whole chain and waits for CONVERGED
//!
//! The `cycinc-chain` binary is a thin wrapper around [`run_chain`].

pub mod error;
pub mod observer;
pub mod runner;
pub mod runtime;

pub use error::{NodeError, Result};
pub use observer::{Observer, ObserverReport};
pub use runner::{run_chain, ChainReport, RunnerConfig};
pub use runtime::{NodeReport, NodeRuntime};
