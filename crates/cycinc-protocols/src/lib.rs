//! Cycinc Protocols - Per-node relay for the cyclic incremental gradient chain
//!
//! Every device in the chain runs one [`ChainNode`]. A single estimate
//! travels the ring; each node refines it with one gradient step against
//! its own sensor reading and relays it downstream, with a copy to the
//! observer.
//!
//! # Overview
//!
//! ## Message Flow
//!
//! ```text
//! origin ──RUNNING(0)──▶ node ──RUNNING(1)──▶ node ── ... ──▶ last ──┐
//!    ▲                                                              │
//!    └──────────────────────── RUNNING(n) ──────────────────────────┘
//! ```
//!
//! Once some node's convergence streak reaches the threshold (or the
//! iteration cap is hit), it relays CONVERGED instead. Each node that sees
//! CONVERGED relays it once and then absorbs everything that follows.
//!
//! ## Components
//!
//! - [`message`]: 28-byte wire format
//! - [`dedup`]: bounded per-sender duplicate suppression
//! - [`phase`]: RUNNING / CONVERGED transitions
//! - [`bootstrap`]: cycle-0 start on the origin
//! - [`config`]: chain-wide constants and startup validation
//! - [`node`]: the event handler tying it together
//!
//! # Example
//!
//! ```rust,ignore
//! use cycinc_protocols::{ChainConfig, ChainNode, Led, NodeEvent};
//! use cycinc_model::FixedReading;
//!
//! let config = ChainConfig::default().with_chain_length(3);
//! let mut origin = ChainNode::new(config.origin, &config, FixedReading(128), Led::default())?;
//!
//! if let Some(out) = origin.handle(NodeEvent::Start).outbound() {
//!     for to in out.destinations() {
//!         link.send(to, out.message.encode());
//!     }
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod dedup;
pub mod error;
pub mod message;
pub mod node;
pub mod phase;

pub use bootstrap::ChainBootstrap;
pub use config::{ChainConfig, ConfigError, ModelConstants, CONFIG_ENV};
pub use dedup::{Admission, DedupCache, SeqNo};
pub use error::{Error, Result};
pub use message::{DecodeError, Iteration, Message, Phase, WIRE_LEN};
pub use node::{Action, ChainNode, Led, NodeEvent, NodeState, NodeStats, Outbound, StatusIndicator};
pub use phase::{ConvergeReason, Decision, PhaseController};
