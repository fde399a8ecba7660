//! Cycinc Link - In-process acknowledged unicast
//!
//! Stands in for the radio stack when a whole chain runs inside one
//! process. Every attached node gets an [`Endpoint`] with an inbox; sends
//! are acknowledged, retried a bounded number of times, and report
//! [`Delivery::Sent`] or [`Delivery::TimedOut`].
//!
//! Loss is simulated on both legs. A lost frame is simply retried. A lost
//! acknowledgment makes the sender retransmit a frame the receiver already
//! has, with the same sequence number, which is exactly the duplicate the
//! receiver's dedup cache exists to drop.
//!
//! # Example
//!
//! ```rust,ignore
//! use cycinc_link::{LinkConfig, Mesh};
//!
//! let mesh = Mesh::new(LinkConfig::default());
//! let mut a = mesh.attach(NodeId(10))?;
//! let mut b = mesh.attach(NodeId(11))?;
//!
//! a.send(NodeId(11), payload).await;
//! let frame = b.recv().await;
//! ```

pub mod error;
pub mod mesh;
pub mod types;

pub use error::{LinkError, Result};
pub use mesh::{Endpoint, LinkConfig, LinkStats, Mesh, Sender};
pub use types::{Delivery, Frame, SeqNo};
