//! Core link types

use bytes::Bytes;
use cycinc_topology::NodeId;

/// Per-sender sequence number, wrapping.
pub type SeqNo = u8;

/// A payload as seen by the receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Sending node
    pub from: NodeId,
    /// Sender's sequence number; repeated on retransmission
    pub seq: SeqNo,
    /// Opaque payload
    pub payload: Bytes,
}

/// Outcome of one acknowledged send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Acknowledged after `retransmissions` extra attempts.
    Sent { to: NodeId, retransmissions: u8 },
    /// No acknowledgment after the last retry.
    TimedOut { to: NodeId, retransmissions: u8 },
}

impl Delivery {
    /// Destination of the send.
    pub fn to(&self) -> NodeId {
        match *self {
            Self::Sent { to, .. } | Self::TimedOut { to, .. } => to,
        }
    }

    /// Check if acknowledged.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}
