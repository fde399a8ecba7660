//! Estimate messages and their fixed-size wire layout.
//!
//! ```text
//! offset  size  field
//!      0     2  key        u16 LE   (RUNNING_KEY or RUNNING_KEY + 1)
//!      2     2  iteration  u16 LE
//!      4    24  estimate   3 x i64 LE, scaled by 2^S
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use cycinc_fixed::{Estimate, Scaled, ESTIMATE_DIM};
use thiserror::Error;

/// Phase key of a running message. The converged key is this plus one.
pub const RUNNING_KEY: u16 = 0x4F50;

/// Phase key of a converged message.
pub const CONVERGED_KEY: u16 = RUNNING_KEY + 1;

/// Encoded size of every message.
pub const WIRE_LEN: usize = 2 + 2 + 8 * ESTIMATE_DIM;

/// Cycle counter carried by every message.
pub type Iteration = u16;

/// Where the chain is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nodes keep stepping the estimate.
    Running,
    /// Terminal: the estimate is final and is only relayed.
    Converged,
}

impl Phase {
    /// Wire key.
    pub const fn key(self) -> u16 {
        match self {
            Self::Running => RUNNING_KEY,
            Self::Converged => CONVERGED_KEY,
        }
    }

    /// Parse a wire key.
    pub const fn from_key(key: u16) -> Option<Self> {
        match key {
            RUNNING_KEY => Some(Self::Running),
            CONVERGED_KEY => Some(Self::Converged),
            _ => None,
        }
    }

    /// Whether this is the terminal phase.
    pub const fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Converged => write!(f, "Converged"),
        }
    }
}

/// Errors from decoding an inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload is not exactly [`WIRE_LEN`] bytes.
    #[error("payload is {len} bytes, expected {}", WIRE_LEN)]
    BadLength { len: usize },

    /// Leading key is neither phase key.
    #[error("unknown phase key {0:#06x}")]
    UnknownKey(u16),

    /// An estimate component lies outside the configured coordinate range.
    #[error("estimate component {component} = {raw} out of range")]
    OutOfRange { component: usize, raw: i64 },
}

/// One hop's worth of shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub phase: Phase,
    pub iteration: Iteration,
    pub estimate: Estimate,
}

impl Message {
    /// A running message.
    pub const fn running(iteration: Iteration, estimate: Estimate) -> Self {
        Self {
            phase: Phase::Running,
            iteration,
            estimate,
        }
    }

    /// A converged message.
    pub const fn converged(iteration: Iteration, estimate: Estimate) -> Self {
        Self {
            phase: Phase::Converged,
            iteration,
            estimate,
        }
    }

    /// Serialize to the wire layout.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(WIRE_LEN);
        buf.put_u16_le(self.phase.key());
        buf.put_u16_le(self.iteration);
        for v in self.estimate.raw() {
            buf.put_i64_le(v);
        }
        buf.freeze()
    }

    /// Parse and validate a payload.
    ///
    /// Length and phase key are checked before anything else is trusted.
    pub fn decode(mut payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != WIRE_LEN {
            return Err(DecodeError::BadLength { len: payload.len() });
        }
        let key = payload.get_u16_le();
        let phase = Phase::from_key(key).ok_or(DecodeError::UnknownKey(key))?;
        let iteration = payload.get_u16_le();
        let mut raw = [0i64; ESTIMATE_DIM];
        for v in raw.iter_mut() {
            *v = payload.get_i64_le();
        }
        Ok(Self {
            phase,
            iteration,
            estimate: Estimate::from_raw(raw),
        })
    }

    /// [`decode`](Self::decode), then reject estimates with any component
    /// outside `[-limit, limit]`.
    pub fn decode_within(payload: &[u8], limit: Scaled) -> Result<Self, DecodeError> {
        let msg = Self::decode(payload)?;
        match msg.estimate.first_out_of_range(limit) {
            Some(component) => Err(DecodeError::OutOfRange {
                component,
                raw: msg.estimate[component].raw(),
            }),
            None => Ok(msg),
        }
    }
}
