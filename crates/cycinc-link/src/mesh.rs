//! Shared in-memory medium and per-node endpoints
//!
//! The [`Mesh`] maps node identities to inbox senders. An [`Endpoint`] owns
//! the receiving half of its inbox and runs the send/acknowledge/retry loop
//! for its outbound traffic. A [`Sender`] split off an endpoint runs the same
//! loop on its own sequence space, so it can live in another task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use cycinc_topology::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::error::{LinkError, Result};
use crate::types::{Delivery, Frame, SeqNo};

/// Link configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Retries after the first attempt before giving up
    pub max_retransmissions: u8,
    /// Wait between attempts
    pub retry_interval: Duration,
    /// Probability a frame is lost on the way out
    pub frame_loss: f64,
    /// Probability the acknowledgment is lost on the way back
    pub ack_loss: f64,
    /// Frames buffered per inbox
    pub inbox_depth: usize,
    /// Seed for the loss model; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_retransmissions: 4,
            retry_interval: Duration::from_millis(10),
            frame_loss: 0.0,
            ack_loss: 0.0,
            inbox_depth: 64,
            seed: None,
        }
    }
}

impl LinkConfig {
    /// Check the loss probabilities.
    pub fn validate(&self) -> Result<()> {
        for p in [self.frame_loss, self.ack_loss] {
            if !(0.0..=1.0).contains(&p) {
                return Err(LinkError::BadProbability(p));
            }
        }
        Ok(())
    }
}

/// Counters shared by every endpoint on a mesh
#[derive(Debug, Default)]
pub struct LinkStats {
    /// Frames placed in an inbox, retransmissions included
    pub frames_delivered: AtomicU64,
    /// Frames lost on the way out
    pub frames_dropped: AtomicU64,
    /// Acknowledgments lost on the way back
    pub acks_dropped: AtomicU64,
    /// Sends that gave up
    pub timeouts: AtomicU64,
}

impl LinkStats {
    /// Snapshot of `(delivered, frames dropped, acks dropped, timeouts)`.
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.frames_delivered.load(Ordering::Relaxed),
            self.frames_dropped.load(Ordering::Relaxed),
            self.acks_dropped.load(Ordering::Relaxed),
            self.timeouts.load(Ordering::Relaxed),
        )
    }
}

struct MeshInner {
    config: LinkConfig,
    inboxes: Mutex<HashMap<NodeId, mpsc::Sender<Frame>>>,
    stats: LinkStats,
}

/// Shared medium. Cheap to clone.
#[derive(Clone)]
pub struct Mesh {
    inner: Arc<MeshInner>,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            inner: Arc::new(MeshInner {
                config,
                inboxes: Mutex::new(HashMap::new()),
                stats: LinkStats::default(),
            }),
        }
    }

    /// Register `id` and return its endpoint.
    pub fn attach(&self, id: NodeId) -> Result<Endpoint> {
        let config = &self.inner.config;
        config.validate()?;

        let mut inboxes = self.inner.inboxes.lock().unwrap_or_else(PoisonError::into_inner);
        if inboxes.contains_key(&id) {
            return Err(LinkError::AlreadyAttached(id));
        }
        let (tx, rx) = mpsc::channel(config.inbox_depth.max(1));
        inboxes.insert(id, tx);

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(id.value())),
            None => StdRng::from_entropy(),
        };
        tracing::debug!(node = %id, "attached to mesh");

        Ok(Endpoint {
            inbox: rx,
            tx: Sender {
                id,
                mesh: self.clone(),
                next_seq: 0,
                rng,
            },
        })
    }

    /// Remove `id`; later sends to it time out.
    pub fn detach(&self, id: NodeId) {
        self.inner
            .inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Attached identities.
    pub fn members(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self
            .inner
            .inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    /// Shared counters.
    pub fn stats(&self) -> &LinkStats {
        &self.inner.stats
    }

    fn inbox(&self, id: NodeId) -> Option<mpsc::Sender<Frame>> {
        self.inner
            .inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

/// One node's attachment to the mesh
pub struct Endpoint {
    inbox: mpsc::Receiver<Frame>,
    tx: Sender,
}

impl Endpoint {
    /// This endpoint's identity.
    pub fn id(&self) -> NodeId {
        self.tx.id
    }

    /// Wait for the next inbound frame. `None` once the mesh is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbox.recv().await
    }

    /// Send `payload` to `to` and wait for the acknowledgment.
    pub async fn send(&mut self, to: NodeId, payload: Bytes) -> Delivery {
        self.tx.send(to, payload).await
    }

    /// An outbound handle for the same identity with its own sequence
    /// numbers and loss draws.
    pub fn sender(&mut self) -> Sender {
        Sender {
            id: self.tx.id,
            mesh: self.tx.mesh.clone(),
            next_seq: 0,
            rng: StdRng::seed_from_u64(self.tx.rng.gen()),
        }
    }
}

/// Outbound half of an attachment.
pub struct Sender {
    id: NodeId,
    mesh: Mesh,
    next_seq: SeqNo,
    rng: StdRng,
}

impl Sender {
    /// Identity frames are sent from.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Send `payload` to `to` and wait for the acknowledgment.
    ///
    /// Every attempt of one send carries the same sequence number.
    pub async fn send(&mut self, to: NodeId, payload: Bytes) -> Delivery {
        let config = self.mesh.inner.config.clone();
        let stats = &self.mesh.inner.stats;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        for attempt in 0..=config.max_retransmissions {
            if attempt > 0 {
                tokio::time::sleep(config.retry_interval).await;
            }

            let Some(inbox) = self.mesh.inbox(to) else {
                tracing::trace!(from = %self.id, %to, attempt, "no such destination");
                continue;
            };

            if self.rng.gen::<f64>() < config.frame_loss {
                stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(from = %self.id, %to, seq, attempt, "frame lost");
                continue;
            }

            let frame = Frame {
                from: self.id,
                seq,
                payload: payload.clone(),
            };
            if inbox.send(frame).await.is_err() {
                tracing::trace!(from = %self.id, %to, "destination inbox closed");
                continue;
            }
            stats.frames_delivered.fetch_add(1, Ordering::Relaxed);

            if self.rng.gen::<f64>() < config.ack_loss {
                stats.acks_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(from = %self.id, %to, seq, attempt, "ack lost");
                continue;
            }

            return Delivery::Sent {
                to,
                retransmissions: attempt,
            };
        }

        stats.timeouts.fetch_add(1, Ordering::Relaxed);
        Delivery::TimedOut {
            to,
            retransmissions: config.max_retransmissions,
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.tx.id)
            .field("next_seq", &self.tx.next_seq)
            .finish()
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("id", &self.id)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}
