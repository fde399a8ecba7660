//! Drives one [`ChainNode`] from its link endpoint.
//!
//! The runtime owns the only mutable handle to the node. Frames and
//! delivery notifications are turned into [`NodeEvent`]s and handled one at
//! a time. The next-hop send completes before the next frame is taken.
//! Observer copies are handed to a mirror task with its own [`Sender`], and
//! their delivery reports come back through the same event loop, so a
//! missing observer never holds up the chain.

use bytes::Bytes;
use cycinc_link::{Delivery, Endpoint, Sender};
use cycinc_model::Sensor;
use cycinc_protocols::{Action, ChainNode, Error, NodeEvent, NodeStats, Phase, StatusIndicator};
use cycinc_topology::NodeId;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Final state of a node when the run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeReport {
    pub id: NodeId,
    pub phase: Phase,
    pub cycles: u64,
    pub stats: NodeStats,
}

/// Observer copies queued before the mirror task falls behind.
const MIRROR_DEPTH: usize = 32;

/// Sends observer copies in order, off the chain's critical path.
struct Mirror {
    link: Sender,
    copies: mpsc::Receiver<(NodeId, Bytes)>,
    reports: mpsc::UnboundedSender<Delivery>,
}

impl Mirror {
    async fn run(mut self) {
        while let Some((to, payload)) = self.copies.recv().await {
            let delivery = self.link.send(to, payload).await;
            if self.reports.send(delivery).is_err() {
                break;
            }
        }
    }
}

/// Event loop for one node.
pub struct NodeRuntime<S, L> {
    node: ChainNode<S, L>,
    endpoint: Endpoint,
    trigger: Option<oneshot::Receiver<()>>,
    copies: mpsc::Sender<(NodeId, Bytes)>,
    reports: mpsc::UnboundedReceiver<Delivery>,
    mirror: Option<Mirror>,
}

impl<S, L> NodeRuntime<S, L>
where
    S: Sensor + Send,
    L: StatusIndicator + Send,
{
    /// Pair a node with its endpoint.
    pub fn new(node: ChainNode<S, L>, mut endpoint: Endpoint) -> Self {
        let (copies, copies_rx) = mpsc::channel(MIRROR_DEPTH);
        let (reports_tx, reports) = mpsc::unbounded_channel();
        let mirror = Mirror {
            link: endpoint.sender(),
            copies: copies_rx,
            reports: reports_tx,
        };
        Self {
            node,
            endpoint,
            trigger: None,
            copies,
            reports,
            mirror: Some(mirror),
        }
    }

    /// Wire the manual start trigger. Only the origin has one.
    pub fn with_trigger(mut self, trigger: oneshot::Receiver<()>) -> Result<Self, Error> {
        if !self.node.is_origin() {
            return Err(Error::NotOrigin(self.node.id()));
        }
        self.trigger = Some(trigger);
        Ok(self)
    }

    /// The node being driven.
    pub fn node(&self) -> &ChainNode<S, L> {
        &self.node
    }

    /// Run until `shutdown` flips or the link goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> NodeReport {
        if let Some(mirror) = self.mirror.take() {
            tokio::spawn(mirror.run());
        }
        if self.node.is_origin() && !self.bootstrap(&mut shutdown).await {
            return self.report();
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                Some(delivery) = self.reports.recv() => self.on_delivery(delivery),
                frame = self.endpoint.recv() => {
                    let Some(frame) = frame else { break };
                    let action = self.node.handle(NodeEvent::Received {
                        from: frame.from,
                        seq: frame.seq,
                        payload: &frame.payload,
                    });
                    self.dispatch(action).await;
                }
            }
        }

        while let Ok(delivery) = self.reports.try_recv() {
            self.on_delivery(delivery);
        }
        debug!(node = %self.node.id(), "runtime stopped");
        self.report()
    }

    /// Warm-up, optional trigger, then the cycle-0 message. Returns `false`
    /// if shut down first.
    async fn bootstrap(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let Some(plan) = self.node.bootstrap().copied() else {
            return true;
        };

        tokio::select! {
            _ = tokio::time::sleep(plan.warmup()) => {}
            _ = shutdown.changed() => return false,
        }

        if plan.requires_trigger() {
            match self.trigger.take() {
                Some(trigger) => {
                    info!(node = %self.node.id(), "waiting for start trigger");
                    tokio::select! {
                        fired = trigger => if fired.is_err() {
                            warn!(node = %self.node.id(), "trigger dropped, not starting");
                            return false;
                        },
                        _ = shutdown.changed() => return false,
                    }
                }
                None => warn!(node = %self.node.id(), "trigger required but not wired, starting anyway"),
            }
        }

        let action = self.node.handle(NodeEvent::Start);
        self.dispatch(action).await;
        true
    }

    async fn dispatch(&mut self, action: Action) {
        let Action::Forward(out) = action else {
            return;
        };
        let payload = out.message.encode();
        // Queued first so the observer sees copies in chain order
        if let Some(observer) = out.observer {
            if self.copies.try_send((observer, payload.clone())).is_err() {
                warn!(node = %self.node.id(), %observer, "observer queue full, copy dropped");
            }
        }
        let delivery = self.endpoint.send(out.next_hop, payload).await;
        self.on_delivery(delivery);
    }

    fn on_delivery(&mut self, delivery: Delivery) {
        let event = match delivery {
            Delivery::Sent { to, retransmissions } => NodeEvent::Sent { to, retransmissions },
            Delivery::TimedOut { to, retransmissions } => NodeEvent::TimedOut { to, retransmissions },
        };
        self.node.handle(event);
    }

    fn report(&self) -> NodeReport {
        NodeReport {
            id: self.node.id(),
            phase: self.node.phase(),
            cycles: self.node.state().cycle(),
            stats: *self.node.stats(),
        }
    }
}
