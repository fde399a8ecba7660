//! Deterministic single-threaded chain driver for end-to-end tests.
//!
//! Frames are delivered one at a time in send order, so a run is a pure
//! function of the configuration and the sensor readings.

use std::collections::{BTreeMap, HashMap, VecDeque};

use bytes::Bytes;
use cycinc_model::FixedReading;
use cycinc_protocols::{Action, ChainConfig, ChainNode, Led, Message, NodeEvent, Result, SeqNo};
use cycinc_topology::NodeId;

/// Node type used by the driver.
pub type TestNode = ChainNode<FixedReading, Led>;

#[derive(Debug, Clone)]
struct InFlight {
    from: NodeId,
    to: NodeId,
    seq: SeqNo,
    payload: Bytes,
}

/// A whole chain stepped by hand.
pub struct SyncChain {
    nodes: BTreeMap<NodeId, TestNode>,
    observer: Option<NodeId>,
    queue: VecDeque<InFlight>,
    seqs: HashMap<NodeId, SeqNo>,
    echo: bool,
    observed: Vec<(NodeId, Message)>,
    deliveries: u64,
}

impl SyncChain {
    /// One node per chain member, reading `readings[i]` for the i-th member.
    pub fn new(config: &ChainConfig, readings: &[i64]) -> Result<Self> {
        let chain = config.chain()?;
        let mut nodes = BTreeMap::new();
        for (id, reading) in chain.ids().zip(readings.iter().copied()) {
            nodes.insert(id, ChainNode::new(id, config, FixedReading(reading), Led::default())?);
        }
        Ok(Self {
            nodes,
            observer: config.observer,
            queue: VecDeque::new(),
            seqs: HashMap::new(),
            echo: false,
            observed: Vec::new(),
            deliveries: 0,
        })
    }

    /// Deliver every frame twice, as a link that loses every ack would.
    #[must_use]
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Send `Start` to every node; only the origin reacts.
    pub fn start(&mut self) {
        let ids: Vec<_> = self.nodes.keys().copied().collect();
        for id in ids {
            self.handle(id, NodeEvent::Start);
        }
    }

    /// Deliver until nothing is in flight or `limit` deliveries were made.
    /// Returns the number of deliveries.
    pub fn run(&mut self, limit: u64) -> u64 {
        let before = self.deliveries;
        while self.deliveries - before < limit {
            let Some(frame) = self.queue.pop_front() else { break };
            self.deliver(frame);
        }
        self.deliveries - before
    }

    /// Put a raw payload on the wire as if `from` had sent it.
    pub fn inject(&mut self, from: NodeId, to: NodeId, payload: Bytes) {
        let seq = self.next_seq(from);
        self.queue.push_back(InFlight { from, to, seq, payload });
    }

    /// Messages the observer received, in order.
    pub fn observed(&self) -> &[(NodeId, Message)] {
        &self.observed
    }

    /// First CONVERGED message the observer received.
    pub fn first_converged(&self) -> Option<&(NodeId, Message)> {
        self.observed.iter().find(|(_, m)| m.phase.is_converged())
    }

    /// Node by identity.
    pub fn node(&self, id: NodeId) -> Option<&TestNode> {
        self.nodes.get(&id)
    }

    /// All nodes in identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &TestNode> {
        self.nodes.values()
    }

    /// Frames still queued.
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    fn next_seq(&mut self, from: NodeId) -> SeqNo {
        let seq = self.seqs.entry(from).or_insert(0);
        let current = *seq;
        *seq = seq.wrapping_add(1);
        current
    }

    fn deliver(&mut self, frame: InFlight) {
        self.deliveries += 1;
        if Some(frame.to) == self.observer {
            if let Ok(msg) = Message::decode(&frame.payload) {
                self.observed.push((frame.from, msg));
            }
            return;
        }

        let copies = if self.echo { 2 } else { 1 };
        for _ in 0..copies {
            self.handle(
                frame.to,
                NodeEvent::Received {
                    from: frame.from,
                    seq: frame.seq,
                    payload: &frame.payload,
                },
            );
        }
    }

    fn handle(&mut self, id: NodeId, event: NodeEvent<'_>) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let Action::Forward(out) = node.handle(event) else {
            return;
        };

        let payload = out.message.encode();
        for to in out.destinations() {
            let reachable = self.nodes.contains_key(&to) || Some(to) == self.observer;
            let notice = if reachable {
                let seq = self.next_seq(id);
                self.queue.push_back(InFlight {
                    from: id,
                    to,
                    seq,
                    payload: payload.clone(),
                });
                NodeEvent::Sent { to, retransmissions: 0 }
            } else {
                NodeEvent::TimedOut { to, retransmissions: 0 }
            };
            if let Some(node) = self.nodes.get_mut(&id) {
                node.handle(notice);
            }
        }
    }
}
