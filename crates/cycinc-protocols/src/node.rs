//! Chain Node - the single per-node message handler.
//!
//! Link-layer callbacks arrive as [`NodeEvent`]s. Each event is handled to
//! completion by [`ChainNode::handle`], which returns the [`Action`] the
//! runtime must hand to the delivery collaborator. All mutable node state
//! lives in [`NodeState`] and is only touched inside `handle`.
//!
//! # Receive Path
//!
//! 1. Duplicate check against the link sequence number
//! 2. Decode and validate the payload, including the coordinate range
//! 3. Processing gate
//! 4. Convergence monitor update
//! 5. Phase decision: gradient step or converge
//! 6. Relay to the next hop and the observer

use std::iter;

use cycinc_consensus::{cycles_remaining, ConvergenceCriteria, ConvergenceMonitor};
use cycinc_fixed::{FixedPoint, Scaled};
use cycinc_model::{calibrate_offset, GradientStepEngine, LocalModel, Sensor};
use cycinc_topology::NodeId;
use tracing::{debug, error, info, trace, warn};

use crate::bootstrap::ChainBootstrap;
use crate::config::ChainConfig;
use crate::dedup::{DedupCache, SeqNo};
use crate::error::Result;
use crate::message::{Message, Phase};
use crate::phase::{Decision, PhaseController};

/// Visual status output: on once the node has converged.
pub trait StatusIndicator {
    /// Switch the indicator.
    fn set_converged(&mut self, on: bool);
}

/// An in-memory indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Led {
    on: bool,
}

impl Led {
    /// Current state.
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl StatusIndicator for Led {
    fn set_converged(&mut self, on: bool) {
        self.on = on;
    }
}

/// Inputs to the node handler.
#[derive(Debug, Clone, Copy)]
pub enum NodeEvent<'a> {
    /// Warm-up (and trigger, if required) done; only meaningful on the origin.
    Start,
    /// A payload arrived from the link layer.
    Received {
        from: NodeId,
        seq: SeqNo,
        payload: &'a [u8],
    },
    /// The link layer confirmed delivery.
    Sent { to: NodeId, retransmissions: u8 },
    /// The link layer gave up after its retries.
    TimedOut { to: NodeId, retransmissions: u8 },
}

/// A message and where to send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    pub message: Message,
    pub next_hop: NodeId,
    pub observer: Option<NodeId>,
}

impl Outbound {
    /// Every destination, observer copy first.
    pub fn destinations(&self) -> impl Iterator<Item = NodeId> {
        self.observer.into_iter().chain(iter::once(self.next_hop))
    }
}

/// What the runtime must do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to send.
    None,
    /// Send the message to each destination.
    Forward(Outbound),
}

impl Action {
    /// The outbound message, if any.
    pub fn outbound(&self) -> Option<&Outbound> {
        match self {
            Self::Forward(out) => Some(out),
            Self::None => None,
        }
    }
}

/// Counters for everything the handler saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub decode_errors: u64,
    pub gated: u64,
    pub sent: u64,
    pub timeouts: u64,
}

/// All mutable per-node state.
#[derive(Debug, Clone)]
pub struct NodeState {
    phase: Phase,
    cycle: u64,
    monitor: ConvergenceMonitor,
    dedup: DedupCache,
    last_sent: Option<Message>,
    started: bool,
}

impl NodeState {
    /// Fresh state at power-up.
    pub fn new(criteria: ConvergenceCriteria, dedup_capacity: usize) -> Self {
        Self {
            phase: Phase::Running,
            cycle: 0,
            monitor: ConvergenceMonitor::new(criteria),
            dedup: DedupCache::new(dedup_capacity),
            last_sent: None,
            started: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Cycles processed so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Convergence monitor.
    pub fn monitor(&self) -> &ConvergenceMonitor {
        &self.monitor
    }

    /// Duplicate cache.
    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    /// Last relayed message.
    pub fn last_sent(&self) -> Option<&Message> {
        self.last_sent.as_ref()
    }
}

/// One device in the chain.
pub struct ChainNode<S, L> {
    id: NodeId,
    next_hop: NodeId,
    observer: Option<NodeId>,
    fx: FixedPoint,
    limit: Scaled,
    controller: PhaseController,
    engine: GradientStepEngine,
    bootstrap: Option<ChainBootstrap>,
    state: NodeState,
    stats: NodeStats,
    sensor: S,
    indicator: L,
}

impl<S: Sensor, L: StatusIndicator> ChainNode<S, L> {
    /// Build node `id` from a validated configuration.
    ///
    /// When calibration is configured, the sensor is sampled here to replace
    /// model constant `C`.
    pub fn new(id: NodeId, config: &ChainConfig, mut sensor: S, indicator: L) -> Result<Self> {
        config.validate()?;
        let fx = config.fixed()?;
        let chain = config.chain()?;
        let anchor = chain.anchor(id, &fx)?;
        let next_hop = chain.next_hop(id)?;

        let mut params = config.model_params(&fx);
        if config.calibration_samples > 0 {
            let c = calibrate_offset(&mut sensor, config.calibration_samples, &fx)?;
            info!(node = %id, c = fx.to_f64(c), "calibrated ambient offset");
            params = params.with_offset(c);
        }

        let mut engine = GradientStepEngine::new(LocalModel::new(fx, anchor, params));
        if let Some(bbox) = config.bounding_box(&fx)? {
            engine = engine.with_clamp(bbox);
        }

        let bootstrap = (id == config.origin).then(|| ChainBootstrap::from_config(config, &fx));

        debug!(node = %id, %next_hop, anchor = %anchor, origin = bootstrap.is_some(), "node configured");

        Ok(Self {
            id,
            next_hop,
            observer: config.observer,
            fx,
            limit: config.estimate_limit(&fx),
            controller: PhaseController::new(config.gate, config.max_iter),
            engine,
            bootstrap,
            state: NodeState::new(config.criteria(), config.dedup_capacity),
            stats: NodeStats::default(),
            sensor,
            indicator,
        })
    }

    /// Handle one event to completion.
    pub fn handle(&mut self, event: NodeEvent<'_>) -> Action {
        match event {
            NodeEvent::Start => self.on_start(),
            NodeEvent::Received { from, seq, payload } => self.on_receive(from, seq, payload),
            NodeEvent::Sent { to, retransmissions } => {
                self.stats.sent += 1;
                debug!(node = %self.id, %to, retransmissions, "delivered");
                Action::None
            }
            NodeEvent::TimedOut { to, retransmissions } => {
                self.stats.timeouts += 1;
                warn!(node = %self.id, %to, retransmissions, "delivery timed out");
                Action::None
            }
        }
    }

    fn on_start(&mut self) -> Action {
        let Some(plan) = self.bootstrap else {
            trace!(node = %self.id, "start ignored: not the origin");
            return Action::None;
        };
        if self.state.started {
            trace!(node = %self.id, "start ignored: already started");
            return Action::None;
        }
        self.state.started = true;

        let message = plan.cycle_zero();
        info!(node = %self.id, estimate = %message.estimate, "starting chain");
        self.relay(message)
    }

    fn on_receive(&mut self, from: NodeId, seq: SeqNo, payload: &[u8]) -> Action {
        if !self.state.dedup.admit(from, seq).is_new() {
            self.stats.duplicates += 1;
            trace!(node = %self.id, %from, seq, "duplicate dropped");
            return Action::None;
        }

        let inbound = match Message::decode_within(payload, self.limit) {
            Ok(msg) => msg,
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!(node = %self.id, %from, error = %e, "discarding malformed message");
                return Action::None;
            }
        };

        if !self.controller.admits(self.state.phase, &self.state.monitor) {
            self.stats.gated += 1;
            debug!(
                node = %self.id,
                phase = %self.state.phase,
                streak = self.state.monitor.streak(),
                iteration = inbound.iteration,
                "gate closed, message absorbed"
            );
            return Action::None;
        }
        self.stats.accepted += 1;

        let obs = self.state.monitor.observe(&inbound.estimate, self.state.cycle);
        trace!(
            node = %self.id,
            iteration = inbound.iteration,
            delta_squared = %obs.delta_squared,
            streak = obs.streak,
            remaining = cycles_remaining(obs.streak, self.state.monitor.criteria().threshold),
            "observed"
        );

        let iteration = inbound.iteration.saturating_add(1);
        let outbound = match self.controller.decide(&self.state.monitor, &inbound) {
            Decision::Converge(reason) => {
                self.state.phase = Phase::Converged;
                self.indicator.set_converged(true);
                info!(
                    node = %self.id,
                    %reason,
                    iteration = inbound.iteration,
                    estimate = ?inbound.estimate.to_f64(&self.fx),
                    "converged"
                );
                Message::converged(iteration, inbound.estimate)
            }
            Decision::Step => {
                self.indicator.set_converged(false);
                let next = match self.engine.step(&inbound.estimate, &mut self.sensor) {
                    Ok(next) => next,
                    Err(e) => {
                        // Unreachable with a validated config; keep the chain moving
                        error!(node = %self.id, error = %e, "gradient step failed, relaying unchanged");
                        inbound.estimate
                    }
                };
                let next = if next.within(self.limit) {
                    next
                } else {
                    warn!(node = %self.id, estimate = %next, "step left the coordinate range, clamping");
                    next.clamp_magnitude(self.limit)
                };
                Message::running(iteration, next)
            }
        };

        let action = self.relay(outbound);
        self.state.cycle += 1;
        action
    }

    fn relay(&mut self, message: Message) -> Action {
        self.state.last_sent = Some(message);
        Action::Forward(Outbound {
            message,
            next_hop: self.next_hop,
            observer: self.observer,
        })
    }

    /// This node's identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Downstream neighbor.
    pub fn next_hop(&self) -> NodeId {
        self.next_hop
    }

    /// Whether this node starts the chain.
    pub fn is_origin(&self) -> bool {
        self.bootstrap.is_some()
    }

    /// Bootstrap plan, on the origin only.
    pub fn bootstrap(&self) -> Option<&ChainBootstrap> {
        self.bootstrap.as_ref()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Full node state.
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Event counters.
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// Status indicator.
    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    /// Fixed-point context.
    pub fn fixed(&self) -> &FixedPoint {
        &self.fx
    }
}

impl<S, L> std::fmt::Debug for ChainNode<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainNode")
            .field("id", &self.id)
            .field("next_hop", &self.next_hop)
            .field("phase", &self.state.phase)
            .field("cycle", &self.state.cycle)
            .field("streak", &self.state.monitor.streak())
            .finish()
    }
}
