//! Origin-node start of cycle 0.

use std::time::Duration;

use cycinc_fixed::{Estimate, FixedPoint};
use cycinc_topology::NodeId;

use crate::config::ChainConfig;
use crate::message::Message;

/// How the designated origin starts the chain.
///
/// The runtime waits out [`warmup`](Self::warmup), then the manual trigger if
/// [`requires_trigger`](Self::requires_trigger), and then delivers
/// `NodeEvent::Start` to the origin's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainBootstrap {
    origin: NodeId,
    start: Estimate,
    warmup: Duration,
    require_trigger: bool,
}

impl ChainBootstrap {
    /// Create a bootstrap plan.
    pub fn new(origin: NodeId, start: Estimate, warmup: Duration, require_trigger: bool) -> Self {
        Self {
            origin,
            start,
            warmup,
            require_trigger,
        }
    }

    /// Plan described by a configuration.
    pub fn from_config(config: &ChainConfig, fx: &FixedPoint) -> Self {
        Self::new(
            config.origin,
            config.start_estimate(fx),
            Duration::from_millis(config.warmup_ms),
            config.require_trigger,
        )
    }

    /// The origin node.
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// Delay between power-up and the first transmission.
    pub fn warmup(&self) -> Duration {
        self.warmup
    }

    /// Whether the origin also waits for a manual trigger.
    pub fn requires_trigger(&self) -> bool {
        self.require_trigger
    }

    /// The cycle-0 message.
    pub fn cycle_zero(&self) -> Message {
        Message::running(0, self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Phase;

    #[test]
    fn canonical_cycle_zero() {
        let config = ChainConfig::default();
        let fx = config.fixed().unwrap();
        let plan = ChainBootstrap::from_config(&config, &fx);

        assert_eq!(plan.origin(), NodeId(10));
        assert_eq!(plan.warmup(), Duration::from_secs(2));
        assert!(!plan.requires_trigger());

        let msg = plan.cycle_zero();
        assert_eq!(msg.phase, Phase::Running);
        assert_eq!(msg.iteration, 0);
        assert_eq!(msg.estimate, Estimate::from_ints(&fx, [30, 30, 10]));
    }
}
