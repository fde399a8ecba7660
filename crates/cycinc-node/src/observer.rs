//! Passive observer: receives a copy of every relayed message.

use cycinc_fixed::FixedPoint;
use cycinc_link::Endpoint;
use cycinc_protocols::{DedupCache, Message};
use tokio::sync::watch;
use tracing::{info, trace, warn};

/// What the observer saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverReport {
    /// Distinct messages received
    pub messages: u64,
    /// Retransmitted copies dropped
    pub duplicates: u64,
    /// Payloads that failed to decode
    pub decode_errors: u64,
    /// Highest iteration seen
    pub last_iteration: Option<u16>,
    /// First CONVERGED message, if any
    pub converged: Option<Message>,
}

/// Logs chain traffic until the first CONVERGED message.
pub struct Observer {
    endpoint: Endpoint,
    fx: FixedPoint,
    dedup: DedupCache,
}

impl Observer {
    /// Watch traffic arriving at `endpoint`.
    pub fn new(endpoint: Endpoint, fx: FixedPoint, dedup_capacity: usize) -> Self {
        Self {
            endpoint,
            fx,
            dedup: DedupCache::new(dedup_capacity),
        }
    }

    /// Run until a CONVERGED message arrives or `shutdown` flips.
    pub async fn watch(mut self, mut shutdown: watch::Receiver<bool>) -> ObserverReport {
        let mut report = ObserverReport::default();
        loop {
            let frame = tokio::select! {
                frame = self.endpoint.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = shutdown.changed() => break,
            };

            if !self.dedup.admit(frame.from, frame.seq).is_new() {
                report.duplicates += 1;
                continue;
            }
            let msg = match Message::decode(&frame.payload) {
                Ok(msg) => msg,
                Err(e) => {
                    report.decode_errors += 1;
                    warn!(from = %frame.from, error = %e, "observer got malformed message");
                    continue;
                }
            };

            report.messages += 1;
            report.last_iteration = Some(msg.iteration);
            trace!(
                from = %frame.from,
                phase = %msg.phase,
                iteration = msg.iteration,
                estimate = ?msg.estimate.to_f64(&self.fx),
                "observed"
            );

            if msg.phase.is_converged() {
                info!(
                    from = %frame.from,
                    iteration = msg.iteration,
                    estimate = ?msg.estimate.to_f64(&self.fx),
                    "chain converged"
                );
                report.converged = Some(msg);
                break;
            }
        }
        report
    }
}
