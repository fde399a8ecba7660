//! Chain runner binary
//!
//! Simulates a full cyclic incremental chain in one process and reports the
//! converged estimate.

use cycinc_node::{run_chain, RunnerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cycinc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RunnerConfig::from_env()?;
    let fx = config.chain.fixed()?;
    tracing::info!(
        nodes = config.chain.chain_length,
        gate = ?config.chain.gate,
        ack_loss = config.ack_loss,
        "Starting cycinc chain"
    );

    let report = run_chain(config).await?;
    for node in &report.nodes {
        tracing::info!(
            node = %node.id,
            phase = %node.phase,
            cycles = node.cycles,
            duplicates = node.stats.duplicates,
            timeouts = node.stats.timeouts,
            "node finished"
        );
    }

    match report.converged() {
        Some(msg) => {
            tracing::info!(
                iteration = msg.iteration,
                estimate = ?msg.estimate.to_f64(&fx),
                elapsed = ?report.elapsed,
                "Chain converged"
            );
            Ok(())
        }
        None => Err(format!("no convergence after {:?}", report.elapsed).into()),
    }
}
