//! Chains running as tokio tasks over the in-process link.

use std::time::Duration;

use cycinc_fixed::Estimate;
use cycinc_link::{LinkConfig, Mesh};
use cycinc_model::FixedReading;
use cycinc_node::{run_chain, NodeRuntime, Observer, RunnerConfig};
use cycinc_protocols::{ChainConfig, ChainNode, Led, Phase};
use cycinc_topology::NodeId;
use tokio::sync::watch;

const READINGS: [i64; 3] = [128, 199, 128];

#[tokio::test]
async fn lossy_acks_do_not_change_the_outcome() {
    let config = ChainConfig {
        warmup_ms: 0,
        ..ChainConfig::default().with_chain_length(3)
    };
    let fx = config.fixed().unwrap();
    let mesh = Mesh::new(LinkConfig {
        ack_loss: 0.5,
        retry_interval: Duration::from_millis(1),
        seed: Some(42),
        max_retransmissions: config.max_retransmissions,
        ..LinkConfig::default()
    });

    let (stop, shutdown) = watch::channel(false);
    let observer = Observer::new(mesh.attach(NodeId(25)).unwrap(), fx, config.dedup_capacity);
    let watcher = tokio::spawn(observer.watch(shutdown.clone()));

    let mut tasks = Vec::new();
    for (id, reading) in config.chain().unwrap().ids().zip(READINGS) {
        let node = ChainNode::new(id, &config, FixedReading(reading), Led::default()).unwrap();
        let runtime = NodeRuntime::new(node, mesh.attach(id).unwrap());
        tasks.push(tokio::spawn(runtime.run(shutdown.clone())));
    }

    let report = tokio::time::timeout(Duration::from_secs(30), watcher)
        .await
        .expect("chain did not converge in time")
        .unwrap();
    stop.send_replace(true);

    // Same result as the lossless deterministic run
    let converged = report.converged.unwrap();
    assert_eq!(converged.iteration, 56);
    assert_eq!(converged.estimate, Estimate::from_raw([15360, 10896, 3637]));
    // Observer copies travel on their own task and may overtake each other
    assert!(report.messages <= 57);
    assert_eq!(report.last_iteration, Some(56));

    let mut duplicates = 0;
    for task in tasks {
        let node = task.await.unwrap();
        duplicates += node.stats.duplicates;
    }
    assert!(duplicates + report.duplicates > 0, "ack loss should cause retransmissions");
}

#[tokio::test]
async fn runner_converges_on_simulated_light() {
    let config = RunnerConfig {
        chain: ChainConfig {
            warmup_ms: 10,
            ..ChainConfig::default()
        },
        ack_loss: 0.2,
        seed: 7,
        retry_interval: Duration::from_millis(1),
        timeout: Duration::from_secs(60),
        ..RunnerConfig::default()
    };

    let report = run_chain(config).await.unwrap();
    let converged = report.converged().expect("observer saw CONVERGED");
    assert!(converged.iteration < 500);
    assert_eq!(report.nodes.len(), 9);
    assert!(report.nodes.iter().any(|n| n.phase == Phase::Converged));
}
