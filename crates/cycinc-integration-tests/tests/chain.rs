//! End-to-end runs of a three-node chain with fixed sensor readings.

use bytes::Bytes;
use cycinc_consensus::GatePolicy;
use cycinc_fixed::Estimate;
use cycinc_integration_tests::SyncChain;
use cycinc_protocols::{ChainConfig, Message, Phase};
use cycinc_topology::NodeId;
use proptest::prelude::*;

const READINGS: [i64; 3] = [128, 199, 128];

fn config() -> ChainConfig {
    ChainConfig::default().with_chain_length(3)
}

fn run(config: &ChainConfig) -> SyncChain {
    let mut chain = SyncChain::new(config, &READINGS).unwrap();
    chain.start();
    chain.run(10_000);
    chain
}

#[test]
fn three_node_chain_converges_and_stops() {
    let chain = run(&config());
    assert_eq!(chain.in_flight(), 0, "traffic must die out after convergence");

    let (from, first) = chain.observed()[0];
    assert_eq!(from, NodeId(10));
    assert_eq!(first.iteration, 0);
    assert_eq!(first.phase, Phase::Running);

    let (from, converged) = *chain.first_converged().unwrap();
    assert_eq!(from, NodeId(12));
    assert_eq!(converged.iteration, 56);
    assert_eq!(converged.estimate, Estimate::from_raw([15360, 10896, 3637]));

    // The terminal message goes around exactly once, unchanged
    let tail: Vec<_> = chain
        .observed()
        .iter()
        .filter(|(_, m)| m.phase.is_converged())
        .map(|(from, m)| (*from, m.iteration))
        .collect();
    assert_eq!(tail, vec![(NodeId(12), 56), (NodeId(10), 57), (NodeId(11), 58)]);
    assert!(chain
        .observed()
        .iter()
        .filter(|(_, m)| m.phase.is_converged())
        .all(|(_, m)| m.estimate == converged.estimate));

    for node in chain.nodes() {
        assert_eq!(node.phase(), Phase::Converged, "{:?}", node);
        assert!(node.indicator().is_on());
    }
    assert_eq!(chain.node(NodeId(12)).unwrap().stats().gated, 1);
}

#[test]
fn observer_sees_every_iteration_in_order() {
    let chain = run(&config());
    let iterations: Vec<u16> = chain.observed().iter().map(|(_, m)| m.iteration).collect();
    assert_eq!(iterations, (0..=58).collect::<Vec<u16>>());
}

#[test]
fn duplicates_do_not_change_the_run() {
    let clean = run(&config());

    let mut echoed = SyncChain::new(&config(), &READINGS).unwrap().with_echo();
    echoed.start();
    echoed.run(10_000);

    assert_eq!(clean.observed(), echoed.observed());
    for node in echoed.nodes() {
        let stats = node.stats();
        assert_eq!(stats.duplicates, stats.accepted + stats.gated, "{:?}", node);
    }
}

#[test]
fn iteration_cap_ends_the_run() {
    let config = ChainConfig {
        max_iter: 20,
        ..config()
    };
    let chain = run(&config);
    let (from, converged) = *chain.first_converged().unwrap();
    assert_eq!(from, NodeId(10));
    assert_eq!(converged.iteration, 21);
    assert_eq!(converged.estimate, Estimate::from_raw([15360, 11024, 3679]));
    assert_eq!(chain.observed().last().map(|(_, m)| m.iteration), Some(23));
}

#[test]
fn zero_streak_gate_stalls_the_chain() {
    let config = ChainConfig {
        gate: GatePolicy::ZeroStreak,
        ..config()
    };
    let chain = run(&config);

    assert_eq!(chain.in_flight(), 0);
    assert!(chain.first_converged().is_none());
    assert_eq!(chain.observed().last().map(|(_, m)| m.iteration), Some(31));
    for node in chain.nodes() {
        assert_eq!(node.phase(), Phase::Running);
        assert!(!node.indicator().is_on());
    }
    let gated: u64 = chain.nodes().map(|n| n.stats().gated).sum();
    assert_eq!(gated, 1);
    assert_eq!(chain.node(NodeId(12)).unwrap().stats().gated, 1);
}

#[test]
fn garbage_on_the_wire_is_ignored() {
    let mut chain = SyncChain::new(&config(), &READINGS).unwrap();
    chain.inject(NodeId(12), NodeId(10), Bytes::from_static(b"\x50\x4f\x00"));
    chain.inject(NodeId(12), NodeId(10), Bytes::from(vec![0xAA; 28]));
    chain.start();
    chain.run(10_000);

    let origin = chain.node(NodeId(10)).unwrap();
    assert_eq!(origin.stats().decode_errors, 2);
    assert_eq!(chain.first_converged().map(|(_, m)| m.iteration), Some(56));
}

#[test]
fn converged_message_from_upstream_short_circuits() {
    let mut chain = SyncChain::new(&config(), &READINGS).unwrap();
    let done = Message::converged(3, Estimate::from_raw([1, 2, 3]));
    chain.inject(NodeId(10), NodeId(11), done.encode());
    chain.run(100);

    let observed: Vec<_> = chain.observed().iter().map(|(f, m)| (*f, m.iteration)).collect();
    assert_eq!(observed, vec![(NodeId(11), 4), (NodeId(12), 5), (NodeId(10), 6)]);
    assert!(chain.nodes().all(|n| n.phase() == Phase::Converged));
}

#[test]
fn runs_without_observer() {
    let config = ChainConfig {
        observer: None,
        ..config()
    };
    let chain = run(&config);
    assert!(chain.observed().is_empty());
    assert_eq!(chain.in_flight(), 0);
    assert!(chain.nodes().all(|n| n.phase() == Phase::Converged));
    assert!(chain.nodes().all(|n| n.stats().timeouts == 0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_cap_terminates_the_ring(max_iter in 1u16..120) {
        let config = ChainConfig { max_iter, ..config() };
        let chain = run(&config);

        prop_assert_eq!(chain.in_flight(), 0);
        prop_assert!(chain.nodes().all(|n| n.phase() == Phase::Converged));
        // Natural convergence leaves node 12 with inbound iteration 55
        let first = chain.first_converged().map(|(_, m)| m.iteration);
        prop_assert_eq!(first, Some(max_iter.min(55) + 1));
    }
}
