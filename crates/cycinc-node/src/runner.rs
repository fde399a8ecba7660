//! Whole-chain simulation: every node plus the observer as tokio tasks on
//! one in-process mesh.

use std::time::{Duration, Instant};

use cycinc_link::{LinkConfig, Mesh};
use cycinc_model::LightSource;
use cycinc_protocols::{ChainConfig, ChainNode, Led, Message};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};
use crate::observer::{Observer, ObserverReport};
use crate::runtime::{NodeReport, NodeRuntime};

/// Simulation knobs on top of the chain configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub chain: ChainConfig,
    /// Simulated light source position, whole units
    pub light: [f64; 3],
    /// Uniform reading noise amplitude, sensor units
    pub noise: f64,
    /// Probability a link acknowledgment is lost
    pub ack_loss: f64,
    /// Seed for noise and loss
    pub seed: u64,
    /// Give up if the observer has not seen CONVERGED by then
    pub timeout: Duration,
    /// Wait between link retransmissions
    pub retry_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            light: [40.0, 35.0, 30.0],
            noise: 0.0,
            ack_loss: 0.0,
            seed: 0,
            timeout: Duration::from_secs(60),
            retry_interval: Duration::from_millis(10),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| NodeError::Env { var, value }),
        Err(_) => Ok(None),
    }
}

impl RunnerConfig {
    /// Chain configuration via `CYCINC_CONFIG`, simulation knobs from their
    /// own variables, defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            chain: ChainConfig::from_env()?,
            ..Self::default()
        };

        if let Ok(value) = std::env::var("CYCINC_LIGHT") {
            let parts: Vec<f64> = value
                .split(',')
                .map(|p| p.trim().parse())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| NodeError::Env {
                    var: "CYCINC_LIGHT",
                    value: value.clone(),
                })?;
            config.light = parts.try_into().map_err(|_| NodeError::Env {
                var: "CYCINC_LIGHT",
                value,
            })?;
        }
        if let Some(noise) = env_parse("CYCINC_NOISE")? {
            config.noise = noise;
        }
        if let Some(ack_loss) = env_parse("CYCINC_ACK_LOSS")? {
            config.ack_loss = ack_loss;
        }
        if let Some(seed) = env_parse("CYCINC_SEED")? {
            config.seed = seed;
        }
        if let Some(secs) = env_parse::<u64>("CYCINC_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Outcome of a chain run.
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub observer: ObserverReport,
    pub nodes: Vec<NodeReport>,
    pub elapsed: Duration,
}

impl ChainReport {
    /// The CONVERGED message the observer saw first.
    pub fn converged(&self) -> Option<&Message> {
        self.observer.converged.as_ref()
    }
}

/// Run one chain to convergence or timeout.
pub async fn run_chain(config: RunnerConfig) -> Result<ChainReport> {
    let chain_config = &config.chain;
    chain_config.validate()?;
    let observer_id = chain_config.observer.ok_or(NodeError::NoObserver)?;
    let fx = chain_config.fixed()?;
    let chain = chain_config.chain()?;

    let mesh = Mesh::new(LinkConfig {
        max_retransmissions: chain_config.max_retransmissions,
        retry_interval: config.retry_interval,
        ack_loss: config.ack_loss,
        seed: Some(config.seed),
        ..LinkConfig::default()
    });
    let (stop, shutdown) = watch::channel(false);
    let started = Instant::now();

    let observer = Observer::new(mesh.attach(observer_id)?, fx, chain_config.dedup_capacity);
    let mut observer_task = tokio::spawn(observer.watch(shutdown.clone()));

    let mut node_tasks = Vec::with_capacity(chain.len());
    for id in chain.ids() {
        let cell = chain.coord(id)?;
        let spacing = chain.spacing() as f64;
        let position = [cell.col as f64 * spacing, cell.row as f64 * spacing, 0.0];
        let model = chain_config.model;
        let mut sensor = LightSource::new(config.light, position, model.a as f64, model.b as f64, model.c as f64);
        if config.noise > 0.0 {
            sensor = sensor.with_noise(config.seed ^ u64::from(id.value()), config.noise);
        }
        debug!(node = %id, reading = sensor.ideal(), "simulated sensor");

        let node = ChainNode::new(id, chain_config, sensor, Led::default())?;
        let runtime = NodeRuntime::new(node, mesh.attach(id)?);
        node_tasks.push(tokio::spawn(runtime.run(shutdown.clone())));
    }
    info!(nodes = node_tasks.len(), observer = %observer_id, light = ?config.light, "chain running");

    let observer_report = match tokio::time::timeout(config.timeout, &mut observer_task).await {
        Ok(joined) => joined?,
        Err(_) => {
            warn!(timeout = ?config.timeout, "no convergence before timeout");
            stop.send_replace(true);
            observer_task.await?
        }
    };
    stop.send_replace(true);

    let mut nodes = Vec::with_capacity(node_tasks.len());
    for task in node_tasks {
        nodes.push(task.await?);
    }

    Ok(ChainReport {
        observer: observer_report,
        nodes,
        elapsed: started.elapsed(),
    })
}
