//! Chain configuration: every constant a node needs, loaded once at startup.

use std::path::Path;

use cycinc_consensus::{ConvergenceCriteria, GatePolicy, CONVERGENCE_THRESHOLD, DEFAULT_EPSILON};
use cycinc_fixed::{Estimate, FixedError, FixedPoint, Scaled};
use cycinc_model::{BoundingBox, ModelParams, CANONICAL_A, CANONICAL_B, CANONICAL_C, CANONICAL_STEP};
use cycinc_topology::{NodeId, TopologyError, TopologyTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dedup::DEFAULT_CAPACITY;
use crate::message::Iteration;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "CYCINC_CONFIG";

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not parse the configuration file.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Precision shift rejected.
    #[error("precision: {0}")]
    Fixed(#[from] FixedError),

    /// Topology table rejected.
    #[error("topology: {0}")]
    Topology(#[from] TopologyError),

    /// A value is outside its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Worst-case arithmetic for the configured ranges overflows 64 bits.
    #[error("constants overflow 64-bit arithmetic at {stage}")]
    Overflow { stage: &'static str },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Observation model constants in whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConstants {
    pub a: i64,
    pub b: i64,
    pub c: i64,
}

impl Default for ModelConstants {
    fn default() -> Self {
        Self {
            a: CANONICAL_A,
            b: CANONICAL_B,
            c: CANONICAL_C,
        }
    }
}

/// Everything fixed at initialization time for a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Precision shift `S`
    pub precision_shift: u32,
    /// Unscaled gradient step constant
    pub step: i64,
    /// Streak rule
    pub convergence: ConvergenceCriteria,
    /// Processing gate
    pub gate: GatePolicy,
    /// Observation model
    pub model: ModelConstants,
    /// Sensor samples averaged to calibrate `C` at startup; 0 keeps the configured `C`
    pub calibration_samples: u32,
    /// Clamp each new estimate to one grid cell around the deployment
    pub clamp: bool,
    /// Number of devices taking part, from the start of the table
    pub chain_length: usize,
    /// Iteration cap
    pub max_iter: Iteration,
    /// Senders remembered for duplicate suppression
    pub dedup_capacity: usize,
    /// Link-layer retransmissions per send
    pub max_retransmissions: u8,
    /// Identity to grid layout
    pub topology: TopologyTable,
    /// Device that receives a copy of every message
    pub observer: Option<NodeId>,
    /// Device that starts the chain
    pub origin: NodeId,
    /// Cycle-0 estimate in whole units
    pub start: [i64; 3],
    /// Delay before the origin may start, in milliseconds
    pub warmup_ms: u64,
    /// Origin waits for a manual trigger after warm-up
    pub require_trigger: bool,
    /// Largest coordinate magnitude, in whole units, the estimate may reach
    pub max_coordinate: i64,
    /// Largest raw sensor reading
    pub max_reading: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        let topology = TopologyTable::canonical();
        Self {
            precision_shift: 9,
            step: CANONICAL_STEP,
            convergence: ConvergenceCriteria {
                epsilon: DEFAULT_EPSILON,
                threshold: CONVERGENCE_THRESHOLD,
                warmup_cycles: 1,
            },
            gate: GatePolicy::UntilThreshold,
            model: ModelConstants::default(),
            calibration_samples: 0,
            clamp: false,
            chain_length: topology.len(),
            max_iter: 500,
            dedup_capacity: DEFAULT_CAPACITY,
            max_retransmissions: 4,
            origin: topology.start(),
            topology,
            observer: Some(NodeId(25)),
            start: [30, 30, 10],
            warmup_ms: 2000,
            require_trigger: false,
            max_coordinate: 1000,
            max_reading: 65_535,
        }
    }
}

impl ChainConfig {
    /// Load and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `CYCINC_CONFIG`, or fall back to the
    /// canonical deployment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path),
            Err(_) => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Canonical constants on a shorter chain.
    pub fn with_chain_length(mut self, len: usize) -> Self {
        self.chain_length = len;
        self
    }

    /// Fixed-point context.
    pub fn fixed(&self) -> Result<FixedPoint, ConfigError> {
        Ok(FixedPoint::new(self.precision_shift)?)
    }

    /// The participating part of the topology table.
    pub fn chain(&self) -> Result<TopologyTable, ConfigError> {
        Ok(self.topology.truncated(self.chain_length)?)
    }

    /// Scaled model constants.
    pub fn model_params(&self, fx: &FixedPoint) -> ModelParams {
        ModelParams::from_units(fx, self.model.a, self.model.b, self.model.c, self.step)
    }

    /// Scaled cycle-0 estimate.
    pub fn start_estimate(&self, fx: &FixedPoint) -> Estimate {
        Estimate::from_ints(fx, self.start)
    }

    /// Largest scaled coordinate magnitude an estimate may carry.
    pub fn estimate_limit(&self, fx: &FixedPoint) -> Scaled {
        fx.from_int(self.max_coordinate)
    }

    /// Clamp box, if enabled.
    pub fn bounding_box(&self, fx: &FixedPoint) -> Result<Option<BoundingBox>, ConfigError> {
        if !self.clamp {
            return Ok(None);
        }
        let chain = self.chain()?;
        let bounds = chain.bounds().ok_or(TopologyError::Empty)?;
        Ok(Some(BoundingBox::around(&bounds, chain.spacing(), fx)))
    }

    /// Check every constraint, including worst-case overflow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fx = self.fixed()?;
        self.topology.validate()?;

        if self.chain_length == 0 || self.chain_length > self.topology.len() {
            return Err(invalid(
                "chain_length",
                format!("{} not in 1..={}", self.chain_length, self.topology.len()),
            ));
        }
        let chain = self.chain()?;
        if !chain.contains(self.origin) {
            return Err(invalid("origin", format!("{} is not in the chain", self.origin)));
        }
        if let Some(observer) = self.observer {
            if chain.contains(observer) {
                return Err(invalid("observer", format!("{} is a chain member", observer)));
            }
        }
        if self.model.b < 1 {
            return Err(invalid("model.b", "must be at least 1"));
        }
        if self.convergence.epsilon < 0 {
            return Err(invalid("convergence.epsilon", "must not be negative"));
        }
        if self.convergence.threshold == 0 {
            return Err(invalid("convergence.threshold", "must be at least 1"));
        }
        if self.dedup_capacity == 0 {
            return Err(invalid("dedup_capacity", "must be at least 1"));
        }
        if self.max_coordinate <= 0 || self.max_reading < 0 {
            return Err(invalid("max_coordinate", "ranges must be positive"));
        }
        if self.start.iter().any(|v| v.abs() > self.max_coordinate) {
            return Err(invalid("start", "outside max_coordinate"));
        }
        let spacing = chain.spacing();
        for id in chain.ids() {
            let cell = chain.coord(id)?;
            if (cell.row * spacing).abs() > self.max_coordinate || (cell.col * spacing).abs() > self.max_coordinate {
                return Err(invalid("topology", format!("anchor of {} outside max_coordinate", id)));
            }
        }

        self.check_overflow(&fx)
    }

    /// Walk the gradient step with worst-case magnitudes and require every
    /// stored intermediate to fit in 64 bits.
    fn check_overflow(&self, fx: &FixedPoint) -> Result<(), ConfigError> {
        let shift = fx.shift();
        let fits = |v: i128, stage: &'static str| {
            if v.unsigned_abs() <= i64::MAX as u128 {
                Ok(v)
            } else {
                Err(ConfigError::Overflow { stage })
            }
        };
        let mul = |a: i128, b: i128, stage: &'static str| a.checked_mul(b).ok_or(ConfigError::Overflow { stage });
        let scale = |v: i64, stage: &'static str| fits(i128::from(v) << shift, stage);

        let a = scale(self.model.a, "model.a")?;
        let b = scale(self.model.b, "model.b")?;
        let c = scale(self.model.c, "model.c")?;
        let reading = scale(self.max_reading, "reading")?;
        let coord = scale(self.max_coordinate, "coordinate")?;

        // Estimate and anchor both within +/- max_coordinate
        let delta = 2 * coord;
        let norm = mul(mul(delta, delta, "squared norm")?, 3, "squared norm")?;
        let g_max = fits((norm >> shift) + b, "g")?;
        fits(mul(g_max, g_max, "g^2")? >> shift, "g^2")?;

        let f_max = fits((a << shift) / b + c, "f")?;
        let residual = fits(reading + f_max, "residual")?;
        let g_sq_min = (b * b) >> shift;
        if g_sq_min == 0 {
            return Err(ConfigError::Overflow { stage: "g^2 underflow" });
        }
        let ratio = fits(mul(a, residual, "ratio")? / g_sq_min, "ratio")?;
        let coef = fits(mul(i128::from(self.step) * 4, ratio, "step")? >> shift, "step")?;
        let correction = fits(mul(coef, delta, "correction")? >> shift, "correction")?;
        fits(correction + coord, "next estimate")?;
        Ok(())
    }

    /// Streak rule in force.
    pub fn criteria(&self) -> ConvergenceCriteria {
        self.convergence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn canonical_config_is_valid() {
        let config = ChainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain().unwrap().len(), 9);
        assert_eq!(config.origin, NodeId(10));
        assert_eq!(config.observer, Some(NodeId(25)));
    }

    #[test]
    fn derived_values() {
        let config = ChainConfig::default();
        let fx = config.fixed().unwrap();
        assert_eq!(config.start_estimate(&fx).raw(), [30 << 9, 30 << 9, 10 << 9]);
        let params = config.model_params(&fx);
        assert_eq!(params.b.raw(), 3 << 9);
        assert_eq!(params.step, 2);
        assert!(config.bounding_box(&fx).unwrap().is_none());
    }

    #[test]
    fn clamp_box_from_chain_extent() {
        let config = ChainConfig {
            clamp: true,
            ..ChainConfig::default().with_chain_length(3)
        };
        let fx = config.fixed().unwrap();
        let bbox = config.bounding_box(&fx).unwrap().unwrap();
        // First three devices all sit on row 0
        assert_eq!(bbox.max[1], fx.from_int(30));
        assert_eq!(bbox.max[0], fx.from_int(90));
    }

    #[test]
    fn rejects_zero_b() {
        let mut config = ChainConfig::default();
        config.model.b = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "model.b", .. })));
    }

    #[test]
    fn rejects_bad_chain_length() {
        let config = ChainConfig::default().with_chain_length(10);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "chain_length", .. })));
        let config = ChainConfig::default().with_chain_length(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_origin_outside_chain() {
        let config = ChainConfig {
            origin: NodeId(15),
            ..ChainConfig::default().with_chain_length(3)
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "origin", .. })));
    }

    #[test]
    fn rejects_observer_inside_chain() {
        let config = ChainConfig {
            observer: Some(NodeId(11)),
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "observer", .. })));
    }

    #[test]
    fn detects_overflow_at_startup() {
        let config = ChainConfig {
            precision_shift: 20,
            max_coordinate: 1_000_000,
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Overflow { .. })));
    }

    #[test]
    fn rejects_oversized_shift() {
        let config = ChainConfig {
            precision_shift: 40,
            ..ChainConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Fixed(_))));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{ "chain_length": 3, "gate": "zero_streak", "convergence": { "threshold": 5 } }"#;
        let config: ChainConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_length, 3);
        assert_eq!(config.gate, GatePolicy::ZeroStreak);
        assert_eq!(config.convergence.threshold, 5);
        assert_eq!(config.convergence.epsilon, 1);
        assert_eq!(config.max_iter, 500);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = ChainConfig::default().with_chain_length(4);
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = ChainConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(ChainConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }
}
