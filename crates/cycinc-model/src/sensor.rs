//! Sensor collaborator and stand-in sensors.

use cycinc_fixed::{FixedPoint, Scaled};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ModelError, Result};

/// Source of raw scalar readings, one per call.
pub trait Sensor {
    /// Take one sample in raw sensor units.
    fn read(&mut self) -> i64;
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn read(&mut self) -> i64 {
        (**self).read()
    }
}

/// A sensor that always reports the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReading(pub i64);

impl Sensor for FixedReading {
    fn read(&mut self) -> i64 {
        self.0
    }
}

/// Simulated light sensor: reports what a point source at `source` produces
/// at `position`, per the unscaled model `A / (d^2 + B) + C`.
#[derive(Debug, Clone)]
pub struct LightSource {
    reading: f64,
    noise: Option<(StdRng, f64)>,
}

impl LightSource {
    /// Sensor at `position` observing a source at `source`.
    pub fn new(source: [f64; 3], position: [f64; 3], a: f64, b: f64, c: f64) -> Self {
        let d2: f64 = source
            .iter()
            .zip(position.iter())
            .map(|(s, p)| (s - p) * (s - p))
            .sum();
        Self {
            reading: a / (d2 + b) + c,
            noise: None,
        }
    }

    /// Add uniform noise of up to `amplitude` sensor units per sample.
    #[must_use]
    pub fn with_noise(mut self, seed: u64, amplitude: f64) -> Self {
        self.noise = Some((StdRng::seed_from_u64(seed), amplitude));
        self
    }

    /// Noise-free reading.
    pub fn ideal(&self) -> f64 {
        self.reading
    }
}

impl Sensor for LightSource {
    fn read(&mut self) -> i64 {
        let jitter = match &mut self.noise {
            Some((rng, amplitude)) if *amplitude > 0.0 => rng.gen_range(-*amplitude..=*amplitude),
            _ => 0.0,
        };
        (self.reading + jitter).round() as i64
    }
}

/// Average `samples` readings and scale the mean, for use as model constant `C`.
pub fn calibrate_offset<S: Sensor + ?Sized>(sensor: &mut S, samples: u32, fx: &FixedPoint) -> Result<Scaled> {
    if samples == 0 {
        return Err(ModelError::NoSamples);
    }
    let total: i64 = (0..samples).map(|_| sensor.read()).sum();
    Ok(fx.from_int(total / i64::from(samples)))
}
