//! Seeded synthetic test signals.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::error::SignalError;

/// A sine trace sampled on a uniform grid, with optional Gaussian noise.
///
/// Sample `i` is `amplitude * sin(x_i / period_divisor + phase) + noise_i`, where
/// `x_i` runs linearly from 0 to `x_max` inclusive.
///
/// # Defaults
///
/// | Parameter        | Default    |
/// |------------------|------------|
/// | `x_max`          | `100 * PI` |
/// | `period_divisor` | 10         |
/// | `amplitude`      | 20         |
/// | `phase`          | 0          |
/// | `noise_std`      | 0          |
/// | `seed`           | 42         |
#[derive(Debug, Clone, PartialEq)]
pub struct SineWave {
    n_samples: usize,
    x_max: f64,
    period_divisor: f64,
    amplitude: f64,
    phase: f64,
    noise_std: f64,
    seed: u64,
}

impl SineWave {
    /// Create a sine generator producing `n_samples` samples.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SignalError::EmptySignal`] | `n_samples` is zero |
    pub fn new(n_samples: usize) -> Result<Self, SignalError> {
        if n_samples == 0 {
            return Err(SignalError::EmptySignal);
        }
        Ok(Self {
            n_samples,
            x_max: 100.0 * PI,
            period_divisor: 10.0,
            amplitude: 20.0,
            phase: 0.0,
            noise_std: 0.0,
            seed: 42,
        })
    }

    /// Set the end of the sampling grid.
    #[must_use]
    pub fn with_x_max(mut self, x_max: f64) -> Self {
        self.x_max = x_max;
        self
    }

    /// Set the divisor applied to the grid before the sine.
    #[must_use]
    pub fn with_period_divisor(mut self, period_divisor: f64) -> Self {
        self.period_divisor = period_divisor;
        self
    }

    /// Set the peak amplitude.
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Set the phase offset in radians.
    #[must_use]
    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    /// Set the standard deviation of additive Gaussian noise.
    #[must_use]
    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    /// Set the noise seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of samples produced.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Generate the samples.
    #[must_use]
    pub fn generate(&self) -> Vec<f64> {
        let step = if self.n_samples > 1 {
            self.x_max / (self.n_samples - 1) as f64
        } else {
            0.0
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        (0..self.n_samples)
            .map(|i| {
                let x = i as f64 * step;
                let clean = (x / self.period_divisor + self.phase).sin() * self.amplitude;
                if self.noise_std > 0.0 {
                    clean + self.noise_std * rng.sample::<f64, _>(StandardNormal)
                } else {
                    clean
                }
            })
            .collect()
    }
}

/// Generate `n_samples` of zero-mean Gaussian noise with standard deviation `std`.
#[must_use]
pub fn white_noise(n_samples: usize, std: f64, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n_samples)
        .map(|_| std * rng.sample::<f64, _>(StandardNormal))
        .collect()
}
