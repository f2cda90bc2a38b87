//! Seeded random stream
//!
//! One instance per run. Every stochastic choice in the simulation (labels,
//! positions, confidences, inter-arrival times, link jitter and loss) draws
//! from it in call order, so a seed plus a configuration fully determines a run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};

pub struct RandomStream {
    rng: StdRng,
    seed: u64,
    draws: u64,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            draws: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of samples taken so far
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Normal sample clamped to [0, 1]
    pub fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        self.draws += 1;
        let value = match Normal::new(mean, std_dev) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => mean,
        };
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, 1.0)
    }

    /// Exponential sample with the given mean; a non-positive mean yields 0
    pub fn exponential(&mut self, mean: f64) -> f64 {
        if !(mean.is_finite() && mean > 0.0) {
            return 0.0;
        }
        self.draws += 1;
        match Exp::new(1.0 / mean) {
            Ok(exp) => exp.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.draws += 1;
        self.rng.gen::<f64>() < p
    }

    /// Sample from [lo, hi); an empty range collapses to `lo`
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if !(hi > lo) {
            return lo;
        }
        self.draws += 1;
        self.rng.gen_range(lo..hi)
    }
}
