//! Random distributions and the sampler seam.

use qn_core::SimRng;

/// A distribution over non-negative durations.  Parameters are in the
/// owning station's time base.
#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    Fixed(f64),
    Exponential { mean: f64 },
    Uniform { low: f64, high: f64 },
    Triangular { low: f64, mode: f64, high: f64 },
    /// Sum of `k` exponentials with overall mean `mean`.
    Erlang { k: u32, mean: f64 },
}

impl Distribution {
    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Fixed(v) => v,
            Distribution::Exponential { mean } => mean,
            Distribution::Uniform { low, high } => (low + high) / 2.0,
            Distribution::Triangular { low, mode, high } => (low + mode + high) / 3.0,
            Distribution::Erlang { mean, .. } => mean,
        }
    }
}

/// Draws values from a [`Distribution`].
///
/// Implementations must return finite values `>= 0`.
pub trait Sampler {
    fn sample(&mut self, dist: &Distribution) -> f64;
}

/// Inverse-transform sampler over the replication's [`SimRng`].
pub struct RngSampler {
    rng: SimRng,
}

impl RngSampler {
    pub fn new(rng: SimRng) -> Self {
        Self { rng }
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        // unit() is in [0, 1) so 1 - u is never zero.
        -mean * (1.0 - self.rng.unit()).ln()
    }
}

impl Sampler for RngSampler {
    fn sample(&mut self, dist: &Distribution) -> f64 {
        let v = match *dist {
            Distribution::Fixed(v) => v,
            Distribution::Exponential { mean } => self.exponential(mean),
            Distribution::Uniform { low, high } => low + (high - low) * self.rng.unit(),
            Distribution::Triangular { low, mode, high } => {
                let span = high - low;
                if span <= 0.0 {
                    low
                } else {
                    let u = self.rng.unit();
                    let cut = (mode - low) / span;
                    if u < cut {
                        low + (u * span * (mode - low)).sqrt()
                    } else {
                        high - ((1.0 - u) * span * (high - mode)).sqrt()
                    }
                }
            }
            Distribution::Erlang { k, mean } => {
                let k = k.max(1);
                let phase = mean / k as f64;
                (0..k).map(|_| self.exponential(phase)).sum()
            }
        };
        if v.is_finite() { v.max(0.0) } else { 0.0 }
    }
}
