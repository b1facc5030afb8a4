//! Discrete Gaussian sampling
//!
//! Error terms for key generation and encryption. The sampler holds only the
//! distribution; randomness comes from the caller so that key generation can
//! run off a seeded ChaCha20 stream and encryption off the thread CSPRNG.

use rand::Rng;

/// Default Gaussian standard deviation
pub const DEFAULT_SIGMA: f64 = 3.2;

/// Tail cut in standard deviations
pub const TAILCUT_SIGMAS: f64 = 6.0;

/// Discrete Gaussian sampler over Z using rejection sampling
#[derive(Debug, Clone, Copy)]
pub struct GaussianSampler {
    /// Standard deviation σ
    sigma: f64,
    /// Samples are confined to [-tailcut, tailcut]
    tailcut: i64,
}

impl GaussianSampler {
    /// Create a new Gaussian sampler with given standard deviation
    pub fn new(sigma: f64) -> Self {
        let tailcut = (sigma * TAILCUT_SIGMAS).ceil() as i64;
        Self { sigma, tailcut }
    }

    /// Get the standard deviation
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Largest magnitude a sample can take
    pub fn tailcut(&self) -> i64 {
        self.tailcut
    }

    /// Sample a single value from the discrete Gaussian D_σ
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let sigma_sq_2 = 2.0 * self.sigma * self.sigma;
        let bound = self.tailcut;

        loop {
            let x = rng.gen_range(-bound..=bound);

            // Accept with probability exp(-x²/(2σ²))
            let prob = (-((x * x) as f64) / sigma_sq_2).exp();
            let u: f64 = rng.gen();
            if u < prob {
                return x;
            }
        }
    }

    /// Sample a vector of Gaussian values
    pub fn sample_vec<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Vec<i64> {
        (0..len).map(|_| self.sample(rng)).collect()
    }
}

impl Default for GaussianSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SIGMA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::HashMap;

    #[test]
    fn test_tailcut_bounds() {
        let sampler = GaussianSampler::default();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let bound = (6.0 * DEFAULT_SIGMA).ceil() as i64;
        assert_eq!(sampler.tailcut(), bound);

        for _ in 0..100_000 {
            let s = sampler.sample(&mut rng);
            assert!(s.abs() <= bound, "Sample {} exceeds 6σ bound of {}", s, bound);
        }
    }

    #[test]
    fn test_deterministic_seeding() {
        let sampler = GaussianSampler::default();
        let mut rng1 = ChaCha20Rng::seed_from_u64(12345);
        let mut rng2 = ChaCha20Rng::seed_from_u64(12345);

        assert_eq!(
            sampler.sample_vec(100, &mut rng1),
            sampler.sample_vec(100, &mut rng2)
        );
    }

    #[test]
    fn test_distribution_moments() {
        let sampler = GaussianSampler::default();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let n = 100_000;

        let samples = sampler.sample_vec(n, &mut rng);
        let mean: f64 = samples.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
        let variance: f64 = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;

        assert!(mean.abs() < 0.1, "Mean {} is too far from 0", mean);

        let expected = DEFAULT_SIGMA * DEFAULT_SIGMA;
        let relative_error = (variance - expected).abs() / expected;
        assert!(
            relative_error < 0.1,
            "Variance {} differs from expected {} by {:.1}%",
            variance,
            expected,
            relative_error * 100.0
        );
    }

    #[test]
    fn test_distribution_shape() {
        let sampler = GaussianSampler::default();
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        let mut histogram: HashMap<i64, usize> = HashMap::new();
        for _ in 0..100_000 {
            *histogram.entry(sampler.sample(&mut rng)).or_insert(0) += 1;
        }

        let count = |v: i64| histogram.get(&v).copied().unwrap_or(0);
        assert!(count(0) > count(5) + count(-5));
        assert!(count(5) + count(-5) > count(10) + count(-10));
    }
}
