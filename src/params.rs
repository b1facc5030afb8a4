//! Scheme parameter sets for encrypted tallying
//!
//! A parameter set fixes the ring, the coefficient-modulus chain, the
//! fixed-point scale and the capacity of one accumulator epoch. The checks in
//! [`SchemeParameters::validate`] need nothing but the numbers themselves;
//! the checks that depend on the concrete primes (existence, wrap-around
//! bound) run when a [`CryptoContext`](crate::context::CryptoContext) is built.

use serde::{Deserialize, Serialize};

use crate::error::{param_err, Result};
use crate::math::gaussian::DEFAULT_SIGMA;

/// Smallest supported ring dimension
pub const MIN_POLY_DEGREE: usize = 4096;
/// Largest supported ring dimension
pub const MAX_POLY_DEGREE: usize = 32768;
/// Smallest prime bit length in the chain
pub const MIN_PRIME_BITS: usize = 20;
/// Largest prime bit length in the chain
pub const MAX_PRIME_BITS: usize = 60;
/// `max_value·scale` must stay below `2^MAX_ENCODED_BITS` so every in-range
/// value has an exact `i128` encoding
pub const MAX_ENCODED_BITS: i32 = 126;

/// Security level for parameter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// 128-bit security (recommended)
    #[default]
    Bits128,
    /// 192-bit security
    Bits192,
    /// 256-bit security (conservative)
    Bits256,
}

impl SecurityLevel {
    /// Classical security in bits
    pub fn bits(self) -> u32 {
        match self {
            Self::Bits128 => 128,
            Self::Bits192 => 192,
            Self::Bits256 => 256,
        }
    }
}

/// Largest total coefficient-modulus size for a ring dimension
///
/// Values are the HomomorphicEncryption.org standard table for ternary
/// secrets. Returns `None` for dimensions the table does not cover.
pub fn max_coeff_modulus_bits(poly_degree: usize, level: SecurityLevel) -> Option<usize> {
    let bits = match (level, poly_degree) {
        (SecurityLevel::Bits128, 1024) => 27,
        (SecurityLevel::Bits128, 2048) => 54,
        (SecurityLevel::Bits128, 4096) => 109,
        (SecurityLevel::Bits128, 8192) => 218,
        (SecurityLevel::Bits128, 16384) => 438,
        (SecurityLevel::Bits128, 32768) => 881,
        (SecurityLevel::Bits192, 1024) => 19,
        (SecurityLevel::Bits192, 2048) => 37,
        (SecurityLevel::Bits192, 4096) => 75,
        (SecurityLevel::Bits192, 8192) => 152,
        (SecurityLevel::Bits192, 16384) => 305,
        (SecurityLevel::Bits192, 32768) => 611,
        (SecurityLevel::Bits256, 1024) => 14,
        (SecurityLevel::Bits256, 2048) => 29,
        (SecurityLevel::Bits256, 4096) => 58,
        (SecurityLevel::Bits256, 8192) => 118,
        (SecurityLevel::Bits256, 16384) => 237,
        (SecurityLevel::Bits256, 32768) => 476,
        _ => return None,
    };
    Some(bits)
}

/// Core parameters of the tally scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeParameters {
    /// Ring dimension d (power of two in [4096, 32768])
    pub poly_degree: usize,

    /// Bit lengths of the RNS primes, in chain order
    ///
    /// The last entry is the special prime used only by key-switching keys.
    pub coeff_modulus_bits: Vec<usize>,

    /// Fixed-point scale applied at encoding
    pub scale: f64,

    /// Largest |value| a single submission may carry
    pub max_value: f64,

    /// Additions one accumulator epoch is sized for
    pub max_submissions: u64,

    /// Decimal places tallies are reported at
    pub precision_digits: u32,

    /// Target security level
    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Standard deviation of the error distribution
    #[serde(default = "default_sigma")]
    pub sigma: f64,
}

fn default_sigma() -> f64 {
    DEFAULT_SIGMA
}

impl SchemeParameters {
    /// d = 8192, chain [60, 40, 40, 60], scale 2^40
    ///
    /// Up to 65536 submissions of |v| ≤ 10^6, reported at 4 decimals.
    pub fn default_8192() -> Self {
        Self {
            poly_degree: 8192,
            coeff_modulus_bits: vec![60, 40, 40, 60],
            scale: 2f64.powi(40),
            max_value: 1e6,
            max_submissions: 1 << 16,
            precision_digits: 4,
            security_level: SecurityLevel::Bits128,
            sigma: DEFAULT_SIGMA,
        }
    }

    /// d = 4096, chain [60, 49], scale 2^30
    ///
    /// Smallest secure shape: a single data prime, |v| ≤ 10^4, 2 decimals.
    /// The special prime is smaller than the data prime, so key switching
    /// carries more noise than with the other presets.
    pub fn compact_4096() -> Self {
        Self {
            poly_degree: 4096,
            coeff_modulus_bits: vec![60, 49],
            scale: 2f64.powi(30),
            max_value: 1e4,
            max_submissions: 1 << 15,
            precision_digits: 2,
            security_level: SecurityLevel::Bits128,
            sigma: DEFAULT_SIGMA,
        }
    }

    /// d = 32768, seven 60-bit primes, scale 2^40
    pub fn wide_32768() -> Self {
        Self {
            poly_degree: 32768,
            coeff_modulus_bits: vec![60; 7],
            scale: 2f64.powi(40),
            max_value: 1e9,
            max_submissions: 1 << 20,
            precision_digits: 4,
            security_level: SecurityLevel::Bits128,
            sigma: DEFAULT_SIGMA,
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" | "default_8192" => Some(Self::default_8192()),
            "compact" | "compact_4096" => Some(Self::compact_4096()),
            "wide" | "wide_32768" => Some(Self::wide_32768()),
            _ => None,
        }
    }

    /// Number of data primes (the chain minus the special prime)
    pub fn data_prime_count(&self) -> usize {
        self.coeff_modulus_bits.len().saturating_sub(1)
    }

    /// Highest ciphertext level
    pub fn top_level(&self) -> usize {
        self.data_prime_count().saturating_sub(1)
    }

    /// Total bit size of the chain including the special prime
    pub fn total_modulus_bits(&self) -> usize {
        self.coeff_modulus_bits.iter().sum()
    }

    /// Worst-case coefficient of fresh public-key encryption noise
    ///
    /// `(2d + 1) · ⌈6σ⌉`: two ternary-times-Gaussian products plus one
    /// Gaussian, each Gaussian bounded by the sampler's tail cut.
    pub fn fresh_noise_bound(&self) -> f64 {
        (2.0 * self.poly_degree as f64 + 1.0) * (6.0 * self.sigma).ceil()
    }

    /// High-probability bound on the accumulated noise, in value units
    ///
    /// Counts one extra fresh ciphertext for the Enc(0) an epoch starts from.
    pub fn noise_in_value_units(&self) -> f64 {
        let fresh_std = self.sigma * (4.0 * self.poly_degree as f64 / 3.0 + 1.0).sqrt();
        let n = (self.max_submissions as f64 + 1.0).sqrt();
        6.0 * fresh_std * n / self.scale
    }

    /// Reporting resolution, `10^-precision_digits`
    pub fn resolution(&self) -> f64 {
        10f64.powi(-(self.precision_digits as i32))
    }

    /// Check every constraint that does not depend on the concrete primes
    pub fn validate(&self) -> Result<()> {
        let d = self.poly_degree;
        if !d.is_power_of_two() || !(MIN_POLY_DEGREE..=MAX_POLY_DEGREE).contains(&d) {
            return Err(param_err!(
                "poly_degree must be a power of two in [{}, {}], got {}",
                MIN_POLY_DEGREE,
                MAX_POLY_DEGREE,
                d
            ));
        }

        if self.coeff_modulus_bits.len() < 2 {
            return Err(param_err!(
                "coefficient modulus chain needs at least 2 primes (data + special), got {}",
                self.coeff_modulus_bits.len()
            ));
        }

        if let Some(&bits) = self
            .coeff_modulus_bits
            .iter()
            .find(|&&b| !(MIN_PRIME_BITS..=MAX_PRIME_BITS).contains(&b))
        {
            return Err(param_err!(
                "prime bit length {} outside [{}, {}]",
                bits,
                MIN_PRIME_BITS,
                MAX_PRIME_BITS
            ));
        }

        let max_bits = max_coeff_modulus_bits(d, self.security_level).ok_or_else(|| {
            param_err!("no security table entry for poly_degree {}", d)
        })?;
        let total = self.total_modulus_bits();
        if total > max_bits {
            return Err(param_err!(
                "coefficient modulus of {} bits exceeds the {}-bit security bound of {} bits for d = {}",
                total,
                self.security_level.bits(),
                max_bits,
                d
            ));
        }

        if !self.scale.is_finite() || self.scale <= 1.0 {
            return Err(param_err!("scale must be finite and > 1, got {}", self.scale));
        }
        if !self.max_value.is_finite() || self.max_value <= 0.0 {
            return Err(param_err!(
                "max_value must be finite and > 0, got {}",
                self.max_value
            ));
        }
        if self.max_submissions == 0 {
            return Err(param_err!("max_submissions must be at least 1"));
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(param_err!("sigma must be finite and > 0, got {}", self.sigma));
        }
        if self.max_value * self.scale >= 2f64.powi(MAX_ENCODED_BITS) {
            return Err(param_err!(
                "max_value·scale = {:.3e} is not encodable below 2^{}",
                self.max_value * self.scale,
                MAX_ENCODED_BITS
            ));
        }

        let digits_scale = 10f64.powi(self.precision_digits as i32);
        if !digits_scale.is_finite() || digits_scale > self.scale {
            return Err(param_err!(
                "10^{} exceeds the scale {}; reported digits would be below encoding resolution",
                self.precision_digits,
                self.scale
            ));
        }

        let noise = self.noise_in_value_units();
        if noise >= 0.5 * self.resolution() {
            return Err(param_err!(
                "accumulated noise {:.3e} after {} submissions would disturb rounding at {} digits",
                noise,
                self.max_submissions,
                self.precision_digits
            ));
        }

        Ok(())
    }
}

impl Default for SchemeParameters {
    fn default() -> Self {
        Self::default_8192()
    }
}
