//! Polynomials over R_Q = Z_Q[X]/(X^d + 1) in RNS form.
//!
//! A polynomial is stored as one residue vector per prime of its basis.
//! Polynomials can be in coefficient domain or NTT domain; ring products are
//! only taken in the NTT domain, automorphisms only in the coefficient domain.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use zeroize::Zeroize;

use super::gaussian::GaussianSampler;
use super::modular::ModQ;
use super::ntt::NttContext;

/// Polynomial in RNS representation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnsPoly {
    /// One coefficient (or NTT) vector per modulus.
    residues: Vec<Vec<u64>>,
    /// RNS primes, aligned with `residues`.
    moduli: Vec<u64>,
    /// Whether residues are in NTT domain.
    is_ntt: bool,
}

impl RnsPoly {
    /// Create zero polynomial
    pub fn zero(degree: usize, moduli: &[u64], is_ntt: bool) -> Self {
        Self {
            residues: vec![vec![0; degree]; moduli.len()],
            moduli: moduli.to_vec(),
            is_ntt,
        }
    }

    /// Coefficient-domain polynomial from small signed coefficients
    pub fn from_signed_coeffs(coeffs: &[i64], moduli: &[u64]) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| ModQ::from_signed(c, q)).collect())
            .collect();
        Self {
            residues,
            moduli: moduli.to_vec(),
            is_ntt: false,
        }
    }

    /// Coefficient-domain constant polynomial
    pub fn constant(value: i128, degree: usize, moduli: &[u64]) -> Self {
        let mut poly = Self::zero(degree, moduli, false);
        for (residue, &q) in poly.residues.iter_mut().zip(moduli) {
            residue[0] = ModQ::from_i128(value, q);
        }
        poly
    }

    /// Build from raw residues; the caller guarantees alignment with `moduli`
    pub fn from_residues(residues: Vec<Vec<u64>>, moduli: &[u64], is_ntt: bool) -> Self {
        debug_assert_eq!(residues.len(), moduli.len());
        Self {
            residues,
            moduli: moduli.to_vec(),
            is_ntt,
        }
    }

    /// Uniformly random polynomial, produced directly in NTT domain
    pub fn sample_uniform<R: Rng + ?Sized>(degree: usize, moduli: &[u64], rng: &mut R) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| (0..degree).map(|_| rng.gen_range(0..q)).collect())
            .collect();
        Self {
            residues,
            moduli: moduli.to_vec(),
            is_ntt: true,
        }
    }

    /// Polynomial with uniform coefficients in {-1, 0, 1}
    pub fn sample_ternary<R: Rng + ?Sized>(degree: usize, moduli: &[u64], rng: &mut R) -> Self {
        let coeffs: Vec<i64> = (0..degree).map(|_| rng.gen_range(-1..=1)).collect();
        Self::from_signed_coeffs(&coeffs, moduli)
    }

    /// Polynomial with discrete Gaussian coefficients
    pub fn sample_gaussian<R: Rng + ?Sized>(
        degree: usize,
        moduli: &[u64],
        sampler: &GaussianSampler,
        rng: &mut R,
    ) -> Self {
        let coeffs = sampler.sample_vec(degree, rng);
        Self::from_signed_coeffs(&coeffs, moduli)
    }

    /// Get polynomial dimension
    pub fn degree(&self) -> usize {
        self.residues.first().map_or(0, Vec::len)
    }

    /// RNS primes of this polynomial
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Number of RNS primes
    pub fn num_moduli(&self) -> usize {
        self.moduli.len()
    }

    /// Check if in NTT domain
    pub fn is_ntt(&self) -> bool {
        self.is_ntt
    }

    /// Residue vector for the i-th prime
    pub fn residue(&self, i: usize) -> &[u64] {
        &self.residues[i]
    }

    /// All residue vectors
    pub fn residues(&self) -> &[Vec<u64>] {
        &self.residues
    }

    /// Whether the shape and every value fit the given basis
    pub fn is_well_formed(&self, degree: usize, moduli: &[u64]) -> bool {
        self.moduli == moduli
            && self.residues.len() == moduli.len()
            && self
                .residues
                .iter()
                .zip(moduli)
                .all(|(r, &q)| r.len() == degree && r.iter().all(|&c| c < q))
    }

    /// Convert to NTT domain; `tables` align with the moduli
    pub fn to_ntt(&mut self, tables: &[&NttContext]) {
        if !self.is_ntt {
            debug_assert_eq!(tables.len(), self.moduli.len());
            for (residue, table) in self.residues.iter_mut().zip(tables) {
                table.forward(residue);
            }
            self.is_ntt = true;
        }
    }

    /// Convert from NTT domain to coefficient domain
    pub fn from_ntt(&mut self, tables: &[&NttContext]) {
        if self.is_ntt {
            debug_assert_eq!(tables.len(), self.moduli.len());
            for (residue, table) in self.residues.iter_mut().zip(tables) {
                table.inverse(residue);
            }
            self.is_ntt = false;
        }
    }

    /// Create a copy in NTT domain
    pub fn to_ntt_new(&self, tables: &[&NttContext]) -> Self {
        let mut result = self.clone();
        result.to_ntt(tables);
        result
    }

    /// Create a copy in coefficient domain
    pub fn from_ntt_new(&self, tables: &[&NttContext]) -> Self {
        let mut result = self.clone();
        result.from_ntt(tables);
        result
    }

    /// Ring product when both are already in NTT domain
    pub fn mul_ntt_domain(&self, other: &Self, tables: &[&NttContext]) -> Self {
        assert!(
            self.is_ntt && other.is_ntt,
            "Both polynomials must be in NTT domain"
        );
        assert_eq!(self.moduli, other.moduli, "Moduli must match");

        let residues = self
            .residues
            .iter()
            .zip(&other.residues)
            .zip(tables)
            .map(|((a, b), table)| {
                let mut out = vec![0u64; a.len()];
                table.pointwise_mul(a, b, &mut out);
                out
            })
            .collect();

        Self {
            residues,
            moduli: self.moduli.clone(),
            is_ntt: true,
        }
    }

    /// In-place multiply-accumulate in NTT domain: self += a * b
    pub fn mul_acc_ntt_domain(&mut self, a: &Self, b: &Self, tables: &[&NttContext]) {
        assert!(
            self.is_ntt && a.is_ntt && b.is_ntt,
            "All polynomials must be in NTT domain"
        );
        assert_eq!(self.moduli, a.moduli, "Moduli must match");
        assert_eq!(self.moduli, b.moduli, "Moduli must match");

        for (((acc, x), y), table) in self
            .residues
            .iter_mut()
            .zip(&a.residues)
            .zip(&b.residues)
            .zip(tables)
        {
            table.pointwise_mul_acc(acc, x, y);
        }
    }

    /// Multiply every residue by a scalar given per prime
    pub fn scalar_mul_rns(&self, scalars: &[u64]) -> Self {
        let residues = self
            .residues
            .iter()
            .zip(&self.moduli)
            .zip(scalars)
            .map(|((r, &q), &s)| r.iter().map(|&c| ModQ::mul(c, s, q)).collect())
            .collect();
        Self {
            residues,
            moduli: self.moduli.clone(),
            is_ntt: self.is_ntt,
        }
    }

    /// `self[i] += scalar · other[i]` on the residue of the i-th prime only
    pub fn add_scaled_residue(&mut self, i: usize, other: &Self, scalar: u64) {
        assert_eq!(self.moduli[i], other.moduli[i], "Moduli must match");
        assert_eq!(self.is_ntt, other.is_ntt, "NTT domains must match");
        let q = self.moduli[i];
        for (x, &y) in self.residues[i].iter_mut().zip(&other.residues[i]) {
            *x = ModQ::add(*x, ModQ::mul(y, scalar, q), q);
        }
    }

    /// Keep the residues of the given primes, in the given order
    ///
    /// Returns `None` if a requested prime is not part of this polynomial.
    pub fn select(&self, moduli: &[u64]) -> Option<Self> {
        let residues = moduli
            .iter()
            .map(|q| {
                self.moduli
                    .iter()
                    .position(|m| m == q)
                    .map(|i| self.residues[i].clone())
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            residues,
            moduli: moduli.to_vec(),
            is_ntt: self.is_ntt,
        })
    }

    /// Drop the residue of the last prime
    pub fn drop_last_modulus(&mut self) {
        self.residues.pop();
        self.moduli.pop();
    }

    /// Apply the Galois automorphism X → X^g (coefficient domain)
    ///
    /// X^i maps to X^(g·i mod 2d), negated when g·i mod 2d ≥ d.
    pub fn automorphism(&self, g: usize) -> Self {
        assert!(!self.is_ntt, "Automorphism requires coefficient domain");
        let d = self.degree();
        let two_d = 2 * d;

        let residues = self
            .residues
            .iter()
            .zip(&self.moduli)
            .map(|(r, &q)| {
                let mut out = vec![0u64; d];
                for (i, &c) in r.iter().enumerate() {
                    let idx = (g * i) % two_d;
                    if idx < d {
                        out[idx] = ModQ::add(out[idx], c, q);
                    } else {
                        out[idx - d] = ModQ::sub(out[idx - d], c, q);
                    }
                }
                out
            })
            .collect();

        Self {
            residues,
            moduli: self.moduli.clone(),
            is_ntt: false,
        }
    }

    /// Little-endian byte image of the residues, for hashing
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.num_moduli() * self.degree() * 8);
        for residue in &self.residues {
            for c in residue {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes
    }
}

impl Zeroize for RnsPoly {
    fn zeroize(&mut self) {
        for residue in self.residues.iter_mut() {
            residue.zeroize();
        }
        self.residues.clear();
    }
}

impl Add for &RnsPoly {
    type Output = RnsPoly;

    fn add(self, rhs: Self) -> Self::Output {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl AddAssign<&RnsPoly> for RnsPoly {
    fn add_assign(&mut self, rhs: &RnsPoly) {
        assert_eq!(self.moduli, rhs.moduli, "Moduli must match");
        assert_eq!(self.is_ntt, rhs.is_ntt, "NTT domains must match");

        for ((a, b), &q) in self
            .residues
            .iter_mut()
            .zip(&rhs.residues)
            .zip(&self.moduli)
        {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = ModQ::add(*x, y, q);
            }
        }
    }
}

impl Sub for &RnsPoly {
    type Output = RnsPoly;

    fn sub(self, rhs: Self) -> Self::Output {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl SubAssign<&RnsPoly> for RnsPoly {
    fn sub_assign(&mut self, rhs: &RnsPoly) {
        assert_eq!(self.moduli, rhs.moduli, "Moduli must match");
        assert_eq!(self.is_ntt, rhs.is_ntt, "NTT domains must match");

        for ((a, b), &q) in self
            .residues
            .iter_mut()
            .zip(&rhs.residues)
            .zip(&self.moduli)
        {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = ModQ::sub(*x, y, q);
            }
        }
    }
}

impl Neg for &RnsPoly {
    type Output = RnsPoly;

    fn neg(self) -> Self::Output {
        let residues = self
            .residues
            .iter()
            .zip(&self.moduli)
            .map(|(r, &q)| r.iter().map(|&c| ModQ::negate(c, q)).collect())
            .collect();

        RnsPoly {
            residues,
            moduli: self.moduli.clone(),
            is_ntt: self.is_ntt,
        }
    }
}
