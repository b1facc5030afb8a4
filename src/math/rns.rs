//! Residue number system (RNS) basis and CRT reconstruction.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive};

use crate::error::{param_err, Result};

use super::modular::ModQ;

/// CRT constants for a list of pairwise coprime moduli.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RnsBasis {
    moduli: Vec<u64>,
    /// Q = ∏ q_i
    product: BigUint,
    /// Q / 2, for centering
    half_product: BigUint,
    /// Q / q_i
    punctured: Vec<BigUint>,
    /// (Q / q_i)^(-1) mod q_i
    punctured_inv: Vec<u64>,
}

impl RnsBasis {
    /// Build the basis; fails if two moduli share a factor.
    pub fn new(moduli: &[u64]) -> Result<Self> {
        if moduli.is_empty() {
            return Err(param_err!("RNS basis needs at least one modulus"));
        }

        let product = moduli
            .iter()
            .fold(BigUint::one(), |acc, &q| acc * BigUint::from(q));

        let mut punctured = Vec::with_capacity(moduli.len());
        let mut punctured_inv = Vec::with_capacity(moduli.len());
        for &q in moduli {
            let hat = &product / BigUint::from(q);
            let hat_mod_q = (&hat % BigUint::from(q))
                .to_u64()
                .ok_or_else(|| param_err!("residue of Q/{} does not fit in u64", q))?;
            let inv = ModQ::inverse(hat_mod_q, q)
                .ok_or_else(|| param_err!("moduli are not pairwise coprime (at {})", q))?;
            punctured.push(hat);
            punctured_inv.push(inv);
        }

        Ok(Self {
            moduli: moduli.to_vec(),
            half_product: &product >> 1usize,
            product,
            punctured,
            punctured_inv,
        })
    }

    /// The moduli of this basis.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Q as a big integer.
    pub fn product(&self) -> &BigUint {
        &self.product
    }

    /// log2(Q), computed from the individual moduli.
    pub fn log2_product(&self) -> f64 {
        self.moduli.iter().map(|&q| (q as f64).log2()).sum()
    }

    /// (Q / q_i)^(-1) mod q_i
    pub fn punctured_inv(&self, i: usize) -> u64 {
        self.punctured_inv[i]
    }

    /// Reconstruct the value in [0, Q) from its residues.
    pub fn lift(&self, residues: &[u64]) -> BigUint {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let sum = residues
            .iter()
            .zip(&self.moduli)
            .zip(self.punctured.iter().zip(&self.punctured_inv))
            .fold(BigUint::default(), |acc, ((&r, &q), (hat, &inv))| {
                acc + hat * BigUint::from(ModQ::mul(r, inv, q))
            });
        sum % &self.product
    }

    /// Reconstruct the representative in (-Q/2, Q/2].
    pub fn lift_centered(&self, residues: &[u64]) -> BigInt {
        let value = self.lift(residues);
        if value > self.half_product {
            BigInt::from(value) - BigInt::from(self.product.clone())
        } else {
            BigInt::from(value)
        }
    }
}
