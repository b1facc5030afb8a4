//! Plaintext and ciphertext types.
//!
//! Ring-LWE over R_Q = Z_Q[X]/(X^d + 1), RNS form.

use serde::{Deserialize, Serialize};

use crate::context::{CryptoContext, ParmsId};
use crate::error::{incompatible, invalid_ct, Result};
use crate::math::RnsPoly;

use super::keys::KeyId;

/// Encoded message polynomial (NTT domain) with its scale and level.
#[derive(Clone, Debug, PartialEq)]
pub struct Plaintext {
    /// Message polynomial in NTT domain.
    pub poly: RnsPoly,
    /// Fixed-point scale the message was multiplied by.
    pub scale: f64,
    /// Level the polynomial lives at.
    pub level: usize,
}

/// Ciphertext: (c0, c1) with c0 + c1·s = m + e.
///
/// Both polynomials are in NTT domain over the primes of `level`. Two
/// ciphertexts are addable only when `parms_id`, `level`, `scale` and
/// `key_id` all match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// Constant-term polynomial.
    pub c0: RnsPoly,
    /// Mask polynomial.
    pub c1: RnsPoly,
    /// Number of data primes minus one.
    pub level: usize,
    /// Fixed-point scale of the encrypted message.
    pub scale: f64,
    /// Parameter id of `level`.
    pub parms_id: ParmsId,
    /// Public key this ciphertext was produced under.
    pub key_id: KeyId,
}

impl Ciphertext {
    /// Check structure and parameter id against `ctx`
    ///
    /// Unknown parameter ids are reported as incompatible; everything else
    /// wrong with the value (shape, residues out of range, inconsistent
    /// metadata) is reported as invalid.
    pub fn validate(&self, ctx: &CryptoContext) -> Result<()> {
        let level = ctx.level_of(&self.parms_id).ok_or_else(|| {
            incompatible!(
                "parameter id {} does not belong to this context",
                self.parms_id
            )
        })?;

        if level != self.level {
            return Err(invalid_ct!(
                "level {} disagrees with parameter id of level {}",
                self.level,
                level
            ));
        }

        // nothing rescales, so every ciphertext carries the context scale
        if self.scale != ctx.params().scale {
            return Err(invalid_ct!(
                "scale {} differs from the context scale {}",
                self.scale,
                ctx.params().scale
            ));
        }

        let moduli = ctx.moduli_at(level);
        for (name, poly) in [("c0", &self.c0), ("c1", &self.c1)] {
            if !poly.is_ntt() {
                return Err(invalid_ct!("{} is not in evaluation form", name));
            }
            if !poly.is_well_formed(ctx.degree(), moduli) {
                return Err(invalid_ct!(
                    "{} does not match {} residues of degree {}",
                    name,
                    moduli.len(),
                    ctx.degree()
                ));
            }
        }

        Ok(())
    }

    /// Check that `other` can be added to this ciphertext
    pub fn check_compatible(&self, other: &Ciphertext) -> Result<()> {
        if self.parms_id != other.parms_id {
            return Err(incompatible!(
                "parameter id {} differs from {}",
                other.parms_id,
                self.parms_id
            ));
        }
        if self.level != other.level {
            return Err(incompatible!("level {} differs from {}", other.level, self.level));
        }
        if self.scale != other.scale {
            return Err(incompatible!("scale {} differs from {}", other.scale, self.scale));
        }
        if self.key_id != other.key_id {
            return Err(incompatible!(
                "encrypted under key {} instead of {}",
                other.key_id,
                self.key_id
            ));
        }
        Ok(())
    }

    /// Returns the ring dimension.
    pub fn ring_dim(&self) -> usize {
        self.c0.degree()
    }

    /// Componentwise sum; the caller has already run [`Self::check_compatible`]
    pub(crate) fn add_assign_unchecked(&mut self, other: &Ciphertext) {
        self.c0 += &other.c0;
        self.c1 += &other.c1;
    }
}
