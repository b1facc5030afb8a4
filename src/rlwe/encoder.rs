//! Fixed-point encoding of a real number as a constant polynomial.
//!
//! A value v is encoded as the constant coefficient `round_half_even(v·Δ)`,
//! which is the canonical embedding of the slot vector (v, v, ..., v).
//! Sums of encodings are encodings of sums, which is all the tally needs.

use std::sync::Arc;

use crate::context::CryptoContext;
use crate::error::{incompatible, Result, TallyError};
use crate::math::RnsPoly;

use super::types::Plaintext;

/// Encodes real numbers under the scale of a context
#[derive(Clone)]
pub struct Encoder {
    ctx: Arc<CryptoContext>,
}

impl Encoder {
    /// Create an encoder for `ctx`
    pub fn new(ctx: Arc<CryptoContext>) -> Self {
        Self { ctx }
    }

    /// Encode `value` at `level`
    ///
    /// Rejects non-finite values and `|value| > max_value` before any
    /// arithmetic happens.
    pub fn encode(&self, value: f64, level: usize) -> Result<Plaintext> {
        let params = self.ctx.params();
        if !value.is_finite() || value.abs() > params.max_value {
            return Err(TallyError::EncodingRange {
                value,
                max: params.max_value,
            });
        }
        if level > self.ctx.top_level() {
            return Err(incompatible!(
                "level {} is above the top level {}",
                level,
                self.ctx.top_level()
            ));
        }

        let scaled = self.scaled(value);
        let moduli = self.ctx.moduli_at(level);
        let mut poly = RnsPoly::constant(scaled, self.ctx.degree(), moduli);
        poly.to_ntt(&self.ctx.tables_at(level));

        Ok(Plaintext {
            poly,
            scale: params.scale,
            level,
        })
    }

    /// `round_half_even(value·Δ)` as an exact integer
    ///
    /// Parameter validation keeps `max_value·Δ` below `2^126`, so the
    /// conversion from f64 is exact for every in-range value.
    fn scaled(&self, value: f64) -> i128 {
        (value * self.ctx.params().scale).round_ties_even() as i128
    }
}
