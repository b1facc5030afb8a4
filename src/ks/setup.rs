//! Key-switching key generation

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::context::CryptoContext;
use crate::math::{GaussianSampler, RnsPoly};

/// One row of a key-switching key, an encryption under the target key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeySwitchRow {
    /// -a·s + e + P·[q_i]·s'
    pub b: RnsPoly,
    /// Uniform mask
    pub a: RnsPoly,
}

/// Key-switching key from s' to s over the full chain (data primes + P)
///
/// Row i carries the RNS digit of prime q_i:
/// ```text
/// K[i] = (-a_i·s + e_i + P·(Q/q_i)·[(Q/q_i)^(-1)]_{q_i}·s', a_i)
/// ```
/// Modulo q_j the message term is `P·s'` when i = j and zero otherwise, and
/// it vanishes modulo P.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeySwitchKey {
    /// One row per data prime
    pub rows: Vec<KeySwitchRow>,
}

impl KeySwitchKey {
    /// Number of rows (data primes covered)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the key has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the key matches the shape `ctx` expects
    pub fn is_well_formed(&self, ctx: &CryptoContext) -> bool {
        self.rows.len() == ctx.data_primes().len()
            && self.rows.iter().all(|row| {
                row.a.is_ntt()
                    && row.b.is_ntt()
                    && row.a.is_well_formed(ctx.degree(), ctx.primes())
                    && row.b.is_well_formed(ctx.degree(), ctx.primes())
            })
    }
}

/// Generate a key-switching key from `from_key` (s') to `to_key` (s)
///
/// Both keys are NTT-domain polynomials over the full chain.
pub fn generate_key_switch_key<R: Rng + ?Sized>(
    ctx: &CryptoContext,
    from_key: &RnsPoly,
    to_key: &RnsPoly,
    sampler: &GaussianSampler,
    rng: &mut R,
) -> KeySwitchKey {
    let d = ctx.degree();
    let primes = ctx.primes();
    let tables = ctx.all_tables();

    debug_assert_eq!(from_key.moduli(), primes);
    debug_assert_eq!(to_key.moduli(), primes);

    let rows = (0..ctx.data_primes().len())
        .map(|i| {
            let a = RnsPoly::sample_uniform(d, primes, rng);
            let e = RnsPoly::sample_gaussian(d, primes, sampler, rng).to_ntt_new(&tables);

            let mut b = &e - &a.mul_ntt_domain(to_key, &tables);
            b.add_scaled_residue(i, from_key, ctx.special_mod(i));

            KeySwitchRow { b, a }
        })
        .collect();

    KeySwitchKey { rows }
}
