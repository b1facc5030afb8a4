//! Hybrid RNS key switching with the special prime

use crate::context::CryptoContext;
use crate::error::{invalid_ct, Result};
use crate::math::{ModQ, RnsPoly};

use super::setup::KeySwitchKey;

/// Switch `target`, a polynomial multiplying s', to a pair under s
///
/// `target` is an NTT-domain polynomial over the primes of `level`. Returns
/// `(d0, d1)` over the same primes with `d0 + d1·s ≈ target·s'`.
///
/// # Algorithm
///
/// 1. Split `target` into its RNS digits `[target]_{q_i}`, i ≤ level
/// 2. Lift each digit to the primes of `level` plus P and accumulate
///    `Σᵢ digitᵢ · K[i]`, which is `P·target·s'` plus small noise
/// 3. Divide by P with rounding (mod-down) to drop the special prime
pub fn key_switch(
    ctx: &CryptoContext,
    target: &RnsPoly,
    level: usize,
    ksk: &KeySwitchKey,
) -> Result<(RnsPoly, RnsPoly)> {
    let d = ctx.degree();
    if ksk.rows.len() <= level {
        return Err(invalid_ct!(
            "key-switching key covers {} primes, level {} needs {}",
            ksk.rows.len(),
            level,
            level + 1
        ));
    }

    let level_tables = ctx.tables_at(level);
    let ext_tables = ctx.extended_tables_at(level);
    let ext_moduli = ctx.extended_moduli_at(level);

    let coeffs = target.from_ntt_new(&level_tables);

    let mut acc0 = RnsPoly::zero(d, &ext_moduli, true);
    let mut acc1 = RnsPoly::zero(d, &ext_moduli, true);

    for (i, row) in ksk.rows.iter().take(level + 1).enumerate() {
        let digit = coeffs.residue(i);
        let lifted: Vec<Vec<u64>> = ext_moduli
            .iter()
            .map(|&m| digit.iter().map(|&v| v % m).collect())
            .collect();
        let mut digit_poly = RnsPoly::from_residues(lifted, &ext_moduli, false);
        digit_poly.to_ntt(&ext_tables);

        let (row_b, row_a) = match (row.b.select(&ext_moduli), row.a.select(&ext_moduli)) {
            (Some(b), Some(a)) => (b, a),
            _ => {
                return Err(invalid_ct!(
                    "key-switching key row {} does not cover the chain",
                    i
                ))
            }
        };

        acc0.mul_acc_ntt_domain(&digit_poly, &row_b, &ext_tables);
        acc1.mul_acc_ntt_domain(&digit_poly, &row_a, &ext_tables);
    }

    Ok((mod_down(ctx, acc0, level), mod_down(ctx, acc1, level)))
}

/// Divide an NTT-domain polynomial over (q_0..q_level, P) by P, rounding
fn mod_down(ctx: &CryptoContext, mut poly: RnsPoly, level: usize) -> RnsPoly {
    poly.from_ntt(&ctx.extended_tables_at(level));

    let p = ctx.special_prime();
    let last = poly.residue(level + 1).to_vec();

    let residues = ctx
        .moduli_at(level)
        .iter()
        .enumerate()
        .map(|(j, &q)| {
            let p_inv = ctx.special_inv(j);
            poly.residue(j)
                .iter()
                .zip(&last)
                .map(|(&x, &r)| {
                    // Centered remainder mod P, reduced mod q_j
                    let r_q = if r > p / 2 {
                        ModQ::negate((p - r) % q, q)
                    } else {
                        r % q
                    };
                    ModQ::mul(ModQ::sub(x, r_q, q), p_inv, q)
                })
                .collect()
        })
        .collect();

    let mut out = RnsPoly::from_residues(residues, ctx.moduli_at(level), false);
    out.to_ntt(&ctx.tables_at(level));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ks::generate_key_switch_key;
    use crate::math::GaussianSampler;
    use crate::params::SchemeParameters;
    use num_bigint::BigInt;
    use num_traits::Signed;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn ternary_key(ctx: &CryptoContext, rng: &mut ChaCha20Rng) -> RnsPoly {
        RnsPoly::sample_ternary(ctx.degree(), ctx.primes(), rng).to_ntt_new(&ctx.all_tables())
    }

    /// Largest centered coefficient of `(d0 + d1·s) - target·s'` at `level`
    fn switch_error(
        ctx: &CryptoContext,
        level: usize,
        d0: &RnsPoly,
        d1: &RnsPoly,
        target: &RnsPoly,
        s: &RnsPoly,
        s_prime: &RnsPoly,
    ) -> BigInt {
        let tables = ctx.tables_at(level);
        let moduli = ctx.moduli_at(level);
        let s = s.select(moduli).unwrap();
        let s_prime = s_prime.select(moduli).unwrap();

        let lhs = d0 + &d1.mul_ntt_domain(&s, &tables);
        let rhs = target.mul_ntt_domain(&s_prime, &tables);
        let diff = (&lhs - &rhs).from_ntt_new(&tables);

        let basis = ctx.basis_at(level);
        (0..ctx.degree())
            .map(|k| {
                let residues: Vec<u64> = diff.residues().iter().map(|r| r[k]).collect();
                basis.lift_centered(&residues).abs()
            })
            .max()
            .unwrap()
    }

    #[test]
    fn test_key_switch_small_error_all_levels() {
        let ctx = CryptoContext::new(SchemeParameters::default_8192()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let sampler = GaussianSampler::new(ctx.params().sigma);

        let s = ternary_key(&ctx, &mut rng);
        let s_prime = ternary_key(&ctx, &mut rng);
        let ksk = generate_key_switch_key(&ctx, &s_prime, &s, &sampler, &mut rng);
        assert!(ksk.is_well_formed(&ctx));

        for level in 0..=ctx.top_level() {
            let target = RnsPoly::sample_uniform(ctx.degree(), ctx.moduli_at(level), &mut rng);
            let (d0, d1) = key_switch(&ctx, &target, level, &ksk).unwrap();
            let err = switch_error(&ctx, level, &d0, &d1, &target, &s, &s_prime);
            assert!(
                err < BigInt::from(1u64 << 24),
                "key switch error {} too large at level {}",
                err,
                level
            );
        }
    }

    #[test]
    fn test_key_switch_rejects_short_key() {
        let ctx = CryptoContext::new(SchemeParameters::default_8192()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let sampler = GaussianSampler::new(ctx.params().sigma);
        let s = ternary_key(&ctx, &mut rng);
        let mut ksk = generate_key_switch_key(&ctx, &s, &s, &sampler, &mut rng);
        ksk.rows.truncate(1);

        let target = RnsPoly::zero(ctx.degree(), ctx.moduli_at(2), true);
        assert!(key_switch(&ctx, &target, 2, &ksk).is_err());
        assert!(key_switch(&ctx, &RnsPoly::zero(ctx.degree(), ctx.moduli_at(0), true), 0, &ksk).is_ok());
    }
}
