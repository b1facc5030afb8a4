//! Homomorphic operations on ciphertexts.
//!
//! The tally only ever adds. Level management and key switching are here so
//! the relinearization and Galois keys generated with a context can be used
//! without the secret key.

use rayon::prelude::*;
use std::sync::Arc;

use crate::context::CryptoContext;
use crate::error::{incompatible, invalid_ct, Result};
use crate::ks::{self, KeySwitchKey};
use crate::math::RnsPoly;
use crate::rlwe::{is_valid_galois_element, Ciphertext, GaloisKeys};

/// Stateless evaluator over one context
#[derive(Clone)]
pub struct Evaluator {
    ctx: Arc<CryptoContext>,
}

impl Evaluator {
    /// Create an evaluator for `ctx`
    pub fn new(ctx: Arc<CryptoContext>) -> Self {
        Self { ctx }
    }

    /// Shared context
    pub fn context(&self) -> &Arc<CryptoContext> {
        &self.ctx
    }

    /// Homomorphic addition of two compatible ciphertexts
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        a.validate(&self.ctx)?;
        b.validate(&self.ctx)?;
        a.check_compatible(b)?;

        let mut out = a.clone();
        out.add_assign_unchecked(b);
        Ok(out)
    }

    /// Sum of a non-empty batch of compatible ciphertexts
    pub fn add_many(&self, cts: &[Ciphertext]) -> Result<Ciphertext> {
        let (first, rest) = cts
            .split_first()
            .ok_or_else(|| invalid_ct!("cannot sum an empty batch"))?;

        first.validate(&self.ctx)?;
        rest.par_iter().try_for_each(|ct| {
            ct.validate(&self.ctx)?;
            first.check_compatible(ct)
        })?;

        let mut sum = first.clone();
        for ct in rest {
            sum.add_assign_unchecked(ct);
        }
        Ok(sum)
    }

    /// Drop the last data prime of `ct`
    ///
    /// The encrypted value is unchanged; the result carries the parameter
    /// id of the next level down and is no longer addable to ciphertexts of
    /// the original level.
    pub fn mod_switch_to_next(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        ct.validate(&self.ctx)?;
        if ct.level == 0 {
            return Err(incompatible!("ciphertext is already at the lowest level"));
        }

        let level = ct.level - 1;
        let mut out = ct.clone();
        out.c0.drop_last_modulus();
        out.c1.drop_last_modulus();
        out.level = level;
        out.parms_id = self.ctx.parms_id(level);
        Ok(out)
    }

    /// Switch `target` (NTT domain at `level`, multiplying s') to a pair under s
    pub fn key_switch(
        &self,
        target: &RnsPoly,
        level: usize,
        ksk: &KeySwitchKey,
    ) -> Result<(RnsPoly, RnsPoly)> {
        if level > self.ctx.top_level() {
            return Err(incompatible!("level {} is above the top level", level));
        }
        if !target.is_ntt() || !target.is_well_formed(self.ctx.degree(), self.ctx.moduli_at(level)) {
            return Err(invalid_ct!("key-switch target does not match level {}", level));
        }
        ks::key_switch(&self.ctx, target, level, ksk)
    }

    /// Apply τ_g to `ct`, re-encrypting under s with the Galois key for `g`
    ///
    /// The constant coefficient is fixed by every τ_g, so the encrypted value
    /// is preserved.
    pub fn apply_galois(&self, ct: &Ciphertext, g: usize, keys: &GaloisKeys) -> Result<Ciphertext> {
        ct.validate(&self.ctx)?;
        if !is_valid_galois_element(g, self.ctx.degree()) {
            return Err(incompatible!("{} is not a Galois element", g));
        }
        let key = keys
            .get(g)
            .ok_or_else(|| incompatible!("no Galois key for element {}", g))?;

        let tables = self.ctx.tables_at(ct.level);
        let mut c0 = ct.c0.from_ntt_new(&tables).automorphism(g);
        let mut c1 = ct.c1.from_ntt_new(&tables).automorphism(g);
        c0.to_ntt(&tables);
        c1.to_ntt(&tables);

        let (d0, d1) = ks::key_switch(&self.ctx, &c1, ct.level, key)?;
        c0 += &d0;

        Ok(Ciphertext {
            c0,
            c1: d1,
            ..ct.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TallyError;
    use crate::params::SchemeParameters;
    use crate::rlwe::{Decryptor, Encryptor, KeyGenerator, KeyMaterial};

    struct Fixture {
        ctx: Arc<CryptoContext>,
        enc: Encryptor,
        dec: Decryptor,
        eval: Evaluator,
    }

    fn fixture(params: SchemeParameters, seed: u64) -> (Fixture, KeyMaterial) {
        let ctx = CryptoContext::new(params).unwrap();
        let mut keys = KeyGenerator::with_seed(Arc::clone(&ctx), seed).generate();
        let sk = keys.secret_key.take().unwrap();
        let dec = Decryptor::new(Arc::clone(&ctx), sk, &keys.public_key).unwrap();
        let enc = Encryptor::new(Arc::clone(&ctx), keys.public_key.clone()).unwrap();
        let eval = Evaluator::new(Arc::clone(&ctx));
        (Fixture { ctx, enc, dec, eval }, keys)
    }

    #[test]
    fn test_add() {
        let (f, _) = fixture(SchemeParameters::compact_4096(), 41);
        let a = f.enc.encrypt_number(2.25).unwrap();
        let b = f.enc.encrypt_number(-7.5).unwrap();
        let sum = f.eval.add(&a, &b).unwrap();
        assert_eq!(f.dec.decrypt(&sum).unwrap(), -5.25);
    }

    #[test]
    fn test_add_rejects_foreign_key() {
        let (f, _) = fixture(SchemeParameters::compact_4096(), 42);
        let (g, _) = fixture(SchemeParameters::compact_4096(), 43);
        let a = f.enc.encrypt_number(1.0).unwrap();
        let b = g.enc.encrypt_number(1.0).unwrap();
        assert!(matches!(
            f.eval.add(&a, &b),
            Err(TallyError::IncompatibleCiphertext(_))
        ));
    }

    #[test]
    fn test_add_many() {
        let (f, _) = fixture(SchemeParameters::compact_4096(), 44);
        let values = [1.0, 2.0, 3.5, -0.25, 100.0];
        let cts: Vec<_> = values
            .iter()
            .map(|&v| f.enc.encrypt_number(v).unwrap())
            .collect();
        let sum = f.eval.add_many(&cts).unwrap();
        assert_eq!(f.dec.decrypt(&sum).unwrap(), 106.25);
        assert!(f.eval.add_many(&[]).is_err());
    }

    #[test]
    fn test_mod_switch_preserves_value() {
        let (f, _) = fixture(SchemeParameters::default_8192(), 45);
        let ct = f.enc.encrypt_number(42.4242).unwrap();
        let top = f.ctx.top_level();

        let lower = f.eval.mod_switch_to_next(&ct).unwrap();
        assert_eq!(lower.level, top - 1);
        assert_eq!(lower.parms_id, f.ctx.parms_id(top - 1));
        assert_eq!(f.dec.decrypt(&lower).unwrap(), 42.4242);

        assert!(matches!(
            f.eval.add(&ct, &lower),
            Err(TallyError::IncompatibleCiphertext(_))
        ));

        let bottom = f.eval.mod_switch_to_next(&lower).unwrap();
        assert_eq!(f.dec.decrypt(&bottom).unwrap(), 42.4242);
        assert!(f.eval.mod_switch_to_next(&bottom).is_err());
    }

    #[test]
    fn test_apply_galois_preserves_value() {
        let ctx = CryptoContext::new(SchemeParameters::default_8192()).unwrap();
        let mut keygen = KeyGenerator::with_seed(Arc::clone(&ctx), 46);
        let mut keys = keygen.generate();
        let (g1, g2) = crate::rlwe::galois_generators(ctx.degree());
        let sk = keys.secret_key.take().unwrap();
        let galois = keygen.galois_keys(&sk, &[g1, g2]).unwrap();

        let dec = Decryptor::new(Arc::clone(&ctx), sk, &keys.public_key).unwrap();
        let enc = Encryptor::new(Arc::clone(&ctx), keys.public_key).unwrap();
        let eval = Evaluator::new(Arc::clone(&ctx));

        let ct = enc.encrypt_number(-1234.5678).unwrap();
        for g in [g1, g2] {
            let rotated = eval.apply_galois(&ct, g, &galois).unwrap();
            assert_eq!(rotated.key_id, ct.key_id);
            assert_eq!(dec.decrypt(&rotated).unwrap(), -1234.5678);
        }

        let lower = eval.mod_switch_to_next(&ct).unwrap();
        let rotated = eval.apply_galois(&lower, g1, &galois).unwrap();
        assert_eq!(dec.decrypt(&rotated).unwrap(), -1234.5678);

        assert!(eval.apply_galois(&ct, 5, &galois).is_err());
        assert!(eval.apply_galois(&ct, 4, &galois).is_err());
    }

    #[test]
    fn test_relinearization_key_switches_s_squared() {
        let ctx = CryptoContext::new(SchemeParameters::default_8192()).unwrap();
        let mut keys = KeyGenerator::with_seed(Arc::clone(&ctx), 47).generate();
        let level = ctx.top_level();
        let tables = ctx.tables_at(level);
        let moduli = ctx.moduli_at(level);

        let sk = keys.secret_key.take().unwrap();
        let s = sk.poly().select(moduli).unwrap();
        let s_squared = s.mul_ntt_domain(&s, &tables);
        let dec = Decryptor::new(Arc::clone(&ctx), sk, &keys.public_key).unwrap();
        let enc = Encryptor::new(Arc::clone(&ctx), keys.public_key).unwrap();
        let eval = Evaluator::new(Arc::clone(&ctx));

        // (c0, 0, c2) with c0 + c2·s² = m
        let pt = enc.encoder().encode(17.5, level).unwrap();
        let mut rng = rand::thread_rng();
        let c2 = RnsPoly::sample_uniform(ctx.degree(), moduli, &mut rng);
        let c0 = &pt.poly - &c2.mul_ntt_domain(&s_squared, &tables);

        let (d0, d1) = eval.key_switch(&c2, level, &keys.relin_key.0).unwrap();
        let ct = Ciphertext {
            c0: &c0 + &d0,
            c1: d1,
            level,
            scale: pt.scale,
            parms_id: ctx.parms_id(level),
            key_id: dec.key_id(),
        };
        assert_eq!(dec.decrypt(&ct).unwrap(), 17.5);
    }
}
