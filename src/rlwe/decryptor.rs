//! Decryption of tallies (the only code path that reads the secret key).

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::sync::Arc;
use tracing::debug;

use crate::context::CryptoContext;
use crate::error::{invalid_ct, param_err, Result, TallyError};
use crate::math::RnsPoly;

use super::keys::{KeyId, PublicKey, SecretKey};
use super::types::Ciphertext;

/// Decrypts ciphertexts under one secret key
pub struct Decryptor {
    ctx: Arc<CryptoContext>,
    secret_key: SecretKey,
    key_id: KeyId,
}

impl Decryptor {
    /// Bind `secret_key` to the public key it generated
    ///
    /// The pair is checked: `p0 + p1·s` must be a small error polynomial.
    pub fn new(ctx: Arc<CryptoContext>, secret_key: SecretKey, public_key: &PublicKey) -> Result<Self> {
        public_key.validate(&ctx)?;
        if secret_key.poly().moduli() != ctx.primes() {
            return Err(param_err!("secret key does not cover the prime chain of this context"));
        }

        let decryptor = Self {
            ctx,
            secret_key,
            key_id: public_key.key_id,
        };

        let level = decryptor.ctx.top_level();
        let phase = decryptor.phase(&public_key.p0, &public_key.p1, level)?;
        let bound = BigInt::from(decryptor.ctx.params().fresh_noise_bound() as u64);
        if decryptor.max_centered(&phase, level) > bound {
            return Err(param_err!("secret key does not match public key {}", public_key.key_id));
        }
        Ok(decryptor)
    }

    /// Key this decryptor accepts ciphertexts under
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Decrypt to a real number rounded at `precision_digits` decimals
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<f64> {
        self.check(ct)?;
        let phase = self.phase(&ct.c0, &ct.c1, ct.level)?;

        let residues: Vec<u64> = phase.residues().iter().map(|r| r[0]).collect();
        let m = self.ctx.basis_at(ct.level).lift_centered(&residues);
        let value = descale(&m, ct.scale)
            .ok_or_else(|| invalid_ct!("decrypted value does not fit a float"))?;

        let rounded = round_digits(value, self.ctx.params().precision_digits);
        debug!(level = ct.level, "ciphertext decrypted");
        Ok(rounded)
    }

    /// Remaining noise budget in bits
    ///
    /// `log2(Q_l / 2) - log2(max |c0 + c1·s|)` over all coefficients. The
    /// message itself counts against the budget since only its constant term
    /// is meaningful.
    pub fn headroom_bits(&self, ct: &Ciphertext) -> Result<f64> {
        self.check(ct)?;
        let phase = self.phase(&ct.c0, &ct.c1, ct.level)?;
        let max = self.max_centered(&phase, ct.level).to_f64().unwrap_or(f64::INFINITY);
        let modulus_bits = self.ctx.basis_at(ct.level).log2_product() - 1.0;
        Ok(modulus_bits - max.max(1.0).log2())
    }

    fn check(&self, ct: &Ciphertext) -> Result<()> {
        ct.validate(&self.ctx).map_err(|err| match err {
            TallyError::IncompatibleCiphertext(msg) => TallyError::InvalidCiphertext(msg),
            other => other,
        })?;
        if ct.key_id != self.key_id {
            return Err(invalid_ct!(
                "encrypted under key {}, this decryptor holds {}",
                ct.key_id,
                self.key_id
            ));
        }
        Ok(())
    }

    /// Coefficient-domain `c0 + c1·s` at `level`
    fn phase(&self, c0: &RnsPoly, c1: &RnsPoly, level: usize) -> Result<RnsPoly> {
        let moduli = self.ctx.moduli_at(level);
        let tables = self.ctx.tables_at(level);
        let s = self
            .secret_key
            .poly()
            .select(moduli)
            .ok_or_else(|| invalid_ct!("secret key does not cover level {}", level))?;

        let mut phase = c1.mul_ntt_domain(&s, &tables);
        phase += c0;
        phase.from_ntt(&tables);
        Ok(phase)
    }

    fn max_centered(&self, poly: &RnsPoly, level: usize) -> BigInt {
        let basis = self.ctx.basis_at(level);
        let mut residues = vec![0u64; poly.num_moduli()];
        let mut max = BigInt::zero();
        for k in 0..poly.degree() {
            for (slot, r) in residues.iter_mut().zip(poly.residues()) {
                *slot = r[k];
            }
            let v = basis.lift_centered(&residues).abs();
            if v > max {
                max = v;
            }
        }
        max
    }
}

impl std::fmt::Debug for Decryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decryptor")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// `m / scale`, exact in the integer part when the scale is an integer
fn descale(m: &BigInt, scale: f64) -> Option<f64> {
    if scale.fract() == 0.0 && scale < u64::MAX as f64 {
        let s = BigInt::from(scale as u64);
        let whole = m / &s;
        let rest = m % &s;
        Some(whole.to_f64()? + rest.to_f64()? / scale)
    } else {
        Some(m.to_f64()? / scale)
    }
}

/// Round half-to-even at `digits` decimals, normalizing -0.0 to 0.0
fn round_digits(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    let rounded = (value * factor).round_ties_even() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SchemeParameters;
    use crate::rlwe::{Encryptor, KeyGenerator};

    fn setup(params: SchemeParameters, seed: u64) -> (Arc<CryptoContext>, Encryptor, Decryptor) {
        let ctx = CryptoContext::new(params).unwrap();
        let mut keys = KeyGenerator::with_seed(Arc::clone(&ctx), seed).generate();
        let sk = keys.secret_key.take().unwrap();
        let dec = Decryptor::new(Arc::clone(&ctx), sk, &keys.public_key).unwrap();
        let enc = Encryptor::new(Arc::clone(&ctx), keys.public_key).unwrap();
        (ctx, enc, dec)
    }

    #[test]
    fn test_round_trip() {
        let (_, enc, dec) = setup(SchemeParameters::default_8192(), 31);
        for v in [3.14, -3.14, 0.0, 1e6, -1e6, 0.0001, 123456.7891] {
            let ct = enc.encrypt_number(v).unwrap();
            assert_eq!(dec.decrypt(&ct).unwrap(), v, "round trip of {}", v);
        }
    }

    #[test]
    fn test_zero_is_positive_zero() {
        let (_, enc, dec) = setup(SchemeParameters::compact_4096(), 32);
        let v = dec.decrypt(&enc.encrypt_zero()).unwrap();
        assert_eq!(v, 0.0);
        assert!(v.is_sign_positive());

        let tiny = dec.decrypt(&enc.encrypt_number(-0.001).unwrap()).unwrap();
        assert!(tiny.is_sign_positive());
    }

    #[test]
    fn test_homomorphic_sum() {
        let (ctx, enc, dec) = setup(SchemeParameters::compact_4096(), 33);
        let values = [2.0, 3.0, 5.0, -1.25];
        let mut sum = enc.encrypt_zero();
        for v in values {
            let ct = enc.encrypt_number(v).unwrap();
            sum.c0 += &ct.c0;
            sum.c1 += &ct.c1;
        }
        assert!(sum.validate(&ctx).is_ok());
        assert_eq!(dec.decrypt(&sum).unwrap(), 8.75);
    }

    #[test]
    fn test_foreign_key_rejected() {
        let (_, enc, _) = setup(SchemeParameters::compact_4096(), 34);
        let (_, _, other) = setup(SchemeParameters::compact_4096(), 35);
        let ct = enc.encrypt_number(1.0).unwrap();
        assert!(matches!(
            other.decrypt(&ct),
            Err(TallyError::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn test_tampered_scale_rejected() {
        let (_, enc, dec) = setup(SchemeParameters::compact_4096(), 38);
        let mut ct = enc.encrypt_number(5.0).unwrap();
        for scale in [1.0, 2.0 * ct.scale, f64::NAN] {
            ct.scale = scale;
            assert!(matches!(
                dec.decrypt(&ct),
                Err(TallyError::InvalidCiphertext(_))
            ));
            assert!(dec.headroom_bits(&ct).is_err());
        }
    }

    #[test]
    fn test_foreign_context_is_invalid() {
        let (_, _, dec) = setup(SchemeParameters::compact_4096(), 39);
        let (_, other, _) = setup(SchemeParameters::default_8192(), 40);
        let err = dec.decrypt(&other.encrypt_number(1.0).unwrap()).unwrap_err();
        assert!(matches!(err, TallyError::InvalidCiphertext(_)));
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_mismatched_key_pair_rejected() {
        let ctx = CryptoContext::new(SchemeParameters::compact_4096()).unwrap();
        let mut a = KeyGenerator::with_seed(Arc::clone(&ctx), 36).generate();
        let b = KeyGenerator::with_seed(Arc::clone(&ctx), 37).generate();
        let sk = a.secret_key.take().unwrap();
        assert!(matches!(
            Decryptor::new(ctx, sk, &b.public_key),
            Err(TallyError::Parameter(_))
        ));
    }

    #[test]
    fn test_headroom_shrinks_with_additions() {
        let (_, enc, dec) = setup(SchemeParameters::default_8192(), 38);
        let fresh = enc.encrypt_number(1.0).unwrap();
        let fresh_bits = dec.headroom_bits(&fresh).unwrap();
        assert!(fresh_bits > 50.0, "fresh headroom {}", fresh_bits);

        let mut sum = fresh.clone();
        for _ in 0..64 {
            sum.c0 += &fresh.c0;
            sum.c1 += &fresh.c1;
        }
        let summed_bits = dec.headroom_bits(&sum).unwrap();
        assert!(summed_bits < fresh_bits - 5.0);
    }

    #[test]
    fn test_descale_exact_for_large_values() {
        let scale = (1u64 << 40) as f64;
        let m = BigInt::from(987_654_321_123i64) * BigInt::from(1u64 << 40) + BigInt::from(1u64 << 39);
        assert_eq!(descale(&m, scale), Some(987_654_321_123.5));
        assert_eq!(descale(&BigInt::from(-3i64 << 39), scale), Some(-1.5));
    }

    #[test]
    fn test_round_digits_half_even() {
        assert_eq!(round_digits(0.125, 2), 0.12);
        assert_eq!(round_digits(2.5, 0), 2.0);
        assert_eq!(round_digits(-0.00001, 4), 0.0);
        assert!(round_digits(-0.00001, 4).is_sign_positive());
    }
}
