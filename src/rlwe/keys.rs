//! Key material and key generation.
//!
//! The secret key never leaves the process that generated it: it has no
//! serialization, no `Clone`, and its residues are wiped on drop. Everything
//! a client needs travels as a [`PublicKeyBundle`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroize;

use crate::context::{CryptoContext, ParmsId};
use crate::error::{incompatible, param_err, Result, TallyError};
use crate::ks::{generate_key_switch_key, KeySwitchKey};
use crate::math::{GaussianSampler, RnsPoly};
use crate::params::SchemeParameters;

use super::galois::is_valid_galois_element;

/// SHA-256 identity of a public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 32]);

impl KeyId {
    fn of(p0: &RnsPoly, p1: &RnsPoly) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"ckks-tally/key");
        hasher.update(p0.to_le_bytes());
        hasher.update(p1.to_le_bytes());
        Self(hasher.finalize().into())
    }

    /// Hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self)
    }
}

/// Ternary secret key over the full chain, NTT domain.
pub struct SecretKey {
    poly: RnsPoly,
}

impl SecretKey {
    /// Secret polynomial; crate-internal so decryption stays the only consumer
    pub(crate) fn poly(&self) -> &RnsPoly {
        &self.poly
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.poly.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Public encryption key (-a·s + e, a) over the data primes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    /// -a·s + e
    pub p0: RnsPoly,
    /// Uniform mask a
    pub p1: RnsPoly,
    /// Hash of (p0, p1)
    pub key_id: KeyId,
}

impl PublicKey {
    /// Check the key against `ctx` and recompute its id
    pub fn validate(&self, ctx: &CryptoContext) -> Result<()> {
        let moduli = ctx.moduli_at(ctx.top_level());
        for poly in [&self.p0, &self.p1] {
            if !poly.is_ntt() || !poly.is_well_formed(ctx.degree(), moduli) {
                return Err(incompatible!("public key does not match the context primes"));
            }
        }
        if KeyId::of(&self.p0, &self.p1) != self.key_id {
            return Err(TallyError::Serialization(
                "public key id does not match its contents".to_string(),
            ));
        }
        Ok(())
    }
}

/// Relinearization key: key switching from s² to s
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelinKey(pub KeySwitchKey);

/// Galois keys: key switching from τ_g(s) to s, per Galois element g
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GaloisKeys {
    /// Keys indexed by Galois element
    pub keys: BTreeMap<usize, KeySwitchKey>,
}

impl GaloisKeys {
    /// Key for element `g`, if generated
    pub fn get(&self, g: usize) -> Option<&KeySwitchKey> {
        self.keys.get(&g)
    }

    /// Generated Galois elements
    pub fn elements(&self) -> Vec<usize> {
        self.keys.keys().copied().collect()
    }
}

/// Everything generated for one context
#[derive(Debug)]
pub struct KeyMaterial {
    /// Public encryption key
    pub public_key: PublicKey,
    /// Secret key, present only on the decrypting party
    pub secret_key: Option<SecretKey>,
    /// Relinearization key
    pub relin_key: RelinKey,
    /// Galois keys, if requested
    pub galois_keys: Option<GaloisKeys>,
}

impl KeyMaterial {
    /// What clients need to encrypt for this context
    pub fn public_bundle(&self, ctx: &CryptoContext) -> PublicKeyBundle {
        PublicKeyBundle {
            params: ctx.params().clone(),
            parms_id: ctx.parms_id(ctx.top_level()),
            public_key: self.public_key.clone(),
        }
    }
}

/// Public key plus the parameters needed to rebuild the context
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    /// Scheme parameters of the issuing server
    pub params: SchemeParameters,
    /// Parameter id of the top level
    pub parms_id: ParmsId,
    /// Public encryption key
    pub public_key: PublicKey,
}

/// Generates key material for a context from a ChaCha20 stream.
pub struct KeyGenerator {
    ctx: Arc<CryptoContext>,
    rng: ChaCha20Rng,
    sampler: GaussianSampler,
}

impl KeyGenerator {
    /// Generator seeded from OS entropy
    pub fn new(ctx: Arc<CryptoContext>) -> Self {
        Self::with_rng(ctx, ChaCha20Rng::from_entropy())
    }

    /// Deterministic generator for reproducible runs
    pub fn with_seed(ctx: Arc<CryptoContext>, seed: u64) -> Self {
        Self::with_rng(ctx, ChaCha20Rng::seed_from_u64(seed))
    }

    fn with_rng(ctx: Arc<CryptoContext>, rng: ChaCha20Rng) -> Self {
        let sampler = GaussianSampler::new(ctx.params().sigma);
        Self { ctx, rng, sampler }
    }

    /// Generate secret, public and relinearization keys
    pub fn generate(&mut self) -> KeyMaterial {
        let ctx = Arc::clone(&self.ctx);
        let d = ctx.degree();
        let all_tables = ctx.all_tables();
        let level = ctx.top_level();

        let mut coeffs: Vec<i64> = (0..d).map(|_| self.rng.gen_range(-1..=1)).collect();
        let secret_key = SecretKey {
            poly: RnsPoly::from_signed_coeffs(&coeffs, ctx.primes()).to_ntt_new(&all_tables),
        };
        let mut s_data =
            RnsPoly::from_signed_coeffs(&coeffs, ctx.moduli_at(level)).to_ntt_new(&ctx.tables_at(level));
        coeffs.zeroize();

        let public_key = self.public_key(&s_data);
        s_data.zeroize();

        let mut s_squared = secret_key
            .poly
            .mul_ntt_domain(&secret_key.poly, &all_tables);
        let relin_key = RelinKey(generate_key_switch_key(
            &ctx,
            &s_squared,
            &secret_key.poly,
            &self.sampler,
            &mut self.rng,
        ));
        s_squared.zeroize();

        info!(key_id = %public_key.key_id, "key material generated");

        KeyMaterial {
            public_key,
            secret_key: Some(secret_key),
            relin_key,
            galois_keys: None,
        }
    }

    /// (-a·s + e, a) at the top level; `s` is the secret over the data primes
    fn public_key(&mut self, s: &RnsPoly) -> PublicKey {
        let ctx = &self.ctx;
        let level = ctx.top_level();
        let moduli = ctx.moduli_at(level);
        let tables = ctx.tables_at(level);

        let a = RnsPoly::sample_uniform(ctx.degree(), moduli, &mut self.rng);
        let e = RnsPoly::sample_gaussian(ctx.degree(), moduli, &self.sampler, &mut self.rng)
            .to_ntt_new(&tables);

        let p0 = &e - &a.mul_ntt_domain(s, &tables);
        let key_id = KeyId::of(&p0, &a);
        PublicKey { p0, p1: a, key_id }
    }

    /// Galois keys for the given elements
    ///
    /// Each element must be odd and below 2d.
    pub fn galois_keys(&mut self, secret_key: &SecretKey, elements: &[usize]) -> Result<GaloisKeys> {
        let ctx = Arc::clone(&self.ctx);
        let d = ctx.degree();
        let all_tables = ctx.all_tables();

        let mut s_coeffs = secret_key.poly.from_ntt_new(&all_tables);
        let mut keys = BTreeMap::new();
        for &g in elements {
            if !is_valid_galois_element(g, d) {
                return Err(param_err!("{} is not a Galois element for degree {}", g, d));
            }
            let mut s_g = s_coeffs.automorphism(g);
            s_g.to_ntt(&all_tables);
            let key = generate_key_switch_key(
                &ctx,
                &s_g,
                &secret_key.poly,
                &self.sampler,
                &mut self.rng,
            );
            s_g.zeroize();
            keys.insert(g, key);
        }
        s_coeffs.zeroize();

        info!(elements = ?elements, "galois keys generated");
        Ok(GaloisKeys { keys })
    }
}
