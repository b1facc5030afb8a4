//! Public-key encryption (client capability).
//!
//! ```text
//! u ← ternary, e0, e1 ← χ_σ
//! c0 = p0·u + e0 + m
//! c1 = p1·u + e1
//! ```
//! so that `c0 + c1·s = m + e0 + e1·s + e·u`.

use rand::{CryptoRng, RngCore};
use std::sync::Arc;

use crate::context::CryptoContext;
use crate::error::{incompatible, Result};
use crate::math::{GaussianSampler, RnsPoly};

use super::encoder::Encoder;
use super::keys::{PublicKey, PublicKeyBundle};
use super::types::{Ciphertext, Plaintext};

/// Encrypts under a public key; holds no secret material
#[derive(Clone)]
pub struct Encryptor {
    ctx: Arc<CryptoContext>,
    public_key: PublicKey,
    /// (p0, p1) restricted to the primes of each level, index = level.
    key_by_level: Vec<(RnsPoly, RnsPoly)>,
    encoder: Encoder,
    sampler: GaussianSampler,
}

impl Encryptor {
    /// Encryptor for `public_key`, which must belong to `ctx`
    pub fn new(ctx: Arc<CryptoContext>, public_key: PublicKey) -> Result<Self> {
        public_key.validate(&ctx)?;

        let mut key_by_level = Vec::with_capacity(ctx.top_level() + 1);
        let mut p0 = public_key.p0.clone();
        let mut p1 = public_key.p1.clone();
        for _ in 0..ctx.top_level() {
            key_by_level.push((p0.clone(), p1.clone()));
            p0.drop_last_modulus();
            p1.drop_last_modulus();
        }
        key_by_level.push((p0, p1));
        key_by_level.reverse();

        Ok(Self {
            encoder: Encoder::new(Arc::clone(&ctx)),
            sampler: GaussianSampler::new(ctx.params().sigma),
            ctx,
            public_key,
            key_by_level,
        })
    }

    /// Rebuild the context a server advertised and bind its public key
    ///
    /// Fails when the rebuilt context does not reproduce the advertised
    /// parameter id.
    pub fn from_bundle(bundle: PublicKeyBundle) -> Result<Self> {
        let ctx = CryptoContext::new(bundle.params)?;
        let top = ctx.parms_id(ctx.top_level());
        if top != bundle.parms_id {
            return Err(incompatible!(
                "bundle advertises parameter id {}, parameters produce {}",
                bundle.parms_id,
                top
            ));
        }
        Self::new(ctx, bundle.public_key)
    }

    /// Shared context
    pub fn context(&self) -> &Arc<CryptoContext> {
        &self.ctx
    }

    /// The public key being encrypted under
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Encoder for the same context
    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Encrypt a plaintext with the thread-local CSPRNG
    pub fn encrypt(&self, pt: &Plaintext) -> Result<Ciphertext> {
        self.encrypt_with_rng(pt, &mut rand::thread_rng())
    }

    /// Encrypt a plaintext with an explicit RNG
    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        let level = pt.level;
        if level > self.ctx.top_level() {
            return Err(incompatible!("plaintext level {} is above the top level", level));
        }
        if !pt.poly.is_ntt() || !pt.poly.is_well_formed(self.ctx.degree(), self.ctx.moduli_at(level)) {
            return Err(incompatible!("plaintext does not match the primes of level {}", level));
        }
        if pt.scale != self.ctx.params().scale {
            return Err(incompatible!(
                "plaintext scale {} differs from the context scale {}",
                pt.scale,
                self.ctx.params().scale
            ));
        }
        Ok(self.encrypt_poly(&pt.poly, level, pt.scale, rng))
    }

    /// Encode and encrypt a single number at the top level
    pub fn encrypt_number(&self, value: f64) -> Result<Ciphertext> {
        self.encrypt_number_with_rng(value, &mut rand::thread_rng())
    }

    /// Encode and encrypt a single number with an explicit RNG
    pub fn encrypt_number_with_rng<R: RngCore + CryptoRng>(
        &self,
        value: f64,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        let pt = self.encoder.encode(value, self.ctx.top_level())?;
        self.encrypt_with_rng(&pt, rng)
    }

    /// Fresh encryption of zero at the top level
    pub fn encrypt_zero(&self) -> Ciphertext {
        self.encrypt_zero_with_rng(&mut rand::thread_rng())
    }

    /// Fresh encryption of zero with an explicit RNG
    pub fn encrypt_zero_with_rng<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Ciphertext {
        let level = self.ctx.top_level();
        let zero = RnsPoly::zero(self.ctx.degree(), self.ctx.moduli_at(level), true);
        self.encrypt_poly(&zero, level, self.ctx.params().scale, rng)
    }

    fn encrypt_poly<R: RngCore + CryptoRng>(
        &self,
        m: &RnsPoly,
        level: usize,
        scale: f64,
        rng: &mut R,
    ) -> Ciphertext {
        let ctx = &self.ctx;
        let d = ctx.degree();
        let moduli = ctx.moduli_at(level);
        let tables = ctx.tables_at(level);
        let (p0, p1) = &self.key_by_level[level];

        let u = RnsPoly::sample_ternary(d, moduli, rng).to_ntt_new(&tables);
        let e0 = RnsPoly::sample_gaussian(d, moduli, &self.sampler, rng).to_ntt_new(&tables);
        let e1 = RnsPoly::sample_gaussian(d, moduli, &self.sampler, rng).to_ntt_new(&tables);

        let mut c0 = p0.mul_ntt_domain(&u, &tables);
        c0 += &e0;
        c0 += m;
        let mut c1 = p1.mul_ntt_domain(&u, &tables);
        c1 += &e1;

        Ciphertext {
            c0,
            c1,
            level,
            scale,
            parms_id: ctx.parms_id(level),
            key_id: self.public_key.key_id,
        }
    }
}
