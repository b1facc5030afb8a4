//! Encryption context: validated parameters plus every derived table
//!
//! A [`CryptoContext`] is built once at startup and shared read-only behind
//! an `Arc`. It owns the prime chain, one NTT table per prime, the CRT basis
//! of every ciphertext level and the parameter id stamped on ciphertexts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{param_err, Result};
use crate::math::{generate_ntt_primes, ModQ, NttContext, RnsBasis};
use crate::params::SchemeParameters;

/// SHA-256 identity of a ring and its prime chain at one level
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParmsId(pub [u8; 32]);

impl ParmsId {
    fn compute(degree: usize, moduli: &[u64]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"ckks-tally/parms");
        hasher.update((degree as u64).to_le_bytes());
        for q in moduli {
            hasher.update(q.to_le_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ParmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for ParmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParmsId({})", self)
    }
}

/// Scheme parameters with precomputed NTT and CRT tables
pub struct CryptoContext {
    params: SchemeParameters,
    /// Full chain, data primes first, special prime last.
    primes: Vec<u64>,
    /// NTT tables aligned with `primes`.
    ntt: Vec<NttContext>,
    /// CRT basis of `primes[..=level]` per level.
    level_bases: Vec<RnsBasis>,
    parms_ids: Vec<ParmsId>,
    /// P mod q_j for each data prime.
    special_mod_q: Vec<u64>,
    /// P^(-1) mod q_j for each data prime.
    special_inv_mod_q: Vec<u64>,
}

impl CryptoContext {
    /// Validate `params`, find the primes and build every table
    pub fn new(params: SchemeParameters) -> Result<Arc<Self>> {
        params.validate()?;

        let degree = params.poly_degree;
        let primes = generate_ntt_primes(&params.coeff_modulus_bits, degree)?;
        debug!(?primes, "coefficient modulus chain");

        let ntt = primes
            .iter()
            .map(|&q| NttContext::new(degree, q))
            .collect::<Result<Vec<_>>>()?;

        let data_count = primes.len() - 1;
        let level_bases = (1..=data_count)
            .map(|k| RnsBasis::new(&primes[..k]))
            .collect::<Result<Vec<_>>>()?;

        // Largest sum the accumulator can hold, including the Enc(0) it starts from
        let top_basis = &level_bases[data_count - 1];
        let per_submission =
            params.max_value * params.scale + 0.5 + params.fresh_noise_bound();
        let needed_bits =
            ((params.max_submissions as f64 + 1.0) * per_submission).log2() + 1.0;
        let available_bits = top_basis.log2_product();
        if needed_bits >= available_bits {
            return Err(param_err!(
                "sum of {} submissions needs {:.1} bits but the data modulus has {:.1}",
                params.max_submissions,
                needed_bits,
                available_bits
            ));
        }

        let parms_ids = (1..=data_count)
            .map(|k| ParmsId::compute(degree, &primes[..k]))
            .collect();

        let special = primes[data_count];
        let special_mod_q: Vec<u64> = primes[..data_count].iter().map(|&q| special % q).collect();
        let special_inv_mod_q = special_mod_q
            .iter()
            .zip(&primes)
            .map(|(&p, &q)| {
                ModQ::inverse(p, q).ok_or_else(|| param_err!("special prime shares a factor with {}", q))
            })
            .collect::<Result<Vec<_>>>()?;

        let ctx = Self {
            params,
            primes,
            ntt,
            level_bases,
            parms_ids,
            special_mod_q,
            special_inv_mod_q,
        };

        info!(
            degree,
            levels = data_count,
            modulus_bits = ctx.params.total_modulus_bits(),
            headroom_bits = format_args!("{:.1}", available_bits - needed_bits),
            parms_id = %ctx.parms_id(ctx.top_level()),
            "crypto context ready"
        );

        Ok(Arc::new(ctx))
    }

    /// Parameters this context was built from
    pub fn params(&self) -> &SchemeParameters {
        &self.params
    }

    /// Ring dimension d
    pub fn degree(&self) -> usize {
        self.params.poly_degree
    }

    /// Full prime chain including the special prime
    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    /// Data primes only
    pub fn data_primes(&self) -> &[u64] {
        &self.primes[..self.primes.len() - 1]
    }

    /// Special prime P used by key-switching keys
    pub fn special_prime(&self) -> u64 {
        self.primes[self.primes.len() - 1]
    }

    /// Highest ciphertext level; fresh ciphertexts live here
    pub fn top_level(&self) -> usize {
        self.level_bases.len() - 1
    }

    /// Primes of a ciphertext at `level`
    pub fn moduli_at(&self, level: usize) -> &[u64] {
        &self.primes[..=level]
    }

    /// CRT basis of a ciphertext at `level`
    pub fn basis_at(&self, level: usize) -> &RnsBasis {
        &self.level_bases[level]
    }

    /// Parameter id of `level`
    pub fn parms_id(&self, level: usize) -> ParmsId {
        self.parms_ids[level]
    }

    /// Level carrying this parameter id, if it belongs to this context
    pub fn level_of(&self, id: &ParmsId) -> Option<usize> {
        self.parms_ids.iter().position(|p| p == id)
    }

    /// NTT tables for the primes of `level`
    pub fn tables_at(&self, level: usize) -> Vec<&NttContext> {
        self.ntt[..=level].iter().collect()
    }

    /// NTT tables for the whole chain including the special prime
    pub fn all_tables(&self) -> Vec<&NttContext> {
        self.ntt.iter().collect()
    }

    /// NTT tables for the primes of `level` followed by the special prime
    pub fn extended_tables_at(&self, level: usize) -> Vec<&NttContext> {
        let mut tables: Vec<&NttContext> = self.ntt[..=level].iter().collect();
        tables.push(&self.ntt[self.ntt.len() - 1]);
        tables
    }

    /// Primes of `level` followed by the special prime
    pub fn extended_moduli_at(&self, level: usize) -> Vec<u64> {
        let mut moduli = self.primes[..=level].to_vec();
        moduli.push(self.special_prime());
        moduli
    }

    /// NTT table of the special prime
    pub fn special_table(&self) -> &NttContext {
        &self.ntt[self.ntt.len() - 1]
    }

    /// P mod q_j
    pub fn special_mod(&self, j: usize) -> u64 {
        self.special_mod_q[j]
    }

    /// P^(-1) mod q_j
    pub fn special_inv(&self, j: usize) -> u64 {
        self.special_inv_mod_q[j]
    }
}

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContext")
            .field("degree", &self.degree())
            .field("primes", &self.primes)
            .field("parms_id", &self.parms_id(self.top_level()))
            .finish()
    }
}
