//! NTT-friendly prime search

use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::BigUint;

use crate::error::{param_err, Result};

/// Miller-Rabin rounds on top of the Baillie-PSW test
const MILLER_RABIN_ROUNDS: usize = 20;

/// Primality test for a 64-bit candidate
pub fn is_prime(n: u64) -> bool {
    probably_prime(&BigUint::from(n), MILLER_RABIN_ROUNDS)
}

/// Largest `bits`-bit prime q ≡ 1 (mod 2·degree) that is not in `exclude`
///
/// Candidates walk downward from 2^bits in steps of 2·degree.
pub fn ntt_prime(bits: usize, degree: usize, exclude: &[u64]) -> Option<u64> {
    if !(2..=62).contains(&bits) {
        return None;
    }
    let two_n = 2 * degree as u64;
    let lower = 1u64 << (bits - 1);
    let mut candidate = (1u64 << bits).checked_sub(two_n)? + 1;

    while candidate > lower {
        if !exclude.contains(&candidate) && is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(two_n)?;
    }
    None
}

/// Distinct NTT-friendly primes of the requested bit lengths, in chain order
pub fn generate_ntt_primes(bit_sizes: &[usize], degree: usize) -> Result<Vec<u64>> {
    let mut primes = Vec::with_capacity(bit_sizes.len());
    for &bits in bit_sizes {
        let q = ntt_prime(bits, degree, &primes).ok_or_else(|| {
            param_err!(
                "no {}-bit prime ≡ 1 mod {} left for the coefficient modulus",
                bits,
                2 * degree
            )
        })?;
        primes.push(q);
    }
    Ok(primes)
}
