//! Key-switching module
//!
//! Key switching turns a polynomial that multiplies a secret s' into a pair
//! that decrypts under s. The relinearization key (s' = s²) and the Galois
//! keys (s' = τ_g(s)) are both key-switching keys.
//!
//! # Key-Switching Key
//!
//! Keys use the hybrid RNS construction: one row per data prime, defined
//! over the data primes plus a special prime P that is divided out after
//! the inner product, so the switching noise shrinks by a factor of P.
//!
//! ```text
//! K[i] = RLWE_s(P · [Q/q_i]·[(Q/q_i)^(-1)]_{q_i} · s')
//! ```
//!
//! # Algorithm
//!
//! To switch c (multiplying s') at level l:
//! 1. Decompose c into RNS digits [c]_{q_0} .. [c]_{q_l}
//! 2. Compute (d0, d1) = Σᵢ [c]_{q_i} · K[i] over q_0..q_l, P
//! 3. Mod-down: divide by P and drop the special prime

mod setup;
mod switch;

pub use setup::{generate_key_switch_key, KeySwitchKey, KeySwitchRow};
pub use switch::key_switch;
