//! Mathematical primitives for the tally scheme.
//!
//! This module provides the ring arithmetic the RLWE layer is built on:
//!
//! - **Modular arithmetic** over Z_q
//! - **Number-Theoretic Transform (NTT)** with Montgomery reduction, one table per prime
//! - **RNS polynomials** over R_Q = Z_Q[X]/(X^d + 1)
//! - **CRT reconstruction** of RNS residues into big integers
//! - **NTT-friendly prime search** with a Miller-Rabin test
//! - **Discrete Gaussian sampling** for error terms
//!
//! # Example
//!
//! ```
//! use ckks_tally::math::{NttContext, RnsPoly};
//!
//! let q = 1152921504606830593;
//! let table = NttContext::new(256, q).unwrap();
//! let mut poly = RnsPoly::constant(42, 256, &[q]);
//! poly.to_ntt(&[&table]);
//! poly.from_ntt(&[&table]);
//! assert_eq!(poly.residue(0)[0], 42);
//! ```

pub mod gaussian;
pub mod modular;
pub mod ntt;
pub mod poly;
pub mod primes;
pub mod rns;

pub use gaussian::GaussianSampler;
pub use modular::ModQ;
pub use ntt::NttContext;
pub use poly::RnsPoly;
pub use primes::generate_ntt_primes;
pub use rns::RnsBasis;
