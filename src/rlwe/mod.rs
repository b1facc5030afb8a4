//! RLWE encryption of fixed-point numbers
//!
//! Ciphertexts live in R_Q = Z_Q[X]/(X^d + 1), Q = q_0·…·q_l, with every
//! polynomial kept in RNS form and NTT domain.
//!
//! # Overview
//!
//! - Secret key s is a ternary polynomial, held only by the [`Decryptor`]
//! - Public key is (-a·s + e, a); the [`Encryptor`] needs nothing else
//! - A value v is encoded as the constant coefficient ⌊v·Δ⌉, so adding
//!   ciphertexts adds the encrypted values
//!
//! # Galois Automorphisms
//!
//! Automorphisms τ_g: R → R defined by τ_g(X) = X^g. A Galois key lets the
//! evaluator apply τ_g to a ciphertext without the secret key. The constant
//! coefficient is fixed by every τ_g, so applying one never changes a tally.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ckks_tally::context::CryptoContext;
//! use ckks_tally::params::SchemeParameters;
//! use ckks_tally::rlwe::{Decryptor, Encryptor, KeyGenerator};
//!
//! let ctx = CryptoContext::new(SchemeParameters::default_8192()).unwrap();
//! let mut keys = KeyGenerator::new(Arc::clone(&ctx)).generate();
//!
//! let secret_key = keys.secret_key.take().unwrap();
//! let decryptor = Decryptor::new(Arc::clone(&ctx), secret_key, &keys.public_key).unwrap();
//! let encryptor = Encryptor::new(ctx, keys.public_key).unwrap();
//!
//! let ct = encryptor.encrypt_number(3.14).unwrap();
//! assert_eq!(decryptor.decrypt(&ct).unwrap(), 3.14);
//! ```

mod decryptor;
mod encoder;
mod encryptor;
pub mod galois;
mod keys;
mod types;

pub use decryptor::Decryptor;
pub use encoder::Encoder;
pub use encryptor::Encryptor;
pub use galois::{galois_generators, is_valid_galois_element};
pub use keys::{
    GaloisKeys, KeyGenerator, KeyId, KeyMaterial, PublicKey, PublicKeyBundle, RelinKey, SecretKey,
};
pub use types::{Ciphertext, Plaintext};
