//! ckks-tally: encrypted tallying with homomorphic addition
//!
//! Untrusted clients encrypt numbers under a server's public key; the server
//! sums the ciphertexts without ever seeing a single value and only the
//! holder of the secret key can reveal the aggregate.
//!
//! Key components:
//! - [`CryptoContext`]: validated parameters, prime chain, NTT and CRT tables
//! - [`KeyGenerator`]: public, secret, relinearization and Galois keys
//! - [`Encryptor`] / [`Decryptor`]: the client and key-holder capabilities
//! - [`Accumulator`]: running encrypted sum shared by concurrent submitters
//! - [`wire`]: binary envelope and base64 text encoding for the transport
//!
//! ```no_run
//! use std::sync::Arc;
//! use ckks_tally::{Accumulator, CryptoContext, Decryptor, Encryptor, KeyGenerator, SchemeParameters};
//!
//! let ctx = CryptoContext::new(SchemeParameters::default_8192())?;
//! let mut keys = KeyGenerator::new(Arc::clone(&ctx)).generate();
//! let secret_key = keys.secret_key.take().unwrap();
//! let decryptor = Decryptor::new(Arc::clone(&ctx), secret_key, &keys.public_key)?;
//! let encryptor = Encryptor::new(Arc::clone(&ctx), keys.public_key)?;
//!
//! let accumulator = Accumulator::new(encryptor.clone());
//! for v in [2.0, 3.0, 5.0] {
//!     accumulator.add(&encryptor.encrypt_number(v)?)?;
//! }
//! let snapshot = accumulator.snapshot();
//! assert_eq!(decryptor.decrypt(&snapshot.ciphertext)?, 10.0);
//! # Ok::<(), ckks_tally::TallyError>(())
//! ```

pub mod accumulator;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod ks;
pub mod math;
pub mod params;
pub mod rlwe;
pub mod wire;

#[cfg(feature = "server")]
pub mod api;

pub use accumulator::{Accumulator, AccumulatorState, Snapshot};
pub use context::{CryptoContext, ParmsId};
pub use error::{Result, TallyError};
pub use evaluator::Evaluator;
pub use params::{SchemeParameters, SecurityLevel};
pub use rlwe::{
    Ciphertext, Decryptor, Encoder, Encryptor, GaloisKeys, KeyGenerator, KeyId, KeyMaterial,
    Plaintext, PublicKey, PublicKeyBundle, RelinKey, SecretKey,
};
