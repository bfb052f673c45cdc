#![crate_name = "ckks"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! The CKKS approximate homomorphic encryption scheme.
//!
//! Vectors of reals are encoded through the canonical embedding into
//! polynomials of `Z_Q[x]/(x^n + 1)`, and encrypted under a ternary secret
//! key. Ciphertexts at the same scale can be added and subtracted, and their
//! slots rotated with Galois keys. When the parameters list at least two
//! moduli, the last one is a special prime only used by the key-switching
//! keys.

mod ciphertext;
mod encoding;
mod errors;
mod keys;
mod parameters;
mod plaintext;
mod proto;
mod traits;

pub use ciphertext::Ciphertext;
pub use errors::{Error, ParametersError, Result};
pub use keys::{GaloisKey, GaloisKeys, KeySwitchingKey, PublicKey, SecretKey};
pub use parameters::{CkksParameters, CkksParametersBuilder};
pub use plaintext::{Encoding, Plaintext};
pub use traits::TryConvertFrom;
