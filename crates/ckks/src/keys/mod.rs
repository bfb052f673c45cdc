//! Keys for the CKKS encryption scheme

mod galois_key;
mod key_switching_key;
mod public_key;
mod secret_key;

pub use galois_key::{GaloisKey, GaloisKeys};
pub use key_switching_key::KeySwitchingKey;
pub use public_key::PublicKey;
pub use secret_key::SecretKey;
