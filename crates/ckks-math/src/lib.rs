#![crate_name = "ckks_math"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Mathematical utilities for the ckks crates: modular arithmetic, prime
//! generation, number-theoretic transforms, residue number systems and the
//! polynomial ring Z_q\[x\]/(x^n + 1).

pub mod ntt;
pub mod rns;
pub mod rq;
pub mod sampling;
pub mod zq;

use thiserror::Error;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Indicates an invalid modulus
    #[error("Invalid modulus: modulus {0} should be between 2 and 2^62-1.")]
    InvalidModulus(u64),

    /// Indicates an error in the serialization / deserialization.
    #[error("{0}")]
    Serialization(String),

    /// Indicates that there is no more contexts to switch to.
    #[error("This is the last context.")]
    NoMoreContext,

    /// Indicates that the provided context is invalid.
    #[error("Invalid context provided.")]
    InvalidContext,

    /// Indicates an incorrect representation.
    #[error("Incorrect representation: got {0:?}, expected {1:?}.")]
    IncorrectRepresentation(rq::Representation, rq::Representation),

    /// Indicates that the seed size is incorrect.
    #[error("Invalid seed: got {0} bytes, expected {1} bytes.")]
    InvalidSeedSize(usize, usize),

    /// Indicates a default error
    #[error("{0}")]
    Default(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_strings() {
        assert_eq!(
            Error::InvalidModulus(0).to_string(),
            "Invalid modulus: modulus 0 should be between 2 and 2^62-1."
        );
        assert_eq!(
            Error::Serialization("test".to_string()).to_string(),
            "test"
        );
        assert_eq!(Error::NoMoreContext.to_string(), "This is the last context.");
        assert_eq!(Error::InvalidContext.to_string(), "Invalid context provided.");
        assert_eq!(
            Error::InvalidSeedSize(0, 1).to_string(),
            "Invalid seed: got 0 bytes, expected 1 bytes."
        );
    }
}
