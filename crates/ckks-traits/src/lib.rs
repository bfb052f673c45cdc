#![crate_name = "ckks_traits"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Traits shared by the ckks crates.
//!
//! The traits are independent of the underlying scheme: a set of parameters,
//! plaintexts that encode values under these parameters, ciphertexts that
//! encrypt plaintexts, and encrypters / decrypters moving between the two.

use rand::{CryptoRng, RngCore};
use std::sync::Arc;

/// The homomorphic encryption parameters.
pub trait FheParameters {}

/// Indicates that an object is parametrized.
pub trait FheParametrized {
    /// The type of the FHE parameters.
    type Parameters: FheParameters;
}

/// Indicates that an object is a plaintext.
pub trait FhePlaintext
where
    Self: Sized + FheParametrized,
{
    /// The type of the encoding.
    type Encoding;
}

/// Encode a value using a specified encoding.
pub trait FheEncoder<V>
where
    Self: FhePlaintext,
{
    /// The type of error returned.
    type Error;

    /// Attempt to encode a value using a specified encoding.
    fn try_encode(
        value: V,
        encoding: Self::Encoding,
        par: &Arc<Self::Parameters>,
    ) -> Result<Self, Self::Error>;
}

/// Decode the value in the plaintext.
pub trait FheDecoder<P: FhePlaintext>
where
    Self: Sized,
{
    /// The type of error returned.
    type Error;

    /// Attempt to decode a plaintext. The encoding stored in the plaintext is
    /// used when `encoding` is `None`.
    fn try_decode<O>(pt: &P, encoding: O) -> Result<Self, Self::Error>
    where
        O: Into<Option<P::Encoding>>;
}

/// A ciphertext which will encrypt a plaintext.
pub trait FheCiphertext
where
    Self: Sized + Serialize + FheParametrized + DeserializeParametrized,
{
}

/// Encrypt a plaintext into a ciphertext.
pub trait FheEncrypter<
    P: FhePlaintext<Parameters = Self::Parameters>,
    C: FheCiphertext<Parameters = Self::Parameters>,
>: FheParametrized
{
    /// The type of error returned.
    type Error;

    /// Try to encrypt an [`FhePlaintext`] into an [`FheCiphertext`].
    fn try_encrypt<R: RngCore + CryptoRng>(&self, pt: &P, rng: &mut R) -> Result<C, Self::Error>;
}

/// Decrypt a ciphertext into a plaintext.
pub trait FheDecrypter<
    P: FhePlaintext<Parameters = Self::Parameters>,
    C: FheCiphertext<Parameters = Self::Parameters>,
>: FheParametrized
{
    /// The type of error returned.
    type Error;

    /// Try to decrypt an [`FheCiphertext`] into an [`FhePlaintext`].
    fn try_decrypt(&self, ct: &C) -> Result<P, Self::Error>;
}

/// Serialization.
pub trait Serialize {
    /// Serialize `Self` into a vector of bytes.
    fn to_bytes(&self) -> Vec<u8>;
}

/// Deserialization of a parametrized value.
pub trait DeserializeParametrized
where
    Self: Sized,
    Self: FheParametrized,
{
    /// The type of error returned.
    type Error;

    /// Attempt to deserialize from a vector of bytes.
    fn from_bytes(bytes: &[u8], par: &Arc<Self::Parameters>) -> Result<Self, Self::Error>;
}

/// Deserialization setting an explicit context.
pub trait DeserializeWithContext
where
    Self: Sized,
{
    /// The type of error returned.
    type Error;

    /// The type of context.
    type Context;

    /// Attempt to deserialize from a vector of bytes.
    fn from_bytes(bytes: &[u8], ctx: &Arc<Self::Context>) -> Result<Self, Self::Error>;
}

/// Deserialization without context.
pub trait Deserialize
where
    Self: Sized,
{
    /// The type of error returned.
    type Error;

    /// Attempt to deserialize from a vector of bytes.
    fn try_deserialize(bytes: &[u8]) -> Result<Self, Self::Error>;
}
