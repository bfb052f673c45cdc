//! Encryption of flat sequences as ordered fixed-capacity ciphertext chunks.

use ckks::{Ciphertext, CkksParameters};
use ckks_traits::{DeserializeParametrized, FheParametrized, Serialize};
use prost::Message;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::collection::{ParameterCollection, ShapeTable};
use crate::context::CryptoContext;
use crate::proto::{
    EncryptedParameter as EncryptedParameterProto,
    EncryptedParameterCollection as EncryptedParameterCollectionProto,
};
use crate::{tensor_codec, Error, Result};

/// A ciphertext encoding a contiguous chunk of a flat sequence.
pub type CipherChunk = Ciphertext;

/// Encrypt `values` as chunks of `max_chunk_size` values, the last one
/// possibly shorter.
///
/// The chunks are in the order of the values; an empty sequence gives no
/// chunk.
pub fn encrypt(
    values: &[f64],
    context: &CryptoContext,
    max_chunk_size: usize,
) -> Result<Vec<CipherChunk>> {
    check_chunk_size(context, max_chunk_size)?;
    values
        .par_chunks(max_chunk_size)
        .map(|chunk| context.encrypt(chunk))
        .collect()
}

/// Decrypt the chunks in order and concatenate their values.
pub fn decrypt(chunks: &[CipherChunk], context: &CryptoContext) -> Result<Vec<f64>> {
    let decrypted = chunks
        .par_iter()
        .map(|chunk| context.decrypt(chunk))
        .collect::<Result<Vec<_>>>()?;
    Ok(decrypted.into_iter().flatten().collect())
}

fn check_chunk_size(context: &CryptoContext, max_chunk_size: usize) -> Result<()> {
    if max_chunk_size == 0 {
        return Err(Error::InvalidConfiguration(
            "the chunk size must be positive".to_string(),
        ));
    }
    if max_chunk_size > context.slot_capacity() {
        return Err(Error::CryptoContextMismatch(format!(
            "chunks of {max_chunk_size} values exceed the capacity of {} slots",
            context.slot_capacity()
        )));
    }
    Ok(())
}

/// Chunked encryption under a fixed context and chunk size.
#[derive(Debug, Clone)]
pub struct ChunkedCipherCodec {
    context: Arc<CryptoContext>,
    max_chunk_size: usize,
}

impl ChunkedCipherCodec {
    /// A codec using the full capacity of the context, i.e. half the
    /// polynomial degree.
    pub fn new(context: &Arc<CryptoContext>) -> Self {
        Self {
            context: context.clone(),
            max_chunk_size: context.slot_capacity(),
        }
    }

    /// A codec with an explicit chunk size.
    pub fn with_chunk_size(context: &Arc<CryptoContext>, max_chunk_size: usize) -> Result<Self> {
        check_chunk_size(context, max_chunk_size)?;
        Ok(Self {
            context: context.clone(),
            max_chunk_size,
        })
    }

    /// The context of the codec.
    pub fn context(&self) -> &Arc<CryptoContext> {
        &self.context
    }

    /// The number of values per chunk.
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Encrypt a flat sequence.
    pub fn encrypt(&self, values: &[f64]) -> Result<Vec<CipherChunk>> {
        encrypt(values, &self.context, self.max_chunk_size)
    }

    /// Decrypt a chunk sequence.
    pub fn decrypt(&self, chunks: &[CipherChunk]) -> Result<Vec<f64>> {
        decrypt(chunks, &self.context)
    }

    /// Flatten and encrypt every parameter of a collection.
    pub fn encrypt_collection(
        &self,
        collection: &ParameterCollection,
    ) -> Result<EncryptedParameterCollection> {
        let (flat, _) = tensor_codec::flatten(collection);
        let parameters = flat
            .into_iter()
            .map(|(name, values)| Ok((name, self.encrypt(&values)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        debug!(
            parameters = parameters.len(),
            chunks = parameters.values().map(Vec::len).sum::<usize>(),
            "encrypted collection"
        );
        Ok(EncryptedParameterCollection {
            par: self.context.parameters().clone(),
            parameters,
        })
    }

    /// Decrypt every parameter of an encrypted collection and restore the
    /// shapes recorded in `shapes`.
    pub fn decrypt_collection(
        &self,
        encrypted: &EncryptedParameterCollection,
        shapes: &ShapeTable,
    ) -> Result<ParameterCollection> {
        let flat = encrypted
            .parameters
            .iter()
            .map(|(name, chunks)| Ok((name.clone(), self.decrypt(chunks)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        tensor_codec::restore(flat, shapes)
    }
}

/// The encrypted parameters of one participant: each parameter name mapped to
/// its ordered chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedParameterCollection {
    par: Arc<CkksParameters>,
    parameters: BTreeMap<String, Vec<CipherChunk>>,
}

impl EncryptedParameterCollection {
    /// The scheme parameters the chunks were encrypted under.
    pub fn scheme_parameters(&self) -> &Arc<CkksParameters> {
        &self.par
    }

    /// The chunks of a parameter.
    pub fn get(&self, name: &str) -> Option<&[CipherChunk]> {
        self.parameters.get(name).map(Vec::as_slice)
    }

    /// Iterate over the parameters, in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<CipherChunk>)> {
        self.parameters.iter()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the collection has no parameter.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Total number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.parameters.values().map(Vec::len).sum()
    }
}

impl FheParametrized for EncryptedParameterCollection {
    type Parameters = CkksParameters;
}

impl From<&EncryptedParameterCollection> for EncryptedParameterCollectionProto {
    fn from(value: &EncryptedParameterCollection) -> Self {
        EncryptedParameterCollectionProto {
            parameters: value
                .parameters
                .iter()
                .map(|(name, chunks)| EncryptedParameterProto {
                    name: name.clone(),
                    chunks: chunks.iter().map(|c| c.to_bytes()).collect(),
                })
                .collect(),
        }
    }
}

impl Serialize for EncryptedParameterCollection {
    fn to_bytes(&self) -> Vec<u8> {
        EncryptedParameterCollectionProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for EncryptedParameterCollection {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let proto: EncryptedParameterCollectionProto = Message::decode(bytes)
            .map_err(|_| Error::Scheme(ckks::Error::SerializationError))?;
        let mut parameters = BTreeMap::new();
        for p in proto.parameters {
            let chunks = p
                .chunks
                .iter()
                .map(|c| Ciphertext::from_bytes(c, par))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if parameters.insert(p.name.clone(), chunks).is_some() {
                return Err(Error::Scheme(ckks::Error::SerializationError));
            }
        }
        Ok(Self {
            par: par.clone(),
            parameters,
        })
    }
}
