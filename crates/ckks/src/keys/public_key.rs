//! Public keys for the CKKS encryption scheme

use crate::proto::{Ciphertext as CiphertextProto, PublicKey as PublicKeyProto};
use crate::traits::TryConvertFrom;
use crate::{Ciphertext, CkksParameters, Encoding, Error, Plaintext, Result};
use ckks_math::rq::{Poly, Representation};
use ckks_traits::{
    DeserializeParametrized, FheEncoder, FheEncrypter, FheParametrized, Serialize,
};
use prost::Message;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::SecretKey;

/// Public key for the CKKS encryption scheme.
#[derive(Debug, PartialEq, Clone)]
pub struct PublicKey {
    /// The CKKS parameters
    pub(crate) par: Arc<CkksParameters>,
    /// The public key ciphertext, an encryption of zero
    pub(crate) c: Ciphertext,
}

impl PublicKey {
    /// Generate a new [`PublicKey`] from a [`SecretKey`].
    pub fn new<R: RngCore + CryptoRng>(sk: &SecretKey, rng: &mut R) -> Result<Self> {
        let empty: &[f64] = &[];
        let zero = Plaintext::try_encode(empty, Encoding::canonical(), &sk.par)?;
        let c: Ciphertext = sk.try_encrypt(&zero, rng)?;
        Ok(Self {
            par: sk.par.clone(),
            c,
        })
    }

    /// Returns the parameters of the public key.
    pub fn parameters(&self) -> &Arc<CkksParameters> {
        &self.par
    }
}

impl FheParametrized for PublicKey {
    type Parameters = CkksParameters;
}

impl FheEncrypter<Plaintext, Ciphertext> for PublicKey {
    type Error = Error;

    fn try_encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        if !(Arc::ptr_eq(&self.par, &pt.par) || self.par == pt.par) {
            return Err(Error::IncompatibleParameters(
                "the public key and the plaintext use different parameters".to_string(),
            ));
        }

        let ctx = self.par.ctx();
        let u = Zeroizing::new(Poly::small(
            ctx,
            Representation::Ntt,
            SecretKey::SK_VARIANCE,
            rng,
        )?);
        let variance = self.par.variance() as f32;
        let e0 = Zeroizing::new(Poly::small(ctx, Representation::Ntt, variance, rng)?);
        let e1 = Zeroizing::new(Poly::small(ctx, Representation::Ntt, variance, rng)?);

        let mut c0 = u.as_ref() * &self.c.c[0];
        c0 += e0.as_ref();
        c0 += &pt.poly_ntt;
        let mut c1 = u.as_ref() * &self.c.c[1];
        c1 += e1.as_ref();

        Ciphertext::new(vec![c0, c1], pt.scale, pt.len, &self.par)
    }
}

impl From<&PublicKey> for PublicKeyProto {
    fn from(pk: &PublicKey) -> Self {
        PublicKeyProto {
            c: Some(CiphertextProto::from(&pk.c)),
        }
    }
}

impl Serialize for PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        PublicKeyProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for PublicKey {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let proto: PublicKeyProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        let c = proto.c.as_ref().ok_or(Error::SerializationError)?;
        Ok(Self {
            par: par.clone(),
            c: Ciphertext::try_convert_from(c, par)?,
        })
    }
}
