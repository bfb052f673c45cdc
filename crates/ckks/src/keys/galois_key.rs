//! Galois keys and slot rotations for the CKKS encryption scheme

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::proto::{GaloisKey as GaloisKeyProto, GaloisKeys as GaloisKeysProto};
use crate::traits::TryConvertFrom;
use crate::{Ciphertext, CkksParameters, Error, Result};
use ckks_traits::{DeserializeParametrized, FheParametrized, Serialize};
use prost::Message;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::{KeySwitchingKey, SecretKey};

/// Galois key for the CKKS encryption scheme.
///
/// A Galois key applies the automorphism `x -> x^element` to a ciphertext,
/// which permutes its slots.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GaloisKey {
    pub(crate) element: usize,
    pub(crate) ksk: KeySwitchingKey,
}

impl GaloisKey {
    /// Generate a [`GaloisKey`] for the Galois element `element` from a
    /// [`SecretKey`].
    pub fn new<R: RngCore + CryptoRng>(
        sk: &SecretKey,
        element: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let s = sk.poly_in(sk.par.ctx_key())?;
        let s_sub = Zeroizing::new(s.substitute(element)?);
        let ksk = KeySwitchingKey::new(sk, &s_sub, rng)?;
        Ok(Self { element, ksk })
    }

    /// The Galois element of the key.
    pub const fn element(&self) -> usize {
        self.element
    }

    /// Apply the automorphism to a ciphertext.
    pub fn relinearize(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        if !(Arc::ptr_eq(&self.ksk.par, &ct.par) || self.ksk.par == ct.par) {
            return Err(Error::IncompatibleParameters(
                "the Galois key and the ciphertext use different parameters".to_string(),
            ));
        }

        let c0 = ct.c[0].substitute(self.element)?;
        let c1 = ct.c[1].substitute(self.element)?;
        let (mut k0, k1) = self.ksk.key_switch(&c1)?;
        k0 += &c0;

        Ciphertext::new(vec![k0, k1], ct.scale, ct.par.slots(), &ct.par)
    }
}

impl From<&GaloisKey> for GaloisKeyProto {
    fn from(value: &GaloisKey) -> Self {
        GaloisKeyProto {
            ksk: Some((&value.ksk).into()),
            element: value.element as u32,
        }
    }
}

impl TryConvertFrom<&GaloisKeyProto> for GaloisKey {
    fn try_convert_from(value: &GaloisKeyProto, par: &Arc<CkksParameters>) -> Result<Self> {
        let element = value.element as usize;
        if element % 2 == 0 || element >= 2 * par.degree() {
            return Err(Error::SerializationError);
        }
        let ksk = value.ksk.as_ref().ok_or(Error::SerializationError)?;
        Ok(Self {
            element,
            ksk: KeySwitchingKey::try_convert_from(ksk, par)?,
        })
    }
}

/// Rotation keys for all the power-of-two rotations of the slots.
///
/// A rotation by any number of steps is decomposed into its binary
/// representation, and applies one key per bit set.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GaloisKeys {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) keys: BTreeMap<usize, GaloisKey>,
}

impl GaloisKeys {
    /// Generate the keys for the rotations to the left by `1, 2, 4, ...,
    /// slots / 2` positions.
    pub fn new<R: RngCore + CryptoRng>(sk: &SecretKey, rng: &mut R) -> Result<Self> {
        let par = sk.par.clone();
        let mut keys = BTreeMap::new();
        let mut step = 1;
        while step < par.slots() {
            let element = par.fft.rotation_element(step);
            keys.insert(step, GaloisKey::new(sk, element, rng)?);
            step <<= 1;
        }
        Ok(Self { par, keys })
    }

    /// The rotation steps for which a key exists.
    pub fn steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.keys().copied()
    }

    /// Rotate the slots of a ciphertext to the left by `steps` positions.
    ///
    /// The rotated ciphertext exposes all the slots.
    pub fn rotate_left(&self, ct: &Ciphertext, steps: usize) -> Result<Ciphertext> {
        let slots = self.par.slots();
        let steps = steps % slots;

        let mut out = ct.clone();
        let mut bit = 1;
        while bit < slots {
            if steps & bit != 0 {
                let key = self.keys.get(&bit).ok_or(Error::MissingRotationKey(bit))?;
                out = key.relinearize(&out)?;
            }
            bit <<= 1;
        }
        out.len = slots;
        Ok(out)
    }

    /// Sum all the slots of a ciphertext: every slot of the result encrypts
    /// the sum of the encrypted values.
    pub fn sum_slots(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut acc = ct.clone();
        let mut step = 1;
        while step < self.par.slots() {
            let rotated = self.rotate_left(&acc, step)?;
            acc += &rotated;
            step <<= 1;
        }
        acc.len = self.par.slots();
        Ok(acc)
    }
}

impl FheParametrized for GaloisKeys {
    type Parameters = CkksParameters;
}

impl From<&GaloisKeys> for GaloisKeysProto {
    fn from(value: &GaloisKeys) -> Self {
        GaloisKeysProto {
            gk: value.keys.values().map(GaloisKeyProto::from).collect(),
        }
    }
}

impl Serialize for GaloisKeys {
    fn to_bytes(&self) -> Vec<u8> {
        GaloisKeysProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for GaloisKeys {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let proto: GaloisKeysProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;

        let mut keys = BTreeMap::new();
        for gkp in proto.gk.iter() {
            let gk = GaloisKey::try_convert_from(gkp, par)?;
            let mut step = 1;
            while step < par.slots() && par.fft.rotation_element(step) != gk.element {
                step <<= 1;
            }
            if step >= par.slots() {
                return Err(Error::SerializationError);
            }
            keys.insert(step, gk);
        }

        Ok(Self {
            par: par.clone(),
            keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{GaloisKey, GaloisKeys};
    use crate::{Ciphertext, CkksParameters, Encoding, Error, Plaintext, PublicKey, SecretKey};
    use ckks_traits::{
        DeserializeParametrized, FheDecoder, FheDecrypter, FheEncoder, FheEncrypter, Serialize,
    };
    use rand::{thread_rng, Rng};
    use std::error::Error as StdError;

    fn decrypt(sk: &SecretKey, ct: &Ciphertext) -> Result<Vec<f64>, Box<dyn StdError>> {
        let pt = sk.try_decrypt(ct)?;
        Ok(Vec::<f64>::try_decode(&pt, Encoding::canonical())?)
    }

    #[test]
    fn rotate() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let params = CkksParameters::default_arc(64);
        let slots = params.slots();
        let sk = SecretKey::random(&params, &mut rng)?;
        let pk = PublicKey::new(&sk, &mut rng)?;
        let gk = GaloisKeys::new(&sk, &mut rng)?;
        assert_eq!(gk.steps().collect::<Vec<_>>(), vec![1, 2, 4, 8, 16]);

        let values = (0..slots)
            .map(|_| rng.gen_range(-5.0..5.0))
            .collect::<Vec<f64>>();
        let pt = Plaintext::try_encode(values.as_slice(), Encoding::canonical(), &params)?;
        let ct: Ciphertext = pk.try_encrypt(&pt, &mut rng)?;

        for steps in [0usize, 1, 3, 10, slots - 1, slots + 2] {
            let rotated = gk.rotate_left(&ct, steps)?;
            assert_eq!(rotated.len(), slots);
            let decoded = decrypt(&sk, &rotated)?;
            for i in 0..slots {
                assert!((decoded[i] - values[(i + steps) % slots]).abs() < 1e-4);
            }
        }
        Ok(())
    }

    #[test]
    fn sum_slots() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let params = CkksParameters::default_arc(32);
        let sk = SecretKey::random(&params, &mut rng)?;
        let gk = GaloisKeys::new(&sk, &mut rng)?;

        let values = [1.5, -2.0, 3.25, 0.5, 4.0];
        let pt = Plaintext::try_encode(&values[..], Encoding::canonical(), &params)?;
        let ct: Ciphertext = sk.try_encrypt(&pt, &mut rng)?;
        let summed = gk.sum_slots(&ct)?;
        assert_eq!(summed.len(), params.slots());
        for v in decrypt(&sk, &summed)? {
            assert!((v - 7.25).abs() < 1e-4);
        }
        Ok(())
    }

    #[test]
    fn missing_key() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let params = CkksParameters::default_arc(32);
        let sk = SecretKey::random(&params, &mut rng)?;
        let mut gk = GaloisKeys::new(&sk, &mut rng)?;
        gk.keys.remove(&2);

        let pt = Plaintext::try_encode(&[1.0][..], Encoding::canonical(), &params)?;
        let ct: Ciphertext = sk.try_encrypt(&pt, &mut rng)?;
        assert!(gk.rotate_left(&ct, 1).is_ok());
        assert_eq!(
            gk.rotate_left(&ct, 3).err(),
            Some(Error::MissingRotationKey(2))
        );
        Ok(())
    }

    #[test]
    fn invalid_element() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let params = CkksParameters::default_arc(16);
        let sk = SecretKey::random(&params, &mut rng)?;
        assert!(GaloisKey::new(&sk, 2, &mut rng).is_err());
        assert!(GaloisKey::new(&sk, 33, &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let params = CkksParameters::default_arc(16);
        let sk = SecretKey::random(&params, &mut rng)?;
        let gk = GaloisKeys::new(&sk, &mut rng)?;
        let bytes = gk.to_bytes();
        assert_eq!(gk, GaloisKeys::from_bytes(&bytes, &params)?);
        Ok(())
    }
}
