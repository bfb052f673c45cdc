//! The cryptographic context shared by all the rounds of a run.

use ckks::{Ciphertext, CkksParameters, Encoding, GaloisKeys, Plaintext, PublicKey, SecretKey};
use ckks_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};
use rand::{thread_rng, CryptoRng, RngCore};
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::CryptoConfig;
use crate::{Error, Result};

/// Scheme parameters and keys, created once per run and read-only
/// afterwards.
///
/// The coordinator holds the secret key: participants encrypt with the
/// public key, and the coordinator decrypts every update before aggregating.
pub struct CryptoContext {
    par: Arc<CkksParameters>,
    sk: SecretKey,
    pk: PublicKey,
    galois_keys: Option<GaloisKeys>,
}

impl Debug for CryptoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext")
            .field("par", &self.par)
            .field("galois_keys", &self.galois_keys.is_some())
            .finish()
    }
}

impl CryptoContext {
    /// Build the parameters of a configuration and generate fresh keys.
    pub fn new<R: RngCore + CryptoRng>(config: &CryptoConfig, rng: &mut R) -> Result<Self> {
        let par = config.build_parameters()?;
        Self::from_parameters(&par, config.generate_galois_keys, rng)
    }

    /// Generate fresh keys for existing parameters.
    pub fn from_parameters<R: RngCore + CryptoRng>(
        par: &Arc<CkksParameters>,
        generate_galois_keys: bool,
        rng: &mut R,
    ) -> Result<Self> {
        let sk = SecretKey::random(par, rng)?;
        let pk = PublicKey::new(&sk, rng)?;
        let galois_keys = if generate_galois_keys {
            Some(GaloisKeys::new(&sk, rng)?)
        } else {
            None
        };
        Ok(Self {
            par: par.clone(),
            sk,
            pk,
            galois_keys,
        })
    }

    /// The scheme parameters.
    pub fn parameters(&self) -> &Arc<CkksParameters> {
        &self.par
    }

    /// The largest number of values a single ciphertext encodes.
    pub fn slot_capacity(&self) -> usize {
        self.par.slots()
    }

    /// The public key, the only key participants need.
    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// The rotation keys, when generated.
    pub fn galois_keys(&self) -> Option<&GaloisKeys> {
        self.galois_keys.as_ref()
    }

    /// Encrypt at most [`CryptoContext::slot_capacity`] values with the
    /// public key.
    pub fn encrypt(&self, values: &[f64]) -> Result<Ciphertext> {
        if values.len() > self.slot_capacity() {
            return Err(Error::CryptoContextMismatch(format!(
                "{} values exceed the capacity of {} slots",
                values.len(),
                self.slot_capacity()
            )));
        }
        let pt = Plaintext::try_encode(values, Encoding::canonical(), &self.par)?;
        let ct: Ciphertext = self.pk.try_encrypt(&pt, &mut thread_rng())?;
        Ok(ct)
    }

    /// Decrypt a ciphertext produced under this context.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<f64>> {
        self.check(ct)?;
        let pt: Plaintext = self.sk.try_decrypt(ct)?;
        Ok(Vec::<f64>::try_decode(&pt, Encoding::canonical())?)
    }

    /// Sum the encrypted values of a ciphertext with the rotation keys.
    pub fn encrypted_sum(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check(ct)?;
        let gk = self.galois_keys.as_ref().ok_or_else(|| {
            Error::InvalidConfiguration("the rotation keys were not generated".to_string())
        })?;
        Ok(gk.sum_slots(ct)?)
    }

    /// Fails with [`Error::CryptoContextMismatch`] unless the ciphertext was
    /// produced under the parameters of this context.
    pub fn check(&self, ct: &Ciphertext) -> Result<()> {
        let par = ct.parameters();
        if Arc::ptr_eq(par, &self.par) || **par == *self.par {
            Ok(())
        } else {
            Err(Error::CryptoContextMismatch(format!(
                "the chunk was encrypted under {:?}, the context uses {:?}",
                par, self.par
            )))
        }
    }
}
