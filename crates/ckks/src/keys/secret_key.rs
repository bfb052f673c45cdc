//! Secret keys for the CKKS encryption scheme

use crate::{Ciphertext, CkksParameters, Error, Plaintext, Result};
use ckks_math::{
    rq::{traits::TryConvertFrom, Context, Poly, Representation},
    sampling::sample_vec_cbd,
};
use ckks_traits::{FheDecrypter, FheEncrypter, FheParametrized};
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Secret key for the CKKS encryption scheme.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SecretKey {
    /// The CKKS parameters
    pub(crate) par: Arc<CkksParameters>,
    /// The secret key coefficients
    pub(crate) coeffs: Box<[i64]>,
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.coeffs.zeroize();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl SecretKey {
    /// The variance used for secret key sampling
    pub const SK_VARIANCE: f32 = 0.5;

    /// Generate a random [`SecretKey`] with ternary coefficients.
    pub fn random<R: RngCore + CryptoRng>(par: &Arc<CkksParameters>, rng: &mut R) -> Result<Self> {
        let coeffs = sample_vec_cbd(par.degree(), Self::SK_VARIANCE, rng)?;
        Self::new(coeffs, par)
    }

    /// Generate a [`SecretKey`] from its coefficients.
    pub fn new(coeffs: Vec<i64>, par: &Arc<CkksParameters>) -> Result<Self> {
        if coeffs.len() != par.degree() {
            return Err(Error::UnspecifiedInput(format!(
                "A secret key has {} coefficients, got {}",
                par.degree(),
                coeffs.len()
            )));
        }
        Ok(Self {
            par: par.clone(),
            coeffs: coeffs.into_boxed_slice(),
        })
    }

    /// Returns the parameters of the secret key.
    pub fn parameters(&self) -> &Arc<CkksParameters> {
        &self.par
    }

    /// The secret key as a polynomial of the context `ctx`, in Ntt
    /// representation.
    pub(crate) fn poly_in(&self, ctx: &Arc<Context>) -> Result<Zeroizing<Poly>> {
        Ok(Zeroizing::new(Poly::try_convert_from(
            self.coeffs.as_ref(),
            ctx,
            Representation::Ntt,
        )?))
    }

    fn check_parameters(&self, par: &Arc<CkksParameters>) -> Result<()> {
        if Arc::ptr_eq(&self.par, par) || self.par == *par {
            Ok(())
        } else {
            Err(Error::IncompatibleParameters(
                "the secret key and the ciphertext use different parameters".to_string(),
            ))
        }
    }
}

impl FheParametrized for SecretKey {
    type Parameters = CkksParameters;
}

impl FheEncrypter<Plaintext, Ciphertext> for SecretKey {
    type Error = Error;

    fn try_encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        self.check_parameters(&pt.par)?;

        let ctx = self.par.ctx();
        let s = self.poly_in(ctx)?;

        let a = Poly::random(ctx, Representation::Ntt, rng);
        let a_s = Zeroizing::new(&a * s.as_ref());

        let mut b = Poly::small(ctx, Representation::Ntt, self.par.variance() as f32, rng)?;
        b -= &a_s;
        b += &pt.poly_ntt;

        Ciphertext::new(vec![b, a], pt.scale, pt.len, &self.par)
    }
}

impl FheDecrypter<Plaintext, Ciphertext> for SecretKey {
    type Error = Error;

    fn try_decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
        self.check_parameters(&ct.par)?;

        let s = self.poly_in(self.par.ctx())?;
        let mut c1_s = Zeroizing::new(ct.c[1].clone());
        *c1_s.as_mut() *= s.as_ref();

        let mut m = ct.c[0].clone();
        m += c1_s.as_ref();

        Ok(Plaintext {
            par: self.par.clone(),
            poly_ntt: m,
            scale: ct.scale,
            len: ct.len,
        })
    }
}
