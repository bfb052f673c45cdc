//! Key-switching keys for the CKKS encryption scheme
//!
//! A key-switching key turns a polynomial `d` that multiplies a secret `s'`
//! into a pair `(k0, k1)` such that `k0 + k1 * s ≈ d * s'`. The keys live
//! in the extended context `QP`, where `P` is the special prime reserved by
//! the parameters:
//!
//! 1. `d` is decomposed into its centered residues `d_i` modulo each `q_i`;
//! 2. the residues are multiplied by the key components and accumulated in
//!    `QP`;
//! 3. the result is divided by `P` and rounded, which brings it back to `Q`
//!    and removes most of the key noise.
//!
//! The gadget vector has `P mod q_i` in the i-th residue and zero in all the
//! others, so that `Σ d_i * g_i = P * d` modulo `QP`.

use crate::proto::KeySwitchingKey as KeySwitchingKeyProto;
use crate::{CkksParameters, Error, Result};
use ckks_math::rq::{traits::TryConvertFrom, Poly, Representation};
use ckks_traits::{DeserializeWithContext, Serialize};
use itertools::izip;
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use zeroize::Zeroizing;

use super::SecretKey;

/// Key-switching key from a secret `s'` to the secret key `s`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct KeySwitchingKey {
    /// The CKKS parameters
    pub(crate) par: Arc<CkksParameters>,

    /// The seed that generated the polynomials c1
    pub(crate) seed: <ChaCha8Rng as SeedableRng>::Seed,

    /// The key switching elements c0, in the key context
    pub(crate) c0: Box<[Poly]>,

    /// The key switching elements c1, in the key context
    pub(crate) c1: Box<[Poly]>,
}

impl KeySwitchingKey {
    /// Generate a [`KeySwitchingKey`] to switch from the secret `from` to the
    /// secret key `sk`. The polynomial `from` must be in the key context of
    /// the parameters, in Ntt representation.
    ///
    /// Returns an error if the parameters do not reserve a special prime.
    pub fn new<R: RngCore + CryptoRng>(sk: &SecretKey, from: &Poly, rng: &mut R) -> Result<Self> {
        let par = &sk.par;
        let special_prime = par.special_prime().ok_or_else(|| {
            Error::DefaultError(
                "Key switching requires at least two moduli: the last one is the special prime"
                    .to_string(),
            )
        })?;
        let ctx_key = par.ctx_key();
        if from.ctx() != ctx_key {
            return Err(Error::MathError(ckks_math::Error::InvalidContext));
        }
        if from.representation() != &Representation::Ntt {
            return Err(Error::MathError(ckks_math::Error::IncorrectRepresentation(
                *from.representation(),
                Representation::Ntt,
            )));
        }

        let mut seed = <ChaCha8Rng as SeedableRng>::Seed::default();
        rng.fill(&mut seed);
        let c1 = Self::generate_c1(par, seed);

        let s = sk.poly_in(ctx_key)?;
        let nmoduli = par.data_moduli().len();
        let mut c0 = Vec::with_capacity(nmoduli);
        for (i, a) in c1.iter().enumerate() {
            let mut b = Poly::small(ctx_key, Representation::Ntt, par.variance() as f32, rng)?;
            let a_s = Zeroizing::new(a * s.as_ref());
            b -= &a_s;

            let qi = &ctx_key.moduli_operators()[i];
            let gadget = qi.reduce(special_prime);
            let mut g_from = Zeroizing::new(Poly::zero(ctx_key, Representation::Ntt));
            izip!(
                g_from.coefficients_mut().row_mut(i).iter_mut(),
                from.coefficients().row(i).iter()
            )
            .for_each(|(g, f)| *g = qi.mul(*f, gadget));
            b += g_from.as_ref();

            c0.push(b);
        }

        Ok(Self {
            par: par.clone(),
            seed,
            c0: c0.into_boxed_slice(),
            c1,
        })
    }

    fn generate_c1(
        par: &Arc<CkksParameters>,
        seed: <ChaCha8Rng as SeedableRng>::Seed,
    ) -> Box<[Poly]> {
        let mut rng = ChaCha8Rng::from_seed(seed);
        (0..par.data_moduli().len())
            .map(|_| Poly::random(par.ctx_key(), Representation::Ntt, &mut rng))
            .collect()
    }

    /// Key switch a polynomial of the ciphertext context.
    ///
    /// Returns `(k0, k1)` in the ciphertext context and in Ntt representation,
    /// such that `k0 + k1 * s ≈ p * s'`.
    pub fn key_switch(&self, p: &Poly) -> Result<(Poly, Poly)> {
        if p.ctx() != self.par.ctx() {
            return Err(Error::MathError(ckks_math::Error::InvalidContext));
        }
        let ctx_key = self.par.ctx_key();

        let mut p = p.clone();
        p.change_representation(Representation::PowerBasis);

        let mut k0 = Poly::zero(ctx_key, Representation::Ntt);
        let mut k1 = Poly::zero(ctx_key, Representation::Ntt);
        for (row, qi, c0, c1) in izip!(
            p.coefficients().outer_iter(),
            p.ctx().moduli().iter(),
            self.c0.iter(),
            self.c1.iter()
        ) {
            let half = *qi >> 1;
            let di = row
                .iter()
                .map(|c| {
                    if *c > half {
                        *c as i64 - *qi as i64
                    } else {
                        *c as i64
                    }
                })
                .collect::<Vec<_>>();
            let di = Poly::try_convert_from(di.as_slice(), ctx_key, Representation::Ntt)?;
            k0 += &(&di * c0);
            k1 += &(&di * c1);
        }

        k0.mod_switch_down_next()?;
        k1.mod_switch_down_next()?;
        Ok((k0, k1))
    }
}

impl From<&KeySwitchingKey> for KeySwitchingKeyProto {
    fn from(value: &KeySwitchingKey) -> Self {
        KeySwitchingKeyProto {
            c0: value.c0.iter().map(|c| c.to_bytes()).collect(),
            seed: value.seed.to_vec(),
        }
    }
}

impl crate::traits::TryConvertFrom<&KeySwitchingKeyProto> for KeySwitchingKey {
    fn try_convert_from(value: &KeySwitchingKeyProto, par: &Arc<CkksParameters>) -> Result<Self> {
        let nmoduli = par.data_moduli().len();
        if par.special_prime().is_none() || value.c0.len() != nmoduli {
            return Err(Error::SerializationError);
        }

        let mut seed = <ChaCha8Rng as SeedableRng>::Seed::default();
        if value.seed.len() != seed.len() {
            return Err(Error::MathError(ckks_math::Error::InvalidSeedSize(
                value.seed.len(),
                seed.len(),
            )));
        }
        seed.copy_from_slice(&value.seed);

        let c0 = value
            .c0
            .iter()
            .map(|c| Poly::from_bytes(c, par.ctx_key()).map_err(Error::MathError))
            .collect::<Result<Box<[_]>>>()?;
        if c0
            .iter()
            .any(|c| c.representation() != &Representation::Ntt)
        {
            return Err(Error::SerializationError);
        }

        Ok(Self {
            par: par.clone(),
            seed,
            c0,
            c1: Self::generate_c1(par, seed),
        })
    }
}
