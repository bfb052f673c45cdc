//! Residue-Number System operations.

use crate::{zq::Modulus, Error, Result};
use itertools::izip;
use ndarray::ArrayView1;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};
use std::fmt::Debug;

/// Context for a Residue Number System.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct RnsContext {
    moduli_u64: Vec<u64>,
    moduli: Vec<Modulus>,
    q_tilde: Vec<u64>,
    q_tilde_shoup: Vec<u64>,
    q_star: Vec<BigUint>,
    product: BigUint,
    half_product: BigUint,
}

impl Debug for RnsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RnsContext")
            .field("moduli_u64", &self.moduli_u64)
            .field("product", &self.product)
            .finish()
    }
}

impl RnsContext {
    /// Create a RNS context from a list of moduli.
    ///
    /// Returns an error if the list is empty, or if the moduli are not
    /// pairwise coprime.
    pub fn new(moduli_u64: &[u64]) -> Result<Self> {
        if moduli_u64.is_empty() {
            return Err(Error::Default("The list of moduli is empty".to_string()));
        }

        let mut product = BigUint::one();
        for (i, mi) in moduli_u64.iter().enumerate() {
            for mj in &moduli_u64[i + 1..] {
                if gcd(*mi, *mj) != 1 {
                    return Err(Error::Default(
                        "The moduli are not pairwise coprime".to_string(),
                    ));
                }
            }
            product *= *mi;
        }

        let mut moduli = Vec::with_capacity(moduli_u64.len());
        let mut q_tilde = Vec::with_capacity(moduli_u64.len());
        let mut q_tilde_shoup = Vec::with_capacity(moduli_u64.len());
        let mut q_star = Vec::with_capacity(moduli_u64.len());
        for modulus in moduli_u64 {
            let m = Modulus::new(*modulus)?;
            // q* = product / modulus
            let q_star_i = &product / *modulus;
            // q~ = (product / modulus) ^ (-1) % modulus
            let q_tilde_i = (&q_star_i % *modulus)
                .modinv(&BigUint::from(*modulus))
                .and_then(|inv| inv.to_u64())
                .ok_or_else(|| {
                    Error::Default("The moduli are not pairwise coprime".to_string())
                })?;
            q_tilde.push(q_tilde_i);
            q_tilde_shoup.push(m.shoup(q_tilde_i));
            q_star.push(q_star_i);
            moduli.push(m);
        }

        let half_product = &product >> 1;
        Ok(Self {
            moduli_u64: moduli_u64.to_owned(),
            moduli,
            q_tilde,
            q_tilde_shoup,
            q_star,
            product,
            half_product,
        })
    }

    /// Returns the product of the moduli used when creating the RNS context.
    pub const fn modulus(&self) -> &BigUint {
        &self.product
    }

    /// Returns the moduli of the RNS context.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli_u64
    }

    /// Project a BigUint into its rests.
    pub fn project(&self, a: &BigUint) -> Vec<u64> {
        self.moduli_u64
            .iter()
            .map(|modulus| (a % *modulus).to_u64().unwrap_or_default())
            .collect()
    }

    /// Project a signed BigInt into its rests.
    pub fn project_signed(&self, a: &BigInt) -> Vec<u64> {
        let (sign, magnitude) = (a.sign(), a.magnitude());
        self.moduli
            .iter()
            .zip(self.project(magnitude))
            .map(|(m, r)| {
                if sign == num_bigint::Sign::Minus {
                    m.neg(r)
                } else {
                    r
                }
            })
            .collect()
    }

    /// Lift rests into a BigUint in [0, product).
    ///
    /// Aborts if the number of rests is different than the number of moduli
    /// in debug mode.
    pub fn lift(&self, rests: ArrayView1<u64>) -> BigUint {
        debug_assert_eq!(rests.len(), self.moduli_u64.len());

        let mut result = BigUint::zero();
        izip!(
            rests.iter(),
            &self.q_tilde,
            &self.q_tilde_shoup,
            &self.q_star,
            &self.moduli
        )
        .for_each(|(xi, qi_tilde, qi_tilde_shoup, qi_star, qi)| {
            result += qi_star * qi.mul_shoup(*xi, *qi_tilde, *qi_tilde_shoup);
        });

        result % &self.product
    }

    /// Lift rests into a BigInt in the centered interval
    /// (-product / 2, product / 2].
    pub fn lift_centered(&self, rests: ArrayView1<u64>) -> BigInt {
        let lifted = self.lift(rests);
        if lifted > self.half_product {
            BigInt::from(lifted) - BigInt::from(self.product.clone())
        } else {
            BigInt::from(lifted)
        }
    }
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
