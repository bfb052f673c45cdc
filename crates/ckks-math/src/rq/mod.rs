//! Polynomials in R_q\[x\] = (ZZ_q1 x ... x ZZ_qn)\[x\] where the qi's are
//! prime moduli in zq.

mod context;
pub mod traits;

pub use context::Context;

use crate::{sampling::sample_vec_cbd, Error, Result};
use ckks_traits::{DeserializeWithContext, Serialize};
use itertools::izip;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use num_bigint::{BigInt, BigUint};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::sync::Arc;
use traits::TryConvertFrom;
use zeroize::Zeroize;

/// Possible representations of the underlying polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// This is the list of coefficients ci, such that the polynomial is c0 + c1
    /// * x + ... + c_(degree - 1) * x^(degree - 1)
    #[default]
    PowerBasis,
    /// This is the NTT representation of the PowerBasis representation.
    Ntt,
}

/// Struct that holds a polynomial for a specific context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    ctx: Arc<Context>,
    representation: Representation,
    coefficients: Array2<u64>,
}

impl Poly {
    /// Creates a polynomial holding the constant 0.
    pub fn zero(ctx: &Arc<Context>, representation: Representation) -> Self {
        Self {
            ctx: ctx.clone(),
            representation,
            coefficients: Array2::zeros((ctx.q.len(), ctx.degree)),
        }
    }

    /// Generate a random polynomial.
    pub fn random<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        representation: Representation,
        rng: &mut R,
    ) -> Self {
        let mut p = Poly::zero(ctx, representation);
        izip!(p.coefficients.outer_iter_mut(), ctx.q.iter()).for_each(|(mut row, qi)| {
            row.iter_mut()
                .zip(qi.random_vec(ctx.degree, rng))
                .for_each(|(c, r)| *c = r)
        });
        p
    }

    /// Generate a random polynomial deterministically from a seed.
    pub fn random_from_seed(
        ctx: &Arc<Context>,
        representation: Representation,
        seed: <ChaCha8Rng as SeedableRng>::Seed,
    ) -> Self {
        let mut rng = ChaCha8Rng::from_seed(seed);
        Self::random(ctx, representation, &mut rng)
    }

    /// Generate a small polynomial whose coefficients follow a centered
    /// binomial distribution of the given variance.
    pub fn small<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        representation: Representation,
        variance: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = sample_vec_cbd(ctx.degree, variance, rng)?;
        Poly::try_convert_from(coeffs.as_slice(), ctx, representation)
    }

    /// Access the polynomial context.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Current representation of the polynomial.
    pub const fn representation(&self) -> &Representation {
        &self.representation
    }

    /// Get a view of the coefficients, one row per modulus.
    pub fn coefficients(&self) -> ArrayView2<u64> {
        self.coefficients.view()
    }

    /// Get a mutable view of the coefficients.
    ///
    /// The values must stay reduced modulo the moduli of the context.
    pub fn coefficients_mut(&mut self) -> ArrayViewMut2<u64> {
        self.coefficients.view_mut()
    }

    /// Change the representation of the underlying polynomial.
    pub fn change_representation(&mut self, to: Representation) {
        match (self.representation, to) {
            (Representation::PowerBasis, Representation::Ntt) => {
                izip!(self.coefficients.outer_iter_mut(), self.ctx.ops.iter()).for_each(
                    |(mut row, op)| {
                        if let Some(s) = row.as_slice_mut() {
                            op.forward(s)
                        }
                    },
                );
            }
            (Representation::Ntt, Representation::PowerBasis) => {
                izip!(self.coefficients.outer_iter_mut(), self.ctx.ops.iter()).for_each(
                    |(mut row, op)| {
                        if let Some(s) = row.as_slice_mut() {
                            op.backward(s)
                        }
                    },
                );
            }
            _ => {}
        }
        self.representation = to;
    }

    /// Apply the automorphism x -> x^exponent, where the exponent is odd and
    /// smaller than twice the degree.
    ///
    /// The polynomial is returned in the same representation.
    pub fn substitute(&self, exponent: usize) -> Result<Poly> {
        let degree = self.ctx.degree;
        if exponent % 2 == 0 || exponent >= 2 * degree {
            return Err(Error::Default(format!(
                "Invalid substitution exponent {exponent}"
            )));
        }

        let mut source = self.clone();
        source.change_representation(Representation::PowerBasis);

        let mut q = Poly::zero(&self.ctx, Representation::PowerBasis);
        for (src, mut dst, qi) in izip!(
            source.coefficients.outer_iter(),
            q.coefficients.outer_iter_mut(),
            self.ctx.q.iter()
        ) {
            for (i, c) in src.iter().enumerate() {
                let t = (i * exponent) % (2 * degree);
                if t < degree {
                    dst[t] = *c;
                } else {
                    dst[t - degree] = qi.neg(*c);
                }
            }
        }
        q.change_representation(self.representation);
        Ok(q)
    }

    /// Divide the polynomial by the last modulus of its context and round,
    /// moving it to the next context.
    ///
    /// Returns an error if there is no next context.
    pub fn mod_switch_down_next(&mut self) -> Result<()> {
        let next = self.ctx.next_context.clone().ok_or(Error::NoMoreContext)?;
        let representation = self.representation;
        self.change_representation(Representation::PowerBasis);

        let nmoduli = self.ctx.q.len();
        let q_last = &self.ctx.q[nmoduli - 1];
        let half_last = q_last.modulus() >> 1;
        let last = self.coefficients.row(nmoduli - 1).to_owned();

        let mut coefficients = Array2::zeros((nmoduli - 1, self.ctx.degree));
        for (mut dst, src, qi, inv, inv_shoup) in izip!(
            coefficients.outer_iter_mut(),
            self.coefficients.outer_iter(),
            self.ctx.q.iter(),
            self.ctx.inv_last_qi_mod_qj.iter(),
            self.ctx.inv_last_qi_mod_qj_shoup.iter()
        ) {
            for (d, s, l) in izip!(dst.iter_mut(), src.iter(), last.iter()) {
                let centered = if *l > half_last {
                    *l as i128 - q_last.modulus() as i128
                } else {
                    *l as i128
                };
                let diff = qi.sub(*s, qi.reduce_i128(centered));
                *d = qi.mul_shoup(diff, *inv, *inv_shoup);
            }
        }

        self.zeroize();
        self.coefficients = coefficients;
        self.ctx = next;
        self.representation = Representation::PowerBasis;
        self.change_representation(representation);
        Ok(())
    }

    /// Lift the coefficients into the centered interval around zero, modulo
    /// the product of the moduli.
    ///
    /// Returns an error if the polynomial is not in power basis.
    pub fn to_centered_bigints(&self) -> Result<Vec<BigInt>> {
        if self.representation != Representation::PowerBasis {
            return Err(Error::IncorrectRepresentation(
                self.representation,
                Representation::PowerBasis,
            ));
        }
        Ok(self
            .coefficients
            .axis_iter(Axis(1))
            .map(|column| self.ctx.rns.lift_centered(column))
            .collect())
    }

    fn assert_compatible(&self, other: &Poly) {
        assert!(
            Arc::ptr_eq(&self.ctx, &other.ctx) || self.ctx == other.ctx,
            "Incompatible contexts"
        );
        assert_eq!(
            self.representation, other.representation,
            "Incompatible representations"
        );
    }
}

impl AsRef<Poly> for Poly {
    fn as_ref(&self) -> &Poly {
        self
    }
}

impl AsMut<Poly> for Poly {
    fn as_mut(&mut self) -> &mut Poly {
        self
    }
}

impl Zeroize for Poly {
    fn zeroize(&mut self) {
        if let Some(s) = self.coefficients.as_slice_mut() {
            s.zeroize()
        }
    }
}

impl From<&Poly> for Vec<BigUint> {
    fn from(p: &Poly) -> Self {
        let mut p = p.clone();
        p.change_representation(Representation::PowerBasis);
        p.coefficients
            .axis_iter(Axis(1))
            .map(|column| p.ctx.rns.lift(column))
            .collect()
    }
}

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, p: &Poly) {
        self.assert_compatible(p);
        izip!(
            self.coefficients.outer_iter_mut(),
            p.coefficients.outer_iter(),
            self.ctx.q.iter()
        )
        .for_each(|(mut v1, v2, qi)| {
            v1.iter_mut().zip(v2.iter()).for_each(|(a, b)| *a = qi.add(*a, *b))
        });
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, p: &Poly) {
        self.assert_compatible(p);
        izip!(
            self.coefficients.outer_iter_mut(),
            p.coefficients.outer_iter(),
            self.ctx.q.iter()
        )
        .for_each(|(mut v1, v2, qi)| {
            v1.iter_mut().zip(v2.iter()).for_each(|(a, b)| *a = qi.sub(*a, *b))
        });
    }
}

impl MulAssign<&Poly> for Poly {
    fn mul_assign(&mut self, p: &Poly) {
        self.assert_compatible(p);
        assert_eq!(
            self.representation,
            Representation::Ntt,
            "Multiplication requires an Ntt representation."
        );
        izip!(
            self.coefficients.outer_iter_mut(),
            p.coefficients.outer_iter(),
            self.ctx.q.iter()
        )
        .for_each(|(mut v1, v2, qi)| {
            v1.iter_mut().zip(v2.iter()).for_each(|(a, b)| *a = qi.mul(*a, *b))
        });
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;
    fn add(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q += p;
        q
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;
    fn sub(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q -= p;
        q
    }
}

impl Mul<&Poly> for &Poly {
    type Output = Poly;
    fn mul(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q *= p;
        q
    }
}

impl Neg for &Poly {
    type Output = Poly;
    fn neg(self) -> Poly {
        let mut out = self.clone();
        izip!(out.coefficients.outer_iter_mut(), self.ctx.q.iter())
            .for_each(|(mut v, qi)| v.iter_mut().for_each(|a| *a = qi.neg(*a)));
        out
    }
}

impl Serialize for Poly {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 8 * self.coefficients.len());
        bytes.push(match self.representation {
            Representation::PowerBasis => 0u8,
            Representation::Ntt => 1u8,
        });
        self.coefficients
            .iter()
            .for_each(|c| bytes.extend_from_slice(&c.to_le_bytes()));
        bytes
    }
}

impl DeserializeWithContext for Poly {
    type Error = Error;
    type Context = Context;

    fn from_bytes(bytes: &[u8], ctx: &Arc<Context>) -> Result<Self> {
        let expected = 1 + 8 * ctx.q.len() * ctx.degree;
        if bytes.len() != expected {
            return Err(Error::Serialization(format!(
                "Invalid polynomial serialization: got {} bytes, expected {expected}",
                bytes.len()
            )));
        }
        let representation = match bytes[0] {
            0 => Representation::PowerBasis,
            1 => Representation::Ntt,
            r => {
                return Err(Error::Serialization(format!(
                    "Invalid polynomial representation {r}"
                )))
            }
        };

        let mut values = Vec::with_capacity(ctx.q.len() * ctx.degree);
        for (i, chunk) in bytes[1..].chunks_exact(8).enumerate() {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            let v = u64::from_le_bytes(word);
            let qi = &ctx.q[i / ctx.degree];
            if v >= qi.modulus() {
                return Err(Error::Serialization(
                    "Coefficient larger than its modulus".to_string(),
                ));
            }
            values.push(v);
        }
        let coefficients = Array2::from_shape_vec((ctx.q.len(), ctx.degree), values)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        Ok(Self {
            ctx: ctx.clone(),
            representation,
            coefficients,
        })
    }
}
