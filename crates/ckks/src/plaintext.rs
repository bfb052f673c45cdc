//! Plaintext type in the CKKS encryption scheme.

use crate::{CkksParameters, Error, Result};
use ckks_math::rq::{traits::TryConvertFrom, Poly, Representation};
use ckks_traits::{FheDecoder, FheEncoder, FheParametrized, FhePlaintext};
use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{FromPrimitive, ToPrimitive};
use std::sync::Arc;
use zeroize::Zeroize;

/// Largest magnitude for which the scaled coefficients are encoded through
/// machine integers.
const I64_ENCODING_BOUND: f64 = (1u64 << 62) as f64;

/// An encoding for the plaintext: the scale applied to the values before
/// rounding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Encoding {
    pub(crate) scale: Option<f64>,
}

impl Encoding {
    /// Encoding at the default scale: the scale of the parameters when
    /// encoding, the scale recorded in the plaintext when decoding.
    pub const fn canonical() -> Self {
        Self { scale: None }
    }

    /// Encoding at an explicit scale.
    pub const fn with_scale(scale: f64) -> Self {
        Self { scale: Some(scale) }
    }
}

/// A plaintext object, that encodes a vector of reals according to a scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext {
    /// The parameters of the underlying CKKS encryption scheme.
    pub(crate) par: Arc<CkksParameters>,
    /// The polynomial, in Ntt representation.
    pub(crate) poly_ntt: Poly,
    /// The scale of the encoded values.
    pub(crate) scale: f64,
    /// The number of encoded values.
    pub(crate) len: usize,
}

impl Plaintext {
    /// Returns the scale of the encoded values.
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the number of encoded values.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the plaintext encodes no value.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the underlying polynomial, in Ntt representation.
    pub fn poly(&self) -> &Poly {
        &self.poly_ntt
    }

    fn scaled_coefficients(values: &[f64], scale: f64, par: &CkksParameters) -> Vec<f64> {
        let slots = par.slots();
        let mut vals = values
            .iter()
            .map(|v| Complex64::new(*v, 0.0))
            .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
            .take(slots)
            .collect::<Vec<_>>();
        par.fft.embed_inverse(&mut vals);

        let mut coeffs = vec![0f64; par.degree()];
        for (i, v) in vals.iter().enumerate() {
            coeffs[i] = (v.re * scale).round();
            coeffs[i + slots] = (v.im * scale).round();
        }
        coeffs
    }
}

impl Zeroize for Plaintext {
    fn zeroize(&mut self) {
        self.poly_ntt.zeroize();
    }
}

impl FheParametrized for Plaintext {
    type Parameters = CkksParameters;
}

impl FhePlaintext for Plaintext {
    type Encoding = Encoding;
}

impl FheEncoder<&[f64]> for Plaintext {
    type Error = Error;

    fn try_encode(value: &[f64], encoding: Encoding, par: &Arc<CkksParameters>) -> Result<Self> {
        if value.len() > par.slots() {
            return Err(Error::TooManyValues(value.len(), par.slots()));
        }
        if let Some(v) = value.iter().find(|v| !v.is_finite()) {
            return Err(Error::EncodingError(format!("cannot encode {v}")));
        }
        let scale = encoding.scale.unwrap_or(par.scale());
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::EncodingError(format!("invalid scale {scale}")));
        }

        let coeffs = Self::scaled_coefficients(value, scale, par);

        let max_abs = coeffs.iter().fold(0f64, |m, c| m.max(c.abs()));
        let half_modulus = par.ctx.modulus().to_f64().unwrap_or(f64::INFINITY) / 2.0;
        if max_abs >= half_modulus {
            return Err(Error::EncodingError(format!(
                "the scaled values reach {max_abs:e}, beyond half the ciphertext modulus"
            )));
        }

        let poly_ntt = if max_abs < I64_ENCODING_BOUND {
            let coeffs = coeffs.iter().map(|c| *c as i64).collect::<Vec<_>>();
            Poly::try_convert_from(coeffs.as_slice(), &par.ctx, Representation::Ntt)?
        } else {
            let coeffs = coeffs
                .iter()
                .map(|c| {
                    BigInt::from_f64(*c)
                        .ok_or_else(|| Error::EncodingError(format!("cannot encode {c}")))
                })
                .collect::<Result<Vec<_>>>()?;
            Poly::try_convert_from(coeffs.as_slice(), &par.ctx, Representation::Ntt)?
        };

        Ok(Self {
            par: par.clone(),
            poly_ntt,
            scale,
            len: value.len(),
        })
    }
}

impl FheDecoder<Plaintext> for Vec<f64> {
    type Error = Error;

    fn try_decode<O>(pt: &Plaintext, encoding: O) -> Result<Vec<f64>>
    where
        O: Into<Option<Encoding>>,
    {
        let scale = encoding
            .into()
            .and_then(|e| e.scale)
            .unwrap_or(pt.scale);

        let mut p = pt.poly_ntt.clone();
        p.change_representation(Representation::PowerBasis);
        let coeffs = p.to_centered_bigints()?;
        p.zeroize();

        let slots = pt.par.slots();
        let mut vals = (0..slots)
            .map(|i| {
                Complex64::new(
                    coeffs[i].to_f64().unwrap_or_default() / scale,
                    coeffs[i + slots].to_f64().unwrap_or_default() / scale,
                )
            })
            .collect::<Vec<_>>();
        pt.par.fft.embed(&mut vals);

        Ok(vals.iter().take(pt.len).map(|v| v.re).collect())
    }
}
