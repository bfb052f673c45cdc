//! Ciphertext type in the CKKS encryption scheme.

use crate::proto::Ciphertext as CiphertextProto;
use crate::traits::TryConvertFrom;
use crate::{CkksParameters, Error, Result};
use ckks_math::rq::{Poly, Representation};
use ckks_traits::{
    DeserializeParametrized, DeserializeWithContext, FheCiphertext, FheParametrized, Serialize,
};
use prost::Message;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::sync::Arc;

/// A ciphertext encrypting a plaintext.
#[derive(Debug, Clone, PartialEq)]
pub struct Ciphertext {
    /// The parameters of the underlying CKKS encryption scheme.
    pub(crate) par: Arc<CkksParameters>,

    /// The ciphertext elements, in Ntt representation.
    pub c: Vec<Poly>,

    /// The scale of the encrypted values.
    pub(crate) scale: f64,

    /// The number of encrypted values.
    pub(crate) len: usize,
}

impl Ciphertext {
    /// Create a ciphertext from a vector of polynomials.
    /// A ciphertext must contain exactly two polynomials, and all polynomials
    /// must be in Ntt representation and in the context of the parameters.
    pub fn new(c: Vec<Poly>, scale: f64, len: usize, par: &Arc<CkksParameters>) -> Result<Self> {
        if c.len() < 2 {
            return Err(Error::TooFewValues(c.len(), 2));
        }
        if c.len() > 2 {
            return Err(Error::TooManyValues(c.len(), 2));
        }
        if len > par.slots() {
            return Err(Error::TooManyValues(len, par.slots()));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::UnspecifiedInput(format!("Invalid scale {scale}")));
        }

        // Check that all polynomials have the expected representation and context.
        for ci in c.iter() {
            if ci.representation() != &Representation::Ntt {
                return Err(Error::MathError(
                    ckks_math::Error::IncorrectRepresentation(
                        *ci.representation(),
                        Representation::Ntt,
                    ),
                ));
            }
            if ci.ctx() != par.ctx() {
                return Err(Error::MathError(ckks_math::Error::InvalidContext));
            }
        }

        Ok(Self {
            par: par.clone(),
            c,
            scale,
            len,
        })
    }

    /// Returns the scale of the encrypted values.
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the number of encrypted values.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the ciphertext encrypts no value.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the parameters of the ciphertext.
    pub fn parameters(&self) -> &Arc<CkksParameters> {
        &self.par
    }

    /// Get the i-th polynomial of the ciphertext.
    pub fn get(&self, i: usize) -> Option<&Poly> {
        self.c.get(i)
    }

    fn assert_compatible(&self, other: &Ciphertext) {
        assert!(
            Arc::ptr_eq(&self.par, &other.par) || self.par == other.par,
            "Incompatible parameters"
        );
        assert_eq!(
            self.scale.to_bits(),
            other.scale.to_bits(),
            "Incompatible scales"
        );
    }
}

impl AddAssign<&Ciphertext> for Ciphertext {
    fn add_assign(&mut self, rhs: &Ciphertext) {
        self.assert_compatible(rhs);
        self.c
            .iter_mut()
            .zip(rhs.c.iter())
            .for_each(|(c1i, c2i)| *c1i += c2i);
        self.len = self.len.max(rhs.len);
    }
}

impl SubAssign<&Ciphertext> for Ciphertext {
    fn sub_assign(&mut self, rhs: &Ciphertext) {
        self.assert_compatible(rhs);
        self.c
            .iter_mut()
            .zip(rhs.c.iter())
            .for_each(|(c1i, c2i)| *c1i -= c2i);
        self.len = self.len.max(rhs.len);
    }
}

impl Add<&Ciphertext> for &Ciphertext {
    type Output = Ciphertext;

    fn add(self, rhs: &Ciphertext) -> Ciphertext {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub<&Ciphertext> for &Ciphertext {
    type Output = Ciphertext;

    fn sub(self, rhs: &Ciphertext) -> Ciphertext {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl Neg for &Ciphertext {
    type Output = Ciphertext;

    fn neg(self) -> Ciphertext {
        Ciphertext {
            par: self.par.clone(),
            c: self.c.iter().map(|ci| -ci).collect(),
            scale: self.scale,
            len: self.len,
        }
    }
}

impl FheCiphertext for Ciphertext {}

impl FheParametrized for Ciphertext {
    type Parameters = CkksParameters;
}

impl Serialize for Ciphertext {
    fn to_bytes(&self) -> Vec<u8> {
        CiphertextProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for Ciphertext {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let ctp: CiphertextProto = Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        Ciphertext::try_convert_from(&ctp, par)
    }
}

impl From<&Ciphertext> for CiphertextProto {
    fn from(ct: &Ciphertext) -> Self {
        CiphertextProto {
            c: ct.c.iter().map(|ci| ci.to_bytes()).collect(),
            scale: ct.scale,
            len: ct.len as u32,
        }
    }
}

impl TryConvertFrom<&CiphertextProto> for Ciphertext {
    fn try_convert_from(value: &CiphertextProto, par: &Arc<CkksParameters>) -> Result<Self> {
        let c = value
            .c
            .iter()
            .map(|cip| Poly::from_bytes(cip, par.ctx()).map_err(Error::MathError))
            .collect::<Result<Vec<_>>>()?;
        Ciphertext::new(c, value.scale, value.len as usize, par)
    }
}
