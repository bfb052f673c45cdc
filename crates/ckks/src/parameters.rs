//! Create parameters for the CKKS encryption scheme

use crate::encoding::SpecialFft;
use crate::proto::Parameters;
use crate::{Error, ParametersError, Result};
use ckks_math::{rq::Context, zq::primes::generate_prime};
use ckks_traits::{Deserialize, FheParameters, Serialize};
use itertools::Itertools;
use prost::Message;
use std::fmt::Debug;
use std::sync::Arc;

/// Parameters for the CKKS encryption scheme.
///
/// When at least two moduli are given, the last one is reserved as the
/// special prime used by key switching: data lives modulo the product of the
/// other moduli.
pub struct CkksParameters {
    /// Number of coefficients in a polynomial.
    polynomial_degree: usize,

    /// Vector of coprime moduli q_i, the special prime last.
    pub(crate) moduli: Box<[u64]>,

    /// Vector of the sizes of the moduli.
    moduli_sizes: Box<[usize]>,

    /// Default encoding scale.
    scale: f64,

    /// Error variance
    pub(crate) variance: usize,

    /// Context over all the moduli, used by the key-switching keys.
    pub(crate) ctx_key: Arc<Context>,

    /// Context for the plaintexts and ciphertexts.
    pub(crate) ctx: Arc<Context>,

    /// Special FFT for the canonical embedding.
    pub(crate) fft: SpecialFft,
}

impl Debug for CkksParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksParameters")
            .field("polynomial_degree", &self.polynomial_degree)
            .field("moduli", &self.moduli)
            .field("scale", &self.scale)
            .finish()
    }
}

impl PartialEq for CkksParameters {
    fn eq(&self, other: &Self) -> bool {
        self.polynomial_degree == other.polynomial_degree
            && self.moduli == other.moduli
            && self.variance == other.variance
            && self.scale.to_bits() == other.scale.to_bits()
    }
}

impl Eq for CkksParameters {}

impl FheParameters for CkksParameters {}

impl CkksParameters {
    /// Returns the underlying polynomial degree
    pub const fn degree(&self) -> usize {
        self.polynomial_degree
    }

    /// Returns the number of slots of a plaintext, i.e. half the degree.
    pub const fn slots(&self) -> usize {
        self.polynomial_degree / 2
    }

    /// Returns a reference to the moduli, the special prime last.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Returns a reference to the sizes of the moduli.
    pub fn moduli_sizes(&self) -> &[usize] {
        &self.moduli_sizes
    }

    /// Returns the moduli holding ciphertext data.
    pub fn data_moduli(&self) -> &[u64] {
        self.ctx.moduli()
    }

    /// Returns the special prime, if the moduli reserve one.
    pub fn special_prime(&self) -> Option<u64> {
        if self.moduli.len() >= 2 {
            self.moduli.last().copied()
        } else {
            None
        }
    }

    /// Returns the default encoding scale.
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the variance
    pub const fn variance(&self) -> usize {
        self.variance
    }

    /// Returns the context of the plaintexts and ciphertexts.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Returns the context of the key-switching keys.
    pub fn ctx_key(&self) -> &Arc<Context> {
        &self.ctx_key
    }

    #[cfg(test)]
    #[allow(missing_docs)]
    pub fn default_arc(degree: usize) -> Arc<Self> {
        CkksParametersBuilder::new()
            .set_degree(degree)
            .set_moduli_sizes(&[60, 40, 40, 60])
            .set_scale(2f64.powi(40))
            .build_arc()
            .unwrap()
    }
}

/// Builder for parameters for the Ckks encryption scheme.
#[derive(Debug)]
pub struct CkksParametersBuilder {
    degree: usize,
    variance: usize,
    scale: f64,
    ciphertext_moduli: Vec<u64>,
    ciphertext_moduli_sizes: Vec<usize>,
}

impl CkksParametersBuilder {
    /// Creates a new instance of the builder
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            degree: Default::default(),
            variance: 10,
            scale: 2f64.powi(40),
            ciphertext_moduli: Default::default(),
            ciphertext_moduli_sizes: Default::default(),
        }
    }

    /// Sets the polynomial degree. Building fails if the degree is not a
    /// power of two larger or equal to 8.
    pub fn set_degree(&mut self, degree: usize) -> &mut Self {
        self.degree = degree;
        self
    }

    /// Sets the sizes of the ciphertext moduli.
    /// Only one of `set_moduli_sizes` and `set_moduli`
    /// can be specified.
    pub fn set_moduli_sizes(&mut self, sizes: &[usize]) -> &mut Self {
        self.ciphertext_moduli_sizes = sizes.to_owned();
        self
    }

    /// Sets the ciphertext moduli to use.
    /// Only one of `set_moduli_sizes` and `set_moduli`
    /// can be specified.
    pub fn set_moduli(&mut self, moduli: &[u64]) -> &mut Self {
        self.ciphertext_moduli = moduli.to_owned();
        self
    }

    /// Sets the default encoding scale.
    pub fn set_scale(&mut self, scale: f64) -> &mut Self {
        self.scale = scale;
        self
    }

    /// Sets the error variance. Building fails if the variance is not between
    /// one and sixteen.
    pub fn set_variance(&mut self, variance: usize) -> &mut Self {
        self.variance = variance;
        self
    }

    /// Generate ciphertext moduli with the specified sizes
    fn generate_moduli(moduli_sizes: &[usize], degree: usize) -> Result<Vec<u64>> {
        let mut moduli = vec![];
        for size in moduli_sizes {
            if *size > 62 || *size < 10 {
                return Err(Error::ParametersError(ParametersError::InvalidModulusSize(
                    *size, 10, 62,
                )));
            }

            let mut upper_bound = 1 << size;
            loop {
                if let Some(prime) = generate_prime(*size, 2 * degree as u64, upper_bound) {
                    if !moduli.contains(&prime) {
                        moduli.push(prime);
                        break;
                    } else {
                        upper_bound = prime;
                    }
                } else {
                    return Err(Error::ParametersError(ParametersError::NotEnoughPrimes(
                        *size, degree,
                    )));
                }
            }
        }

        Ok(moduli)
    }

    /// Build a new `CkksParameters` inside an `Arc`.
    pub fn build_arc(&self) -> Result<Arc<CkksParameters>> {
        self.build().map(Arc::new)
    }

    /// Build a new `CkksParameters`.
    pub fn build(&self) -> Result<CkksParameters> {
        // Check that the degree is a power of 2 (and large enough).
        if self.degree < 8 || !self.degree.is_power_of_two() {
            return Err(Error::ParametersError(ParametersError::InvalidDegree(
                self.degree,
            )));
        }

        if !(1..=16).contains(&self.variance) {
            return Err(Error::ParametersError(ParametersError::InvalidVariance(
                self.variance,
            )));
        }

        // Check that one of `ciphertext_moduli` and `ciphertext_moduli_sizes` is
        // specified.
        if !self.ciphertext_moduli.is_empty() && !self.ciphertext_moduli_sizes.is_empty() {
            return Err(Error::ParametersError(ParametersError::TooManySpecified(
                "Only one of `ciphertext_moduli` and `ciphertext_moduli_sizes` can be specified"
                    .to_string(),
            )));
        } else if self.ciphertext_moduli.is_empty() && self.ciphertext_moduli_sizes.is_empty() {
            return Err(Error::ParametersError(ParametersError::TooFewSpecified(
                "One of `ciphertext_moduli` and `ciphertext_moduli_sizes` must be specified"
                    .to_string(),
            )));
        }

        // Get or generate the moduli
        let moduli = if !self.ciphertext_moduli_sizes.is_empty() {
            Self::generate_moduli(&self.ciphertext_moduli_sizes, self.degree)?
        } else {
            self.ciphertext_moduli.clone()
        };

        // Recomputes the moduli sizes
        let moduli_sizes = moduli
            .iter()
            .map(|m| 64 - m.leading_zeros() as usize)
            .collect_vec();

        let ctx_key = Arc::new(Context::new(&moduli, self.degree)?);
        let ctx = match ctx_key.next_context() {
            Some(next) => next.clone(),
            None => ctx_key.clone(),
        };

        // The scaled values must fit in the centered interval modulo the data
        // modulus, with at least one bit left for the values themselves.
        let data_bits = ctx.modulus().bits() as f64;
        if !self.scale.is_finite() || self.scale <= 1.0 || self.scale.log2() >= data_bits - 1.0 {
            return Err(Error::ParametersError(ParametersError::InvalidScale(
                format!(
                    "the scale {} should be larger than 1 and smaller than 2^{}",
                    self.scale,
                    data_bits - 1.0
                ),
            )));
        }

        Ok(CkksParameters {
            polynomial_degree: self.degree,
            moduli: moduli.into_boxed_slice(),
            moduli_sizes: moduli_sizes.into_boxed_slice(),
            scale: self.scale,
            variance: self.variance,
            ctx_key,
            ctx,
            fft: SpecialFft::new(self.degree),
        })
    }
}

impl Serialize for CkksParameters {
    fn to_bytes(&self) -> Vec<u8> {
        Parameters {
            degree: self.polynomial_degree as u32,
            moduli: self.moduli.to_vec(),
            variance: self.variance as u32,
            scale: self.scale,
        }
        .encode_to_vec()
    }
}

impl Deserialize for CkksParameters {
    type Error = Error;

    fn try_deserialize(bytes: &[u8]) -> Result<Self> {
        let params: Parameters = Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        CkksParametersBuilder::new()
            .set_degree(params.degree as usize)
            .set_moduli(&params.moduli)
            .set_variance(params.variance as usize)
            .set_scale(params.scale)
            .build()
    }
}
