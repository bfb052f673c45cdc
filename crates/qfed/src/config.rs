//! Run configuration, loaded from and saved to JSON.

use ckks::{CkksParameters, CkksParametersBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::collaborators::{DatasetKind, ModelKind};
use crate::weighting::{FairnessWeighter, DEFAULT_EPSILON};
use crate::{Error, Result};

/// Parameters of the CKKS scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Degree of the polynomial ring; a ciphertext holds half as many values.
    pub poly_modulus_degree: usize,
    /// Bit sizes of the coefficient moduli. With at least two moduli, the
    /// last one is reserved for key switching.
    pub coeff_mod_bit_sizes: Vec<usize>,
    /// Encoding scale.
    pub global_scale: f64,
    /// Whether to generate the rotation keys at setup.
    pub generate_galois_keys: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            poly_modulus_degree: 16384,
            coeff_mod_bit_sizes: vec![60, 40, 40, 60],
            global_scale: 2f64.powi(40),
            generate_galois_keys: true,
        }
    }
}

impl CryptoConfig {
    /// Check the configuration before building any parameter.
    pub fn validate(&self) -> Result<()> {
        let degree = self.poly_modulus_degree;
        if degree < 8 || !degree.is_power_of_two() {
            return Err(Error::InvalidConfiguration(format!(
                "the polynomial modulus degree must be a power of two larger than 8, got {degree}"
            )));
        }
        if self.coeff_mod_bit_sizes.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one coefficient modulus is required".to_string(),
            ));
        }
        if let Some(size) = self
            .coeff_mod_bit_sizes
            .iter()
            .find(|size| !(10..=62).contains(*size))
        {
            return Err(Error::InvalidConfiguration(format!(
                "coefficient modulus sizes must be between 10 and 62 bits, got {size}"
            )));
        }
        if self.generate_galois_keys && self.coeff_mod_bit_sizes.len() < 2 {
            return Err(Error::InvalidConfiguration(
                "rotation keys require a key-switching modulus".to_string(),
            ));
        }

        let data_bits = match self.coeff_mod_bit_sizes.as_slice() {
            [size] => *size,
            sizes => sizes[..sizes.len() - 1].iter().sum(),
        } as f64;
        let scale = self.global_scale;
        if !scale.is_finite() || scale <= 1.0 || scale.log2() >= data_bits - 1.0 {
            return Err(Error::InvalidConfiguration(format!(
                "the global scale must be in (1, 2^{}), got {scale}",
                data_bits - 1.0
            )));
        }
        Ok(())
    }

    /// Validate the configuration and build the scheme parameters.
    pub fn build_parameters(&self) -> Result<Arc<CkksParameters>> {
        self.validate()?;
        Ok(CkksParametersBuilder::new()
            .set_degree(self.poly_modulus_degree)
            .set_moduli_sizes(&self.coeff_mod_bit_sizes)
            .set_scale(self.global_scale)
            .build_arc()?)
    }
}

/// Configuration of a federated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Fairness exponent.
    pub q: f64,
    /// Floor added to every fairness weight.
    pub epsilon: f64,
    /// Give exactly the same weight `1` to everyone when `q = 0`.
    pub uniform_when_q_zero: bool,
    /// Number of rounds.
    pub rounds: usize,
    /// Size of the participant pool.
    pub num_users: usize,
    /// Fraction of the pool sampled at each round.
    pub frac: f64,
    /// Seed of the participant sampling.
    pub seed: u64,
    /// Dataset of the task.
    pub dataset: DatasetKind,
    /// Model architecture of the task.
    pub model: ModelKind,
    /// Local learning rate.
    pub learning_rate: f64,
    /// Number of local epochs per round.
    pub local_epochs: usize,
    /// Scheme parameters.
    pub crypto: CryptoConfig,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            q: 10.0,
            epsilon: DEFAULT_EPSILON,
            uniform_when_q_zero: false,
            rounds: 10,
            num_users: 100,
            frac: 0.1,
            seed: 1,
            dataset: DatasetKind::Mnist,
            model: ModelKind::Mlp,
            learning_rate: 0.01,
            local_epochs: 5,
            crypto: CryptoConfig::default(),
        }
    }
}

impl FederationConfig {
    /// Read a configuration from a JSON file. Missing fields take their
    /// default value.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::Persistence {
            message: e.to_string(),
            path: path.to_path_buf(),
        })?;
        serde_json::from_str(&json).map_err(|e| {
            Error::InvalidConfiguration(format!("{}: {e}", path.display()))
        })
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::Persistence {
            message: e.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Check every field of the configuration.
    pub fn validate(&self) -> Result<()> {
        self.weighter()?;
        if self.rounds == 0 {
            return Err(Error::InvalidConfiguration(
                "at least one round is required".to_string(),
            ));
        }
        if self.num_users == 0 {
            return Err(Error::InvalidConfiguration(
                "the participant pool is empty".to_string(),
            ));
        }
        if !(self.frac > 0.0 && self.frac <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "the sampling fraction must be in (0, 1], got {}",
                self.frac
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "the learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        self.crypto.validate()
    }

    /// The fairness weighter of the configuration.
    pub fn weighter(&self) -> Result<FairnessWeighter> {
        Ok(FairnessWeighter::with_epsilon(self.q, self.epsilon)?
            .uniform_when_q_zero(self.uniform_when_q_zero))
    }
}
