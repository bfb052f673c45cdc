//! q-FedAvg fairness weights.
//!
//! A participant whose update moved far from the global model gets a larger
//! weight: with `L` the squared distance between the two models, the weight
//! is `q * L^(q - 1) + ε`.

use tracing::warn;

use crate::collection::{check_same_names, ParameterCollection};
use crate::{Error, Result};

/// Default floor added to every weight.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Computes the q-FedAvg weight of a participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FairnessWeighter {
    q: f64,
    epsilon: f64,
    uniform_when_q_zero: bool,
}

impl FairnessWeighter {
    /// Create a weighter for the fairness exponent `q`, with the default
    /// floor [`DEFAULT_EPSILON`].
    ///
    /// Fails if `q` is negative or not finite.
    pub fn new(q: f64) -> Result<Self> {
        Self::with_epsilon(q, DEFAULT_EPSILON)
    }

    /// Create a weighter with an explicit floor.
    ///
    /// Fails if `q` is negative or not finite, or if `epsilon` is not
    /// positive and finite.
    pub fn with_epsilon(q: f64, epsilon: f64) -> Result<Self> {
        if !q.is_finite() || q < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "the fairness exponent q must be a non-negative number, got {q}"
            )));
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "epsilon must be positive, got {epsilon}"
            )));
        }
        Ok(Self {
            q,
            epsilon,
            uniform_when_q_zero: false,
        })
    }

    /// With `uniform` set, a zero exponent gives the weight `1` to every
    /// participant instead of `ε`.
    pub fn uniform_when_q_zero(mut self, uniform: bool) -> Self {
        self.uniform_when_q_zero = uniform;
        self
    }

    /// The fairness exponent.
    pub const fn q(&self) -> f64 {
        self.q
    }

    /// The floor added to every weight.
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The weight of a participant whose trained model is `local`, given the
    /// current `global` model.
    ///
    /// The weight is positive and finite.
    pub fn weight(&self, local: &ParameterCollection, global: &ParameterCollection) -> Result<f64> {
        let l = squared_distance(local, global)?;
        Ok(self.weight_from_distance(l))
    }

    /// The weight of a participant from the squared distance `l` between its
    /// model and the global one.
    pub fn weight_from_distance(&self, l: f64) -> f64 {
        if self.q == 0.0 {
            return if self.uniform_when_q_zero {
                1.0
            } else {
                self.epsilon
            };
        }

        let term = self.q * l.powf(self.q - 1.0);
        if term.is_finite() {
            term + self.epsilon
        } else {
            warn!(q = self.q, l, "fairness weight saturated");
            f64::MAX
        }
    }
}

/// Sum over all the parameters of the squared L2 norm of `local - global`.
///
/// Fails with [`Error::ParameterSetMismatch`] if the collections do not have
/// the same names, and with [`Error::ShapeMismatch`] if a parameter has
/// different shapes.
pub fn squared_distance(local: &ParameterCollection, global: &ParameterCollection) -> Result<f64> {
    check_same_names(global, local)?;
    let mut l = 0.0;
    for (name, g) in global.iter() {
        let w = &local[name];
        if w.shape() != g.shape() {
            return Err(Error::ShapeMismatch {
                name: name.clone(),
                expected: g.len(),
                found: w.len(),
            });
        }
        l += w
            .iter()
            .zip(g.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>();
    }
    Ok(l)
}

#[cfg(test)]
mod tests {
    use super::{squared_distance, FairnessWeighter, DEFAULT_EPSILON};
    use crate::collection::ParameterCollection;
    use crate::Error;
    use ndarray::{ArrayD, IxDyn};
    use proptest::prelude::*;
    use std::error::Error as StdError;

    fn collection(a: &[f64], b: &[f64]) -> ParameterCollection {
        let mut c = ParameterCollection::new();
        c.insert(
            "a".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[a.len()]), a.to_vec()).unwrap(),
        );
        c.insert(
            "b".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[b.len()]), b.to_vec()).unwrap(),
        );
        c
    }

    #[test]
    fn distance() -> Result<(), Box<dyn StdError>> {
        let global = collection(&[0.0, 0.0], &[1.0]);
        let local = collection(&[1.0, 2.0], &[3.0]);
        assert_eq!(squared_distance(&local, &global)?, 1.0 + 4.0 + 4.0);
        Ok(())
    }

    #[test]
    fn weights() -> Result<(), Box<dyn StdError>> {
        let global = collection(&[0.0, 0.0], &[1.0]);
        let local = collection(&[1.0, 2.0], &[3.0]);

        // L = 9.
        let w = FairnessWeighter::new(2.0)?.weight(&local, &global)?;
        assert!((w - (2.0 * 9.0 + DEFAULT_EPSILON)).abs() < 1e-12);
        let w = FairnessWeighter::new(1.0)?.weight(&local, &global)?;
        assert!((w - 1.0).abs() < 1e-9);
        let w = FairnessWeighter::with_epsilon(0.5, 1e-3)?.weight(&local, &global)?;
        assert!((w - (0.5 / 3.0 + 1e-3)).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn q_zero() -> Result<(), Box<dyn StdError>> {
        let global = collection(&[0.0], &[0.0]);
        let local = collection(&[1.0], &[1.0]);
        let w = FairnessWeighter::new(0.0)?;
        assert_eq!(w.weight(&local, &global)?, DEFAULT_EPSILON);
        assert_eq!(w.weight(&global, &global)?, DEFAULT_EPSILON);
        let w = w.uniform_when_q_zero(true);
        assert_eq!(w.weight(&local, &global)?, 1.0);
        Ok(())
    }

    #[test]
    fn singularity() -> Result<(), Box<dyn StdError>> {
        let global = collection(&[1.0], &[2.0]);
        let w = FairnessWeighter::new(0.5)?.weight(&global, &global)?;
        assert_eq!(w, f64::MAX);
        let w = FairnessWeighter::new(3.0)?.weight(&global, &global)?;
        assert_eq!(w, DEFAULT_EPSILON);
        Ok(())
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            FairnessWeighter::new(-1.0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(FairnessWeighter::new(f64::NAN).is_err());
        assert!(FairnessWeighter::with_epsilon(1.0, 0.0).is_err());
    }

    #[test]
    fn mismatches() -> Result<(), Box<dyn StdError>> {
        let global = collection(&[0.0, 0.0], &[1.0]);
        let w = FairnessWeighter::new(1.0)?;

        let mut renamed = global.clone();
        let b = renamed.remove("b").unwrap();
        renamed.insert("c".to_string(), b);
        assert!(matches!(
            w.weight(&renamed, &global),
            Err(Error::ParameterSetMismatch { .. })
        ));

        let reshaped = collection(&[0.0, 0.0, 0.0], &[1.0]);
        assert!(matches!(
            w.weight(&reshaped, &global),
            Err(Error::ShapeMismatch { expected: 2, found: 3, .. })
        ));
        Ok(())
    }

    proptest! {
        #[test]
        fn positive_and_finite(
            q in 0.0f64..20.0,
            a in prop::collection::vec(-100.0f64..100.0, 3),
            b in prop::collection::vec(-100.0f64..100.0, 3),
        ) {
            let global = collection(&a[..2], &a[2..]);
            let local = collection(&b[..2], &b[2..]);
            let w = FairnessWeighter::new(q).unwrap().weight(&local, &global).unwrap();
            prop_assert!(w > 0.0);
            prop_assert!(w.is_finite());
        }
    }
}
