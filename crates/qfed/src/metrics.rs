//! Fairness dispersion metrics over participant accuracies.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

fn non_empty(values: &[f64], what: &str) -> Result<()> {
    if values.is_empty() {
        Err(Error::EmptyInput(what.to_string()))
    } else {
        Ok(())
    }
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Result<f64> {
    non_empty(values, "mean of an empty sequence")?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance: the mean of the squared deviations from the mean.
///
/// Deviations are taken from the first value, so a constant sequence has a
/// variance of exactly zero.
pub fn variance(values: &[f64]) -> Result<f64> {
    non_empty(values, "variance of an empty sequence")?;
    let shift = values[0];
    let n = values.len() as f64;
    let (sum, sum_sq) = values.iter().fold((0.0, 0.0), |(s, sq), v| {
        let d = v - shift;
        (s + d, sq + d * d)
    });
    Ok(((sum_sq - sum * sum / n) / n).max(0.0))
}

/// `sqrt(Σ (v_i - reference)^2)`.
pub fn euclidean_distance(values: &[f64], reference: f64) -> Result<f64> {
    non_empty(values, "distance of an empty sequence")?;
    Ok(values
        .iter()
        .map(|v| (v - reference) * (v - reference))
        .sum::<f64>()
        .sqrt())
}

/// Dispersion of the participant accuracies of one round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundFairnessRecord {
    /// Population variance of the accuracies.
    pub variance: f64,
    /// Mean accuracy.
    pub mean_accuracy: f64,
    /// Euclidean distance of the accuracies to their mean.
    pub euclidean_distance: f64,
}

impl RoundFairnessRecord {
    /// Compute the record of a set of accuracies.
    pub fn from_accuracies(accuracies: &[f64]) -> Result<Self> {
        let mean_accuracy = mean(accuracies)?;
        Ok(Self {
            variance: variance(accuracies)?,
            mean_accuracy,
            euclidean_distance: euclidean_distance(accuracies, mean_accuracy)?,
        })
    }
}

/// Append-only history of the fairness records of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FairnessHistory {
    records: Vec<RoundFairnessRecord>,
}

impl FairnessHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record of a round.
    pub fn push(&mut self, record: RoundFairnessRecord) {
        self.records.push(record);
    }

    /// The records, in round order.
    pub fn records(&self) -> &[RoundFairnessRecord] {
        &self.records
    }

    /// Number of recorded rounds.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no round was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Average variance (AV) over the rounds.
    pub fn average_variance(&self) -> Result<f64> {
        let v = self.records.iter().map(|r| r.variance).collect::<Vec<_>>();
        mean(&v).map_err(|_| Error::EmptyInput("no round recorded".into()))
    }

    /// Average Euclidean distance (ED) over the rounds.
    pub fn average_distance(&self) -> Result<f64> {
        let d = self
            .records
            .iter()
            .map(|r| r.euclidean_distance)
            .collect::<Vec<_>>();
        mean(&d).map_err(|_| Error::EmptyInput("no round recorded".into()))
    }
}
