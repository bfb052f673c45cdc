//! One aggregation round, as a state machine.
//!
//! A round moves through `Idle → Sampling → Collecting → Aggregating →
//! Evaluated → Idle`. A failing step leaves the round in the phase it was in,
//! and never publishes a partial global model.

use ndarray::{ArrayD, IxDyn};
use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::chunked::{ChunkedCipherCodec, EncryptedParameterCollection};
use crate::collaborators::{Evaluator, LocalTrainer, TrainedUpdate};
use crate::collection::{ParameterCollection, ShapeTable};
use crate::metrics::{mean, RoundFairnessRecord};
use crate::weighting::FairnessWeighter;
use crate::{Error, Result};

/// The phase of an [`AggregationRound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a round to start.
    Idle,
    /// Participants are sampled.
    Sampling,
    /// Contributions are collected.
    Collecting,
    /// Contributions are decrypted and averaged.
    Aggregating,
    /// The new global model is evaluated.
    Evaluated,
}

impl Phase {
    fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::Sampling,
            Phase::Sampling => Phase::Collecting,
            Phase::Collecting => Phase::Aggregating,
            Phase::Aggregating => Phase::Evaluated,
            Phase::Evaluated => Phase::Idle,
        }
    }
}

/// The encrypted update of a participant and what the coordinator knows
/// about it in clear.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantContribution {
    participant: usize,
    encrypted_update: EncryptedParameterCollection,
    fairness_weight: f64,
    local_accuracy: f64,
    training_loss: f64,
}

impl ParticipantContribution {
    /// Create a contribution.
    ///
    /// Fails with [`Error::InvalidConfiguration`] if the weight is negative
    /// or not finite.
    pub fn new(
        participant: usize,
        encrypted_update: EncryptedParameterCollection,
        fairness_weight: f64,
        local_accuracy: f64,
        training_loss: f64,
    ) -> Result<Self> {
        if !fairness_weight.is_finite() || fairness_weight < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "invalid fairness weight {fairness_weight}"
            )));
        }
        Ok(Self {
            participant,
            encrypted_update,
            fairness_weight,
            local_accuracy,
            training_loss,
        })
    }

    /// Index of the participant in the pool.
    pub fn participant(&self) -> usize {
        self.participant
    }

    /// The encrypted trained model.
    pub fn encrypted_update(&self) -> &EncryptedParameterCollection {
        &self.encrypted_update
    }

    /// The q-FedAvg weight.
    pub fn fairness_weight(&self) -> f64 {
        self.fairness_weight
    }

    /// Accuracy of the trained model on held-out data.
    pub fn local_accuracy(&self) -> f64 {
        self.local_accuracy
    }

    /// Final training loss.
    pub fn training_loss(&self) -> f64 {
        self.training_loss
    }
}

/// What a completed round produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Index of the round.
    pub round: usize,
    /// The aggregated global model.
    pub new_global: ParameterCollection,
    /// Accuracy of the new global model.
    pub global_accuracy: f64,
    /// Loss of the new global model.
    pub global_loss: f64,
    /// Dispersion of the participant accuracies.
    pub fairness: RoundFairnessRecord,
    /// Average training loss of the participants.
    pub mean_training_loss: f64,
    /// The sampled participants, in increasing order.
    pub participants: Vec<usize>,
}

/// Weighted average of collections with the same names and shapes:
/// `Σ wᵢ·xᵢ / Σ wᵢ`, parameter by parameter.
///
/// The weights are scaled by their maximum before summing, so that large
/// weights do not overflow.
pub fn weighted_average(
    collections: &[ParameterCollection],
    weights: &[f64],
) -> Result<ParameterCollection> {
    if collections.is_empty() {
        return Err(Error::EmptyContributionSet);
    }
    if collections.len() != weights.len() {
        return Err(Error::InvalidConfiguration(format!(
            "{} collections for {} weights",
            collections.len(),
            weights.len()
        )));
    }

    let max = weights.iter().copied().fold(0.0, f64::max);
    if !max.is_finite() || max <= 0.0 || weights.iter().any(|w| w.is_nan() || *w < 0.0) {
        return Err(Error::ZeroTotalWeight);
    }
    let scaled = weights.iter().map(|w| w / max).collect::<Vec<_>>();
    let total = scaled.iter().sum::<f64>();

    let shapes = ShapeTable::from_collection(&collections[0]);
    for collection in &collections[1..] {
        shapes.check(collection)?;
    }

    let mut average = ParameterCollection::new();
    for (name, shape) in shapes.iter() {
        let mut acc = ArrayD::<f64>::zeros(IxDyn(shape));
        for (collection, w) in collections.iter().zip(&scaled) {
            acc.scaled_add(*w, &collection[name]);
        }
        acc.mapv_inplace(|v| v / total);
        average.insert(name.clone(), acc);
    }
    Ok(average)
}

/// A round of encrypted q-FedAvg.
#[derive(Debug)]
pub struct AggregationRound {
    index: usize,
    phase: Phase,
    codec: ChunkedCipherCodec,
    weighter: FairnessWeighter,
    participants: Vec<usize>,
    global: Option<ParameterCollection>,
    shapes: ShapeTable,
    contributions: Vec<ParticipantContribution>,
    aggregated: Option<ParameterCollection>,
}

impl AggregationRound {
    /// An idle round.
    pub fn new(index: usize, codec: ChunkedCipherCodec, weighter: FairnessWeighter) -> Self {
        Self {
            index,
            phase: Phase::Idle,
            codec,
            weighter,
            participants: vec![],
            global: None,
            shapes: ShapeTable::default(),
            contributions: vec![],
            aggregated: None,
        }
    }

    /// Index of the round.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The sampled participants, in increasing order.
    pub fn participants(&self) -> &[usize] {
        &self.participants
    }

    /// The contributions collected so far.
    pub fn contributions(&self) -> &[ParticipantContribution] {
        &self.contributions
    }

    /// The shapes of the global model of the round.
    pub fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }

    fn expect_next(&self, to: Phase) -> Result<()> {
        if self.phase.next() == to {
            Ok(())
        } else {
            Err(Error::InvalidPhase {
                from: self.phase,
                to,
            })
        }
    }

    /// Draw `max(1, round(fraction · pool_size))` distinct participants.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        pool_size: usize,
        fraction: f64,
        rng: &mut R,
    ) -> Result<&[usize]> {
        self.expect_next(Phase::Sampling)?;
        if pool_size == 0 {
            return Err(Error::InvalidConfiguration(
                "the participant pool is empty".to_string(),
            ));
        }
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "the sampling fraction must be in (0, 1], got {fraction}"
            )));
        }

        let wanted = (fraction * pool_size as f64).round() as usize;
        if wanted == 0 {
            warn!(fraction, pool_size, "sampling fraction too small, sampling one participant");
        }
        let m = wanted.clamp(1, pool_size);

        let mut participants = index::sample(rng, pool_size, m).into_vec();
        participants.sort_unstable();
        debug!(round = self.index, ?participants, "sampled participants");

        self.participants = participants;
        self.phase = Phase::Sampling;
        Ok(&self.participants)
    }

    /// Capture the global model of the round.
    pub fn begin_collecting(&mut self, global: &ParameterCollection) -> Result<()> {
        self.expect_next(Phase::Collecting)?;
        self.shapes = ShapeTable::from_collection(global);
        self.global = Some(global.clone());
        self.contributions.clear();
        self.phase = Phase::Collecting;
        Ok(())
    }

    /// Weight and encrypt the trained model of a sampled participant.
    pub fn prepare_contribution(
        &self,
        participant: usize,
        update: &TrainedUpdate,
        local_accuracy: f64,
    ) -> Result<ParticipantContribution> {
        let global = match (self.phase, self.global.as_ref()) {
            (Phase::Collecting, Some(global)) => global,
            _ => {
                return Err(Error::InvalidPhase {
                    from: self.phase,
                    to: Phase::Collecting,
                })
            }
        };
        if self.participants.binary_search(&participant).is_err() {
            return Err(Error::InvalidConfiguration(format!(
                "participant {participant} was not sampled"
            )));
        }
        self.shapes.check(&update.collection)?;

        let weight = self.weighter.weight(&update.collection, global)?;
        debug!(
            round = self.index,
            participant,
            weight,
            accuracy = local_accuracy,
            loss = update.loss,
            "participant update"
        );
        let encrypted = self.codec.encrypt_collection(&update.collection)?;
        ParticipantContribution::new(participant, encrypted, weight, local_accuracy, update.loss)
    }

    /// Append a contribution.
    ///
    /// Fails if the participant was not sampled or already contributed.
    pub fn contribute(&mut self, contribution: ParticipantContribution) -> Result<()> {
        if self.phase != Phase::Collecting {
            return Err(Error::InvalidPhase {
                from: self.phase,
                to: Phase::Collecting,
            });
        }
        let p = contribution.participant;
        if self.participants.binary_search(&p).is_err()
            || self.contributions.iter().any(|c| c.participant == p)
        {
            return Err(Error::InvalidConfiguration(format!(
                "unexpected contribution from participant {p}"
            )));
        }
        if self.codec.context().parameters() != contribution.encrypted_update.scheme_parameters() {
            return Err(Error::CryptoContextMismatch(format!(
                "participant {p} encrypted under other parameters"
            )));
        }
        self.contributions.push(contribution);
        Ok(())
    }

    /// Train, evaluate, weight and encrypt the model of every sampled
    /// participant, in parallel.
    pub fn collect<T: LocalTrainer + ?Sized, E: Evaluator + ?Sized>(
        &mut self,
        trainer: &T,
        evaluator: &E,
    ) -> Result<()> {
        let global = match (self.phase, self.global.as_ref()) {
            (Phase::Collecting, Some(global)) => global,
            _ => {
                return Err(Error::InvalidPhase {
                    from: self.phase,
                    to: Phase::Collecting,
                })
            }
        };

        let contributions = self
            .participants
            .par_iter()
            .map(|&p| {
                let update = trainer.train(p, global)?;
                let evaluation = evaluator.evaluate(&update.collection)?;
                evaluation.check()?;
                self.prepare_contribution(p, &update, evaluation.accuracy)
            })
            .collect::<Vec<_>>();

        let mut collected = Vec::with_capacity(contributions.len());
        for (p, contribution) in self.participants.iter().zip(contributions) {
            collected.push(contribution.map_err(|e| e.in_participant(self.index, *p))?);
        }
        for contribution in collected {
            self.contribute(contribution)?;
        }
        Ok(())
    }

    /// Decrypt the contributions and average them with their fairness
    /// weights.
    ///
    /// Fails until every sampled participant has contributed.
    pub fn aggregate(&mut self) -> Result<&ParameterCollection> {
        self.expect_next(Phase::Aggregating)?;
        if self.contributions.is_empty() {
            return Err(Error::EmptyContributionSet);
        }
        let missing = self
            .participants
            .iter()
            .copied()
            .filter(|p| self.contributions.iter().all(|c| c.participant != *p))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Error::MissingContributions { missing });
        }

        let decrypted = self
            .contributions
            .par_iter()
            .map(|c| {
                self.codec
                    .decrypt_collection(&c.encrypted_update, &self.shapes)
                    .map_err(|e| e.in_participant(self.index, c.participant))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            round = self.index,
            contributions = decrypted.len(),
            "decrypted contributions"
        );

        let weights = self
            .contributions
            .iter()
            .map(|c| c.fairness_weight)
            .collect::<Vec<_>>();
        let average = weighted_average(&decrypted, &weights)?;
        debug!(
            round = self.index,
            total_weight = weights.iter().sum::<f64>(),
            "aggregated contributions"
        );

        self.phase = Phase::Aggregating;
        Ok(&*self.aggregated.insert(average))
    }

    /// Evaluate the aggregated model and the fairness of the round.
    pub fn evaluate<E: Evaluator + ?Sized>(&mut self, evaluator: &E) -> Result<RoundOutcome> {
        self.expect_next(Phase::Evaluated)?;
        let new_global = self.aggregated.as_ref().ok_or(Error::EmptyContributionSet)?;

        let evaluation = evaluator.evaluate(new_global)?;
        evaluation.check()?;
        let accuracies = self
            .contributions
            .iter()
            .map(|c| c.local_accuracy)
            .collect::<Vec<_>>();
        let fairness = RoundFairnessRecord::from_accuracies(&accuracies)?;
        let losses = self
            .contributions
            .iter()
            .map(|c| c.training_loss)
            .collect::<Vec<_>>();
        let mean_training_loss = mean(&losses)?;

        self.phase = Phase::Evaluated;
        Ok(RoundOutcome {
            round: self.index,
            new_global: self.aggregated.take().unwrap_or_default(),
            global_accuracy: evaluation.accuracy,
            global_loss: evaluation.loss,
            fairness,
            mean_training_loss,
            participants: self.participants.clone(),
        })
    }

    /// Release the state of the round and go back to idle.
    pub fn finish(&mut self) -> Result<()> {
        self.expect_next(Phase::Idle)?;
        self.participants.clear();
        self.global = None;
        self.shapes = ShapeTable::default();
        self.contributions.clear();
        self.aggregated = None;
        self.phase = Phase::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{weighted_average, AggregationRound, ParticipantContribution, Phase};
    use crate::chunked::ChunkedCipherCodec;
    use crate::collaborators::{Evaluation, Evaluator, LocalTrainer, SyntheticTask, TrainedUpdate};
    use crate::collection::{ParameterCollection, ShapeTable};
    use crate::config::CryptoConfig;
    use crate::context::CryptoContext;
    use crate::weighting::FairnessWeighter;
    use crate::{Error, Result};
    use ndarray::{ArrayD, IxDyn};
    use rand::{thread_rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::error::Error as StdError;
    use std::sync::{Arc, OnceLock};

    fn codec() -> ChunkedCipherCodec {
        static CONTEXT: OnceLock<Arc<CryptoContext>> = OnceLock::new();
        let ctx = CONTEXT.get_or_init(|| {
            let config = CryptoConfig {
                poly_modulus_degree: 64,
                generate_galois_keys: false,
                ..CryptoConfig::default()
            };
            Arc::new(CryptoContext::new(&config, &mut thread_rng()).unwrap())
        });
        ChunkedCipherCodec::new(ctx)
    }

    fn single(values: &[f64]) -> ParameterCollection {
        let mut c = ParameterCollection::new();
        c.insert(
            "w".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec()).unwrap(),
        );
        c
    }

    fn task() -> SyntheticTask {
        let shapes = ShapeTable::from_shapes([
            ("fc.weight".to_string(), vec![4, 10]),
            ("fc.bias".to_string(), vec![4]),
        ]);
        SyntheticTask::with_shapes(shapes, 3).unwrap()
    }

    #[test]
    fn convex_combination() -> std::result::Result<(), Box<dyn StdError>> {
        let avg = weighted_average(&[single(&[2.0]), single(&[6.0])], &[1.0, 3.0])?;
        assert!((avg["w"][0] - 5.0).abs() < 1e-12);

        let avg = weighted_average(&[single(&[6.0]), single(&[2.0])], &[3.0, 1.0])?;
        assert!((avg["w"][0] - 5.0).abs() < 1e-12);

        let avg = weighted_average(
            &[single(&[2.0]), single(&[6.0])],
            &[f64::MAX, f64::MAX],
        )?;
        assert!((avg["w"][0] - 4.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn average_failures() {
        assert!(matches!(
            weighted_average(&[], &[]),
            Err(Error::EmptyContributionSet)
        ));
        assert!(matches!(
            weighted_average(&[single(&[1.0])], &[0.0]),
            Err(Error::ZeroTotalWeight)
        ));
        assert!(matches!(
            weighted_average(&[single(&[1.0])], &[f64::INFINITY]),
            Err(Error::ZeroTotalWeight)
        ));
        assert!(matches!(
            weighted_average(&[single(&[1.0]), single(&[1.0, 2.0])], &[1.0, 1.0]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn phases() -> std::result::Result<(), Box<dyn StdError>> {
        let mut round = AggregationRound::new(0, codec(), FairnessWeighter::new(1.0)?);
        assert_eq!(round.phase(), Phase::Idle);
        assert!(matches!(
            round.aggregate(),
            Err(Error::InvalidPhase {
                from: Phase::Idle,
                to: Phase::Aggregating
            })
        ));
        assert!(round.begin_collecting(&single(&[0.0])).is_err());
        assert!(round.finish().is_err());

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(round.sample(100, 0.1, &mut rng)?.len(), 10);
        assert_eq!(round.phase(), Phase::Sampling);
        assert!(round.sample(100, 0.1, &mut rng).is_err());

        round.begin_collecting(&single(&[0.0]))?;
        assert!(matches!(round.aggregate(), Err(Error::EmptyContributionSet)));
        assert_eq!(round.phase(), Phase::Collecting);
        Ok(())
    }

    #[test]
    fn sampling() -> std::result::Result<(), Box<dyn StdError>> {
        let weighter = FairnessWeighter::new(1.0)?;
        let sample = |pool: usize, frac: f64, seed: u64| -> Result<Vec<usize>> {
            let mut round = AggregationRound::new(0, codec(), weighter);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            Ok(round.sample(pool, frac, &mut rng)?.to_vec())
        };

        let s = sample(100, 0.1, 5)?;
        assert_eq!(s, sample(100, 0.1, 5)?);
        assert!(s.windows(2).all(|w| w[0] < w[1]));
        assert!(s.iter().all(|p| *p < 100));

        assert_eq!(sample(10, 0.01, 1)?.len(), 1);
        assert_eq!(sample(10, 0.25, 1)?.len(), 3);
        assert_eq!(sample(7, 1.0, 1)?, (0..7).collect::<Vec<_>>());
        assert!(matches!(
            sample(0, 0.5, 1),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(sample(10, 0.0, 1).is_err());
        Ok(())
    }

    #[test]
    fn full_round() -> std::result::Result<(), Box<dyn StdError>> {
        let task = task();
        let global = task.initial_global()?;
        let mut round = AggregationRound::new(4, codec(), FairnessWeighter::new(2.0)?);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        round.sample(20, 0.2, &mut rng)?;
        round.begin_collecting(&global)?;
        round.collect(&task.trainer(0.1, 5), &task.evaluator())?;
        assert_eq!(round.contributions().len(), 4);
        assert!(round.contributions().iter().all(|c| c.fairness_weight() > 0.0));

        let aggregated = round.aggregate()?.clone();
        round.shapes().check(&aggregated)?;
        let outcome = round.evaluate(&task.evaluator())?;
        assert_eq!(outcome.round, 4);
        assert_eq!(outcome.new_global, aggregated);
        assert_eq!(outcome.participants.len(), 4);
        assert!(outcome.fairness.variance >= 0.0);
        assert!((0.0..=100.0).contains(&outcome.global_accuracy));

        round.finish()?;
        assert_eq!(round.phase(), Phase::Idle);
        assert!(round.contributions().is_empty());
        Ok(())
    }

    #[test]
    fn single_participant_reproduces_update() -> std::result::Result<(), Box<dyn StdError>> {
        let task = task();
        let global = task.initial_global()?;
        let trainer = task.trainer(0.3, 2);
        for q in [0.0, 0.5, 1.0, 10.0] {
            let mut round = AggregationRound::new(0, codec(), FairnessWeighter::new(q)?);
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            let p = round.sample(5, 0.2, &mut rng)?[0];
            round.begin_collecting(&global)?;
            round.collect(&trainer, &task.evaluator())?;

            let expected = trainer.train(p, &global)?;
            let aggregated = round.aggregate()?;
            for (name, tensor) in expected.collection.iter() {
                for (a, b) in tensor.iter().zip(aggregated[name].iter()) {
                    assert!((a - b).abs() < 1e-6);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn order_independence() -> std::result::Result<(), Box<dyn StdError>> {
        let global = single(&[0.0, 0.0]);
        let updates = [
            (0, single(&[1.0, 2.0]), 50.0),
            (1, single(&[-1.0, 4.0]), 60.0),
            (2, single(&[3.0, 0.5]), 70.0),
        ];

        let mut results = vec![];
        for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0]] {
            let mut round = AggregationRound::new(0, codec(), FairnessWeighter::new(3.0)?);
            let mut rng = ChaCha8Rng::seed_from_u64(0);
            assert_eq!(round.sample(3, 1.0, &mut rng)?, &[0, 1, 2]);
            round.begin_collecting(&global)?;
            for i in order {
                let (p, collection, accuracy) = &updates[i];
                let update = TrainedUpdate {
                    collection: collection.clone(),
                    loss: 0.1,
                };
                let c = round.prepare_contribution(*p, &update, *accuracy)?;
                round.contribute(c)?;
            }
            let aggregated = round.aggregate()?.clone();
            let fairness = round.evaluate(&Fixed)?.fairness;
            results.push((aggregated, fairness));
        }

        for (aggregated, fairness) in &results[1..] {
            for (a, b) in aggregated["w"].iter().zip(results[0].0["w"].iter()) {
                assert!((a - b).abs() < 1e-6);
            }
            assert!((fairness.variance - results[0].1.variance).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn aggregation_waits_for_every_participant() -> std::result::Result<(), Box<dyn StdError>> {
        let global = single(&[0.0]);
        let mut round = AggregationRound::new(1, codec(), FairnessWeighter::new(1.0)?);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        round.sample(10, 1.0, &mut rng)?;
        round.begin_collecting(&global)?;

        let update = TrainedUpdate {
            collection: single(&[7.0]),
            loss: 0.0,
        };
        let c = round.prepare_contribution(4, &update, 50.0)?;
        round.contribute(c)?;
        match round.aggregate() {
            Err(Error::MissingContributions { missing }) => {
                assert_eq!(missing, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(round.phase(), Phase::Collecting);

        for p in [0, 1, 2, 3, 5, 6, 7, 8, 9] {
            let c = round.prepare_contribution(p, &update, 50.0)?;
            round.contribute(c)?;
        }
        assert!((round.aggregate()?["w"][0] - 7.0).abs() < 1e-6);
        assert_eq!(round.phase(), Phase::Aggregating);
        Ok(())
    }

    #[test]
    fn contribution_checks() -> std::result::Result<(), Box<dyn StdError>> {
        let codec = codec();
        let global = single(&[0.0]);
        let encrypted = codec.encrypt_collection(&global)?;
        assert!(ParticipantContribution::new(0, encrypted.clone(), -1.0, 50.0, 0.0).is_err());
        assert!(ParticipantContribution::new(0, encrypted.clone(), f64::NAN, 50.0, 0.0).is_err());

        let mut round = AggregationRound::new(2, codec, FairnessWeighter::new(1.0)?);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        round.sample(2, 1.0, &mut rng)?;
        round.begin_collecting(&global)?;

        let update = TrainedUpdate {
            collection: single(&[1.0]),
            loss: 0.0,
        };
        assert!(round.prepare_contribution(5, &update, 50.0).is_err());
        let c = round.prepare_contribution(1, &update, 50.0)?;
        round.contribute(c.clone())?;
        assert!(round.contribute(c).is_err());

        let reshaped = TrainedUpdate {
            collection: single(&[1.0, 2.0]),
            loss: 0.0,
        };
        assert!(matches!(
            round.prepare_contribution(0, &reshaped, 50.0),
            Err(Error::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn collaborator_failure_names_participant() -> std::result::Result<(), Box<dyn StdError>> {
        let task = task();
        let global = task.initial_global()?;
        let mut round = AggregationRound::new(6, codec(), FairnessWeighter::new(1.0)?);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let first = round.sample(4, 0.25, &mut rng)?[0];
        round.begin_collecting(&global)?;

        let e = round.collect(&task.trainer(0.1, 1), &Broken).unwrap_err();
        assert!(matches!(
            &e,
            Error::Round { round: 6, participant: Some(p), .. } if *p == first
        ));
        assert!(matches!(e.root(), Error::Collaborator(_)));
        assert!(round.contributions().is_empty());
        Ok(())
    }

    struct Fixed;

    impl Evaluator for Fixed {
        fn evaluate(&self, _: &ParameterCollection) -> Result<Evaluation> {
            Ok(Evaluation {
                accuracy: 80.0,
                loss: 0.2,
            })
        }
    }

    struct Broken;

    impl Evaluator for Broken {
        fn evaluate(&self, _: &ParameterCollection) -> Result<Evaluation> {
            Err(Error::Collaborator("evaluation failed".to_string()))
        }
    }
}
