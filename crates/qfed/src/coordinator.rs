//! The coordinator of a federated run.

use rand::{thread_rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::chunked::ChunkedCipherCodec;
use crate::collaborators::{Evaluator, LocalTrainer};
use crate::collection::ParameterCollection;
use crate::config::FederationConfig;
use crate::context::CryptoContext;
use crate::metrics::FairnessHistory;
use crate::round::{AggregationRound, RoundOutcome};
use crate::weighting::FairnessWeighter;
use crate::Result;

/// Results of a complete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of completed rounds.
    pub rounds: usize,
    /// Accuracy of the final global model.
    pub final_accuracy: f64,
    /// Average over the rounds of the variance of the participant accuracies
    /// (AV).
    pub average_variance: f64,
    /// Average over the rounds of the Euclidean distance of the participant
    /// accuracies to their mean (ED).
    pub average_distance: f64,
    /// Accuracy of the global model after each round.
    pub global_accuracies: Vec<f64>,
}

/// Runs the rounds of a federation and owns the global model.
#[derive(Debug)]
pub struct Coordinator<T, E> {
    config: FederationConfig,
    codec: ChunkedCipherCodec,
    weighter: FairnessWeighter,
    trainer: T,
    evaluator: E,
    global: ParameterCollection,
    history: FairnessHistory,
    global_accuracies: Vec<f64>,
    rng: ChaCha8Rng,
    round: usize,
}

impl<T: LocalTrainer, E: Evaluator> Coordinator<T, E> {
    /// Validate the configuration and generate the keys of the run.
    pub fn new(
        config: FederationConfig,
        initial_global: ParameterCollection,
        trainer: T,
        evaluator: E,
    ) -> Result<Self> {
        config.validate()?;
        let context = Arc::new(CryptoContext::new(&config.crypto, &mut thread_rng())?);
        Self::with_context(config, context, initial_global, trainer, evaluator)
    }

    /// Use an existing cryptographic context.
    pub fn with_context(
        config: FederationConfig,
        context: Arc<CryptoContext>,
        initial_global: ParameterCollection,
        trainer: T,
        evaluator: E,
    ) -> Result<Self> {
        config.validate()?;
        let weighter = config.weighter()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        info!(
            q = config.q,
            rounds = config.rounds,
            num_users = config.num_users,
            frac = config.frac,
            degree = context.parameters().degree(),
            "federation configured"
        );
        Ok(Self {
            codec: ChunkedCipherCodec::new(&context),
            config,
            weighter,
            trainer,
            evaluator,
            global: initial_global,
            history: FairnessHistory::new(),
            global_accuracies: vec![],
            rng,
            round: 0,
        })
    }

    /// The configuration of the run.
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// The cryptographic context of the run.
    pub fn context(&self) -> &Arc<CryptoContext> {
        self.codec.context()
    }

    /// The current global model.
    pub fn global(&self) -> &ParameterCollection {
        &self.global
    }

    /// The fairness records of the completed rounds.
    pub fn history(&self) -> &FairnessHistory {
        &self.history
    }

    /// Number of completed rounds.
    pub fn rounds_completed(&self) -> usize {
        self.round
    }

    /// Run one round and publish its global model.
    ///
    /// On failure, the global model, the history and the sampling state are
    /// left untouched, so a retry samples the same participants.
    pub fn run_round(&mut self) -> Result<RoundOutcome> {
        let index = self.round;
        info!(round = index, "round started");
        let mut rng = self.rng.clone();
        let outcome = self
            .execute_round(index, &mut rng)
            .map_err(|e| e.in_round(index))?;

        self.rng = rng;
        self.global = outcome.new_global.clone();
        self.history.push(outcome.fairness);
        self.global_accuracies.push(outcome.global_accuracy);
        self.round += 1;

        info!(
            round = index,
            mean_accuracy = outcome.fairness.mean_accuracy,
            variance = outcome.fairness.variance,
            distance = outcome.fairness.euclidean_distance,
            global_accuracy = outcome.global_accuracy,
            "round completed"
        );
        Ok(outcome)
    }

    fn execute_round(&self, index: usize, rng: &mut ChaCha8Rng) -> Result<RoundOutcome> {
        let mut round = AggregationRound::new(index, self.codec.clone(), self.weighter);
        round.sample(self.config.num_users, self.config.frac, rng)?;
        round.begin_collecting(&self.global)?;
        round.collect(&self.trainer, &self.evaluator)?;
        round.aggregate()?;
        let outcome = round.evaluate(&self.evaluator)?;
        round.finish()?;
        debug!(
            round = index,
            mean_training_loss = outcome.mean_training_loss,
            global_loss = outcome.global_loss,
            "round losses"
        );
        Ok(outcome)
    }

    /// Run the remaining rounds of the configuration.
    pub fn run(&mut self) -> Result<RunSummary> {
        while self.round < self.config.rounds {
            self.run_round()?;
        }
        self.summary()
    }

    /// Summary of the completed rounds.
    pub fn summary(&self) -> Result<RunSummary> {
        let summary = RunSummary {
            rounds: self.round,
            final_accuracy: self.global_accuracies.last().copied().unwrap_or_default(),
            average_variance: self.history.average_variance()?,
            average_distance: self.history.average_distance()?,
            global_accuracies: self.global_accuracies.clone(),
        };
        info!(
            average_variance = summary.average_variance,
            average_distance = summary.average_distance,
            final_accuracy = summary.final_accuracy,
            "federation completed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::Coordinator;
    use crate::collaborators::{Evaluation, Evaluator, SyntheticEvaluator, SyntheticTask};
    use crate::collection::{ParameterCollection, ShapeTable};
    use crate::config::{CryptoConfig, FederationConfig};
    use crate::context::CryptoContext;
    use crate::{Error, Result};
    use rand::thread_rng;
    use std::error::Error as StdError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(rounds: usize) -> FederationConfig {
        FederationConfig {
            q: 1.0,
            rounds,
            num_users: 10,
            frac: 0.3,
            learning_rate: 0.2,
            crypto: CryptoConfig {
                poly_modulus_degree: 64,
                generate_galois_keys: false,
                ..CryptoConfig::default()
            },
            ..FederationConfig::default()
        }
    }

    fn task() -> SyntheticTask {
        let shapes = ShapeTable::from_shapes([
            ("fc.weight".to_string(), vec![5, 8]),
            ("fc.bias".to_string(), vec![5]),
        ]);
        SyntheticTask::with_shapes(shapes, 11).unwrap()
    }

    #[test]
    fn run() -> std::result::Result<(), Box<dyn StdError>> {
        let task = task();
        let initial = task.initial_global()?;
        let mut coordinator = Coordinator::new(
            config(3),
            initial.clone(),
            task.trainer(0.2, 5),
            task.evaluator(),
        )?;
        let summary = coordinator.run()?;

        assert_eq!(summary.rounds, 3);
        assert_eq!(coordinator.rounds_completed(), 3);
        assert_eq!(coordinator.history().len(), 3);
        assert_eq!(summary.global_accuracies.len(), 3);
        assert_eq!(summary.final_accuracy, summary.global_accuracies[2]);
        assert!(summary.average_variance >= 0.0);
        assert!(summary.average_distance >= 0.0);
        assert_ne!(coordinator.global(), &initial);
        assert_eq!(
            ShapeTable::from_collection(coordinator.global()),
            *task.shapes()
        );

        // Nothing left to run.
        assert_eq!(coordinator.run()?, summary);
        Ok(())
    }

    #[test]
    fn same_seed_same_participants() -> std::result::Result<(), Box<dyn StdError>> {
        let task = task();
        let context = Arc::new(CryptoContext::new(&config(1).crypto, &mut thread_rng())?);
        let mut participants = vec![];
        for _ in 0..2 {
            let mut coordinator = Coordinator::with_context(
                config(1),
                context.clone(),
                task.initial_global()?,
                task.trainer(0.2, 5),
                task.evaluator(),
            )?;
            participants.push(coordinator.run_round()?.participants);
        }
        assert_eq!(participants[0], participants[1]);
        assert_eq!(participants[0].len(), 3);
        Ok(())
    }

    struct FailingOnce {
        inner: SyntheticEvaluator,
        calls: AtomicUsize,
        fail_at: usize,
    }

    impl Evaluator for FailingOnce {
        fn evaluate(&self, collection: &ParameterCollection) -> Result<Evaluation> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(Error::Collaborator("evaluation failed".to_string()));
            }
            self.inner.evaluate(collection)
        }
    }

    #[test]
    fn failed_round_keeps_global() -> std::result::Result<(), Box<dyn StdError>> {
        let task = task();
        let initial = task.initial_global()?;
        let evaluator = FailingOnce {
            inner: task.evaluator(),
            calls: AtomicUsize::new(0),
            // Three participant evaluations, then the global one.
            fail_at: 3,
        };
        let context = Arc::new(CryptoContext::new(&config(2).crypto, &mut thread_rng())?);
        let mut coordinator = Coordinator::with_context(
            config(2),
            context.clone(),
            initial.clone(),
            task.trainer(0.2, 5),
            evaluator,
        )?;
        let mut reference = Coordinator::with_context(
            config(2),
            context,
            initial.clone(),
            task.trainer(0.2, 5),
            task.evaluator(),
        )?;

        let e = coordinator.run_round().unwrap_err();
        assert!(matches!(
            e,
            Error::Round {
                round: 0,
                participant: None,
                ..
            }
        ));
        assert!(matches!(e.root(), Error::Collaborator(_)));
        assert_eq!(coordinator.global(), &initial);
        assert!(coordinator.history().is_empty());
        assert_eq!(coordinator.rounds_completed(), 0);

        let retried = coordinator.run_round()?;
        assert_eq!(coordinator.rounds_completed(), 1);
        assert_eq!(retried.round, 0);
        assert_eq!(retried.participants, reference.run_round()?.participants);
        assert_eq!(
            coordinator.run_round()?.participants,
            reference.run_round()?.participants
        );
        Ok(())
    }

    #[test]
    fn invalid_configuration() {
        let task = task();
        let result = Coordinator::new(
            FederationConfig {
                frac: 0.0,
                ..config(1)
            },
            ParameterCollection::new(),
            task.trainer(0.1, 1),
            task.evaluator(),
        );
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }
}
