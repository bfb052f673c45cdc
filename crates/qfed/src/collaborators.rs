//! Training and evaluation collaborators.
//!
//! The aggregation only sees the [`LocalTrainer`] and [`Evaluator`] traits.
//! [`SyntheticTask`] provides a deterministic implementation of both, used by
//! the simulation binary and the tests.

use ndarray::{ArrayD, IxDyn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use crate::collection::{ParameterCollection, ShapeTable};
use crate::{Error, Result};

/// A locally trained model and its training loss.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedUpdate {
    /// The trained parameters.
    pub collection: ParameterCollection,
    /// The final training loss.
    pub loss: f64,
}

/// The evaluation of a model on held-out data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Accuracy, in percent.
    pub accuracy: f64,
    /// Loss.
    pub loss: f64,
}

impl Evaluation {
    /// Fails with [`Error::Collaborator`] unless the accuracy is in
    /// `[0, 100]` and the loss is finite.
    pub fn check(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.accuracy) || !self.loss.is_finite() {
            return Err(Error::Collaborator(format!(
                "invalid evaluation: accuracy {}, loss {}",
                self.accuracy, self.loss
            )));
        }
        Ok(())
    }
}

/// Trains a copy of the global model on the data of a participant.
///
/// Called from several threads at once.
pub trait LocalTrainer: Sync {
    /// Train from `global` on the data of `participant`.
    fn train(&self, participant: usize, global: &ParameterCollection) -> Result<TrainedUpdate>;
}

/// Evaluates a model on held-out data.
///
/// Called for every participant model and for the new global model.
pub trait Evaluator: Sync {
    /// Evaluate `collection`.
    fn evaluate(&self, collection: &ParameterCollection) -> Result<Evaluation>;
}

/// The dataset of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Grayscale 28x28 digits.
    Mnist,
    /// RGB 32x32 images.
    Cifar,
}

/// The model architecture of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Multi-layer perceptron with one hidden layer of 64 units.
    Mlp,
    /// Convolutional network.
    Cnn,
}

impl DatasetKind {
    fn input_size(self) -> usize {
        match self {
            DatasetKind::Mnist => 28 * 28,
            DatasetKind::Cifar => 3 * 32 * 32,
        }
    }
}

impl Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DatasetKind::Mnist => "mnist",
            DatasetKind::Cifar => "cifar",
        })
    }
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mnist" => Ok(DatasetKind::Mnist),
            "cifar" => Ok(DatasetKind::Cifar),
            _ => Err(Error::InvalidConfiguration(format!("unknown dataset `{s}`"))),
        }
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ModelKind::Mlp => "mlp",
            ModelKind::Cnn => "cnn",
        })
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mlp" => Ok(ModelKind::Mlp),
            "cnn" => Ok(ModelKind::Cnn),
            _ => Err(Error::InvalidConfiguration(format!("unknown model `{s}`"))),
        }
    }
}

impl ModelKind {
    /// The parameter shapes of the model on a dataset, with ten classes.
    pub fn parameter_shapes(self, dataset: DatasetKind) -> ShapeTable {
        let layers: Vec<(&str, Vec<usize>)> = match (self, dataset) {
            (ModelKind::Mlp, dataset) => vec![
                ("layer_input", vec![64, dataset.input_size()]),
                ("layer_hidden", vec![10, 64]),
            ],
            (ModelKind::Cnn, DatasetKind::Mnist) => vec![
                ("conv1", vec![10, 1, 5, 5]),
                ("conv2", vec![20, 10, 5, 5]),
                ("fc1", vec![50, 320]),
                ("fc2", vec![10, 50]),
            ],
            (ModelKind::Cnn, DatasetKind::Cifar) => vec![
                ("conv1", vec![6, 3, 5, 5]),
                ("conv2", vec![16, 6, 5, 5]),
                ("fc1", vec![120, 400]),
                ("fc2", vec![84, 120]),
                ("fc3", vec![10, 84]),
            ],
        };
        ShapeTable::from_shapes(layers.into_iter().flat_map(|(layer, weight)| {
            let bias = vec![weight[0]];
            [
                (format!("{layer}.weight"), weight),
                (format!("{layer}.bias"), bias),
            ]
        }))
    }
}

const CENTER_STREAM: u64 = 0;
const INITIAL_STREAM: u64 = 1;

fn sample_collection(
    shapes: &ShapeTable,
    seed: u64,
    stream: u64,
    mean: Option<&ParameterCollection>,
    std_dev: f64,
) -> Result<ParameterCollection> {
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| Error::InvalidConfiguration(format!("standard deviation {std_dev}: {e}")))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);

    let mut collection = ParameterCollection::new();
    for (name, shape) in shapes.iter() {
        let mut tensor = ArrayD::from_shape_fn(IxDyn(shape), |_| normal.sample(&mut rng));
        if let Some(mean) = mean.and_then(|m| m.get(name)) {
            tensor += mean;
        }
        collection.insert(name.clone(), tensor);
    }
    Ok(collection)
}

fn mean_squared_distance(a: &ParameterCollection, b: &ParameterCollection) -> f64 {
    let (sum, count) = a
        .iter()
        .filter_map(|(name, x)| b.get(name).map(|y| (x, y)))
        .fold((0.0, 0usize), |(sum, count), (x, y)| {
            let s = x
                .iter()
                .zip(y.iter())
                .map(|(u, v)| (u - v) * (u - v))
                .sum::<f64>();
            (sum + s, count + x.len())
        });
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// A deterministic learning task.
///
/// Every participant has its own optimum, drawn around a common center with a
/// participant-dependent spread. Local training runs gradient steps on the
/// squared distance to the optimum, and the accuracy of a model decreases
/// with its distance to the center.
#[derive(Debug, Clone)]
pub struct SyntheticTask {
    shapes: ShapeTable,
    seed: u64,
    spread: f64,
    center: Arc<ParameterCollection>,
}

impl SyntheticTask {
    /// The task of a model on a dataset.
    pub fn new(dataset: DatasetKind, model: ModelKind, seed: u64) -> Result<Self> {
        Self::with_shapes(model.parameter_shapes(dataset), seed)
    }

    /// A task over arbitrary parameter shapes.
    pub fn with_shapes(shapes: ShapeTable, seed: u64) -> Result<Self> {
        let spread = 0.05;
        let center = sample_collection(&shapes, seed, CENTER_STREAM, None, 0.1)?;
        Ok(Self {
            shapes,
            seed,
            spread,
            center: Arc::new(center),
        })
    }

    /// The shapes of the model.
    pub fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }

    /// The model the federation starts from.
    pub fn initial_global(&self) -> Result<ParameterCollection> {
        sample_collection(&self.shapes, self.seed, INITIAL_STREAM, None, 0.1)
    }

    /// The trainer of the participants.
    pub fn trainer(&self, learning_rate: f64, local_epochs: usize) -> SyntheticTrainer {
        SyntheticTrainer {
            task: self.clone(),
            learning_rate,
            local_epochs,
        }
    }

    /// The held-out evaluator.
    pub fn evaluator(&self) -> SyntheticEvaluator {
        SyntheticEvaluator {
            center: self.center.clone(),
            sharpness: 1.0 / (self.spread * self.spread),
        }
    }

    /// The optimum of a participant.
    pub fn optimum(&self, participant: usize) -> Result<ParameterCollection> {
        // Participants are spread between half and one and a half times the
        // base spread, so that their accuracies differ.
        let factor = 0.5 + (participant % 11) as f64 / 10.0;
        sample_collection(
            &self.shapes,
            self.seed,
            participant as u64 + 2,
            Some(&self.center),
            self.spread * factor,
        )
    }
}

/// Gradient steps on the squared distance to the participant optimum.
#[derive(Debug, Clone)]
pub struct SyntheticTrainer {
    task: SyntheticTask,
    learning_rate: f64,
    local_epochs: usize,
}

impl LocalTrainer for SyntheticTrainer {
    fn train(&self, participant: usize, global: &ParameterCollection) -> Result<TrainedUpdate> {
        self.task.shapes.check(global)?;
        let optimum = self.task.optimum(participant)?;

        // Each step moves `learning_rate` of the way to the optimum.
        let remaining = (1.0 - self.learning_rate).powi(self.local_epochs as i32);
        let mut collection = ParameterCollection::new();
        for (name, opt) in optimum.iter() {
            let start = &global[name];
            let trained = opt + &((start - opt) * remaining);
            collection.insert(name.clone(), trained);
        }
        let loss = 0.5 * mean_squared_distance(&collection, &optimum);
        Ok(TrainedUpdate { collection, loss })
    }
}

/// Accuracy decreasing with the distance to the task center.
#[derive(Debug, Clone)]
pub struct SyntheticEvaluator {
    center: Arc<ParameterCollection>,
    sharpness: f64,
}

impl Evaluator for SyntheticEvaluator {
    fn evaluate(&self, collection: &ParameterCollection) -> Result<Evaluation> {
        ShapeTable::from_collection(&self.center).check(collection)?;
        let loss = mean_squared_distance(collection, &self.center);
        Ok(Evaluation {
            accuracy: 100.0 / (1.0 + self.sharpness * loss),
            loss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DatasetKind, Evaluation, Evaluator, LocalTrainer, ModelKind, SyntheticTask,
    };
    use crate::collection::ShapeTable;
    use crate::Error;
    use std::error::Error as StdError;

    #[test]
    fn shapes() {
        let mlp = ModelKind::Mlp.parameter_shapes(DatasetKind::Mnist);
        assert_eq!(mlp.get("layer_input.weight"), Some(&[64usize, 784][..]));
        assert_eq!(mlp.get("layer_input.bias"), Some(&[64usize][..]));
        assert_eq!(mlp.get("layer_hidden.weight"), Some(&[10usize, 64][..]));
        assert_eq!(mlp.get("layer_hidden.bias"), Some(&[10usize][..]));
        assert_eq!(mlp.len(), 4);

        let mlp = ModelKind::Mlp.parameter_shapes(DatasetKind::Cifar);
        assert_eq!(mlp.element_count("layer_input.weight"), Some(64 * 3072));

        let cnn = ModelKind::Cnn.parameter_shapes(DatasetKind::Mnist);
        assert_eq!(cnn.get("conv2.weight"), Some(&[20usize, 10, 5, 5][..]));
        assert_eq!(cnn.get("fc1.weight"), Some(&[50usize, 320][..]));
        assert_eq!(cnn.len(), 8);

        let cnn = ModelKind::Cnn.parameter_shapes(DatasetKind::Cifar);
        assert_eq!(cnn.get("fc3.weight"), Some(&[10usize, 84][..]));
        assert_eq!(cnn.get("fc2.bias"), Some(&[84usize][..]));
        assert_eq!(cnn.len(), 10);
    }

    #[test]
    fn names() -> Result<(), Box<dyn StdError>> {
        assert_eq!("cifar".parse::<DatasetKind>()?, DatasetKind::Cifar);
        assert_eq!(DatasetKind::Mnist.to_string(), "mnist");
        assert_eq!("cnn".parse::<ModelKind>()?, ModelKind::Cnn);
        assert_eq!(ModelKind::Mlp.to_string(), "mlp");
        assert!(matches!(
            "resnet".parse::<ModelKind>(),
            Err(Error::InvalidConfiguration(_))
        ));
        Ok(())
    }

    fn task() -> Result<SyntheticTask, Box<dyn StdError>> {
        let shapes = ShapeTable::from_shapes([
            ("a.weight".to_string(), vec![3, 4]),
            ("a.bias".to_string(), vec![3]),
        ]);
        Ok(SyntheticTask::with_shapes(shapes, 7)?)
    }

    #[test]
    fn deterministic() -> Result<(), Box<dyn StdError>> {
        let task = task()?;
        let global = task.initial_global()?;
        assert_eq!(ShapeTable::from_collection(&global), *task.shapes());
        assert_eq!(global, task.initial_global()?);

        let trainer = task.trainer(0.1, 5);
        let u1 = trainer.train(3, &global)?;
        let u2 = trainer.train(3, &global)?;
        assert_eq!(u1, u2);
        assert_ne!(u1.collection, trainer.train(4, &global)?.collection);
        assert!(u1.loss >= 0.0);
        Ok(())
    }

    #[test]
    fn training_improves_accuracy() -> Result<(), Box<dyn StdError>> {
        let task = task()?;
        let global = task.initial_global()?;
        let evaluator = task.evaluator();
        let before = evaluator.evaluate(&global)?;
        before.check()?;

        let trained = task.trainer(0.5, 10).train(0, &global)?;
        let after = evaluator.evaluate(&trained.collection)?;
        after.check()?;
        assert!(after.accuracy > before.accuracy);
        assert!(after.loss < before.loss);
        Ok(())
    }

    #[test]
    fn shape_mismatch() -> Result<(), Box<dyn StdError>> {
        let task = task()?;
        let mut global = task.initial_global()?;
        global.remove("a.bias");
        assert!(matches!(
            task.trainer(0.1, 1).train(0, &global),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            task.evaluator().evaluate(&global),
            Err(Error::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn evaluation_check() {
        assert!(Evaluation {
            accuracy: 101.0,
            loss: 0.0
        }
        .check()
        .is_err());
        assert!(Evaluation {
            accuracy: 50.0,
            loss: f64::NAN
        }
        .check()
        .is_err());
    }
}
