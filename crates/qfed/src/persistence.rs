//! Storage of the final global model.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::collaborators::{DatasetKind, ModelKind};
use crate::collection::ParameterCollection;
use crate::{Error, Result};

/// File name of the stored weights inside a checkpoint directory.
pub const WEIGHTS_FILE_NAME: &str = "model_weights_final.json";

/// Name of the checkpoint of a run, for example
/// `mnist_mlp_10_q-fedavg_HE_10.0_degree=16384_weights`.
pub fn checkpoint_name(
    dataset: DatasetKind,
    model: ModelKind,
    rounds: usize,
    q: f64,
    degree: usize,
) -> String {
    let q = float_label(q);
    format!("{dataset}_{model}_{rounds}_q-fedavg_HE_{q}_degree={degree}_weights")
}

/// Shortest round-trip rendering of a float, with a signed two-digit
/// exponent in scientific notation (`1e-05`, `2.5e+16`).
fn float_label(value: f64) -> String {
    let repr = format!("{value:?}");
    match repr.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(e) => {
                let sign = if e < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", e.unsigned_abs())
            }
            Err(_) => repr,
        },
        None => repr,
    }
}

/// Saves and loads named models.
pub trait ModelStore {
    /// Save a model under a checkpoint name and return where it was stored.
    fn save(&self, name: &str, collection: &ParameterCollection) -> Result<PathBuf>;

    /// Load the model saved under a checkpoint name.
    fn load(&self, name: &str) -> Result<ParameterCollection>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTensor {
    shape: Vec<usize>,
    values: Vec<f64>,
}

/// Stores each model as JSON in `root/<name>/model_weights_final.json`.
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    root: PathBuf,
}

impl JsonModelStore {
    /// A store rooted at a directory, created on the first save.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of the weights of a checkpoint.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(WEIGHTS_FILE_NAME)
    }
}

fn persistence_error(e: impl ToString, path: &Path) -> Error {
    Error::Persistence {
        message: e.to_string(),
        path: path.to_path_buf(),
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, name: &str, collection: &ParameterCollection) -> Result<PathBuf> {
        let path = self.path(name);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| persistence_error(e, dir))?;
        }

        let stored = collection
            .iter()
            .map(|(name, tensor)| {
                (
                    name.clone(),
                    StoredTensor {
                        shape: tensor.shape().to_vec(),
                        values: tensor.iter().copied().collect(),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        let json = serde_json::to_string(&stored).map_err(|e| persistence_error(e, &path))?;
        std::fs::write(&path, json).map_err(|e| persistence_error(e, &path))?;

        info!(path = %path.display(), "saved model weights");
        Ok(path)
    }

    fn load(&self, name: &str) -> Result<ParameterCollection> {
        let path = self.path(name);
        let json = std::fs::read_to_string(&path).map_err(|e| persistence_error(e, &path))?;
        let stored: BTreeMap<String, StoredTensor> =
            serde_json::from_str(&json).map_err(|e| persistence_error(e, &path))?;

        stored
            .into_iter()
            .map(|(name, t)| {
                let tensor = ArrayD::from_shape_vec(IxDyn(&t.shape), t.values)
                    .map_err(|e| persistence_error(format!("`{name}`: {e}"), &path))?;
                Ok((name, tensor))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{checkpoint_name, float_label, JsonModelStore, ModelStore, WEIGHTS_FILE_NAME};
    use crate::collaborators::{DatasetKind, ModelKind};
    use crate::collection::ParameterCollection;
    use crate::Error;
    use ndarray::{ArrayD, IxDyn};
    use std::error::Error as StdError;

    #[test]
    fn names() {
        assert_eq!(
            checkpoint_name(DatasetKind::Mnist, ModelKind::Mlp, 10, 10.0, 16384),
            "mnist_mlp_10_q-fedavg_HE_10.0_degree=16384_weights"
        );
        assert_eq!(
            checkpoint_name(DatasetKind::Cifar, ModelKind::Cnn, 50, 0.5, 8192),
            "cifar_cnn_50_q-fedavg_HE_0.5_degree=8192_weights"
        );
        assert_eq!(
            checkpoint_name(DatasetKind::Mnist, ModelKind::Cnn, 5, 1e-5, 4096),
            "mnist_cnn_5_q-fedavg_HE_1e-05_degree=4096_weights"
        );
    }

    #[test]
    fn float_labels() {
        assert_eq!(float_label(0.0), "0.0");
        assert_eq!(float_label(0.0001), "0.0001");
        assert_eq!(float_label(2.5e-7), "2.5e-07");
        assert_eq!(float_label(1e16), "1e+16");
        assert_eq!(float_label(1.25e120), "1.25e+120");
        assert_eq!(float_label(123.0), "123.0");
    }

    #[test]
    fn save_load() -> Result<(), Box<dyn StdError>> {
        let dir = tempfile::tempdir()?;
        let store = JsonModelStore::new(dir.path().join("weights"));

        let mut model = ParameterCollection::new();
        model.insert(
            "fc.weight".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.1, -0.2, 0.3, 1e-12])?,
        );
        model.insert("fc.bias".to_string(), ArrayD::zeros(IxDyn(&[2])));

        let name = checkpoint_name(DatasetKind::Mnist, ModelKind::Cnn, 2, 1.0, 64);
        let path = store.save(&name, &model)?;
        assert!(path.ends_with(format!("{name}/{WEIGHTS_FILE_NAME}")));
        assert_eq!(store.load(&name)?, model);

        assert!(matches!(
            store.load("missing"),
            Err(Error::Persistence { .. })
        ));

        std::fs::write(&path, r#"{"fc.bias": {"shape": [3], "values": [1.0]}}"#)?;
        assert!(matches!(store.load(&name), Err(Error::Persistence { .. })));
        Ok(())
    }
}
