#![crate_name = "qfed"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Fair federated aggregation over CKKS-encrypted model updates.
//!
//! At every round, the coordinator samples participants, each of which trains
//! the current global model on its own data and sends its parameters
//! encrypted under the public key of the run, split into ciphertexts of at
//! most `degree / 2` values. The coordinator decrypts the updates and averages
//! them with q-FedAvg weights, which give more weight to the participants the
//! global model fits worst. The dispersion of the participant accuracies is
//! recorded at every round.
//!
//! The coordinator holds the secret key and decrypts every update before
//! aggregating. The encryption protects the updates in transit and at rest,
//! not against the coordinator itself.

mod errors;
mod proto;

pub mod chunked;
pub mod collaborators;
pub mod collection;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod metrics;
pub mod persistence;
pub mod round;
pub mod tensor_codec;
pub mod weighting;

pub use chunked::{ChunkedCipherCodec, CipherChunk, EncryptedParameterCollection};
pub use collaborators::{
    DatasetKind, Evaluation, Evaluator, LocalTrainer, ModelKind, SyntheticTask, TrainedUpdate,
};
pub use collection::{ParameterCollection, ShapeTable};
pub use config::{CryptoConfig, FederationConfig};
pub use context::CryptoContext;
pub use coordinator::{Coordinator, RunSummary};
pub use errors::{Error, Result};
pub use metrics::{FairnessHistory, RoundFairnessRecord};
pub use persistence::{checkpoint_name, JsonModelStore, ModelStore};
pub use round::{AggregationRound, ParticipantContribution, Phase, RoundOutcome};
pub use weighting::FairnessWeighter;
