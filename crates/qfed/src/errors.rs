use std::path::PathBuf;
use thiserror::Error;

use crate::round::Phase;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The values of a parameter do not fit its recorded shape, or a
    /// parameter is only known on one side.
    #[error("Shape mismatch for `{name}`: expected {expected} elements, found {found}")]
    ShapeMismatch {
        /// The parameter name.
        name: String,
        /// Number of elements of the recorded shape.
        expected: usize,
        /// Number of elements found.
        found: usize,
    },

    /// A chunk does not fit the cryptographic context it is used with.
    #[error("Cryptographic context mismatch: {0}")]
    CryptoContextMismatch(String),

    /// Two parameter collections do not have the same parameter names.
    #[error("Parameter set mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    ParameterSetMismatch {
        /// Names of the reference collection absent from the other one.
        missing: Vec<String>,
        /// Names absent from the reference collection.
        unexpected: Vec<String>,
    },

    /// No participant contributed to the round.
    #[error("No contribution to aggregate")]
    EmptyContributionSet,

    /// Some sampled participants have not contributed yet.
    #[error("Missing contributions from participants {missing:?}")]
    MissingContributions {
        /// The sampled participants without a contribution.
        missing: Vec<usize>,
    },

    /// The fairness weights cannot be normalized.
    #[error("The total weight of the contributions is zero")]
    ZeroTotalWeight,

    /// A statistic was requested over an empty input.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Indicates an invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The round cannot move from one phase to the other.
    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidPhase {
        /// The current phase.
        from: Phase,
        /// The requested phase.
        to: Phase,
    },

    /// The training or evaluation collaborator failed.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    /// Indicates an error from the encryption scheme.
    #[error("Scheme error: {0}")]
    Scheme(#[from] ckks::Error),

    /// The model weights could not be stored or loaded.
    #[error("Persistence error: {message} (path: {path:?})")]
    Persistence {
        /// Human-readable description.
        message: String,
        /// The path involved.
        path: PathBuf,
    },

    /// An error raised inside a round.
    #[error("Round {round}{}: {source}", .participant.map(|p| format!(", participant {p}")).unwrap_or_default())]
    Round {
        /// The round index.
        round: usize,
        /// The participant index, when known.
        participant: Option<usize>,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the round index to an error.
    pub fn in_round(self, round: usize) -> Self {
        match self {
            Error::Round {
                participant,
                source,
                ..
            } => Error::Round {
                round,
                participant,
                source,
            },
            e => Error::Round {
                round,
                participant: None,
                source: Box::new(e),
            },
        }
    }

    /// Attach the round and participant indices to an error.
    pub fn in_participant(self, round: usize, participant: usize) -> Self {
        match self {
            Error::Round { source, .. } => Error::Round {
                round,
                participant: Some(participant),
                source,
            },
            e => Error::Round {
                round,
                participant: Some(participant),
                source: Box::new(e),
            },
        }
    }

    /// The error without its round context.
    pub fn root(&self) -> &Error {
        match self {
            Error::Round { source, .. } => source.root(),
            e => e,
        }
    }
}
