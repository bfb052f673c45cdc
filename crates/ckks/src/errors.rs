use thiserror::Error;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Indicates that an error from the underlying mathematical library was
    /// encountered.
    #[error("{0}")]
    MathError(#[from] ckks_math::Error),

    /// Indicates a serialization error.
    #[error("Serialization error")]
    SerializationError,

    /// Indicates that too many values were provided.
    #[error("Too many values provided: {0} exceeds limit {1}")]
    TooManyValues(usize, usize),

    /// Indicates that too few values were provided.
    #[error("Too few values provided: {0} is below limit {1}")]
    TooFewValues(usize, usize),

    /// Indicates that an input is invalid.
    #[error("{0}")]
    UnspecifiedInput(String),

    /// Indicates that the objects were created under different parameters.
    #[error("Incompatible parameters: {0}")]
    IncompatibleParameters(String),

    /// Indicates that a value cannot be encoded at the requested scale.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Indicates that no rotation key exists for the requested step.
    #[error("No rotation key for a rotation by {0}")]
    MissingRotationKey(usize),

    /// Indicates an error in the parameters.
    #[error("{0}")]
    ParametersError(#[from] ParametersError),

    /// Indicates a default error
    #[error("{0}")]
    DefaultError(String),
}

/// Separate enum to indicate parameters-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParametersError {
    /// Indicates that the degree is invalid.
    #[error("Invalid degree: {0} is not a power of 2 larger than 8")]
    InvalidDegree(usize),

    /// Indicates that the moduli sizes are invalid.
    #[error("Invalid modulus size: {0}, expected an integer between {1} and {2}")]
    InvalidModulusSize(usize, usize, usize),

    /// Indicates that there exists not enough primes of this size.
    #[error("Not enough primes of size {0} for polynomials of degree {1}")]
    NotEnoughPrimes(usize, usize),

    /// Indicates that the scale is invalid.
    #[error("Invalid scale: {0}")]
    InvalidScale(String),

    /// Indicates that the variance is invalid.
    #[error("Invalid variance: {0} is not between 1 and 16")]
    InvalidVariance(usize),

    /// Indicates that too many parameters were specified.
    #[error("{0}")]
    TooManySpecified(String),

    /// Indicates that too few parameters were specified.
    #[error("{0}")]
    TooFewSpecified(String),
}
