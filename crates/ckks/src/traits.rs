//! Traits of the CKKS scheme.

use crate::{CkksParameters, Result};
use std::sync::Arc;

/// Fallible conversion of a value that only makes sense under a set of
/// parameters, such as a deserialized ciphertext.
pub trait TryConvertFrom<T>
where
    Self: Sized,
{
    /// Converts `value` under the parameters `par`.
    fn try_convert_from(value: T, par: &Arc<CkksParameters>) -> Result<Self>;
}
