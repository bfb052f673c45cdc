//! Flattening of parameter collections into per-parameter sequences, and
//! their restoration.

use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;

use crate::collection::{ParameterCollection, ShapeTable};
use crate::{Error, Result};

/// Flatten every parameter of the collection independently, in row-major
/// order, and record the shapes.
///
/// The parameters are returned in lexicographic order of their names.
pub fn flatten(collection: &ParameterCollection) -> (Vec<(String, Vec<f64>)>, ShapeTable) {
    let flat = collection
        .iter()
        .map(|(name, tensor)| (name.clone(), tensor.iter().copied().collect()))
        .collect();
    (flat, ShapeTable::from_collection(collection))
}

/// Restore a collection from the flat values of each parameter.
///
/// Fails with [`Error::ShapeMismatch`] when the number of values of a
/// parameter differs from the size of its recorded shape, or when a name is
/// known to only one of `flat` and `shapes`.
pub fn restore(flat: BTreeMap<String, Vec<f64>>, shapes: &ShapeTable) -> Result<ParameterCollection> {
    if let Some((name, values)) = flat.iter().find(|(name, _)| shapes.get(name).is_none()) {
        return Err(Error::ShapeMismatch {
            name: name.clone(),
            expected: 0,
            found: values.len(),
        });
    }

    let mut flat = flat;
    let mut collection = ParameterCollection::new();
    for (name, shape) in shapes.iter() {
        let expected = shape.iter().product::<usize>();
        let values = flat.remove(name).ok_or_else(|| Error::ShapeMismatch {
            name: name.clone(),
            expected,
            found: 0,
        })?;
        if values.len() != expected {
            return Err(Error::ShapeMismatch {
                name: name.clone(),
                expected,
                found: values.len(),
            });
        }
        let found = values.len();
        let tensor = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| {
            Error::ShapeMismatch {
                name: name.clone(),
                expected,
                found,
            }
        })?;
        collection.insert(name.clone(), tensor);
    }
    Ok(collection)
}
