//! Named parameter collections and their shapes.

use ndarray::ArrayD;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// A model: parameter names mapped to dense tensors.
///
/// Iteration is in lexicographic order of the names.
pub type ParameterCollection = BTreeMap<String, ArrayD<f64>>;

/// Shapes of the parameters of a collection, captured once per round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShapeTable {
    shapes: BTreeMap<String, Vec<usize>>,
}

impl ShapeTable {
    /// Record the shapes of a collection.
    pub fn from_collection(collection: &ParameterCollection) -> Self {
        Self {
            shapes: collection
                .iter()
                .map(|(name, tensor)| (name.clone(), tensor.shape().to_vec()))
                .collect(),
        }
    }

    /// A table from explicit names and shapes.
    pub fn from_shapes<I: IntoIterator<Item = (String, Vec<usize>)>>(shapes: I) -> Self {
        Self {
            shapes: shapes.into_iter().collect(),
        }
    }

    /// The shape recorded for a parameter.
    pub fn get(&self, name: &str) -> Option<&[usize]> {
        self.shapes.get(name).map(Vec::as_slice)
    }

    /// Number of elements of a parameter.
    pub fn element_count(&self, name: &str) -> Option<usize> {
        self.get(name).map(|shape| shape.iter().product())
    }

    /// Iterate over the names and shapes, in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<usize>)> {
        self.shapes.iter()
    }

    /// Iterate over the names, in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.shapes.keys()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether the table records no parameter.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Fails with [`Error::ShapeMismatch`] unless `collection` has exactly
    /// the recorded names and shapes.
    pub fn check(&self, collection: &ParameterCollection) -> Result<()> {
        for (name, shape) in self.shapes.iter() {
            let expected = shape.iter().product();
            match collection.get(name) {
                Some(tensor) if tensor.shape() == shape.as_slice() => {}
                Some(tensor) => {
                    return Err(Error::ShapeMismatch {
                        name: name.clone(),
                        expected,
                        found: tensor.len(),
                    })
                }
                None => {
                    return Err(Error::ShapeMismatch {
                        name: name.clone(),
                        expected,
                        found: 0,
                    })
                }
            }
        }
        if let Some((name, tensor)) = collection
            .iter()
            .find(|(name, _)| !self.shapes.contains_key(*name))
        {
            return Err(Error::ShapeMismatch {
                name: name.clone(),
                expected: 0,
                found: tensor.len(),
            });
        }
        Ok(())
    }
}

/// Fails with [`Error::ParameterSetMismatch`] unless both collections have
/// the same parameter names.
pub fn check_same_names(reference: &ParameterCollection, other: &ParameterCollection) -> Result<()> {
    let missing = reference
        .keys()
        .filter(|name| !other.contains_key(*name))
        .cloned()
        .collect::<Vec<_>>();
    let unexpected = other
        .keys()
        .filter(|name| !reference.contains_key(*name))
        .cloned()
        .collect::<Vec<_>>();
    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(Error::ParameterSetMismatch {
            missing,
            unexpected,
        })
    }
}
