//! Model parameter snapshots.
//!
//! A [`ParamSnapshot`] is the trainable state of one model: an ordered list
//! of tensors. Snapshots taken from models built by the same factory are
//! structurally homogeneous and can be averaged element-wise.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{MplcError, Result};

/// Ordered collection of parameter tensors for one model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    tensors: Vec<ArrayD<f32>>,
}

impl ParamSnapshot {
    /// Wrap a list of tensors.
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Self { tensors }
    }

    /// Snapshot whose tensors have the given shapes and are all filled with `value`.
    pub fn filled(shapes: &[Vec<usize>], value: f32) -> Self {
        Self {
            tensors: shapes
                .iter()
                .map(|shape| ArrayD::from_elem(IxDyn(shape), value))
                .collect(),
        }
    }

    /// Borrow the tensors.
    pub fn tensors(&self) -> &[ArrayD<f32>] {
        &self.tensors
    }

    /// Mutably borrow the tensors.
    pub fn tensors_mut(&mut self) -> &mut [ArrayD<f32>] {
        &mut self.tensors
    }

    /// Consume the snapshot and return its tensors.
    pub fn into_tensors(self) -> Vec<ArrayD<f32>> {
        self.tensors
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the snapshot holds no tensors.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.tensors.iter().map(|t| t.len()).sum()
    }

    /// Shape of every tensor, in order.
    pub fn shapes(&self) -> Vec<Vec<usize>> {
        self.tensors.iter().map(|t| t.shape().to_vec()).collect()
    }

    /// Check that `other` has the same number of tensors with the same shapes.
    pub fn check_compatible(&self, other: &ParamSnapshot) -> Result<()> {
        if self.len() != other.len() {
            return Err(MplcError::CountMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        for (index, (a, b)) in self.tensors.iter().zip(other.tensors.iter()).enumerate() {
            if a.shape() != b.shape() {
                return Err(MplcError::ShapeMismatch {
                    index,
                    expected: a.shape().to_vec(),
                    actual: b.shape().to_vec(),
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<ArrayD<f32>>> for ParamSnapshot {
    fn from(tensors: Vec<ArrayD<f32>>) -> Self {
        Self::new(tensors)
    }
}
