//! Labelled data slices held by partners and scenarios.

use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{MplcError, Result};

/// A sequence of `(input, label)` pairs stored row-wise.
///
/// `features` is `(n, d)`; `labels` is `(n, k)` one-hot encoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSlice {
    /// Input rows
    pub features: Array2<f32>,
    /// One-hot label rows, aligned with `features`
    pub labels: Array2<f32>,
}

impl DataSlice {
    /// Build a slice, checking that features and labels have the same number of rows.
    pub fn new(features: Array2<f32>, labels: Array2<f32>) -> Result<Self> {
        if features.nrows() != labels.nrows() {
            return Err(MplcError::CountMismatch {
                expected: features.nrows(),
                actual: labels.nrows(),
            });
        }
        Ok(Self { features, labels })
    }

    /// Build a slice from integer class labels, one-hot encoding them over `class_count` classes.
    pub fn from_class_labels(
        features: Array2<f32>,
        classes: &[usize],
        class_count: usize,
    ) -> Result<Self> {
        let mut labels = Array2::zeros((classes.len(), class_count));
        for (row, &class) in classes.iter().enumerate() {
            if class >= class_count {
                return Err(MplcError::Configuration(format!(
                    "class label {} out of range for {} classes",
                    class, class_count
                )));
            }
            labels[[row, class]] = 1.0;
        }
        Self::new(features, labels)
    }

    /// Empty slice with the given feature and label widths.
    pub fn empty(feature_dim: usize, class_count: usize) -> Self {
        Self {
            features: Array2::zeros((0, feature_dim)),
            labels: Array2::zeros((0, class_count)),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    /// Whether the slice holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature width.
    pub fn feature_dim(&self) -> usize {
        self.features.ncols()
    }

    /// Number of label classes.
    pub fn class_count(&self) -> usize {
        self.labels.ncols()
    }

    /// Copy of the rows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Stack several slices row-wise.
    pub fn concat<'a>(slices: impl IntoIterator<Item = &'a DataSlice>) -> Result<Self> {
        let slices: Vec<&DataSlice> = slices.into_iter().collect();
        if slices.is_empty() {
            return Err(MplcError::EmptyInput);
        }
        let features: Vec<_> = slices.iter().map(|s| s.features.view()).collect();
        let labels: Vec<_> = slices.iter().map(|s| s.labels.view()).collect();
        Ok(Self {
            features: concatenate(Axis(0), &features)?,
            labels: concatenate(Axis(0), &labels)?,
        })
    }

    /// Iterate over consecutive mini-batches of at most `batch_size` rows.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = DataSlice> + '_ {
        let batch_size = batch_size.max(1);
        let n = self.len();
        (0..n).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(n);
            DataSlice {
                features: self.features.slice(ndarray::s![start..end, ..]).to_owned(),
                labels: self.labels.slice(ndarray::s![start..end, ..]).to_owned(),
            }
        })
    }
}
