//! Error types for mplc

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MplcError>;

/// All possible errors in mplc
#[derive(Error, Debug)]
pub enum MplcError {
    /// No snapshots were provided for aggregation
    #[error("Empty input provided for aggregation")]
    EmptyInput,

    /// Snapshots have inconsistent tensor shapes
    #[error("Shape mismatch at tensor {index}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Position of the offending tensor inside the snapshot
        index: usize,
        /// Shape of the first snapshot's tensor
        expected: Vec<usize>,
        /// Shape found in the other snapshot
        actual: Vec<usize>,
    },

    /// Snapshot and weight counts differ, or snapshots hold a different number of tensors
    #[error("Count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Expected number of items
        expected: usize,
        /// Actual number of items
        actual: usize,
    },

    /// Invalid hyperparameter or inconsistent scenario setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Contributivity method name is not registered
    #[error("Unknown contributivity method '{0}'")]
    UnknownMethod(String),

    /// Aggregation weighting name is not registered
    #[error("Unknown aggregation weighting '{0}'. Use 'uniform', 'data-volume' or 'local-score'")]
    UnknownWeighting(String),

    /// Multi-partner learning approach name is not registered
    #[error("Unknown multi-partner learning approach '{0}'. Use 'fedavg', 'seq-pure', 'seq-with-final-agg' or 'seqavg'")]
    UnknownApproach(String),

    /// Not enough partners for the requested computation
    #[error("Insufficient partners: need {needed}, got {actual}")]
    InsufficientPartners {
        /// Minimum required partners
        needed: usize,
        /// Actual partners provided
        actual: usize,
    },

    /// The trainable model failed to train or evaluate
    #[error("Compute failure ({context}): {reason}")]
    ComputeFailure {
        /// Where the failure happened (partner, epoch, coalition)
        context: String,
        /// Underlying cause
        reason: String,
    },

    /// Array shape error raised by ndarray
    #[error("Array shape error: {0}")]
    ShapeError(String),

    /// (De)serialization of a config or report failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MplcError {
    /// Build a [`MplcError::ComputeFailure`] from a context label and any displayable cause.
    pub fn compute(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        MplcError::ComputeFailure {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Prefix the context of a [`MplcError::ComputeFailure`]; other variants pass through.
    pub fn within(self, outer: impl std::fmt::Display) -> Self {
        match self {
            MplcError::ComputeFailure { context, reason } => MplcError::ComputeFailure {
                context: format!("{}, {}", outer, context),
                reason,
            },
            other => other,
        }
    }
}

impl From<ndarray::ShapeError> for MplcError {
    fn from(e: ndarray::ShapeError) -> Self {
        MplcError::ShapeError(e.to_string())
    }
}

impl From<serde_json::Error> for MplcError {
    fn from(e: serde_json::Error) -> Self {
        MplcError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_failure_context_nesting() {
        let err = MplcError::compute("partner 2", "NaN loss").within("epoch 3");
        match err {
            MplcError::ComputeFailure { context, reason } => {
                assert_eq!(context, "epoch 3, partner 2");
                assert_eq!(reason, "NaN loss");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_within_leaves_other_variants() {
        let err = MplcError::EmptyInput.within("epoch 1");
        assert!(matches!(err, MplcError::EmptyInput));
    }

    #[test]
    fn test_display_includes_shapes() {
        let err = MplcError::ShapeMismatch {
            index: 1,
            expected: vec![2, 3],
            actual: vec![3, 2],
        };
        let text = err.to_string();
        assert!(text.contains("tensor 1"));
        assert!(text.contains("[2, 3]"));
    }
}
