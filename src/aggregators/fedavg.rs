//! Weighted federated averaging of parameter snapshots.
//!
//! Standard federated averaging as described by McMahan et al. (2017):
//! the aggregate is the element-wise weighted mean of the partners'
//! snapshots, tensor by tensor.

use ndarray::ArrayD;
use rayon::prelude::*;

use crate::error::{MplcError, Result};
use crate::snapshot::ParamSnapshot;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weighted element-wise mean of `snapshots`.
///
/// `weights` must be non-negative, one per snapshot. They are normalized
/// internally when they do not sum to 1. Inputs are never mutated.
///
/// # Errors
///
/// * [`MplcError::EmptyInput`] when `snapshots` is empty
/// * [`MplcError::CountMismatch`] when weights and snapshots differ in count
/// * [`MplcError::ShapeMismatch`] when snapshots are not structurally identical
/// * [`MplcError::Configuration`] for negative, non-finite or all-zero weights
pub fn weighted_average(snapshots: &[ParamSnapshot], weights: &[f64]) -> Result<ParamSnapshot> {
    if snapshots.is_empty() {
        return Err(MplcError::EmptyInput);
    }
    if weights.len() != snapshots.len() {
        return Err(MplcError::CountMismatch {
            expected: snapshots.len(),
            actual: weights.len(),
        });
    }

    let first = &snapshots[0];
    for snapshot in &snapshots[1..] {
        first.check_compatible(snapshot)?;
    }

    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(MplcError::Configuration(format!(
            "aggregation weights must be finite and non-negative, got {:?}",
            weights
        )));
    }
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum == 0.0 {
        return Err(MplcError::Configuration(
            "aggregation weights sum to zero".to_string(),
        ));
    }
    if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        log::debug!("normalizing aggregation weights summing to {:.6}", weight_sum);
    }
    let normalized: Vec<f32> = weights.iter().map(|w| (w / weight_sum) as f32).collect();

    let tensors: Vec<ArrayD<f32>> = (0..first.len())
        .into_par_iter()
        .map(|index| {
            let shape = first.tensors()[index].raw_dim();
            snapshots.iter().zip(normalized.iter()).fold(
                ArrayD::<f32>::zeros(shape),
                |mut acc, (snapshot, &weight)| {
                    acc.scaled_add(weight, &snapshot.tensors()[index]);
                    acc
                },
            )
        })
        .collect();

    Ok(ParamSnapshot::new(tensors))
}

/// Unweighted mean of `snapshots`.
pub fn fedavg(snapshots: &[ParamSnapshot]) -> Result<ParamSnapshot> {
    let weights = vec![1.0; snapshots.len()];
    weighted_average(snapshots, &weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn snap(values: &[f32]) -> ParamSnapshot {
        ParamSnapshot::new(vec![ndarray::Array1::from(values.to_vec()).into_dyn()])
    }

    #[test]
    fn test_fedavg_unweighted() {
        let result = fedavg(&[snap(&[1.0, 2.0]), snap(&[3.0, 4.0])]).unwrap();
        let t = &result.tensors()[0];
        assert!((t[[0]] - 2.0).abs() < 1e-6);
        assert!((t[[1]] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_weighted() {
        // (1*1 + 3*3) / 4 = 2.5
        let result = weighted_average(&[snap(&[1.0]), snap(&[3.0])], &[1.0, 3.0]).unwrap();
        assert!((result.tensors()[0][[0]] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_multi_tensor_shapes_preserved() {
        let a = ParamSnapshot::new(vec![
            array![[1.0f32, 1.0], [1.0, 1.0]].into_dyn(),
            array![10.0f32].into_dyn(),
        ]);
        let b = ParamSnapshot::new(vec![
            array![[3.0f32, 3.0], [3.0, 3.0]].into_dyn(),
            array![20.0f32].into_dyn(),
        ]);
        let result = weighted_average(&[a, b], &[0.5, 0.5]).unwrap();
        assert_eq!(result.shapes(), vec![vec![2, 2], vec![1]]);
        assert!(result.tensors()[0].iter().all(|v| (v - 2.0).abs() < 1e-6));
        assert!((result.tensors()[1][[0]] - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let inputs = vec![snap(&[1.0]), snap(&[5.0])];
        let copy = inputs.clone();
        let _ = fedavg(&inputs).unwrap();
        assert_eq!(inputs, copy);
    }

    #[test]
    fn test_empty() {
        assert!(matches!(weighted_average(&[], &[]), Err(MplcError::EmptyInput)));
    }

    #[test]
    fn test_weight_length_mismatch() {
        let result = weighted_average(&[snap(&[1.0]), snap(&[2.0])], &[1.0]);
        assert!(matches!(result, Err(MplcError::CountMismatch { .. })));
    }

    #[test]
    fn test_shape_mismatch() {
        let result = fedavg(&[snap(&[1.0, 2.0]), snap(&[1.0])]);
        assert!(matches!(result, Err(MplcError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zero_and_negative_weights() {
        let inputs = [snap(&[1.0]), snap(&[2.0])];
        assert!(weighted_average(&inputs, &[0.0, 0.0]).is_err());
        assert!(weighted_average(&inputs, &[1.0, -0.5]).is_err());
    }

    #[test]
    fn test_single_snapshot() {
        let result = fedavg(&[snap(&[42.0, 7.0])]).unwrap();
        assert_eq!(result, snap(&[42.0, 7.0]));
    }
}
