//! Integration tests for mplc aggregation

use ndarray::{array, ArrayD, IxDyn};
use mplc::aggregators::{AggregationWeighting, Aggregator};
use mplc::error::MplcError;
use mplc::{fedavg, weighted_average, ParamSnapshot};

fn constant(shapes: &[Vec<usize>], value: f32) -> ParamSnapshot {
    ParamSnapshot::filled(shapes, value)
}

fn assert_all_close(snapshot: &ParamSnapshot, expected: f32) {
    for tensor in snapshot.tensors() {
        for &v in tensor.iter() {
            assert!(
                (v - expected).abs() < 1e-5,
                "expected {} everywhere, found {}",
                expected,
                v
            );
        }
    }
}

#[test]
fn test_weighted_average_of_constants() {
    let shapes = vec![vec![4], vec![2, 3], vec![2, 2, 2]];
    let snapshots = vec![
        constant(&shapes, 1.0),
        constant(&shapes, 5.0),
        constant(&shapes, -2.0),
    ];
    let weights = [0.5, 0.25, 0.25];

    let result = weighted_average(&snapshots, &weights).unwrap();

    assert_eq!(result.shapes(), shapes);
    assert_all_close(&result, 0.5 * 1.0 + 0.25 * 5.0 + 0.25 * -2.0);
}

#[test]
fn test_unnormalized_weights_are_normalized() {
    let snapshots = vec![constant(&[vec![3]], 2.0), constant(&[vec![3]], 4.0)];

    let result = weighted_average(&snapshots, &[3.0, 1.0]).unwrap();

    assert_all_close(&result, 2.5);
}

#[test]
fn test_inputs_are_not_mutated() {
    let snapshots = vec![
        ParamSnapshot::new(vec![array![1.0f32, 2.0].into_dyn()]),
        ParamSnapshot::new(vec![array![3.0f32, 4.0].into_dyn()]),
    ];
    let before = snapshots.clone();

    let result = fedavg(&snapshots).unwrap();

    assert_eq!(snapshots, before);
    assert_eq!(result.tensors()[0], array![2.0f32, 3.0].into_dyn());
}

#[test]
fn test_data_volume_scenario() {
    // 3 partners with [100, 200, 300] samples, values [1, 2, 3]
    let shapes = vec![vec![2, 2]];
    let snapshots = vec![
        constant(&shapes, 1.0),
        constant(&shapes, 2.0),
        constant(&shapes, 3.0),
    ];
    let aggregator = Aggregator::new(AggregationWeighting::DataVolume);

    let result = aggregator.aggregate(&snapshots, &[100, 200, 300], &[]).unwrap();

    assert_all_close(&result, 7.0 / 3.0);
}

#[test]
fn test_equal_volumes_match_uniform() {
    let snapshots: Vec<ParamSnapshot> = (0..4)
        .map(|i| {
            ParamSnapshot::new(vec![ArrayD::from_shape_fn(IxDyn(&[3, 5]), |idx| {
                (i as f32 + 1.0) * (idx[0] * 5 + idx[1]) as f32
            })])
        })
        .collect();
    let volumes = [250; 4];

    let by_volume = Aggregator::new(AggregationWeighting::DataVolume)
        .aggregate(&snapshots, &volumes, &[])
        .unwrap();
    let uniform = Aggregator::new(AggregationWeighting::Uniform)
        .aggregate(&snapshots, &volumes, &[])
        .unwrap();

    for (a, b) in by_volume.tensors()[0].iter().zip(uniform.tensors()[0].iter()) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn test_local_score_weighting() {
    let snapshots = vec![constant(&[vec![1]], 0.0), constant(&[vec![1]], 1.0)];
    let aggregator = Aggregator::new(AggregationWeighting::LocalScore);

    let result = aggregator.aggregate(&snapshots, &[10, 10], &[0.2, 0.6]).unwrap();
    assert_all_close(&result, 0.75);

    // all-zero scores fall back to uniform
    let result = aggregator.aggregate(&snapshots, &[10, 10], &[0.0, 0.0]).unwrap();
    assert_all_close(&result, 0.5);
}

#[test]
fn test_empty_input() {
    let result = weighted_average(&[], &[]);
    assert!(matches!(result, Err(MplcError::EmptyInput)));
}

#[test]
fn test_shape_mismatch() {
    let snapshots = vec![constant(&[vec![2, 3]], 1.0), constant(&[vec![3, 2]], 1.0)];

    let result = fedavg(&snapshots);

    assert!(matches!(result, Err(MplcError::ShapeMismatch { index: 0, .. })));
}

#[test]
fn test_weight_count_mismatch() {
    let snapshots = vec![constant(&[vec![1]], 1.0), constant(&[vec![1]], 2.0)];

    let result = weighted_average(&snapshots, &[1.0]);

    assert!(matches!(
        result,
        Err(MplcError::CountMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_negative_weight_rejected() {
    let snapshots = vec![constant(&[vec![1]], 1.0), constant(&[vec![1]], 2.0)];

    let result = weighted_average(&snapshots, &[1.5, -0.5]);

    assert!(matches!(result, Err(MplcError::Configuration(_))));
}

#[test]
fn test_weighting_names() {
    assert_eq!(
        "data-volume".parse::<AggregationWeighting>().unwrap(),
        AggregationWeighting::DataVolume
    );
    assert!(matches!(
        "krum".parse::<AggregationWeighting>(),
        Err(MplcError::UnknownWeighting(_))
    ));
}
