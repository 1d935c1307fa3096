//! Quickstart: federated training over three partners, then Shapley contributivity

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mplc::{
    ContributivityConfig, ContributivityMethod, DataSlice, MplConfig, Partner, Scenario,
    SoftmaxRegression,
};

/// Two classes around (-1, -1) and (1, 1); `flip` is the share of wrong labels.
fn blobs(n: usize, flip: f64, rng: &mut StdRng) -> DataSlice {
    let mut features = Array2::zeros((n, 2));
    let mut classes = Vec::with_capacity(n);
    for i in 0..n {
        let class = rng.gen_range(0..2usize);
        let center = if class == 0 { -1.0 } else { 1.0 };
        features[[i, 0]] = center + rng.gen_range(-0.8f32..0.8);
        features[[i, 1]] = center + rng.gen_range(-0.8f32..0.8);
        let label = if rng.gen_bool(flip) { 1 - class } else { class };
        classes.push(label);
    }
    DataSlice::from_class_labels(features, &classes, 2).expect("labels are in range")
}

fn main() {
    env_logger::init();
    println!("mplc quickstart\n");

    let mut rng = StdRng::seed_from_u64(7);

    // partner 2 holds mostly mislabelled data
    let partners = vec![
        Partner::new(0, blobs(400, 0.0, &mut rng), blobs(50, 0.0, &mut rng)),
        Partner::new(1, blobs(200, 0.05, &mut rng), blobs(50, 0.05, &mut rng)),
        Partner::new(2, blobs(200, 0.6, &mut rng), blobs(50, 0.6, &mut rng)),
    ];
    let val = blobs(200, 0.0, &mut rng);
    let test = blobs(400, 0.0, &mut rng);

    let scenario = Scenario::new(partners, val, test)
        .and_then(|s| s.with_mpl_config(MplConfig::default().with_epoch_count(10)))
        .and_then(|s| {
            s.with_contributivity_config(ContributivityConfig::default().with_methods([
                ContributivityMethod::ShapleyValues,
                ContributivityMethod::IndependentRaw,
            ]))
        })
        .map(|s| s.with_id("quickstart"))
        .expect("valid scenario");

    let model = SoftmaxRegression::new(2, 2);
    let report = scenario.run(&model).expect("scenario run");

    println!(
        "Federated model: test accuracy {:.3} after {} epoch(s)\n",
        report.mpl_test_score, report.nb_epochs_done
    );
    for result in &report.contributivity {
        println!("{}\n", result);
    }
    println!("Partner 2 (mislabelled data) should receive the lowest Shapley value.");
}
