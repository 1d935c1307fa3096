//! # mplc: Multi-Partner Learning and Contributivity
//!
//! Simulates a federated collaboration between data-holding partners: a
//! shared model is trained through repeated local-pass / aggregate cycles,
//! and each partner's share of the final model's accuracy is estimated with
//! Shapley-value style methods.
//!
//! ## Building blocks
//!
//! - [`Partner`] - a data holder with local train/validation/test slices
//! - [`TrainableModel`] - the opaque model the engine drives
//! - [`weighted_average()`] / [`Aggregator`] - parameter aggregation
//! - [`MultiPartnerLearning`] - the training engine, returning a [`TrainingHistory`]
//! - [`ContributivityEstimator`] - exact and sampled Shapley values, independent
//!   scores and leave-one-out over any [`CharacteristicFunction`]
//! - [`Scenario`] - runs both and produces a [`ScenarioReport`]
//!
//! ## Example
//!
//! ```rust
//! use mplc::contributivity::FnCharacteristic;
//! use mplc::{Coalition, ContributivityConfig, ContributivityEstimator, ContributivityMethod};
//!
//! // three partners whose value simply adds up
//! let game = FnCharacteristic::new(vec![0, 1, 2], |c: &Coalition| {
//!     Ok(c.members().iter().map(|&id| 0.1 * (id + 1) as f64).sum())
//! });
//! let estimator = ContributivityEstimator::new(&game, ContributivityConfig::default()).unwrap();
//! let result = estimator.compute(ContributivityMethod::ShapleyValues).unwrap();
//! assert!((result.scores[2] - 0.3).abs() < 1e-9);
//! ```

#![deny(missing_docs)]

pub mod aggregators;
pub mod contributivity;
pub mod dataset;
pub mod error;
pub mod math;
pub mod model;
pub mod mpl;
pub mod partner;
pub mod scenario;
pub mod snapshot;

// Re-exports
pub use aggregators::{fedavg, weighted_average, AggregationWeighting, Aggregator};
pub use contributivity::{
    CharacteristicFunction, Coalition, ContributivityConfig, ContributivityEstimator,
    ContributivityMethod, ContributivityResult, MplCharacteristic,
};
pub use dataset::DataSlice;
pub use error::{MplcError, Result};
pub use model::{Metrics, PassMetrics, SoftmaxRegression, TrainableModel};
pub use mpl::{MplApproach, MplConfig, MultiPartnerLearning, TrainingHistory};
pub use partner::{compute_batch_sizes, Partner, PartnerId};
pub use scenario::{Scenario, ScenarioReport};
pub use snapshot::ParamSnapshot;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
