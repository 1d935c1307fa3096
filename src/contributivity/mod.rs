//! Contributivity estimation.
//!
//! Each partner's share of the final model's performance is estimated from
//! a characteristic function `v(S)`, the test accuracy reached by the
//! coalition `S`. Available methods:
//!
//! | Method | Evaluations | Notes |
//! |--------|-------------|-------|
//! | [`ContributivityMethod::ShapleyValues`] | `2^n` | exact; efficiency and symmetry hold |
//! | [`ContributivityMethod::MonteCarloShapley`] | up to `sample_count * n` | sampled permutations, with std-dev |
//! | [`ContributivityMethod::TmcShapley`] | fewer than Monte Carlo | permutation walk truncated near `v(all)` |
//! | [`ContributivityMethod::IndependentRaw`] | `n` | standalone accuracies |
//! | [`ContributivityMethod::IndependentAdditive`] | `n` | standalone accuracies over their sum |
//! | [`ContributivityMethod::LeaveOneOut`] | `n + 1` | `v(all) - v(all \ {i})` |
//!
//! Exact enumeration grows exponentially with the number of partners and is
//! refused above [`MAX_EXACT_PARTNERS`].

pub mod characteristic;
pub mod coalition;
pub mod estimator;

pub use characteristic::MplCharacteristic;
pub use coalition::{CharacteristicFunction, Coalition, CoalitionCache, FnCharacteristic};
pub use estimator::{ContributivityEstimator, MAX_EXACT_PARTNERS};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MplcError, Result};
use crate::math::l2_distance;
use crate::partner::PartnerId;

/// Default number of sampled permutations.
pub const DEFAULT_SAMPLE_COUNT: usize = 200;
/// Default truncation threshold for truncated Monte Carlo.
pub const DEFAULT_TRUNCATION: f64 = 0.05;

/// Registered contributivity estimators.
///
/// Names are resolved case-insensitively from either the long name shown by
/// `Display` or the short name (`shapley`, `mcs`, `tmcs`, `independent-raw`,
/// `independent-additive`, `loo`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContributivityMethod {
    /// Exact Shapley values
    ShapleyValues,
    /// Monte Carlo sampled Shapley values
    MonteCarloShapley,
    /// Truncated Monte Carlo Shapley values
    TmcShapley,
    /// Standalone accuracy of each partner
    IndependentRaw,
    /// Standalone accuracies normalized by their sum
    IndependentAdditive,
    /// Accuracy lost when a partner leaves the full coalition
    LeaveOneOut,
}

impl ContributivityMethod {
    /// Every registered method.
    pub const ALL: [ContributivityMethod; 6] = [
        ContributivityMethod::ShapleyValues,
        ContributivityMethod::MonteCarloShapley,
        ContributivityMethod::TmcShapley,
        ContributivityMethod::IndependentRaw,
        ContributivityMethod::IndependentAdditive,
        ContributivityMethod::LeaveOneOut,
    ];

    /// Long display name.
    pub fn name(&self) -> &'static str {
        match self {
            ContributivityMethod::ShapleyValues => "Shapley values",
            ContributivityMethod::MonteCarloShapley => "Monte Carlo Shapley",
            ContributivityMethod::TmcShapley => "TMC Shapley",
            ContributivityMethod::IndependentRaw => "Independent scores raw",
            ContributivityMethod::IndependentAdditive => "Independent scores additive",
            ContributivityMethod::LeaveOneOut => "Leave one out",
        }
    }

    /// Short configuration name.
    pub fn short_name(&self) -> &'static str {
        match self {
            ContributivityMethod::ShapleyValues => "shapley",
            ContributivityMethod::MonteCarloShapley => "mcs",
            ContributivityMethod::TmcShapley => "tmcs",
            ContributivityMethod::IndependentRaw => "independent-raw",
            ContributivityMethod::IndependentAdditive => "independent-additive",
            ContributivityMethod::LeaveOneOut => "loo",
        }
    }
}

impl FromStr for ContributivityMethod {
    type Err = MplcError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        ContributivityMethod::ALL
            .into_iter()
            .find(|m| m.name().to_lowercase() == wanted || m.short_name() == wanted)
            .ok_or_else(|| MplcError::UnknownMethod(s.to_string()))
    }
}

impl TryFrom<String> for ContributivityMethod {
    type Error = MplcError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ContributivityMethod> for String {
    fn from(method: ContributivityMethod) -> Self {
        method.name().to_string()
    }
}

impl fmt::Display for ContributivityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable configuration of the contributivity estimator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributivityConfig {
    /// Methods run by [`ContributivityEstimator::compute_all`]
    pub methods: Vec<ContributivityMethod>,
    /// Permutations drawn by the Monte Carlo methods (> 0)
    pub sample_count: usize,
    /// Truncated Monte Carlo stops a walk once `|v(all) - v(prefix)|` falls below this
    pub truncation: f64,
    /// Value of the empty coalition
    pub empty_coalition_value: f64,
    /// Seed of the permutation sampler
    pub seed: u64,
}

impl Default for ContributivityConfig {
    fn default() -> Self {
        Self {
            methods: Vec::new(),
            sample_count: DEFAULT_SAMPLE_COUNT,
            truncation: DEFAULT_TRUNCATION,
            empty_coalition_value: 0.0,
            seed: 42,
        }
    }
}

impl ContributivityConfig {
    /// Parse a JSON document and validate it. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ContributivityConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter.
    pub fn validate(&self) -> Result<()> {
        if self.sample_count == 0 {
            return Err(MplcError::Configuration("sample_count should be > 0".to_string()));
        }
        if !self.truncation.is_finite() || self.truncation < 0.0 {
            return Err(MplcError::Configuration(format!(
                "truncation should be a non-negative number, got {}",
                self.truncation
            )));
        }
        if !self.empty_coalition_value.is_finite() {
            return Err(MplcError::Configuration(
                "empty_coalition_value should be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the methods to run.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = ContributivityMethod>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Set the number of sampled permutations.
    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Set the truncation threshold.
    pub fn with_truncation(mut self, truncation: f64) -> Self {
        self.truncation = truncation;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Outcome of one estimator invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributivityResult {
    /// Method that produced the scores
    pub method: ContributivityMethod,
    /// Partner ids, in score order
    pub partner_ids: Vec<PartnerId>,
    /// One score per partner
    pub scores: Vec<f64>,
    /// One standard deviation per partner; zero for deterministic methods
    pub stds: Vec<f64>,
    /// Distinct characteristic-function evaluations performed
    pub evaluation_count: usize,
    /// Wall-clock duration of the computation
    pub computation_time: Duration,
}

impl ContributivityResult {
    /// Score of partner `id`, if it took part.
    pub fn score_of(&self, id: PartnerId) -> Option<f64> {
        self.partner_ids
            .iter()
            .position(|&p| p == id)
            .map(|pos| self.scores[pos])
    }

    /// Sum of all scores.
    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// L2 distance between the score vectors of two results over the same partners.
    pub fn distance_to(&self, other: &ContributivityResult) -> Result<f64> {
        if self.partner_ids != other.partner_ids {
            return Err(MplcError::Configuration(format!(
                "cannot compare scores over partners {:?} and {:?}",
                self.partner_ids, other.partner_ids
            )));
        }
        Ok(l2_distance(&self.scores, &other.scores))
    }
}

impl fmt::Display for ContributivityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## {}", self.method)?;
        writeln!(f, "Computation time: {:.3}s", self.computation_time.as_secs_f64())?;
        writeln!(f, "Characteristic function evaluations: {}", self.evaluation_count)?;
        writeln!(f, "Contributivity scores: {}", format_values(&self.scores))?;
        write!(f, "Std of the contributivity scores: {}", format_values(&self.stds))
    }
}

fn format_values(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{:.3}", v)).collect();
    format!("[{}]", parts.join(", "))
}
