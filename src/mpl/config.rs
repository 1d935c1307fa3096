//! Hyperparameters of a multi-partner learning run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MplApproach;
use crate::aggregators::AggregationWeighting;
use crate::error::{MplcError, Result};

/// Default number of epochs.
pub const DEFAULT_EPOCH_COUNT: usize = 40;
/// Default number of mini-batches per epoch.
pub const DEFAULT_MINIBATCH_COUNT: usize = 20;
/// Default number of gradient updates per local pass.
pub const DEFAULT_GRADIENT_UPDATES_PER_PASS_COUNT: usize = 8;
/// Default early-stopping patience.
pub const DEFAULT_PATIENCE: usize = 2;

/// Where validation or test samples come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataOrganisation {
    /// A single set supplied by the scenario
    #[default]
    Global,
    /// The concatenation of the active partners' local slices
    Local,
}

impl FromStr for DataOrganisation {
    type Err = MplcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(DataOrganisation::Global),
            "local" => Ok(DataOrganisation::Local),
            other => Err(MplcError::Configuration(format!(
                "data organisation can be 'local' or 'global', not '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DataOrganisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrganisation::Global => f.write_str("global"),
            DataOrganisation::Local => f.write_str("local"),
        }
    }
}

/// Immutable configuration of the multi-partner learning engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MplConfig {
    /// Maximum number of epochs (> 0)
    pub epoch_count: usize,
    /// Mini-batches per epoch, used to derive batch sizes (> 0)
    pub minibatch_count: usize,
    /// Gradient updates per local pass, used to derive batch sizes (> 0)
    pub gradient_updates_per_pass_count: usize,
    /// Halt when the aggregated validation loss regresses
    pub is_early_stopping: bool,
    /// Distance, in epochs, of the loss the current one is compared to
    pub patience: usize,
    /// How partner snapshots are weighted when aggregated
    pub aggregation_weighting: AggregationWeighting,
    /// Multi-partner learning approach
    pub approach: MplApproach,
    /// Validation set organisation
    pub val_set: DataOrganisation,
    /// Test set organisation
    pub test_set: DataOrganisation,
    /// Seed for model initialisation and partner ordering
    pub seed: u64,
}

impl Default for MplConfig {
    fn default() -> Self {
        Self {
            epoch_count: DEFAULT_EPOCH_COUNT,
            minibatch_count: DEFAULT_MINIBATCH_COUNT,
            gradient_updates_per_pass_count: DEFAULT_GRADIENT_UPDATES_PER_PASS_COUNT,
            is_early_stopping: true,
            patience: DEFAULT_PATIENCE,
            aggregation_weighting: AggregationWeighting::default(),
            approach: MplApproach::default(),
            val_set: DataOrganisation::Global,
            test_set: DataOrganisation::Global,
            seed: 42,
        }
    }
}

impl MplConfig {
    /// Parse a JSON document and validate it. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MplConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every hyperparameter.
    pub fn validate(&self) -> Result<()> {
        if self.epoch_count == 0 {
            return Err(MplcError::Configuration("epoch_count should be > 0".to_string()));
        }
        if self.minibatch_count == 0 {
            return Err(MplcError::Configuration("minibatch_count should be > 0".to_string()));
        }
        if self.gradient_updates_per_pass_count == 0 {
            return Err(MplcError::Configuration(
                "gradient_updates_per_pass_count should be > 0".to_string(),
            ));
        }
        if self.is_early_stopping && self.patience == 0 {
            return Err(MplcError::Configuration(
                "patience should be > 0 when early stopping is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the epoch budget.
    pub fn with_epoch_count(mut self, epoch_count: usize) -> Self {
        self.epoch_count = epoch_count;
        self
    }

    /// Enable or disable early stopping.
    pub fn with_early_stopping(mut self, enabled: bool) -> Self {
        self.is_early_stopping = enabled;
        self
    }

    /// Set the early-stopping patience.
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Set the aggregation weighting.
    pub fn with_weighting(mut self, weighting: AggregationWeighting) -> Self {
        self.aggregation_weighting = weighting;
        self
    }

    /// Set the learning approach.
    pub fn with_approach(mut self, approach: MplApproach) -> Self {
        self.approach = approach;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
