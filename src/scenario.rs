//! Scenario orchestration: one learning run plus the configured contributivity methods.
//!
//! A [`Scenario`] owns the partners and the global evaluation sets. Running it
//! produces a [`ScenarioReport`], the row a persistence layer would store.
//! Repeats are independent and run in parallel, each with its own seed.

use std::time::Duration;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregators::AggregationWeighting;
use crate::contributivity::{
    ContributivityConfig, ContributivityEstimator, ContributivityResult, MplCharacteristic,
};
use crate::dataset::DataSlice;
use crate::error::{MplcError, Result};
use crate::model::TrainableModel;
use crate::mpl::{MplApproach, MplConfig, MultiPartnerLearning};
use crate::partner::{compute_batch_sizes, Partner, PartnerId};

/// Partners, evaluation sets and configuration of one experiment.
#[derive(Clone, Debug)]
pub struct Scenario {
    id: String,
    partners: Vec<Partner>,
    global_val: DataSlice,
    global_test: DataSlice,
    mpl_config: MplConfig,
    contributivity_config: ContributivityConfig,
}

impl Scenario {
    /// Build a scenario with default configurations.
    ///
    /// Batch sizes are computed from the learning configuration.
    pub fn new(partners: Vec<Partner>, global_val: DataSlice, global_test: DataSlice) -> Result<Self> {
        if partners.is_empty() {
            return Err(MplcError::InsufficientPartners {
                needed: 1,
                actual: 0,
            });
        }
        let mut scenario = Self {
            id: "scenario".to_string(),
            partners,
            global_val,
            global_test,
            mpl_config: MplConfig::default(),
            contributivity_config: ContributivityConfig::default(),
        };
        scenario.refresh_batch_sizes()?;
        Ok(scenario)
    }

    /// Name the scenario in its reports.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the learning configuration and recompute batch sizes.
    pub fn with_mpl_config(mut self, config: MplConfig) -> Result<Self> {
        config.validate()?;
        self.mpl_config = config;
        self.refresh_batch_sizes()?;
        Ok(self)
    }

    /// Replace the contributivity configuration.
    pub fn with_contributivity_config(mut self, config: ContributivityConfig) -> Result<Self> {
        config.validate()?;
        self.contributivity_config = config;
        Ok(self)
    }

    /// Scenario name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Partners, in scenario order.
    pub fn partners(&self) -> &[Partner] {
        &self.partners
    }

    /// Learning configuration.
    pub fn mpl_config(&self) -> &MplConfig {
        &self.mpl_config
    }

    /// Contributivity configuration.
    pub fn contributivity_config(&self) -> &ContributivityConfig {
        &self.contributivity_config
    }

    fn refresh_batch_sizes(&mut self) -> Result<()> {
        compute_batch_sizes(
            &mut self.partners,
            self.mpl_config.minibatch_count,
            self.mpl_config.gradient_updates_per_pass_count,
        )
    }

    /// Run the scenario once with its configured seeds.
    pub fn run<M: TrainableModel + ?Sized>(&self, model: &M) -> Result<ScenarioReport> {
        self.run_with(model, 0, self.mpl_config.clone(), self.contributivity_config.clone())
    }

    /// Run `repeats` independent repetitions in parallel.
    ///
    /// Repeat `r` offsets both seeds by `r`; reports come back in repeat order.
    pub fn run_repeats<M: TrainableModel + ?Sized>(
        &self,
        model: &M,
        repeats: usize,
    ) -> Result<Vec<ScenarioReport>> {
        (0..repeats)
            .into_par_iter()
            .map(|repeat| {
                let offset = repeat as u64;
                let mpl = self
                    .mpl_config
                    .clone()
                    .with_seed(self.mpl_config.seed.wrapping_add(offset));
                let contributivity = self
                    .contributivity_config
                    .clone()
                    .with_seed(self.contributivity_config.seed.wrapping_add(offset));
                self.run_with(model, repeat, mpl, contributivity)
            })
            .collect()
    }

    fn run_with<M: TrainableModel + ?Sized>(
        &self,
        model: &M,
        repeat_index: usize,
        mpl_config: MplConfig,
        contributivity_config: ContributivityConfig,
    ) -> Result<ScenarioReport> {
        info!(
            "scenario {} repeat {}: {} partners, {} with {} weighting",
            self.id,
            repeat_index,
            self.partners.len(),
            mpl_config.approach,
            mpl_config.aggregation_weighting
        );

        let history = MultiPartnerLearning::from_partners(
            model,
            &self.partners,
            &self.global_val,
            &self.global_test,
            mpl_config.clone(),
        )?
        .fit()?;

        let contributivity = if contributivity_config.methods.is_empty() {
            Vec::new()
        } else {
            let game = MplCharacteristic::new(
                model,
                &self.partners,
                &self.global_val,
                &self.global_test,
                mpl_config.clone(),
            )
            .with_empty_value(contributivity_config.empty_coalition_value);
            ContributivityEstimator::new(&game, contributivity_config)?.compute_all()?
        };

        Ok(ScenarioReport {
            scenario_id: self.id.clone(),
            repeat_index,
            approach: mpl_config.approach,
            aggregation_weighting: mpl_config.aggregation_weighting,
            partner_ids: self.partners.iter().map(|p| p.id).collect(),
            data_volumes: self.partners.iter().map(Partner::data_volume).collect(),
            mpl_test_score: history.score(),
            nb_epochs_done: history.nb_epochs_done(),
            early_stopped: history.early_stopped,
            learning_computation_time: history.computation_time,
            contributivity,
        })
    }
}

/// Results of one scenario repeat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario_id: String,
    /// Repeat index, starting at 0
    pub repeat_index: usize,
    /// Learning approach
    pub approach: MplApproach,
    /// Aggregation weighting
    pub aggregation_weighting: AggregationWeighting,
    /// Partner ids, in scenario order
    pub partner_ids: Vec<PartnerId>,
    /// Training samples per partner
    pub data_volumes: Vec<usize>,
    /// Test accuracy of the full-coalition model
    pub mpl_test_score: f64,
    /// Epochs run by the full-coalition learning
    pub nb_epochs_done: usize,
    /// Whether the full-coalition learning stopped early
    pub early_stopped: bool,
    /// Duration of the full-coalition learning
    pub learning_computation_time: Duration,
    /// One entry per configured contributivity method
    pub contributivity: Vec<ContributivityResult>,
}

impl ScenarioReport {
    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a report produced by [`ScenarioReport::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
