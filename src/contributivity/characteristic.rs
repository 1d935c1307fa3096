//! Characteristic function backed by multi-partner learning runs.

use log::debug;

use super::{CharacteristicFunction, Coalition};
use crate::dataset::DataSlice;
use crate::error::{MplcError, Result};
use crate::model::TrainableModel;
use crate::mpl::{MplConfig, MultiPartnerLearning};
use crate::partner::{compute_batch_sizes, Partner, PartnerId};

/// `v(S)` = test accuracy of a learning run restricted to the partners of `S`.
///
/// Batch sizes are recomputed for every coalition, so a partner training
/// alone uses the single-partner batch size.
pub struct MplCharacteristic<'a, M: TrainableModel + ?Sized> {
    model: &'a M,
    partners: &'a [Partner],
    global_val: &'a DataSlice,
    global_test: &'a DataSlice,
    config: MplConfig,
    empty_value: f64,
}

impl<'a, M: TrainableModel + ?Sized> MplCharacteristic<'a, M> {
    /// Game over every partner of `partners`.
    pub fn new(
        model: &'a M,
        partners: &'a [Partner],
        global_val: &'a DataSlice,
        global_test: &'a DataSlice,
        config: MplConfig,
    ) -> Self {
        Self {
            model,
            partners,
            global_val,
            global_test,
            config,
            empty_value: 0.0,
        }
    }

    /// Value returned for the empty coalition.
    pub fn with_empty_value(mut self, value: f64) -> Self {
        self.empty_value = value;
        self
    }

    fn members(&self, coalition: &Coalition) -> Result<Vec<Partner>> {
        coalition
            .members()
            .iter()
            .map(|&id| {
                self.partners
                    .iter()
                    .find(|p| p.id == id)
                    .cloned()
                    .ok_or_else(|| {
                        MplcError::Configuration(format!("partner #{} is not in the scenario", id))
                    })
            })
            .collect()
    }
}

impl<'a, M: TrainableModel + ?Sized> CharacteristicFunction for MplCharacteristic<'a, M> {
    fn partner_ids(&self) -> Vec<PartnerId> {
        self.partners.iter().map(|p| p.id).collect()
    }

    fn value(&self, coalition: &Coalition) -> Result<f64> {
        if coalition.is_empty() {
            return Ok(self.empty_value);
        }

        let mut members = self.members(coalition)?;
        compute_batch_sizes(
            &mut members,
            self.config.minibatch_count,
            self.config.gradient_updates_per_pass_count,
        )?;

        let history = MultiPartnerLearning::from_partners(
            self.model,
            &members,
            self.global_val,
            self.global_test,
            self.config.clone(),
        )?
        .fit()?;

        debug!(
            "coalition {} trained for {} epoch(s)",
            coalition,
            history.nb_epochs_done()
        );
        Ok(history.score())
    }
}
