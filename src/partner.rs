//! Partners: simulated data holders in a multi-partner scenario.

use serde::{Deserialize, Serialize};

use crate::dataset::DataSlice;
use crate::error::{MplcError, Result};

/// Upper bound applied to computed batch sizes.
pub const MAX_BATCH_SIZE: usize = 1 << 20;

/// Stable partner identifier.
pub type PartnerId = usize;

/// A passive data holder with its local train/validation/test slices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Partner {
    /// Stable identity inside the scenario
    pub id: PartnerId,
    /// Local training samples
    pub train: DataSlice,
    /// Local validation samples
    pub val: DataSlice,
    /// Optional local test samples
    pub test: Option<DataSlice>,
    /// Mini-batch size used for local passes
    pub batch_size: usize,
}

impl Partner {
    /// Create a partner with a default batch size covering its whole training slice.
    pub fn new(id: PartnerId, train: DataSlice, val: DataSlice) -> Self {
        let batch_size = train.len().clamp(1, MAX_BATCH_SIZE);
        Self {
            id,
            train,
            val,
            test: None,
            batch_size,
        }
    }

    /// Attach a local test slice.
    pub fn with_test(mut self, test: DataSlice) -> Self {
        self.test = Some(test);
        self
    }

    /// Override the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Number of training samples.
    pub fn data_volume(&self) -> usize {
        self.train.len()
    }
}

/// Recompute every partner's batch size from the iteration hyperparameters.
///
/// With a single partner one pass performs `gradient_updates_per_pass_count`
/// updates; with several, each of the `minibatch_count` mini-batches does.
/// Results are clipped to `[1, MAX_BATCH_SIZE]`.
pub fn compute_batch_sizes(
    partners: &mut [Partner],
    minibatch_count: usize,
    gradient_updates_per_pass_count: usize,
) -> Result<()> {
    if minibatch_count == 0 || gradient_updates_per_pass_count == 0 {
        return Err(MplcError::Configuration(
            "minibatch_count and gradient_updates_per_pass_count must be > 0".to_string(),
        ));
    }

    let divisor = if partners.len() == 1 {
        gradient_updates_per_pass_count
    } else {
        minibatch_count * gradient_updates_per_pass_count
    };

    for partner in partners.iter_mut() {
        partner.batch_size = (partner.data_volume() / divisor).clamp(1, MAX_BATCH_SIZE);
        log::debug!("batch size for partner #{}: {}", partner.id, partner.batch_size);
    }
    Ok(())
}
