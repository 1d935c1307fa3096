//! Multi-partner learning.
//!
//! A [`MultiPartnerLearning`] run trains one shared model over a set of
//! partners through repeated local-pass / aggregate cycles and reports a
//! [`TrainingHistory`]. Four approaches are available:
//!
//! | Approach | Epoch structure | Final model |
//! |----------|-----------------|-------------|
//! | [`MplApproach::FedAvg`] | parallel local passes, then aggregation | aggregate of the last epoch |
//! | [`MplApproach::SeqPure`] | one model passed through partners in shuffled order | the sequential model |
//! | [`MplApproach::SeqWithFinalAgg`] | as `SeqPure` | one parallel round from the sequential model, aggregated |
//! | [`MplApproach::SeqAvg`] | as `SeqPure`, then average of the chain's snapshots | the averaged model |

pub mod config;
pub mod early_stopping;
pub mod engine;
pub mod history;

pub use config::{DataOrganisation, MplConfig};
pub use early_stopping::EarlyStopping;
pub use engine::MultiPartnerLearning;
pub use history::{GlobalEvaluation, TrainingHistory};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MplcError, Result};

/// Multi-partner learning approach.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MplApproach {
    /// Federated averaging
    #[default]
    #[serde(rename = "fedavg")]
    FedAvg,
    /// Sequential training, no aggregation
    #[serde(rename = "seq-pure")]
    SeqPure,
    /// Sequential training closed by one federated round
    #[serde(rename = "seq-with-final-agg")]
    SeqWithFinalAgg,
    /// Sequential training averaged over each epoch's chain
    #[serde(rename = "seqavg")]
    SeqAvg,
}

impl MplApproach {
    /// Whether epochs visit partners one after another.
    pub fn is_sequential(&self) -> bool {
        !matches!(self, MplApproach::FedAvg)
    }
}

impl FromStr for MplApproach {
    type Err = MplcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fedavg" => Ok(MplApproach::FedAvg),
            "seq-pure" => Ok(MplApproach::SeqPure),
            "seq-with-final-agg" => Ok(MplApproach::SeqWithFinalAgg),
            "seqavg" => Ok(MplApproach::SeqAvg),
            other => Err(MplcError::UnknownApproach(other.to_string())),
        }
    }
}

impl fmt::Display for MplApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MplApproach::FedAvg => "fedavg",
            MplApproach::SeqPure => "seq-pure",
            MplApproach::SeqWithFinalAgg => "seq-with-final-agg",
            MplApproach::SeqAvg => "seqavg",
        };
        f.write_str(name)
    }
}
