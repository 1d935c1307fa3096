//! Training history of one multi-partner learning run.
//!
//! Append-only while the run is in progress; frozen once [`TrainingHistory`]
//! is returned from `fit`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::MplApproach;
use crate::model::{Metrics, PassMetrics};
use crate::partner::PartnerId;
use crate::snapshot::ParamSnapshot;

/// Evaluation of the global model at the end of an aggregation or sequential epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalEvaluation {
    /// Epoch at which the evaluation happened
    pub epoch: usize,
    /// Metrics on the validation set
    pub metrics: Metrics,
}

/// Record of a finished run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Approach used for the run
    pub approach: MplApproach,
    /// Active partners, in the order used by `local`
    pub partner_ids: Vec<PartnerId>,
    /// Global-model validation metrics, in evaluation order
    pub global_val: Vec<GlobalEvaluation>,
    /// Per executed epoch, each partner's local pass metrics aligned with `partner_ids`
    pub local: Vec<Vec<PassMetrics>>,
    /// Whether early stopping ended the run
    pub early_stopped: bool,
    /// Final model metrics on the test set
    pub test: Metrics,
    /// Wall-clock duration of the run
    pub computation_time: Duration,
    /// Parameters of the reported model
    #[serde(skip_serializing, default)]
    pub final_params: ParamSnapshot,
}

impl TrainingHistory {
    pub(crate) fn new(approach: MplApproach, partner_ids: Vec<PartnerId>) -> Self {
        Self {
            approach,
            partner_ids,
            global_val: Vec::new(),
            local: Vec::new(),
            early_stopped: false,
            test: Metrics {
                loss: 0.0,
                accuracy: 0.0,
            },
            computation_time: Duration::ZERO,
            final_params: ParamSnapshot::default(),
        }
    }

    pub(crate) fn push_global(&mut self, epoch: usize, metrics: Metrics) {
        self.global_val.push(GlobalEvaluation { epoch, metrics });
    }

    pub(crate) fn push_epoch(&mut self, passes: Vec<PassMetrics>) {
        self.local.push(passes);
    }

    /// Number of epochs whose local training actually ran.
    pub fn nb_epochs_done(&self) -> usize {
        self.local.len()
    }

    /// Test accuracy of the reported model.
    pub fn score(&self) -> f64 {
        self.test.accuracy
    }

    /// Number of global-model validation evaluations.
    pub fn aggregation_count(&self) -> usize {
        self.global_val.len()
    }

    /// Global validation losses, in evaluation order.
    pub fn global_val_loss(&self) -> Vec<f64> {
        self.global_val.iter().map(|g| g.metrics.loss).collect()
    }

    /// Global validation accuracies, in evaluation order.
    pub fn global_val_acc(&self) -> Vec<f64> {
        self.global_val.iter().map(|g| g.metrics.accuracy).collect()
    }

    /// Epoch × partner matrix of local validation scores.
    pub fn score_matrix(&self) -> Vec<Vec<f64>> {
        self.local
            .iter()
            .map(|epoch| epoch.iter().map(PassMetrics::score).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(loss: f64, accuracy: f64) -> Metrics {
        Metrics { loss, accuracy }
    }

    fn pass(accuracy: f64) -> PassMetrics {
        PassMetrics {
            train: metrics(0.1, 0.9),
            val: Some(metrics(0.2, accuracy)),
        }
    }

    #[test]
    fn test_history_push_and_len() {
        let mut history = TrainingHistory::new(MplApproach::FedAvg, vec![0, 1]);
        assert_eq!(history.nb_epochs_done(), 0);

        history.push_epoch(vec![pass(0.5), pass(0.6)]);
        history.push_global(1, metrics(0.4, 0.7));
        history.push_epoch(vec![pass(0.55), pass(0.65)]);

        assert_eq!(history.nb_epochs_done(), 2);
        assert_eq!(history.aggregation_count(), 1);
        assert_eq!(history.global_val_loss(), vec![0.4]);
        assert_eq!(history.global_val_acc(), vec![0.7]);
        assert_eq!(history.score_matrix(), vec![vec![0.5, 0.6], vec![0.55, 0.65]]);
    }

    #[test]
    fn test_history_serde_skips_params() {
        let mut history = TrainingHistory::new(MplApproach::SeqPure, vec![3]);
        history.final_params = ParamSnapshot::filled(&[vec![2]], 1.0);
        history.test = metrics(0.3, 0.8);

        let json = serde_json::to_string(&history).unwrap();
        assert!(!json.contains("final_params"));

        let restored: TrainingHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.partner_ids, vec![3]);
        assert_eq!(restored.score(), 0.8);
        assert!(restored.final_params.is_empty());
    }
}
