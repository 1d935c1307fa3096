//! Fixed-lag loss regression check.
//!
//! The loss observed at epoch `e` is compared to the loss observed exactly
//! `patience` epochs earlier, not to the best loss so far. Training halts
//! on the first strict increase.

/// Early-stopping monitor over an epoch-indexed loss series.
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    patience: usize,
    losses: Vec<Option<f64>>,
}

impl EarlyStopping {
    /// Monitor comparing each loss with the one `patience` epochs before.
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            losses: Vec::new(),
        }
    }

    /// Record the loss observed at `epoch` and report whether to halt.
    ///
    /// Halts when `loss[epoch] > loss[epoch - patience]`. Epochs without an
    /// observation never trigger a halt.
    pub fn observe(&mut self, epoch: usize, loss: f64) -> bool {
        if self.losses.len() <= epoch {
            self.losses.resize(epoch + 1, None);
        }
        self.losses[epoch] = Some(loss);

        if epoch < self.patience {
            return false;
        }
        match self.losses[epoch - self.patience] {
            Some(reference) => loss > reference,
            None => false,
        }
    }

    /// The configured patience.
    pub fn patience(&self) -> usize {
        self.patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halts_on_first_regression() {
        let mut stopper = EarlyStopping::new(2);
        let losses = [1.0, 0.8, 0.7, 0.75, 0.9];
        let mut halted_at = None;
        for (epoch, loss) in losses.into_iter().enumerate() {
            if stopper.observe(epoch, loss) {
                halted_at = Some(epoch);
                break;
            }
        }
        // 0.75 > 0.8? no. 0.9 > 0.7? yes -> epoch 4
        assert_eq!(halted_at, Some(4));
    }

    #[test]
    fn test_non_monotonic_within_patience_is_tolerated() {
        let mut stopper = EarlyStopping::new(2);
        assert!(!stopper.observe(0, 1.0));
        assert!(!stopper.observe(1, 1.2));
        assert!(!stopper.observe(2, 0.9));
        assert!(!stopper.observe(3, 1.1));
    }

    #[test]
    fn test_missing_reference_never_halts() {
        let mut stopper = EarlyStopping::new(1);
        // epoch 0 never observed, as with aggregated evaluations
        assert!(!stopper.observe(1, 5.0));
        assert!(stopper.observe(2, 6.0));
    }

    #[test]
    fn test_equal_loss_does_not_halt() {
        let mut stopper = EarlyStopping::new(1);
        stopper.observe(0, 0.5);
        assert!(!stopper.observe(1, 0.5));
    }
}
