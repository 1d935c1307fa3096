//! The multi-partner learning engine.
//!
//! Federated averaging runs as a small state machine over epochs:
//!
//! 1. epoch 0: every partner trains its own freshly initialised model for one pass;
//! 2. epoch `e >= 1`: the previous epoch's partner snapshots are aggregated, the
//!    aggregate is evaluated on the validation set and checked for early stopping,
//!    then every partner runs one pass starting from the aggregate;
//! 3. after the last executed epoch, its partner snapshots are aggregated once more
//!    and the result is evaluated on the test set.
//!
//! Local passes within an epoch run in parallel; aggregation waits for all of them.

use std::borrow::Cow;
use std::time::Instant;

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use super::{DataOrganisation, EarlyStopping, MplApproach, MplConfig, TrainingHistory};
use crate::aggregators::Aggregator;
use crate::dataset::DataSlice;
use crate::error::{MplcError, Result};
use crate::model::{PassMetrics, TrainableModel};
use crate::partner::Partner;
use crate::snapshot::ParamSnapshot;

/// One multi-partner learning run over a fixed set of active partners.
pub struct MultiPartnerLearning<'a, M: TrainableModel + ?Sized> {
    model: &'a M,
    partners: Vec<&'a Partner>,
    val: Cow<'a, DataSlice>,
    test: Cow<'a, DataSlice>,
    config: MplConfig,
    aggregator: Aggregator,
    initial_params: Option<ParamSnapshot>,
}

impl<'a, M: TrainableModel + ?Sized> MultiPartnerLearning<'a, M> {
    /// Prepare a run.
    ///
    /// `global_val` and `global_test` are used when the configuration selects
    /// [`DataOrganisation::Global`]; otherwise the partners' local slices are
    /// concatenated.
    ///
    /// # Errors
    ///
    /// * [`MplcError::Configuration`] for invalid hyperparameters, duplicate partner
    ///   ids, missing local test slices or empty evaluation sets
    /// * [`MplcError::InsufficientPartners`] when `partners` is empty
    pub fn new(
        model: &'a M,
        partners: Vec<&'a Partner>,
        global_val: &'a DataSlice,
        global_test: &'a DataSlice,
        config: MplConfig,
    ) -> Result<Self> {
        config.validate()?;

        if partners.is_empty() {
            return Err(MplcError::InsufficientPartners {
                needed: 1,
                actual: 0,
            });
        }

        let mut ids: Vec<_> = partners.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != partners.len() {
            return Err(MplcError::Configuration(
                "duplicate partner ids in the active partner list".to_string(),
            ));
        }

        let val = match config.val_set {
            DataOrganisation::Global => Cow::Borrowed(global_val),
            DataOrganisation::Local => {
                Cow::Owned(DataSlice::concat(partners.iter().map(|p| &p.val))?)
            }
        };

        let test = match config.test_set {
            DataOrganisation::Global => Cow::Borrowed(global_test),
            DataOrganisation::Local => {
                let slices = partners
                    .iter()
                    .map(|p| {
                        p.test.as_ref().ok_or_else(|| {
                            MplcError::Configuration(format!(
                                "partner #{} has no local test slice",
                                p.id
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Cow::Owned(DataSlice::concat(slices)?)
            }
        };

        if test.is_empty() {
            return Err(MplcError::Configuration("test set is empty".to_string()));
        }
        if partners.len() > 1 && val.is_empty() {
            return Err(MplcError::Configuration("validation set is empty".to_string()));
        }

        let aggregator = Aggregator::new(config.aggregation_weighting);
        Ok(Self {
            model,
            partners,
            val,
            test,
            config,
            aggregator,
            initial_params: None,
        })
    }

    /// Prepare a run over every partner of a slice.
    pub fn from_partners(
        model: &'a M,
        partners: &'a [Partner],
        global_val: &'a DataSlice,
        global_test: &'a DataSlice,
        config: MplConfig,
    ) -> Result<Self> {
        Self::new(model, partners.iter().collect(), global_val, global_test, config)
    }

    /// Start every model from `params` instead of a fresh initialisation.
    pub fn with_initial_params(mut self, params: ParamSnapshot) -> Self {
        self.initial_params = Some(params);
        self
    }

    /// Number of active partners.
    pub fn partner_count(&self) -> usize {
        self.partners.len()
    }

    /// The run configuration.
    pub fn config(&self) -> &MplConfig {
        &self.config
    }

    /// Train and evaluate, returning the run's history.
    ///
    /// Any failing local pass, aggregation or evaluation aborts the run.
    pub fn fit(&self) -> Result<TrainingHistory> {
        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let ids = self.partners.iter().map(|p| p.id).collect();
        let mut history = TrainingHistory::new(self.config.approach, ids);

        info!(
            "fitting {} over {} partner(s) for up to {} epoch(s)",
            self.config.approach,
            self.partners.len(),
            self.config.epoch_count
        );

        let final_params = if self.partners.len() == 1 {
            self.fit_single(&mut rng, &mut history)?
        } else if self.config.approach.is_sequential() {
            self.fit_sequential(&mut rng, &mut history)?
        } else {
            self.fit_fedavg(&mut rng, &mut history)?
        };

        history.test = self
            .model
            .evaluate(&final_params, &self.test)
            .map_err(|e| e.within("final evaluation on test set"))?;
        history.final_params = final_params;
        history.computation_time = start.elapsed();

        info!(
            "{} finished after {} epoch(s): test accuracy {:.4}, test loss {:.4}",
            self.config.approach,
            history.nb_epochs_done(),
            history.test.accuracy,
            history.test.loss
        );
        Ok(history)
    }

    fn fit_single(&self, rng: &mut StdRng, history: &mut TrainingHistory) -> Result<ParamSnapshot> {
        let partner = self.partners[0];
        let mut params = self.initial_params(rng)?;

        // no aggregation step, so early stopping never applies here
        for epoch in 0..self.config.epoch_count {
            let (next, pass) = self.local_pass(partner, params, epoch)?;
            params = next;
            history.push_epoch(vec![pass]);
            debug!("epoch {}: partner #{} {:?}", epoch, partner.id, pass);
        }
        Ok(params)
    }

    fn fit_fedavg(&self, rng: &mut StdRng, history: &mut TrainingHistory) -> Result<ParamSnapshot> {
        let n = self.partners.len();
        let volumes = self.data_volumes();
        let mut stopper = self.early_stopping();
        let mut scores = vec![0.0; n];

        let mut snapshots = Vec::with_capacity(n);
        for _ in 0..n {
            snapshots.push(self.initial_params(rng)?);
        }

        for epoch in 0..self.config.epoch_count {
            let starts = if epoch == 0 {
                std::mem::take(&mut snapshots)
            } else {
                let global = self.aggregate(&snapshots, &volumes, &scores, epoch)?;
                let metrics = self
                    .model
                    .evaluate(&global, &self.val)
                    .map_err(|e| e.within(format!("epoch {}, aggregated model", epoch)))?;
                history.push_global(epoch, metrics);
                debug!(
                    "epoch {}: aggregated val loss {:.4}, val accuracy {:.4}",
                    epoch, metrics.loss, metrics.accuracy
                );

                if let Some(stopper) = stopper.as_mut() {
                    if stopper.observe(epoch, metrics.loss) {
                        info!(
                            "early stopping at epoch {}: val loss {:.4} regressed over epoch {}",
                            epoch,
                            metrics.loss,
                            epoch - stopper.patience()
                        );
                        history.early_stopped = true;
                        break;
                    }
                }
                vec![global; n]
            };

            let (next, passes) = self.parallel_round(starts, epoch)?;
            for (partner, pass) in self.partners.iter().zip(passes.iter()) {
                debug!("epoch {}: partner #{} {:?}", epoch, partner.id, pass);
            }
            scores = passes.iter().map(PassMetrics::score).collect();
            snapshots = next;
            history.push_epoch(passes);
        }

        self.aggregate(&snapshots, &volumes, &scores, history.nb_epochs_done())
    }

    fn fit_sequential(
        &self,
        rng: &mut StdRng,
        history: &mut TrainingHistory,
    ) -> Result<ParamSnapshot> {
        let n = self.partners.len();
        let approach = self.config.approach;
        let volumes = self.data_volumes();
        let mut stopper = self.early_stopping();
        let mut global = self.initial_params(rng)?;

        for epoch in 0..self.config.epoch_count {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);
            debug!("epoch {}: partner order {:?}", epoch, order);

            let mut passes: Vec<Option<PassMetrics>> = vec![None; n];
            let mut chain = Vec::new();
            for &i in &order {
                let (next, pass) = self.local_pass(self.partners[i], global, epoch)?;
                passes[i] = Some(pass);
                if approach == MplApproach::SeqAvg {
                    chain.push(next.clone());
                }
                global = next;
            }
            let passes: Vec<PassMetrics> = passes.into_iter().flatten().collect();

            if approach == MplApproach::SeqAvg {
                let chain_volumes: Vec<usize> = order.iter().map(|&i| volumes[i]).collect();
                let chain_scores: Vec<f64> = order.iter().map(|&i| passes[i].score()).collect();
                global = self.aggregate(&chain, &chain_volumes, &chain_scores, epoch)?;
            }
            history.push_epoch(passes);

            let metrics = self
                .model
                .evaluate(&global, &self.val)
                .map_err(|e| e.within(format!("epoch {}, sequential model", epoch)))?;
            history.push_global(epoch, metrics);
            debug!(
                "epoch {}: sequential val loss {:.4}, val accuracy {:.4}",
                epoch, metrics.loss, metrics.accuracy
            );

            if let Some(stopper) = stopper.as_mut() {
                if stopper.observe(epoch, metrics.loss) {
                    info!("early stopping {} at epoch {}", approach, epoch);
                    history.early_stopped = true;
                    break;
                }
            }
        }

        if approach == MplApproach::SeqWithFinalAgg {
            let epoch = history.nb_epochs_done();
            let (snapshots, passes) = self.parallel_round(vec![global; n], epoch)?;
            let scores: Vec<f64> = passes.iter().map(PassMetrics::score).collect();
            return self.aggregate(&snapshots, &volumes, &scores, epoch);
        }
        Ok(global)
    }

    /// One local pass on each partner, in parallel, each from its own start snapshot.
    fn parallel_round(
        &self,
        starts: Vec<ParamSnapshot>,
        epoch: usize,
    ) -> Result<(Vec<ParamSnapshot>, Vec<PassMetrics>)> {
        let results = self
            .partners
            .par_iter()
            .zip(starts.into_par_iter())
            .map(|(partner, params)| self.local_pass(partner, params, epoch))
            .collect::<Result<Vec<_>>>()?;
        Ok(results.into_iter().unzip())
    }

    fn local_pass(
        &self,
        partner: &Partner,
        params: ParamSnapshot,
        epoch: usize,
    ) -> Result<(ParamSnapshot, PassMetrics)> {
        self.model
            .train_one_pass(params, &partner.train, &partner.val, partner.batch_size)
            .map_err(|e| e.within(format!("epoch {}, partner #{}", epoch, partner.id)))
    }

    fn aggregate(
        &self,
        snapshots: &[ParamSnapshot],
        volumes: &[usize],
        scores: &[f64],
        epoch: usize,
    ) -> Result<ParamSnapshot> {
        self.aggregator
            .aggregate(snapshots, volumes, scores)
            .map_err(|e| {
                error!("aggregation failed at epoch {}: {}", epoch, e);
                e
            })
    }

    fn initial_params(&self, rng: &mut StdRng) -> Result<ParamSnapshot> {
        match &self.initial_params {
            Some(params) => Ok(params.clone()),
            None => self.model.init_params(rng),
        }
    }

    fn early_stopping(&self) -> Option<EarlyStopping> {
        self.config
            .is_early_stopping
            .then(|| EarlyStopping::new(self.config.patience))
    }

    fn data_volumes(&self) -> Vec<usize> {
        self.partners.iter().map(|p| p.data_volume()).collect()
    }
}
