//! Shapley-value style estimators over a characteristic function.

use std::time::Instant;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use super::{
    CharacteristicFunction, Coalition, CoalitionCache, ContributivityConfig, ContributivityMethod,
    ContributivityResult,
};
use crate::error::{MplcError, Result};
use crate::math::stats::{mean, sample_std};
use crate::partner::PartnerId;

/// Largest partner count accepted by exact Shapley enumeration.
pub const MAX_EXACT_PARTNERS: usize = 20;

/// Scores and standard deviations, aligned with the partner order.
type Estimate = (Vec<f64>, Vec<f64>);

/// Runs contributivity methods against one characteristic function.
///
/// A fresh [`CoalitionCache`] is created for every [`compute`](Self::compute)
/// call, so coalitions are shared across the draws of one method but never
/// across methods.
pub struct ContributivityEstimator<'a, G: CharacteristicFunction + ?Sized> {
    game: &'a G,
    partner_ids: Vec<PartnerId>,
    config: ContributivityConfig,
}

impl<'a, G: CharacteristicFunction + ?Sized> ContributivityEstimator<'a, G> {
    /// Bind an estimator to `game`.
    ///
    /// # Errors
    ///
    /// * [`MplcError::InsufficientPartners`] with fewer than two partners
    /// * [`MplcError::Configuration`] for an invalid config or duplicate partner ids
    pub fn new(game: &'a G, config: ContributivityConfig) -> Result<Self> {
        config.validate()?;
        let partner_ids = game.partner_ids();
        if partner_ids.len() < 2 {
            return Err(MplcError::InsufficientPartners {
                needed: 2,
                actual: partner_ids.len(),
            });
        }
        if Coalition::new(partner_ids.iter().copied()).len() != partner_ids.len() {
            return Err(MplcError::Configuration(format!(
                "duplicate partner ids in {:?}",
                partner_ids
            )));
        }
        Ok(Self {
            game,
            partner_ids,
            config,
        })
    }

    /// Partner ids, in score order.
    pub fn partner_ids(&self) -> &[PartnerId] {
        &self.partner_ids
    }

    /// Resolve `name` and run that method.
    pub fn compute_by_name(&self, name: &str) -> Result<ContributivityResult> {
        self.compute(name.parse()?)
    }

    /// Run every method listed in the configuration, in order.
    pub fn compute_all(&self) -> Result<Vec<ContributivityResult>> {
        self.config
            .methods
            .iter()
            .map(|&method| self.compute(method))
            .collect()
    }

    /// Run one method.
    pub fn compute(&self, method: ContributivityMethod) -> Result<ContributivityResult> {
        let start = Instant::now();
        let cache = CoalitionCache::new(self.game, self.config.empty_coalition_value);
        info!(
            "computing {} over {} partners",
            method,
            self.partner_ids.len()
        );

        let (scores, stds) = match method {
            ContributivityMethod::ShapleyValues => self.exact_shapley(&cache)?,
            ContributivityMethod::MonteCarloShapley => self.monte_carlo(&cache, None)?,
            ContributivityMethod::TmcShapley => {
                self.monte_carlo(&cache, Some(self.config.truncation))?
            }
            ContributivityMethod::IndependentRaw => self.independent(&cache, false)?,
            ContributivityMethod::IndependentAdditive => self.independent(&cache, true)?,
            ContributivityMethod::LeaveOneOut => self.leave_one_out(&cache)?,
        };

        let result = ContributivityResult {
            method,
            partner_ids: self.partner_ids.clone(),
            scores,
            stds,
            evaluation_count: cache.evaluation_count(),
            computation_time: start.elapsed(),
        };
        info!(
            "{} done: {} evaluations in {:.3}s, scores {:?}",
            method,
            result.evaluation_count,
            result.computation_time.as_secs_f64(),
            result.scores
        );
        Ok(result)
    }

    fn exact_shapley(&self, cache: &CoalitionCache<'_, G>) -> Result<Estimate> {
        let n = self.partner_ids.len();
        if n > MAX_EXACT_PARTNERS {
            return Err(MplcError::Configuration(format!(
                "exact Shapley values over {} partners need 2^{} evaluations; \
                 use Monte Carlo sampling above {} partners",
                n, n, MAX_EXACT_PARTNERS
            )));
        }

        // v(S) for every subset, indexed by its position bitmask
        let values = (0..1usize << n)
            .into_par_iter()
            .map(|mask| cache.value(&Coalition::from_mask(&self.partner_ids, mask)))
            .collect::<Result<Vec<f64>>>()?;

        let factorial: Vec<f64> = (0..=n)
            .scan(1.0, |acc, k| {
                if k > 0 {
                    *acc *= k as f64;
                }
                Some(*acc)
            })
            .collect();

        let mut scores = vec![0.0; n];
        for (i, score) in scores.iter_mut().enumerate() {
            let bit = 1usize << i;
            for mask in (0..1usize << n).filter(|m| m & bit == 0) {
                let s = mask.count_ones() as usize;
                let weight = factorial[s] * factorial[n - s - 1] / factorial[n];
                *score += weight * (values[mask | bit] - values[mask]);
            }
        }
        Ok((scores, vec![0.0; n]))
    }

    /// Permutation sampling; `truncation` enables truncated walks.
    fn monte_carlo(
        &self,
        cache: &CoalitionCache<'_, G>,
        truncation: Option<f64>,
    ) -> Result<Estimate> {
        let n = self.partner_ids.len();
        let permutations = self.config.sample_count;
        if permutations < 2 {
            warn!("a single permutation gives no standard deviation estimate");
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let full_value = match truncation {
            Some(_) => cache.value(&Coalition::new(self.partner_ids.iter().copied()))?,
            None => 0.0,
        };

        let mut marginals: Vec<Vec<f64>> = vec![Vec::with_capacity(permutations); n];
        let mut truncated_walks = 0usize;
        let mut order: Vec<usize> = (0..n).collect();

        for _ in 0..permutations {
            order.shuffle(&mut rng);
            let mut prefix = Coalition::empty();
            let mut prefix_value = cache.value(&prefix)?;
            let mut truncated = false;

            for &pos in &order {
                if !truncated {
                    if let Some(threshold) = truncation {
                        truncated = (full_value - prefix_value).abs() < threshold;
                        if truncated {
                            truncated_walks += 1;
                        }
                    }
                }
                if truncated {
                    marginals[pos].push(0.0);
                    continue;
                }

                let next = prefix.with(self.partner_ids[pos]);
                let next_value = cache.value(&next)?;
                marginals[pos].push(next_value - prefix_value);
                prefix = next;
                prefix_value = next_value;
            }
        }

        if truncation.is_some() {
            debug!("{} of {} walks truncated", truncated_walks, permutations);
        }

        let scores = marginals.iter().map(|m| mean(m)).collect();
        let stds = marginals.iter().map(|m| sample_std(m)).collect();
        Ok((scores, stds))
    }

    fn independent(&self, cache: &CoalitionCache<'_, G>, additive: bool) -> Result<Estimate> {
        let n = self.partner_ids.len();
        let raw = self
            .partner_ids
            .par_iter()
            .map(|&id| cache.value(&Coalition::new([id])))
            .collect::<Result<Vec<f64>>>()?;

        if !additive {
            return Ok((raw, vec![0.0; n]));
        }

        let total: f64 = raw.iter().sum();
        if total == 0.0 {
            warn!("standalone scores sum to zero; additive scores are all zero");
            return Ok((vec![0.0; n], vec![0.0; n]));
        }
        Ok((raw.iter().map(|v| v / total).collect(), vec![0.0; n]))
    }

    fn leave_one_out(&self, cache: &CoalitionCache<'_, G>) -> Result<Estimate> {
        let n = self.partner_ids.len();
        let everyone = Coalition::new(self.partner_ids.iter().copied());
        let full_value = cache.value(&everyone)?;

        let scores = self
            .partner_ids
            .par_iter()
            .map(|&id| cache.value(&everyone.without(id)).map(|v| full_value - v))
            .collect::<Result<Vec<f64>>>()?;
        Ok((scores, vec![0.0; n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contributivity::FnCharacteristic;

    fn weighted_game(weights: Vec<f64>) -> FnCharacteristic<impl Fn(&Coalition) -> Result<f64> + Sync> {
        let ids: Vec<PartnerId> = (0..weights.len()).collect();
        FnCharacteristic::new(ids, move |c: &Coalition| {
            Ok(c.members().iter().map(|&id| weights[id]).sum())
        })
    }

    #[test]
    fn test_additive_game_exact_shapley_is_weights() {
        let game = weighted_game(vec![0.1, 0.2, 0.3]);
        let estimator = ContributivityEstimator::new(&game, ContributivityConfig::default()).unwrap();
        let result = estimator.compute(ContributivityMethod::ShapleyValues).unwrap();

        for (score, expected) in result.scores.iter().zip([0.1, 0.2, 0.3]) {
            assert!((score - expected).abs() < 1e-12);
        }
        assert_eq!(result.evaluation_count, 7);
        assert_eq!(result.stds, vec![0.0; 3]);
    }

    #[test]
    fn test_additive_game_monte_carlo_is_exact() {
        let game = weighted_game(vec![0.5, 0.25]);
        let config = ContributivityConfig::default().with_sample_count(10);
        let estimator = ContributivityEstimator::new(&game, config).unwrap();
        let result = estimator.compute(ContributivityMethod::MonteCarloShapley).unwrap();

        assert!((result.scores[0] - 0.5).abs() < 1e-12);
        assert!((result.scores[1] - 0.25).abs() < 1e-12);
        assert!(result.stds.iter().all(|s| s.abs() < 1e-12));
        assert!(result.evaluation_count <= 3);
    }

    #[test]
    fn test_truncation_skips_tail_partners() {
        // once partner 0 joins, the coalition already reaches v(all)
        let game = FnCharacteristic::new(vec![0, 1, 2], |c: &Coalition| {
            Ok(if c.contains(0) { 1.0 } else { 0.0 })
        });
        let config = ContributivityConfig::default()
            .with_sample_count(30)
            .with_truncation(0.01);
        let estimator = ContributivityEstimator::new(&game, config).unwrap();
        let result = estimator.compute(ContributivityMethod::TmcShapley).unwrap();

        assert!((result.scores[0] - 1.0).abs() < 1e-12);
        assert_eq!(result.scores[1], 0.0);
        assert_eq!(result.scores[2], 0.0);
    }

    #[test]
    fn test_independent_scores() {
        let game = weighted_game(vec![0.2, 0.6]);
        let estimator = ContributivityEstimator::new(&game, ContributivityConfig::default()).unwrap();

        let raw = estimator.compute(ContributivityMethod::IndependentRaw).unwrap();
        assert_eq!(raw.scores, vec![0.2, 0.6]);
        assert_eq!(raw.evaluation_count, 2);

        let additive = estimator.compute(ContributivityMethod::IndependentAdditive).unwrap();
        assert!((additive.scores[0] - 0.25).abs() < 1e-12);
        assert!((additive.scores[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_leave_one_out() {
        let game = FnCharacteristic::new(vec![3, 5], |c: &Coalition| Ok(c.len() as f64 * 0.4));
        let estimator = ContributivityEstimator::new(&game, ContributivityConfig::default()).unwrap();
        let result = estimator.compute_by_name("loo").unwrap();

        assert_eq!(result.partner_ids, vec![3, 5]);
        assert!(result.scores.iter().all(|s| (s - 0.4).abs() < 1e-12));
        assert_eq!(result.evaluation_count, 3);
    }

    #[test]
    fn test_requires_two_partners() {
        let game = weighted_game(vec![1.0]);
        assert!(matches!(
            ContributivityEstimator::new(&game, ContributivityConfig::default()),
            Err(MplcError::InsufficientPartners { needed: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_unknown_method_name() {
        let game = weighted_game(vec![1.0, 2.0]);
        let estimator = ContributivityEstimator::new(&game, ContributivityConfig::default()).unwrap();
        assert!(matches!(
            estimator.compute_by_name("banzhaf"),
            Err(MplcError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_compute_all_follows_config_order() {
        let game = weighted_game(vec![0.3, 0.7]);
        let config = ContributivityConfig::default().with_methods([
            ContributivityMethod::LeaveOneOut,
            ContributivityMethod::ShapleyValues,
        ]);
        let estimator = ContributivityEstimator::new(&game, config).unwrap();
        let results = estimator.compute_all().unwrap();
        let methods: Vec<_> = results.iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            vec![ContributivityMethod::LeaveOneOut, ContributivityMethod::ShapleyValues]
        );
    }
}
