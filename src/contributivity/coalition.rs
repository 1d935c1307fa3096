//! Coalitions, characteristic functions and the per-run coalition cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::partner::PartnerId;

/// A set of partner ids, kept sorted and free of duplicates.
///
/// Two coalitions built from the same ids in any order compare and hash equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coalition(Vec<PartnerId>);

impl Coalition {
    /// Normalize `members` into a coalition.
    pub fn new(members: impl IntoIterator<Item = PartnerId>) -> Self {
        let mut ids: Vec<_> = members.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    /// The empty coalition.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Sorted member ids.
    pub fn members(&self) -> &[PartnerId] {
        &self.0
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the coalition has no member.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `id` belongs to the coalition.
    pub fn contains(&self, id: PartnerId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// Copy of this coalition with `id` added.
    pub fn with(&self, id: PartnerId) -> Self {
        let mut ids = self.0.clone();
        if let Err(pos) = ids.binary_search(&id) {
            ids.insert(pos, id);
        }
        Self(ids)
    }

    /// Copy of this coalition with `id` removed.
    pub fn without(&self, id: PartnerId) -> Self {
        Self(self.0.iter().copied().filter(|&m| m != id).collect())
    }

    /// Coalition of the `ids` whose position bit is set in `mask`.
    pub fn from_mask(ids: &[PartnerId], mask: usize) -> Self {
        Self::new(
            ids.iter()
                .enumerate()
                .filter(|(pos, _)| mask & (1 << pos) != 0)
                .map(|(_, &id)| id),
        )
    }
}

impl fmt::Display for Coalition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", id)?;
        }
        f.write_str("}")
    }
}

/// A cooperative game over partners: `v(S)` for every coalition `S`.
///
/// Implementations are called from several threads at once, each with a
/// different coalition. A call must not request the value of another
/// coalition through the same [`CoalitionCache`].
pub trait CharacteristicFunction: Sync {
    /// The players, in the order contributivity scores are reported.
    fn partner_ids(&self) -> Vec<PartnerId>;

    /// Value of a non-empty coalition.
    fn value(&self, coalition: &Coalition) -> Result<f64>;
}

/// Characteristic function backed by a closure.
///
/// ```rust
/// use mplc::contributivity::{CharacteristicFunction, Coalition, FnCharacteristic};
///
/// let additive = FnCharacteristic::new(vec![0, 1, 2], |c: &Coalition| {
///     Ok(c.members().iter().map(|&id| id as f64).sum())
/// });
/// assert_eq!(additive.value(&Coalition::new([2, 1])).unwrap(), 3.0);
/// ```
pub struct FnCharacteristic<F> {
    ids: Vec<PartnerId>,
    f: F,
}

impl<F> FnCharacteristic<F>
where
    F: Fn(&Coalition) -> Result<f64> + Sync,
{
    /// Wrap `f` as a game over `ids`.
    pub fn new(ids: Vec<PartnerId>, f: F) -> Self {
        Self { ids, f }
    }
}

impl<F> CharacteristicFunction for FnCharacteristic<F>
where
    F: Fn(&Coalition) -> Result<f64> + Sync,
{
    fn partner_ids(&self) -> Vec<PartnerId> {
        self.ids.clone()
    }

    fn value(&self, coalition: &Coalition) -> Result<f64> {
        (self.f)(coalition)
    }
}

type Slot = Arc<Mutex<Option<f64>>>;

/// Memoizes `v(S)` for the duration of one contributivity computation.
///
/// Each coalition owns a slot guarded by its own lock: the first caller
/// computes the value while holding it, concurrent callers for the same
/// coalition wait and then read the stored value. A failed evaluation leaves
/// the slot empty and is propagated.
pub struct CoalitionCache<'a, G: CharacteristicFunction + ?Sized> {
    game: &'a G,
    empty_value: f64,
    slots: Mutex<HashMap<Coalition, Slot>>,
    evaluations: AtomicUsize,
}

impl<'a, G: CharacteristicFunction + ?Sized> CoalitionCache<'a, G> {
    /// Empty cache over `game`; the empty coalition is worth `empty_value`.
    pub fn new(game: &'a G, empty_value: f64) -> Self {
        Self {
            game,
            empty_value,
            slots: Mutex::new(HashMap::new()),
            evaluations: AtomicUsize::new(0),
        }
    }

    /// `v(coalition)`, computing it at most once.
    pub fn value(&self, coalition: &Coalition) -> Result<f64> {
        if coalition.is_empty() {
            return Ok(self.empty_value);
        }

        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(coalition.clone()).or_default())
        };

        let mut guard = slot.lock();
        if let Some(value) = *guard {
            return Ok(value);
        }

        let value = self
            .game
            .value(coalition)
            .map_err(|e| e.within(format!("coalition {}", coalition)))?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        debug!("v({}) = {:.4}", coalition, value);
        *guard = Some(value);
        Ok(value)
    }

    /// Number of characteristic-function evaluations performed so far.
    pub fn evaluation_count(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MplcError;
    use rayon::prelude::*;

    #[test]
    fn test_coalition_is_normalized() {
        let a = Coalition::new([3, 1, 3, 2]);
        let b = Coalition::new([1, 2, 3]);
        assert_eq!(a, b);
        assert_eq!(a.members(), &[1, 2, 3]);
        assert_eq!(a.to_string(), "{1, 2, 3}");
    }

    #[test]
    fn test_with_and_without() {
        let c = Coalition::new([4, 1]);
        assert_eq!(c.with(2).members(), &[1, 2, 4]);
        assert_eq!(c.with(4), c);
        assert_eq!(c.without(4).members(), &[1]);
        assert!(c.contains(1));
        assert!(!c.contains(2));
    }

    #[test]
    fn test_from_mask() {
        let ids = [10, 20, 30];
        assert_eq!(Coalition::from_mask(&ids, 0b101).members(), &[10, 30]);
        assert!(Coalition::from_mask(&ids, 0).is_empty());
    }

    #[test]
    fn test_cache_computes_once_per_coalition() {
        let calls = AtomicUsize::new(0);
        let game = FnCharacteristic::new(vec![0, 1, 2], |c: &Coalition| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(c.len() as f64)
        });
        let cache = CoalitionCache::new(&game, 0.0);

        let requests: Vec<Coalition> = (0..64).map(|i| Coalition::new([i % 3, 2])).collect();
        let values: Vec<f64> = requests
            .par_iter()
            .map(|c| cache.value(c).unwrap())
            .collect();

        assert!(values.iter().all(|&v| v == 1.0 || v == 2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.evaluation_count(), 3);
    }

    #[test]
    fn test_empty_coalition_is_not_evaluated() {
        let game = FnCharacteristic::new(vec![0, 1], |_: &Coalition| {
            Err(MplcError::compute("model", "should not run"))
        });
        let cache = CoalitionCache::new(&game, 0.1);
        assert_eq!(cache.value(&Coalition::empty()).unwrap(), 0.1);
        assert_eq!(cache.evaluation_count(), 0);
    }

    #[test]
    fn test_failure_names_the_coalition() {
        let game = FnCharacteristic::new(vec![0, 1], |_: &Coalition| {
            Err(MplcError::compute("epoch 2", "diverged"))
        });
        let cache = CoalitionCache::new(&game, 0.0);
        match cache.value(&Coalition::new([1, 0])) {
            Err(MplcError::ComputeFailure { context, .. }) => {
                assert_eq!(context, "coalition {0, 1}, epoch 2");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(cache.evaluation_count(), 0);
    }
}
