//! Weighted random outcomes shared by the minigames.

use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};

/// Outcomes paired with relative weights.  Weights need not sum to anything in particular.
pub struct WeightedTable<T> {
    entries: Vec<(T, f64)>,
}

impl<T> WeightedTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an outcome.  Negative and NaN weights are treated as zero.
    pub fn with(mut self, outcome: T, weight: f64) -> Self {
        let weight = if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            0.0
        };
        self.entries.push((outcome, weight));
        self
    }

    /// One weighted draw.  `None` if nothing can be drawn.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        let index = WeightedIndex::new(self.entries.iter().map(|(_, w)| *w)).ok()?;
        self.entries.get(index.sample(rng)).map(|(outcome, _)| outcome)
    }
}

impl<T> FromIterator<(T, f64)> for WeightedTable<T> {
    fn from_iter<I: IntoIterator<Item = (T, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |table, (outcome, weight)| table.with(outcome, weight))
    }
}

/// Effective weight of a rare outcome after `pity` misses.
pub fn boosted(base: f64, pity: u32, bonus: f64) -> f64 {
    base + f64::from(pity) * bonus
}

/// Reset the counter when the rare outcome hit, bump it otherwise.
pub fn advance_pity(pity: &mut u32, hit: bool) {
    *pity = if hit { 0 } else { pity.saturating_add(1) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn single_nonzero_outcome_always_wins() {
        let table = WeightedTable::new()
            .with("never", 0.0)
            .with("always", 3.0)
            .with("also never", 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert_eq!(table.choose(&mut rng), Some(&"always"));
        }
    }

    #[test]
    fn empty_or_all_zero_tables_draw_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(WeightedTable::<u8>::new().choose(&mut rng).is_none());
        let zeros = WeightedTable::new().with(1, 0.0).with(2, -4.0).with(3, f64::NAN);
        assert!(zeros.choose(&mut rng).is_none());
    }

    #[test]
    fn draws_follow_weights_roughly() {
        let table: WeightedTable<&str> = [("common", 9.0), ("rare", 1.0)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(42);
        let rare = (0..10_000)
            .filter(|_| table.choose(&mut rng) == Some(&"rare"))
            .count();
        assert!((700..1300).contains(&rare), "rare drawn {rare} times");
    }

    #[test]
    fn pity_grows_and_resets() {
        let mut pity = 0;
        advance_pity(&mut pity, false);
        advance_pity(&mut pity, false);
        assert_eq!(pity, 2);
        assert_eq!(boosted(2.0, pity, 1.5), 5.0);
        advance_pity(&mut pity, true);
        assert_eq!(pity, 0);

        let mut pity = u32::MAX;
        advance_pity(&mut pity, false);
        assert_eq!(pity, u32::MAX);
    }
}
