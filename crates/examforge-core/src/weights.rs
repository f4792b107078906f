//! Per-tier probability vectors over vocabulary source tiers.

use rand::Rng;

use crate::error::ConfigError;
use crate::tier::Tier;

/// Tolerance when checking that a row sums to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// For each target tier, the probability of drawing replacement vocabulary
/// from each source tier.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelWeightTable {
    rows: [[f64; Tier::COUNT]; Tier::COUNT],
}

impl Default for LevelWeightTable {
    /// The standard table: mostly the target tier, with a band of neighbours.
    fn default() -> Self {
        Self {
            rows: [
                [0.8, 0.2, 0.0, 0.0, 0.0, 0.0],
                [0.2, 0.65, 0.15, 0.0, 0.0, 0.0],
                [0.0, 0.2, 0.6, 0.2, 0.0, 0.0],
                [0.0, 0.0, 0.2, 0.6, 0.2, 0.0],
                [0.0, 0.0, 0.0, 0.2, 0.7, 0.1],
                [0.0, 0.0, 0.0, 0.0, 0.3, 0.7],
            ],
        }
    }
}

impl LevelWeightTable {
    /// Build a table from six rows, checking each is a probability vector.
    pub fn new(rows: [[f64; Tier::COUNT]; Tier::COUNT]) -> Result<Self, ConfigError> {
        for (i, row) in rows.iter().enumerate() {
            let tier = (i + 1) as u8;
            if let Some(bad) = row.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(ConfigError::InvalidWeights {
                    tier,
                    reason: format!("entry {bad} is not a non-negative number"),
                });
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(ConfigError::InvalidWeights {
                    tier,
                    reason: format!("row sums to {sum}"),
                });
            }
        }
        Ok(Self { rows })
    }

    /// Build a table from loosely shaped rows (e.g. from a config file).
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ConfigError> {
        if rows.len() != Tier::COUNT {
            return Err(ConfigError::InvalidWeights {
                tier: 0,
                reason: format!("expected {} rows, got {}", Tier::COUNT, rows.len()),
            });
        }
        let mut table = [[0.0; Tier::COUNT]; Tier::COUNT];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != Tier::COUNT {
                return Err(ConfigError::InvalidWeights {
                    tier: (i + 1) as u8,
                    reason: format!("expected {} entries, got {}", Tier::COUNT, row.len()),
                });
            }
            table[i].copy_from_slice(row);
        }
        Self::new(table)
    }

    /// The probability vector for rewriting at `tier`.
    pub fn row(&self, tier: Tier) -> &[f64; Tier::COUNT] {
        &self.rows[tier.index()]
    }

    /// Weight of drawing from `source` when rewriting at `target`.
    pub fn weight(&self, target: Tier, source: Tier) -> f64 {
        self.rows[target.index()][source.index()]
    }

    /// Pick a source tier for `target` given a uniform draw `r` in `[0, 1)`.
    ///
    /// Walks tiers in ascending order accumulating weight and returns the
    /// first tier whose running sum exceeds `r`. Rounding shortfalls fall
    /// through to the highest tier.
    pub fn pick(&self, target: Tier, r: f64) -> Tier {
        let mut cumulative = 0.0;
        for (i, weight) in self.row(target).iter().enumerate() {
            cumulative += weight;
            if r < cumulative {
                return Tier::from_index(i).unwrap_or(Tier::MAX);
            }
        }
        Tier::MAX
    }

    /// Sample a source tier for `target`.
    pub fn sample<R: Rng + ?Sized>(&self, target: Tier, rng: &mut R) -> Tier {
        self.pick(target, rng.gen::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tier(n: u8) -> Tier {
        Tier::new(n).unwrap()
    }

    #[test]
    fn default_rows_sum_to_one() {
        let table = LevelWeightTable::default();
        for t in Tier::all() {
            let sum: f64 = table.row(t).iter().sum();
            assert!((sum - 1.0).abs() < WEIGHT_TOLERANCE, "{t} sums to {sum}");
        }
        assert!(LevelWeightTable::new(table.rows).is_ok());
    }

    #[test]
    fn pick_walks_cumulative_weights() {
        let table = LevelWeightTable::default();
        assert_eq!(table.pick(tier(1), 0.0), tier(1));
        assert_eq!(table.pick(tier(1), 0.79), tier(1));
        assert_eq!(table.pick(tier(1), 0.8), tier(2));
        assert_eq!(table.pick(tier(4), 0.1), tier(3));
        assert_eq!(table.pick(tier(4), 0.5), tier(4));
        assert_eq!(table.pick(tier(4), 0.95), tier(5));
    }

    #[test]
    fn pick_defaults_to_highest_on_shortfall() {
        let table = LevelWeightTable::default();
        assert_eq!(table.pick(tier(2), 1.0), Tier::MAX);
    }

    #[test]
    fn rejects_rows_that_do_not_sum_to_one() {
        let mut rows = LevelWeightTable::default().rows;
        rows[2][2] = 0.5;
        let err = LevelWeightTable::new(rows).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWeights { tier: 3, .. }));
    }

    #[test]
    fn rejects_negative_and_misshapen_rows() {
        let mut rows = LevelWeightTable::default().rows;
        rows[0] = [1.2, -0.2, 0.0, 0.0, 0.0, 0.0];
        assert!(LevelWeightTable::new(rows).is_err());
        assert!(LevelWeightTable::from_rows(&[vec![1.0]]).is_err());
    }

    #[test]
    fn sampled_mixture_tracks_weights() {
        let table = LevelWeightTable::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let trials = 10_000;
        let mut counts = [0usize; Tier::COUNT];
        for _ in 0..trials {
            counts[table.sample(tier(3), &mut rng).index()] += 1;
        }
        for (i, &count) in counts.iter().enumerate() {
            let observed = count as f64 / trials as f64;
            let expected = table.row(tier(3))[i];
            assert!(
                (observed - expected).abs() < 0.03,
                "tier {} observed {observed}, expected {expected}",
                i + 1
            );
        }
    }
}
