use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Accumulated samples of one genome against one problem.
///
/// `streak` counts consecutive successful samples and resets on any
/// failure. Fitness values order by average (lower and NaN worst), then by
/// sample count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fitness {
    pub sum: f64,
    pub count: u64,
    pub streak: u32,
}

impl Fitness {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fitness holding exactly one sample.
    pub fn sample(score: f64, success: bool) -> Self {
        let mut fitness = Self::new();
        fitness.add_sample(score, success);
        fitness
    }

    pub fn add_sample(&mut self, score: f64, success: bool) {
        self.sum += score;
        self.count += 1;
        self.streak = if success { self.streak.saturating_add(1) } else { 0 };
    }

    /// Folds `other`'s samples in after this one's. The streak continues only
    /// if every sample of `other` was a success.
    pub fn merge(&mut self, other: &Fitness) {
        if other.count == 0 {
            return;
        }
        self.sum += other.sum;
        self.count += other.count;
        self.streak = if u64::from(other.streak) == other.count {
            self.streak.saturating_add(other.streak)
        } else {
            other.streak
        };
    }

    /// NaN when there are no samples or any sample was NaN.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn has_samples(&self) -> bool {
        self.count > 0
    }

    pub fn has_converged(&self, threshold: u32) -> bool {
        threshold > 0 && self.streak >= threshold
    }

    /// `Greater` means `self` is the better fitness.
    pub fn compare(&self, other: &Fitness) -> Ordering {
        let (a, b) = (self.average(), other.average());
        let by_average = match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => a.total_cmp(&b),
        };
        by_average.then(self.count.cmp(&other.count))
    }

    pub fn is_better_than(&self, other: &Fitness) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg={:.6} n={} streak={}",
            self.average(),
            self.count,
            self.streak
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_average_is_nan() {
        assert!(Fitness::new().average().is_nan());
        assert!(!Fitness::new().has_samples());
    }

    #[test]
    fn test_streak_resets_on_failure() {
        let mut fitness = Fitness::new();
        fitness.add_sample(1.0, true);
        fitness.add_sample(1.0, true);
        assert_eq!(fitness.streak, 2);
        fitness.add_sample(0.5, false);
        assert_eq!(fitness.streak, 0);
        assert_eq!(fitness.count, 3);
        assert!((fitness.average() - 2.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ordering() {
        let good = Fitness::sample(0.9, false);
        let bad = Fitness::sample(0.1, false);
        let nan = Fitness::sample(f64::NAN, false);
        assert!(good.is_better_than(&bad));
        assert!(bad.is_better_than(&nan));
        assert!(bad.is_better_than(&Fitness::new()));

        let mut more = Fitness::sample(0.9, false);
        more.add_sample(0.9, false);
        assert!(more.is_better_than(&good));
    }

    #[test]
    fn test_merge_continues_streak() {
        let mut base = Fitness::sample(1.0, true);
        base.merge(&Fitness::sample(1.0, true));
        assert_eq!(base.streak, 2);

        let mut broken = Fitness::new();
        broken.add_sample(0.2, false);
        broken.add_sample(1.0, true);
        base.merge(&broken);
        assert_eq!(base.streak, 1);
        assert_eq!(base.count, 4);
    }

    #[test]
    fn test_convergence_threshold() {
        let mut fitness = Fitness::new();
        for _ in 0..3 {
            fitness.add_sample(1.0, true);
        }
        assert!(fitness.has_converged(3));
        assert!(!fitness.has_converged(4));
        assert!(!fitness.has_converged(0));
    }
}
