//! Record sampling strategies
//!
//! All strategies return ascending index lists so downstream inference sees
//! records in their original order regardless of how they were drawn. The
//! RNG is injected by the caller, which makes `random` and `stratified`
//! reproducible under a fixed seed.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// How to select a bounded subset of records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleStrategy {
    /// The initial N records
    #[default]
    First,
    /// N distinct indices drawn uniformly without replacement
    Random,
    /// min(1000, N) from the front plus a random draw from the tail,
    /// covering both early records and the long tail
    Stratified,
}

/// Number of head records the stratified strategy always keeps.
const STRATIFIED_HEAD: usize = 1000;

/// Build the RNG for a run: seeded when reproducibility is required,
/// system entropy otherwise.
pub fn rng_for_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Select up to `sample_size` indices out of `total` using `strategy`.
///
/// The result is sorted ascending and contains no duplicates.
pub fn select_indices(
    strategy: SampleStrategy,
    total: usize,
    sample_size: usize,
    rng: &mut StdRng,
) -> Vec<usize> {
    if sample_size == 0 || total == 0 {
        return Vec::new();
    }
    if total <= sample_size {
        return (0..total).collect();
    }

    match strategy {
        SampleStrategy::First => (0..sample_size).collect(),
        SampleStrategy::Random => {
            let mut indices = rand::seq::index::sample(rng, total, sample_size).into_vec();
            indices.sort_unstable();
            indices
        }
        SampleStrategy::Stratified => {
            let head = STRATIFIED_HEAD.min(sample_size);
            let mut indices: Vec<usize> = (0..head).collect();

            let remainder = sample_size - head;
            let tail_len = total - head;
            if remainder > 0 && tail_len > 0 {
                let draw = remainder.min(tail_len);
                let tail = rand::seq::index::sample(rng, tail_len, draw);
                indices.extend(tail.into_iter().map(|i| i + head));
            }
            indices.sort_unstable();
            indices
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_takes_initial_n() {
        let mut rng = rng_for_seed(Some(7));
        assert_eq!(
            select_indices(SampleStrategy::First, 10, 3, &mut rng),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_small_input_returns_everything() {
        let mut rng = rng_for_seed(Some(7));
        for strategy in [
            SampleStrategy::First,
            SampleStrategy::Random,
            SampleStrategy::Stratified,
        ] {
            assert_eq!(select_indices(strategy, 4, 10, &mut rng), vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_random_is_distinct_and_seeded() {
        let mut rng1 = rng_for_seed(Some(42));
        let mut rng2 = rng_for_seed(Some(42));
        let a = select_indices(SampleStrategy::Random, 1000, 50, &mut rng1);
        let b = select_indices(SampleStrategy::Random, 1000, 50, &mut rng2);
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);

        let mut seen = std::collections::BTreeSet::new();
        for i in &a {
            assert!(*i < 1000);
            assert!(seen.insert(*i), "duplicate index {}", i);
        }
    }

    #[test]
    fn test_random_different_seeds_differ() {
        let mut rng1 = rng_for_seed(Some(1));
        let mut rng2 = rng_for_seed(Some(2));
        let a = select_indices(SampleStrategy::Random, 10_000, 100, &mut rng1);
        let b = select_indices(SampleStrategy::Random, 10_000, 100, &mut rng2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stratified_covers_head_and_tail() {
        let mut rng = rng_for_seed(Some(9));
        let indices = select_indices(SampleStrategy::Stratified, 10_000, 1500, &mut rng);
        assert_eq!(indices.len(), 1500);
        // head is always present
        assert!(indices.iter().take(1000).eq((0..1000).collect::<Vec<_>>().iter()));
        // the remainder comes from the tail
        assert!(indices[1000..].iter().all(|i| *i >= 1000));
    }

    #[test]
    fn test_stratified_small_sample_is_head_only() {
        let mut rng = rng_for_seed(Some(9));
        let indices = select_indices(SampleStrategy::Stratified, 5000, 200, &mut rng);
        assert_eq!(indices, (0..200).collect::<Vec<_>>());
    }
}
