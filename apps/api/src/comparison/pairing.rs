//! Pair Selector policy.
//!
//! Candidate pairs are ranked by, in order:
//! 1. the higher comparison count of the two members (lowest bucket first),
//! 2. the absolute rating difference (closest match first),
//! 3. the pair's ids (deterministic tie-break).
//!
//! Pairs already in the comparison log are never offered. Pairs reserved by
//! another session are skipped; a pair reserved by the requesting session
//! itself stays eligible.
//!
//! Buckets are visited in ascending order. Within a bucket, pairs are
//! enumerated lazily by rating gap from a min-heap over the rating-sorted
//! members, so the cost tracks the number of compared or reserved pairs
//! skipped rather than the N(N-1)/2 pairs in the pool.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::models::applicant::Applicant;
use crate::models::comparison::PairKey;

/// Why no pair could be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPair {
    /// Every unordered pair in the pool has already been compared.
    Exhausted,
    /// Unseen pairs exist but all of them are reserved by other sessions.
    AllReserved,
}

/// Picks the next pair to present, or explains why there is none.
///
/// `compared` must only hold pairs drawn from `applicants`.
pub fn select_pair(
    applicants: &[Applicant],
    compared: &HashSet<PairKey>,
    reserved_by_others: &HashSet<PairKey>,
) -> Result<PairKey, NoPair> {
    let mut by_rating: Vec<&Applicant> = applicants.iter().collect();
    by_rating.sort_by(|a, b| a.rating.total_cmp(&b.rating).then_with(|| a.id.cmp(&b.id)));

    let mut levels: Vec<i32> = applicants.iter().map(|a| a.comparisons).collect();
    levels.sort_unstable();
    levels.dedup();

    // Every pair whose members both sit below `level` was already rejected
    // at a lower level, so any open pair found here belongs to this bucket.
    for level in levels {
        let members: Vec<&Applicant> = by_rating
            .iter()
            .copied()
            .filter(|a| a.comparisons <= level)
            .collect();
        if let Some(pair) = closest_open_pair(&members, compared, reserved_by_others) {
            return Ok(pair);
        }
    }

    if compared.len() < max_pairs(applicants.len()) {
        Err(NoPair::AllReserved)
    } else {
        Err(NoPair::Exhausted)
    }
}

/// A pair of positions in the rating-sorted member list.
#[derive(Debug, Clone, Copy)]
struct GapEntry {
    gap: f64,
    pair: PairKey,
    lo: usize,
    hi: usize,
}

impl Ord for GapEntry {
    // Reversed so `BinaryHeap` pops the smallest gap, then the smallest pair.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .gap
            .total_cmp(&self.gap)
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

impl PartialOrd for GapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GapEntry {}

/// Closest-rated pair among `sorted` (ascending rating) that is neither
/// compared nor reserved; ties on gap go to the smaller `PairKey`.
fn closest_open_pair(
    sorted: &[&Applicant],
    compared: &HashSet<PairKey>,
    reserved: &HashSet<PairKey>,
) -> Option<PairKey> {
    let entry = |lo: usize, hi: usize| GapEntry {
        gap: sorted[hi].rating - sorted[lo].rating,
        pair: PairKey::new(sorted[lo].id, sorted[hi].id),
        lo,
        hi,
    };

    let mut heap: BinaryHeap<GapEntry> = (1..sorted.len()).map(|hi| entry(hi - 1, hi)).collect();
    let mut best: Option<GapEntry> = None;

    while let Some(next) = heap.pop() {
        if let Some(found) = best {
            if next.gap.total_cmp(&found.gap) == Ordering::Greater {
                break;
            }
        }
        if next.hi + 1 < sorted.len() {
            heap.push(entry(next.lo, next.hi + 1));
        }
        if compared.contains(&next.pair) || reserved.contains(&next.pair) {
            continue;
        }
        // Equal gaps can surface out of pair order; keep the smallest.
        if best.map_or(true, |found| next.pair < found.pair) {
            best = Some(next);
        }
    }

    best.map(|found| found.pair)
}

/// Number of unordered pairs a pool of `n` applicants can form.
pub fn max_pairs(n: usize) -> usize {
    n.saturating_mul(n.saturating_sub(1)) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::applicant::ApplicantProfile;
    use uuid::Uuid;

    fn applicant(n: u128, rating: f64, comparisons: i32) -> Applicant {
        let mut a = Applicant::new(
            Uuid::from_u128(100),
            ApplicantProfile::placeholder(n as usize),
            rating,
        );
        a.id = Uuid::from_u128(n);
        a.wins = comparisons;
        a.comparisons = comparisons;
        a
    }

    fn key(a: u128, b: u128) -> PairKey {
        PairKey::new(Uuid::from_u128(a), Uuid::from_u128(b))
    }

    #[test]
    fn test_prefers_lowest_comparison_bucket() {
        let pool = vec![
            applicant(1, 1500.0, 3),
            applicant(2, 1500.0, 3),
            applicant(3, 1400.0, 0),
            applicant(4, 1600.0, 0),
        ];
        let pair = select_pair(&pool, &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(pair, key(3, 4));
    }

    #[test]
    fn test_prefers_closest_rating_within_bucket() {
        let pool = vec![
            applicant(1, 1500.0, 1),
            applicant(2, 1700.0, 1),
            applicant(3, 1510.0, 1),
            applicant(4, 1300.0, 1),
        ];
        let pair = select_pair(&pool, &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(pair, key(1, 3));
    }

    #[test]
    fn test_expands_bucket_when_lowest_has_one_member() {
        let pool = vec![
            applicant(1, 1500.0, 0),
            applicant(2, 1520.0, 2),
            applicant(3, 1800.0, 2),
            applicant(4, 1490.0, 4),
        ];
        let pair = select_pair(&pool, &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(pair, key(1, 2));
    }

    #[test]
    fn test_never_repeats_a_compared_pair() {
        let pool = vec![
            applicant(1, 1500.0, 1),
            applicant(2, 1500.0, 1),
            applicant(3, 1450.0, 0),
        ];
        let compared: HashSet<_> = [key(1, 2)].into_iter().collect();
        let pair = select_pair(&pool, &compared, &HashSet::new()).unwrap();
        assert_ne!(pair, key(1, 2));
    }

    #[test]
    fn test_skips_pairs_reserved_by_others() {
        let pool = vec![
            applicant(1, 1500.0, 0),
            applicant(2, 1500.0, 0),
            applicant(3, 1600.0, 0),
        ];
        let reserved: HashSet<_> = [key(1, 2)].into_iter().collect();
        let pair = select_pair(&pool, &HashSet::new(), &reserved).unwrap();
        assert_ne!(pair, key(1, 2));
    }

    #[test]
    fn test_all_reserved_is_distinct_from_exhausted() {
        let pool = vec![applicant(1, 1500.0, 0), applicant(2, 1500.0, 0)];
        let reserved: HashSet<_> = [key(1, 2)].into_iter().collect();
        assert_eq!(
            select_pair(&pool, &HashSet::new(), &reserved),
            Err(NoPair::AllReserved)
        );
        assert_eq!(
            select_pair(&pool, &reserved, &HashSet::new()),
            Err(NoPair::Exhausted)
        );
    }

    #[test]
    fn test_tiny_pools_are_exhausted() {
        assert_eq!(
            select_pair(&[], &HashSet::new(), &HashSet::new()),
            Err(NoPair::Exhausted)
        );
        let single = vec![applicant(1, 1500.0, 0)];
        assert_eq!(
            select_pair(&single, &HashSet::new(), &HashSet::new()),
            Err(NoPair::Exhausted)
        );
    }

    #[test]
    fn test_ties_break_on_ids() {
        let pool = vec![
            applicant(4, 1500.0, 0),
            applicant(3, 1500.0, 0),
            applicant(2, 1500.0, 0),
            applicant(1, 1500.0, 0),
        ];
        let pair = select_pair(&pool, &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(pair, key(1, 2));
    }

    /// Scores every pair in the pool; the selector must agree with it.
    fn select_exhaustively(
        applicants: &[Applicant],
        compared: &HashSet<PairKey>,
        reserved: &HashSet<PairKey>,
    ) -> Result<PairKey, NoPair> {
        let mut best: Option<(i32, f64, PairKey)> = None;
        let mut saw_unseen = false;
        for (i, a) in applicants.iter().enumerate() {
            for b in &applicants[i + 1..] {
                let pair = PairKey::new(a.id, b.id);
                if compared.contains(&pair) {
                    continue;
                }
                saw_unseen = true;
                if reserved.contains(&pair) {
                    continue;
                }
                let candidate = (a.comparisons.max(b.comparisons), (a.rating - b.rating).abs(), pair);
                let better = match best {
                    None => true,
                    Some((bucket, gap, key)) => candidate
                        .0
                        .cmp(&bucket)
                        .then_with(|| candidate.1.total_cmp(&gap))
                        .then_with(|| candidate.2.cmp(&key))
                        == Ordering::Less,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        match best {
            Some((_, _, pair)) => Ok(pair),
            None if saw_unseen => Err(NoPair::AllReserved),
            None => Err(NoPair::Exhausted),
        }
    }

    #[test]
    fn test_matches_exhaustive_scoring() {
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (seed >> 33) % bound
        };

        for round in 0..300 {
            let size = 2 + (round % 11) as u128;
            let pool: Vec<Applicant> = (1..=size)
                .map(|n| {
                    // Coarse ratings so gap ties are common.
                    let rating = 1400.0 + 25.0 * next(8) as f64;
                    applicant(n, rating, next(4) as i32)
                })
                .collect();
            let mut compared = HashSet::new();
            let mut reserved = HashSet::new();
            for (i, a) in pool.iter().enumerate() {
                for b in &pool[i + 1..] {
                    match next(10) {
                        0..=4 => {
                            compared.insert(PairKey::new(a.id, b.id));
                        }
                        5 => {
                            reserved.insert(PairKey::new(a.id, b.id));
                        }
                        _ => {}
                    }
                }
            }
            assert_eq!(
                select_pair(&pool, &compared, &reserved),
                select_exhaustively(&pool, &compared, &reserved),
                "round {round}"
            );
        }
    }

    #[test]
    fn test_large_pool_selects_without_scanning_every_pair() {
        let pool: Vec<Applicant> = (1..=5000u128)
            .map(|n| applicant(n, 1000.0 + (n as f64) * 0.5, 0))
            .collect();
        let compared: HashSet<_> = (1..5000u128).map(|n| key(n, n + 1)).collect();

        let started = std::time::Instant::now();
        let pair = select_pair(&pool, &compared, &HashSet::new()).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        // Every neighbour pair is taken, so the closest open gap is two apart.
        assert_eq!(pair, key(1, 3));
    }

    #[test]
    fn test_max_pairs() {
        assert_eq!(max_pairs(0), 0);
        assert_eq!(max_pairs(1), 0);
        assert_eq!(max_pairs(10), 45);
    }
}
