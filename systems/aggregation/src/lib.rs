#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure aggregation system that folds a draw history into per-prize counts.
//!
//! Counts are never cached beside the history log. Every view is recomputed
//! from the log on demand, so undoing or clearing history can never leave a
//! stale total behind.

mod probability;

use gacha_sim_core::{Aggregation, Operation, Prize, TargetId};

pub use probability::{format_fixed_trimmed, preview_relative_probability, relative_probability};

/// Folds the history into cumulative counts for every current prize.
///
/// Each prize in `prizes` is seeded at zero. When `filter` names a target only
/// records attributed to that target contribute. Results that reference a
/// prize missing from `prizes` are ignored.
#[must_use]
pub fn aggregate(prizes: &[Prize], history: &[Operation], filter: Option<&TargetId>) -> Aggregation {
    let mut aggregation = Aggregation::seeded(prizes);
    for operation in history
        .iter()
        .filter(|operation| filter.map_or(true, |target| operation.target() == target))
    {
        for (prize, wins) in operation.results().iter() {
            let _ = aggregation.add(prize, u64::from(wins));
        }
    }
    aggregation
}

/// Counts across every target. Draw limits are enforced against this view.
#[must_use]
pub fn overall(prizes: &[Prize], history: &[Operation]) -> Aggregation {
    aggregate(prizes, history, None)
}

/// Counts attributed to a single target.
#[must_use]
pub fn for_target(prizes: &[Prize], history: &[Operation], target: &TargetId) -> Aggregation {
    aggregate(prizes, history, Some(target))
}

/// Sum of every prize weight regardless of category or limit status.
#[must_use]
pub fn total_weight(prizes: &[Prize]) -> f64 {
    prizes.iter().map(|prize| prize.weight.get()).sum()
}
