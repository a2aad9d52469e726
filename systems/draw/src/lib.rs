#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Weighted draw system that samples prizes under global draw limits.
//!
//! Each individual draw walks the current candidate list, accumulating
//! weights until the running sum exceeds a uniform sample taken from
//! `[0, total)`. Prizes whose limit is reached leave the candidate list
//! immediately, so later draws in the same batch never overshoot a limit.

use gacha_sim_core::{
    Aggregation, DrawCount, DrawResults, Operation, OperationStamp, Prize, TargetId,
};
use gacha_sim_system_aggregation::overall;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Result of one batch of draws.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawOutcome {
    /// Wins per prize.
    pub results: DrawResults,
    /// Number of individual draws that produced a prize.
    pub performed: u64,
}

/// Runs up to `count` draws against `prizes`, updating `counts` as prizes win.
///
/// `counts` must hold the cumulative wins across every target as the batch
/// begins. The batch stops early once no candidate remains or the remaining
/// candidates carry no weight.
pub fn draw_batch<R>(
    prizes: &[Prize],
    counts: &mut Aggregation,
    count: DrawCount,
    rng: &mut R,
) -> DrawOutcome
where
    R: Rng + ?Sized,
{
    let mut running: Vec<u64> = prizes.iter().map(|prize| counts.get(&prize.id)).collect();
    let mut candidates: Vec<usize> = (0..prizes.len())
        .filter(|&index| prizes[index].admits(running[index]))
        .collect();
    let mut wheel = Wheel::new(prizes, &candidates);
    let mut outcome = DrawOutcome::default();

    for _ in 0..count.get() {
        if candidates.is_empty() || wheel.total <= 0.0 {
            break;
        }

        let sample = rng.gen::<f64>() * wheel.total;
        let Some(index) = select(prizes, &candidates, wheel.scale, sample) else {
            continue;
        };

        let prize = &prizes[index];
        running[index] = running[index].saturating_add(1);
        let _ = counts.add(&prize.id, 1);
        outcome.results.record(&prize.id);
        outcome.performed += 1;

        if !prize.admits(running[index]) {
            candidates.retain(|&candidate| candidate != index);
            wheel = Wheel::new(prizes, &candidates);
        }
    }

    debug!(
        requested = count.get(),
        performed = outcome.performed,
        remaining_candidates = candidates.len(),
        "batch drawn"
    );
    outcome
}

/// Draws a batch and packages it as an immutable history record.
///
/// Limits are checked against the overall aggregation of `history`, not the
/// per-target one. The record keeps the requested count even when fewer draws
/// were performed.
pub fn draw<R>(
    prizes: &[Prize],
    history: &[Operation],
    count: DrawCount,
    target: TargetId,
    stamp: OperationStamp,
    rng: &mut R,
) -> Operation
where
    R: Rng + ?Sized,
{
    let mut counts = overall(prizes, history);
    let outcome = draw_batch(prizes, &mut counts, count, rng);
    Operation::new(stamp, count, outcome.results, target)
}

/// Candidate weights measured in units of the largest one, so the total of
/// any finite weights stays finite.
struct Wheel {
    scale: f64,
    total: f64,
}

impl Wheel {
    fn new(prizes: &[Prize], candidates: &[usize]) -> Self {
        let scale = candidates
            .iter()
            .map(|&index| prizes[index].weight.get())
            .fold(0.0, f64::max);
        let total = if scale > 0.0 {
            candidates
                .iter()
                .map(|&index| prizes[index].weight.get() / scale)
                .sum()
        } else {
            0.0
        };
        Self { scale, total }
    }
}

fn select(prizes: &[Prize], candidates: &[usize], scale: f64, sample: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    for &index in candidates {
        cumulative += prizes[index].weight.get() / scale;
        if sample < cumulative {
            return Some(index);
        }
    }
    None
}

/// Owns the random source used for draws.
#[derive(Clone, Debug)]
pub struct DrawEngine<R> {
    rng: R,
}

impl<R: Rng> DrawEngine<R> {
    /// Wraps an existing random source.
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws a batch against the current history and returns the new record.
    pub fn draw(
        &mut self,
        prizes: &[Prize],
        history: &[Operation],
        count: DrawCount,
        target: TargetId,
        stamp: OperationStamp,
    ) -> Operation {
        draw(prizes, history, count, target, stamp, &mut self.rng)
    }
}

impl DrawEngine<ChaCha8Rng> {
    /// Creates an engine whose draws are fully determined by `seed`.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}
