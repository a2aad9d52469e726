//! Plain-text views printed by the command-line adapter.

use std::fmt::Write as _;

use chrono::DateTime;
use gacha_sim_core::{Aggregation, GachaId, Operation, Prize, Timestamp};
use gacha_sim_system_aggregation::{format_fixed_trimmed, relative_probability, total_weight};
use gacha_sim_world::{query, query::GachaSummary, PrizeOrder, World};

const PROBABILITY_DIGITS: usize = 4;

pub(crate) fn gacha_list(summaries: &[GachaSummary]) -> String {
    if summaries.is_empty() {
        return "no gachas yet\n".to_owned();
    }
    let mut out = String::new();
    for summary in summaries {
        let marker = if summary.current { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {}  {}  ({} prizes, {} draws recorded)",
            summary.id, summary.name, summary.prizes, summary.operations
        );
    }
    out
}

/// Id and name pairs, one per line.
pub(crate) fn entry_list<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (id, name) in entries {
        let _ = writeln!(out, "{id:<38}  {name}");
    }
    out
}

/// Prize pool with weights, relative probabilities, limits, and categories.
pub(crate) fn prize_table(world: &World, gacha: &GachaId, order: PrizeOrder) -> String {
    let Some(prizes) = query::sorted_prizes(world, gacha, order) else {
        return String::new();
    };
    let total = query::prizes(world, gacha).map_or(0.0, total_weight);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<38}  {:<20}  {:>8}  {:>10}  {:>6}  category",
        "id", "name", "weight", "relative %", "limit"
    );
    for prize in prizes {
        let limit = prize
            .limit
            .map_or_else(|| "-".to_owned(), |limit| limit.to_string());
        let _ = writeln!(
            out,
            "{:<38}  {:<20}  {:>8}  {:>10}  {:>6}  {}",
            prize.id,
            prize.name,
            prize.weight,
            relative_label(prize, total),
            limit,
            query::category_name(world, gacha, &prize.category_id)
        );
    }
    out
}

/// Counts per prize in pool order, optionally hiding prizes never drawn.
pub(crate) fn aggregation_table(prizes: &[Prize], aggregation: &Aggregation, hide_zero: bool) -> String {
    let total = total_weight(prizes);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20}  {:>8}  {:>10}  {:>6}",
        "name", "weight", "relative %", "count"
    );
    for prize in prizes {
        let count = aggregation.get(&prize.id);
        if hide_zero && count == 0 {
            continue;
        }
        let _ = writeln!(
            out,
            "{:<20}  {:>8}  {:>10}  {:>6}",
            prize.name,
            prize.weight,
            relative_label(prize, total),
            count
        );
    }
    out
}

/// One history record: header line followed by the wins of every prize that
/// still exists.
pub(crate) fn history_entry(world: &World, gacha: &GachaId, operation: &Operation) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  {}  {} draws requested, {} performed  target: {}",
        format_timestamp(operation.timestamp()),
        operation.id(),
        operation.count(),
        operation.performed(),
        query::target_name(world, gacha, operation.target())
    );
    for prize in query::prizes(world, gacha).unwrap_or_default() {
        if let Some(wins) = operation.results().get(&prize.id) {
            let _ = writeln!(out, "    {}: {wins}", prize.name);
        }
    }
    out
}

pub(crate) fn format_timestamp(timestamp: Timestamp) -> String {
    DateTime::from_timestamp_millis(timestamp.as_millis()).map_or_else(
        || timestamp.as_millis().to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn relative_label(prize: &Prize, total: f64) -> String {
    relative_probability(prize.weight.get(), total).map_or_else(
        || "0.00".to_owned(),
        |percent| format_fixed_trimmed(percent, PROBABILITY_DIGITS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gacha_sim_core::{
        Command, DrawCount, DrawResults, OperationId, OperationStamp, PrizeId, TargetId, Weight,
    };
    use gacha_sim_world::apply;

    fn prize(id: &str, name: &str, weight: f64) -> Prize {
        Prize::new(PrizeId::new(id), name, Weight::new(weight).expect("weight"))
    }

    fn world_with_prizes() -> (World, GachaId) {
        let gacha = GachaId::new("g");
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::CreateGacha {
                id: gacha.clone(),
                name: Some("Stream".to_owned()),
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::AddPrizes {
                gacha: gacha.clone(),
                prizes: vec![prize("a", "Acrylic", 1.0), prize("b", "Badge", 2.0)],
            },
            &mut events,
        );
        (world, gacha)
    }

    #[test]
    fn entry_list_aligns_names() {
        let listing = entry_list([("none", "なし"), ("c1", "Goods")]);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("c1 "));
        assert!(lines[1].ends_with("  Goods"));
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(
            format_timestamp(Timestamp::from_millis(0)),
            "1970-01-01 00:00:00 UTC"
        );
    }

    #[test]
    fn prize_table_shows_trimmed_percentages() {
        let (world, gacha) = world_with_prizes();
        let table = prize_table(&world, &gacha, PrizeOrder::Insertion);
        assert!(table.contains("33.3333"), "{table}");
        assert!(table.contains("66.6667"), "{table}");
        assert!(table.contains("なし"), "{table}");
    }

    #[test]
    fn aggregation_table_can_hide_zero_rows() {
        let prizes = vec![prize("a", "Acrylic", 1.0), prize("b", "Badge", 0.0)];
        let mut aggregation = Aggregation::seeded(&prizes);
        let _ = aggregation.add(&PrizeId::new("a"), 2);

        let shown = aggregation_table(&prizes, &aggregation, false);
        assert!(shown.contains("Badge"));
        let hidden = aggregation_table(&prizes, &aggregation, true);
        assert!(!hidden.contains("Badge"));
        assert!(hidden.contains("Acrylic"));
    }

    #[test]
    fn weightless_pool_shows_placeholder_percentage() {
        let prizes = vec![prize("a", "Acrylic", 0.0)];
        let table = aggregation_table(&prizes, &Aggregation::seeded(&prizes), false);
        assert!(table.contains("0.00"), "{table}");
    }

    #[test]
    fn history_entry_skips_deleted_prizes_and_targets() {
        let (world, gacha) = world_with_prizes();
        let operation = Operation::new(
            OperationStamp::new(OperationId::new("op"), Timestamp::from_millis(0)),
            DrawCount::FIVE,
            [(PrizeId::new("a"), 2), (PrizeId::new("gone"), 1)]
                .into_iter()
                .collect::<DrawResults>(),
            TargetId::new("deleted-target"),
        );

        let entry = history_entry(&world, &gacha, &operation);
        assert!(entry.contains("5 draws requested, 3 performed"), "{entry}");
        assert!(entry.contains("target: なし"), "{entry}");
        assert!(entry.contains("Acrylic: 2"), "{entry}");
        assert!(!entry.contains("gone"), "{entry}");
    }
}
