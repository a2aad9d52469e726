#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative state management for the gacha simulator.

mod collation;
mod repository;

use std::collections::HashSet;

use gacha_sim_core::{
    default_gacha_name, Category, CategoryId, Command, Event, Gacha, GachaId, Operation, Prize,
    PrizeId, Rejection, StateSnapshot, Target,
};
use tracing::{debug, info, warn};

use repository::{Record, Repository};

/// Represents the authoritative gacha simulator state.
#[derive(Clone, Debug)]
pub struct World {
    gachas: Repository<GachaRecord>,
    current: Option<GachaId>,
}

impl World {
    /// Creates an empty world without any gacha.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gachas: Repository::new(),
            current: None,
        }
    }

    /// Rebuilds a world from persisted state, repairing anything that would
    /// break the data model invariants.
    ///
    /// Missing sentinel categories and targets are re-inserted, prizes that
    /// reference a deleted category move to the sentinel category, entries
    /// with repeated ids keep their first occurrence, and a stale selection
    /// falls back to the first gacha.
    #[must_use]
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let mut repairs = 0usize;
        let (gachas, dropped) = Repository::from_entries(
            snapshot
                .gacha_list
                .into_iter()
                .map(|gacha| GachaRecord::restore(gacha, &mut repairs)),
        );
        if dropped > 0 {
            warn!(dropped, "discarded gachas with repeated ids");
            repairs += dropped;
        }

        let current = match snapshot.current_gacha_id {
            Some(id) if gachas.contains(&id) => Some(id),
            stale => {
                let fallback = gachas.first().map(|gacha| gacha.id.clone());
                if stale.is_some() {
                    warn!(?stale, ?fallback, "selected gacha no longer exists");
                    repairs += 1;
                }
                fallback
            }
        };

        info!(gachas = gachas.len(), repairs, "world restored from snapshot");
        Self { gachas, current }
    }

    fn gacha(&self, id: &GachaId) -> Result<&GachaRecord, Rejection> {
        self.gachas.retrieve(id).ok_or(Rejection::UnknownGacha)
    }

    fn gacha_mut(&mut self, id: &GachaId) -> Result<&mut GachaRecord, Rejection> {
        self.gachas.retrieve_mut(id).ok_or(Rejection::UnknownGacha)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
struct GachaRecord {
    id: GachaId,
    name: String,
    prizes: Repository<Prize>,
    categories: Repository<Category>,
    targets: Repository<Target>,
    history: Repository<Operation>,
}

impl Record for GachaRecord {
    type Id = GachaId;
    const MISSING: Rejection = Rejection::UnknownGacha;

    fn id(&self) -> &GachaId {
        &self.id
    }
}

impl GachaRecord {
    fn new(id: GachaId, name: String) -> Self {
        Self::restore(Gacha::new(id, name), &mut 0)
    }

    fn restore(gacha: Gacha, repairs: &mut usize) -> Self {
        let Gacha {
            id,
            name,
            targets,
            prizes,
            categories,
            operation_history,
        } = gacha;

        let (mut categories, dropped_categories) = Repository::from_entries(categories);
        let (mut targets, dropped_targets) = Repository::from_entries(targets);
        let (mut prizes, dropped_prizes) = Repository::from_entries(prizes);
        let (history, dropped_operations) = Repository::from_entries(operation_history);
        let dropped = dropped_categories + dropped_targets + dropped_prizes + dropped_operations;
        if dropped > 0 {
            warn!(gacha = %id, dropped, "discarded entries with repeated ids");
            *repairs += dropped;
        }

        if categories.create_first(Category::sentinel()).is_ok() {
            debug!(gacha = %id, "inserted sentinel category");
            *repairs += 1;
        }
        // Saved fallback targets may carry any id, so only an empty list is repaired.
        if targets.is_empty() {
            let _ = targets.create(Target::sentinel());
            debug!(gacha = %id, "inserted sentinel target");
            *repairs += 1;
        }

        for prize in prizes.iter_mut() {
            if !categories.contains(&prize.category_id) {
                warn!(
                    gacha = %id,
                    prize = %prize.id,
                    category = %prize.category_id,
                    "prize referenced a missing category"
                );
                prize.category_id = CategoryId::sentinel();
                *repairs += 1;
            }
        }

        Self {
            id,
            name,
            prizes,
            categories,
            targets,
            history,
        }
    }

    fn to_gacha(&self) -> Gacha {
        Gacha {
            id: self.id.clone(),
            name: self.name.clone(),
            targets: self.targets.as_slice().to_vec(),
            prizes: self.prizes.as_slice().to_vec(),
            categories: self.categories.as_slice().to_vec(),
            operation_history: self.history.as_slice().to_vec(),
        }
    }

    fn ensure_category(&self, category: &CategoryId) -> Result<(), Rejection> {
        if self.categories.contains(category) {
            Ok(())
        } else {
            Err(Rejection::UnknownCategory)
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Rejected commands leave the world untouched and produce a single
/// [`Event::CommandRejected`].
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    let gacha = addressed_gacha(&command);
    let label = command_label(&command);
    match execute(world, command, out_events) {
        Ok(()) => debug!(command = label, "command applied"),
        Err(reason) => {
            warn!(command = label, %reason, "command rejected");
            out_events.push(Event::CommandRejected { gacha, reason });
        }
    }
}

fn execute(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), Rejection> {
    match command {
        Command::CreateGacha { id, name } => {
            let name = match name {
                Some(name) if !is_blank(&name) => name,
                _ => default_gacha_name(world.gachas.len()),
            };
            world
                .gachas
                .create(GachaRecord::new(id.clone(), name.clone()))?;
            out_events.push(Event::GachaCreated {
                gacha: id.clone(),
                name,
            });
            if world.current.is_none() {
                world.current = Some(id.clone());
                out_events.push(Event::CurrentGachaChanged { gacha: Some(id) });
            }
        }
        Command::RenameGacha { gacha, name } => {
            let record = world.gacha_mut(&gacha)?;
            ensure_named(&name)?;
            record.name = name.clone();
            out_events.push(Event::GachaRenamed { gacha, name });
        }
        Command::DeleteGacha { gacha } => {
            let _ = world.gachas.delete(&gacha)?;
            out_events.push(Event::GachaDeleted {
                gacha: gacha.clone(),
            });
            if world.current.as_ref() == Some(&gacha) {
                world.current = world.gachas.first().map(|record| record.id.clone());
                out_events.push(Event::CurrentGachaChanged {
                    gacha: world.current.clone(),
                });
            }
        }
        Command::SelectGacha { gacha } => {
            let _ = world.gacha(&gacha)?;
            world.current = Some(gacha.clone());
            out_events.push(Event::CurrentGachaChanged { gacha: Some(gacha) });
        }
        Command::AddPrizes { gacha, prizes } => {
            let record = world.gacha_mut(&gacha)?;
            let mut incoming: HashSet<&PrizeId> = HashSet::with_capacity(prizes.len());
            for prize in &prizes {
                ensure_named(&prize.name)?;
                record.ensure_category(&prize.category_id)?;
                if record.prizes.contains(&prize.id) || !incoming.insert(&prize.id) {
                    return Err(Rejection::DuplicateId);
                }
            }
            let ids: Vec<PrizeId> = prizes.iter().map(|prize| prize.id.clone()).collect();
            for prize in prizes {
                record.prizes.create(prize)?;
            }
            out_events.push(Event::PrizesAdded { gacha, prizes: ids });
        }
        Command::UpdatePrize { gacha, prize } => {
            let record = world.gacha_mut(&gacha)?;
            if !record.prizes.contains(&prize.id) {
                return Err(Rejection::UnknownPrize);
            }
            ensure_named(&prize.name)?;
            record.ensure_category(&prize.category_id)?;
            let id = prize.id.clone();
            let _ = record.prizes.update(prize)?;
            out_events.push(Event::PrizeUpdated { gacha, prize: id });
        }
        Command::RemovePrizes { gacha, prizes } => {
            let record = world.gacha_mut(&gacha)?;
            if prizes.iter().any(|id| !record.prizes.contains(id)) {
                return Err(Rejection::UnknownPrize);
            }
            let requested: HashSet<&PrizeId> = prizes.iter().collect();
            let removed = record
                .prizes
                .delete_where(|prize| requested.contains(&prize.id))
                .into_iter()
                .map(|prize| prize.id)
                .collect();
            out_events.push(Event::PrizesRemoved {
                gacha,
                prizes: removed,
            });
        }
        Command::RemovePrizesNamed { gacha, names } => {
            let record = world.gacha_mut(&gacha)?;
            let requested: HashSet<&str> = names.iter().map(String::as_str).collect();
            let removed = record
                .prizes
                .delete_where(|prize| requested.contains(prize.name.as_str()))
                .into_iter()
                .map(|prize| prize.id)
                .collect();
            out_events.push(Event::PrizesRemoved {
                gacha,
                prizes: removed,
            });
        }
        Command::AddCategory { gacha, category } => {
            let record = world.gacha_mut(&gacha)?;
            ensure_named(&category.name)?;
            let id = category.id.clone();
            record.categories.create(category)?;
            out_events.push(Event::CategoryAdded {
                gacha,
                category: id,
            });
        }
        Command::RenameCategory {
            gacha,
            category,
            name,
        } => {
            let record = world.gacha_mut(&gacha)?;
            if category.is_sentinel() {
                return Err(Rejection::ProtectedSentinel);
            }
            ensure_named(&name)?;
            let entry = record
                .categories
                .retrieve_mut(&category)
                .ok_or(Rejection::UnknownCategory)?;
            entry.name = name.clone();
            out_events.push(Event::CategoryRenamed {
                gacha,
                category,
                name,
            });
        }
        Command::RemoveCategory { gacha, category } => {
            let record = world.gacha_mut(&gacha)?;
            if category.is_sentinel() {
                return Err(Rejection::ProtectedSentinel);
            }
            let _ = record.categories.delete(&category)?;
            let mut reassigned = Vec::new();
            for prize in record
                .prizes
                .iter_mut()
                .filter(|prize| prize.category_id == category)
            {
                prize.category_id = CategoryId::sentinel();
                reassigned.push(prize.id.clone());
            }
            out_events.push(Event::CategoryRemoved {
                gacha,
                category,
                reassigned,
            });
        }
        Command::AddTarget { gacha, target } => {
            let record = world.gacha_mut(&gacha)?;
            ensure_named(&target.name)?;
            let id = target.id.clone();
            record.targets.create(target)?;
            out_events.push(Event::TargetAdded { gacha, target: id });
        }
        Command::RenameTarget {
            gacha,
            target,
            name,
        } => {
            let record = world.gacha_mut(&gacha)?;
            if target.is_sentinel() {
                return Err(Rejection::ProtectedSentinel);
            }
            ensure_named(&name)?;
            let entry = record
                .targets
                .retrieve_mut(&target)
                .ok_or(Rejection::UnknownTarget)?;
            entry.name = name.clone();
            out_events.push(Event::TargetRenamed {
                gacha,
                target,
                name,
            });
        }
        Command::RemoveTarget { gacha, target } => {
            let record = world.gacha_mut(&gacha)?;
            if target.is_sentinel() {
                return Err(Rejection::ProtectedSentinel);
            }
            let _ = record.targets.delete(&target)?;
            if record.targets.is_empty() {
                let _ = record.targets.create(Target::sentinel());
                debug!(gacha = %gacha, "target list emptied; sentinel restored");
            }
            out_events.push(Event::TargetRemoved { gacha, target });
        }
        Command::RecordOperation { gacha, operation } => {
            let record = world.gacha_mut(&gacha)?;
            let id = operation.id().clone();
            let requested = operation.count();
            let performed = operation.performed();
            record.history.create(operation)?;
            out_events.push(Event::OperationRecorded {
                gacha,
                operation: id,
                requested,
                performed,
            });
        }
        Command::UndoOperation { gacha, operation } => {
            let record = world.gacha_mut(&gacha)?;
            let _ = record.history.delete(&operation)?;
            out_events.push(Event::OperationUndone { gacha, operation });
        }
        Command::ClearHistory { gacha } => {
            let record = world.gacha_mut(&gacha)?;
            let removed = record.history.clear();
            out_events.push(Event::HistoryCleared { gacha, removed });
        }
    }
    Ok(())
}

fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}

fn ensure_named(name: &str) -> Result<(), Rejection> {
    if is_blank(name) {
        Err(Rejection::BlankName)
    } else {
        Ok(())
    }
}

fn addressed_gacha(command: &Command) -> Option<GachaId> {
    match command {
        Command::CreateGacha { id: gacha, .. }
        | Command::RenameGacha { gacha, .. }
        | Command::DeleteGacha { gacha }
        | Command::SelectGacha { gacha }
        | Command::AddPrizes { gacha, .. }
        | Command::UpdatePrize { gacha, .. }
        | Command::RemovePrizes { gacha, .. }
        | Command::RemovePrizesNamed { gacha, .. }
        | Command::AddCategory { gacha, .. }
        | Command::RenameCategory { gacha, .. }
        | Command::RemoveCategory { gacha, .. }
        | Command::AddTarget { gacha, .. }
        | Command::RenameTarget { gacha, .. }
        | Command::RemoveTarget { gacha, .. }
        | Command::RecordOperation { gacha, .. }
        | Command::UndoOperation { gacha, .. }
        | Command::ClearHistory { gacha } => Some(gacha.clone()),
    }
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::CreateGacha { .. } => "create_gacha",
        Command::RenameGacha { .. } => "rename_gacha",
        Command::DeleteGacha { .. } => "delete_gacha",
        Command::SelectGacha { .. } => "select_gacha",
        Command::AddPrizes { .. } => "add_prizes",
        Command::UpdatePrize { .. } => "update_prize",
        Command::RemovePrizes { .. } => "remove_prizes",
        Command::RemovePrizesNamed { .. } => "remove_prizes_named",
        Command::AddCategory { .. } => "add_category",
        Command::RenameCategory { .. } => "rename_category",
        Command::RemoveCategory { .. } => "remove_category",
        Command::AddTarget { .. } => "add_target",
        Command::RenameTarget { .. } => "rename_target",
        Command::RemoveTarget { .. } => "remove_target",
        Command::RecordOperation { .. } => "record_operation",
        Command::UndoOperation { .. } => "undo_operation",
        Command::ClearHistory { .. } => "clear_history",
    }
}

/// Ordering applied when listing prizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrizeOrder {
    /// Order in which the prizes were added.
    #[default]
    Insertion,
    /// Natural order of prize names.
    Name(SortDirection),
    /// Category name, with uncategorised prizes after every category; ties
    /// fall back to ascending prize name.
    Category(SortDirection),
}

/// Direction of the primary sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::cmp::{Ordering, Reverse};

    use super::{collation::natural_cmp, GachaRecord, PrizeOrder, World};
    use gacha_sim_core::{
        Category, CategoryId, Gacha, GachaId, Operation, Prize, StateSnapshot, Target, TargetId,
        SENTINEL_NAME,
    };

    /// Captures the complete state for persistence.
    #[must_use]
    pub fn snapshot(world: &World) -> StateSnapshot {
        StateSnapshot {
            gacha_list: world.gachas.iter().map(GachaRecord::to_gacha).collect(),
            current_gacha_id: world.current.clone(),
        }
    }

    /// Identifier of the gacha the user is working with, if any exists.
    #[must_use]
    pub fn current_gacha_id(world: &World) -> Option<&GachaId> {
        world.current.as_ref()
    }

    /// Lists every gacha in creation order.
    #[must_use]
    pub fn gachas(world: &World) -> Vec<GachaSummary> {
        world
            .gachas
            .iter()
            .map(|record| GachaSummary {
                id: record.id.clone(),
                name: record.name.clone(),
                prizes: record.prizes.len(),
                operations: record.history.len(),
                current: world.current.as_ref() == Some(&record.id),
            })
            .collect()
    }

    /// Captures an owned copy of a single gacha.
    #[must_use]
    pub fn gacha(world: &World, id: &GachaId) -> Option<Gacha> {
        world.gachas.retrieve(id).map(GachaRecord::to_gacha)
    }

    /// Prize pool of the gacha in insertion order.
    #[must_use]
    pub fn prizes<'a>(world: &'a World, id: &GachaId) -> Option<&'a [Prize]> {
        world
            .gachas
            .retrieve(id)
            .map(|record| record.prizes.as_slice())
    }

    /// Categories of the gacha in insertion order.
    #[must_use]
    pub fn categories<'a>(world: &'a World, id: &GachaId) -> Option<&'a [Category]> {
        world
            .gachas
            .retrieve(id)
            .map(|record| record.categories.as_slice())
    }

    /// Draw targets of the gacha in insertion order.
    #[must_use]
    pub fn targets<'a>(world: &'a World, id: &GachaId) -> Option<&'a [Target]> {
        world
            .gachas
            .retrieve(id)
            .map(|record| record.targets.as_slice())
    }

    /// Target a draw is attributed to when none is named: the first target,
    /// or the sentinel when the gacha has none.
    #[must_use]
    pub fn default_target(world: &World, id: &GachaId) -> TargetId {
        targets(world, id)
            .and_then(<[Target]>::first)
            .map_or_else(TargetId::sentinel, |target| target.id.clone())
    }

    /// History log of the gacha in insertion order.
    #[must_use]
    pub fn history<'a>(world: &'a World, id: &GachaId) -> Option<&'a [Operation]> {
        world
            .gachas
            .retrieve(id)
            .map(|record| record.history.as_slice())
    }

    /// History records ordered newest first, optionally restricted to one
    /// target. Records sharing a timestamp keep their insertion order.
    #[must_use]
    pub fn history_newest_first<'a>(
        world: &'a World,
        id: &GachaId,
        filter: Option<&TargetId>,
    ) -> Option<Vec<&'a Operation>> {
        let mut records: Vec<&Operation> = history(world, id)?
            .iter()
            .filter(|operation| filter.map_or(true, |target| operation.target() == target))
            .collect();
        records.sort_by_key(|operation| Reverse(operation.timestamp()));
        Some(records)
    }

    /// Display name for a target id, falling back to the sentinel name when
    /// the target no longer exists.
    #[must_use]
    pub fn target_name<'a>(world: &'a World, id: &GachaId, target: &TargetId) -> &'a str {
        world
            .gachas
            .retrieve(id)
            .and_then(|record| record.targets.retrieve(target))
            .map_or(SENTINEL_NAME, |target| target.name.as_str())
    }

    /// Display name for a category id, falling back to the sentinel name when
    /// the category no longer exists.
    #[must_use]
    pub fn category_name<'a>(world: &'a World, id: &GachaId, category: &CategoryId) -> &'a str {
        world
            .gachas
            .retrieve(id)
            .and_then(|record| record.categories.retrieve(category))
            .map_or(SENTINEL_NAME, |category| category.name.as_str())
    }

    /// Prize pool arranged for display.
    #[must_use]
    pub fn sorted_prizes<'a>(
        world: &'a World,
        id: &GachaId,
        order: PrizeOrder,
    ) -> Option<Vec<&'a Prize>> {
        let record = world.gachas.retrieve(id)?;
        let mut prizes: Vec<&Prize> = record.prizes.iter().collect();
        match order {
            PrizeOrder::Insertion => {}
            PrizeOrder::Name(direction) => {
                prizes.sort_by(|a, b| direction.apply(natural_cmp(&a.name, &b.name)));
            }
            PrizeOrder::Category(direction) => {
                let category_name = |prize: &Prize| {
                    record
                        .categories
                        .retrieve(&prize.category_id)
                        .map_or("", |category| category.name.as_str())
                };
                prizes.sort_by(|a, b| {
                    let primary = match (a.category_id.is_sentinel(), b.category_id.is_sentinel())
                    {
                        (true, false) => Ordering::Greater,
                        (false, true) => Ordering::Less,
                        _ => natural_cmp(category_name(a), category_name(b)),
                    };
                    direction
                        .apply(primary)
                        .then_with(|| natural_cmp(&a.name, &b.name))
                });
            }
        }
        Some(prizes)
    }

    /// Summary of a gacha used for listings.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct GachaSummary {
        /// Identity of the gacha.
        pub id: GachaId,
        /// Display name of the gacha.
        pub name: String,
        /// Number of prizes in the pool.
        pub prizes: usize,
        /// Number of records in the history log.
        pub operations: usize,
        /// Whether the gacha is the selected one.
        pub current: bool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gacha_sim_core::{
        DrawCount, DrawResults, OperationId, OperationStamp, TargetId, Timestamp, Weight,
        SENTINEL_NAME,
    };

    fn gacha_id() -> GachaId {
        GachaId::new("g1")
    }

    fn world_with_gacha() -> World {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::CreateGacha {
                id: gacha_id(),
                name: Some("Stream".to_owned()),
            },
            &mut events,
        );
        world
    }

    fn prize(id: &str, name: &str) -> Prize {
        Prize::new(PrizeId::new(id), name, Weight::new(1.0).expect("weight"))
    }

    fn operation(id: &str, millis: i64, target: &str, results: &[(&str, u32)]) -> Operation {
        Operation::new(
            OperationStamp::new(OperationId::new(id), Timestamp::from_millis(millis)),
            DrawCount::ONE,
            results
                .iter()
                .map(|(prize, wins)| (PrizeId::new(*prize), *wins))
                .collect::<DrawResults>(),
            TargetId::new(target),
        )
    }

    fn run(world: &mut World, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, command, &mut events);
        events
    }

    #[test]
    fn first_gacha_becomes_current_with_sentinels() {
        let mut world = World::new();
        let events = run(
            &mut world,
            Command::CreateGacha {
                id: gacha_id(),
                name: None,
            },
        );

        assert_eq!(
            events,
            vec![
                Event::GachaCreated {
                    gacha: gacha_id(),
                    name: "ガチャの種類 1".to_owned(),
                },
                Event::CurrentGachaChanged {
                    gacha: Some(gacha_id()),
                },
            ]
        );
        assert_eq!(query::current_gacha_id(&world), Some(&gacha_id()));
        let categories = query::categories(&world, &gacha_id()).expect("gacha");
        assert_eq!(categories, &[Category::sentinel()]);
        let targets = query::targets(&world, &gacha_id()).expect("gacha");
        assert_eq!(targets, &[Target::sentinel()]);
    }

    #[test]
    fn second_gacha_does_not_steal_selection() {
        let mut world = world_with_gacha();
        let events = run(
            &mut world,
            Command::CreateGacha {
                id: GachaId::new("g2"),
                name: Some("  ".to_owned()),
            },
        );
        assert_eq!(
            events,
            vec![Event::GachaCreated {
                gacha: GachaId::new("g2"),
                name: "ガチャの種類 2".to_owned(),
            }]
        );
        assert_eq!(query::current_gacha_id(&world), Some(&gacha_id()));
    }

    #[test]
    fn deleting_current_gacha_selects_first_remaining() {
        let mut world = world_with_gacha();
        let _ = run(
            &mut world,
            Command::CreateGacha {
                id: GachaId::new("g2"),
                name: None,
            },
        );
        let events = run(&mut world, Command::DeleteGacha { gacha: gacha_id() });
        assert_eq!(
            events.last(),
            Some(&Event::CurrentGachaChanged {
                gacha: Some(GachaId::new("g2")),
            })
        );

        let events = run(
            &mut world,
            Command::DeleteGacha {
                gacha: GachaId::new("g2"),
            },
        );
        assert_eq!(
            events.last(),
            Some(&Event::CurrentGachaChanged { gacha: None })
        );
        assert!(query::gachas(&world).is_empty());
    }

    #[test]
    fn add_prizes_is_all_or_nothing() {
        let mut world = world_with_gacha();
        let events = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![prize("a", "A"), prize("b", " ")],
            },
        );
        assert_eq!(
            events,
            vec![Event::CommandRejected {
                gacha: Some(gacha_id()),
                reason: Rejection::BlankName,
            }]
        );
        assert!(query::prizes(&world, &gacha_id())
            .expect("gacha")
            .is_empty());

        let events = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![prize("a", "A"), prize("a", "Again")],
            },
        );
        assert!(matches!(
            events.as_slice(),
            [Event::CommandRejected {
                reason: Rejection::DuplicateId,
                ..
            }]
        ));
    }

    #[test]
    fn prize_with_unknown_category_is_rejected() {
        let mut world = world_with_gacha();
        let events = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![prize("a", "A").with_category(CategoryId::new("ghost"))],
            },
        );
        assert!(matches!(
            events.as_slice(),
            [Event::CommandRejected {
                reason: Rejection::UnknownCategory,
                ..
            }]
        ));
    }

    #[test]
    fn update_prize_replaces_fields() {
        let mut world = world_with_gacha();
        let _ = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![prize("a", "A")],
            },
        );
        let replacement = prize("a", "Acrylic").with_limit(Some(3));
        let events = run(
            &mut world,
            Command::UpdatePrize {
                gacha: gacha_id(),
                prize: replacement.clone(),
            },
        );
        assert_eq!(
            events,
            vec![Event::PrizeUpdated {
                gacha: gacha_id(),
                prize: PrizeId::new("a"),
            }]
        );
        assert_eq!(
            query::prizes(&world, &gacha_id()).expect("gacha"),
            &[replacement]
        );
    }

    #[test]
    fn removing_prizes_keeps_history_intact() {
        let mut world = world_with_gacha();
        let _ = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![prize("a", "A"), prize("b", "B")],
            },
        );
        let _ = run(
            &mut world,
            Command::RecordOperation {
                gacha: gacha_id(),
                operation: operation("op", 1, "none", &[("a", 1)]),
            },
        );
        let events = run(
            &mut world,
            Command::RemovePrizes {
                gacha: gacha_id(),
                prizes: vec![PrizeId::new("a")],
            },
        );
        assert_eq!(
            events,
            vec![Event::PrizesRemoved {
                gacha: gacha_id(),
                prizes: vec![PrizeId::new("a")],
            }]
        );
        assert_eq!(query::history(&world, &gacha_id()).expect("gacha").len(), 1);

        let events = run(
            &mut world,
            Command::RemovePrizes {
                gacha: gacha_id(),
                prizes: vec![PrizeId::new("b"), PrizeId::new("a")],
            },
        );
        assert!(matches!(
            events.as_slice(),
            [Event::CommandRejected {
                reason: Rejection::UnknownPrize,
                ..
            }]
        ));
        assert_eq!(query::prizes(&world, &gacha_id()).expect("gacha").len(), 1);
    }

    #[test]
    fn remove_prizes_named_matches_exact_names() {
        let mut world = world_with_gacha();
        let _ = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![
                    prize("1", "Card1"),
                    prize("2", "Card2"),
                    prize("3", "Card3"),
                    prize("4", "Badge"),
                ],
            },
        );
        let events = run(
            &mut world,
            Command::RemovePrizesNamed {
                gacha: gacha_id(),
                names: vec!["Card1".to_owned(), "Card2".to_owned(), "Card9".to_owned()],
            },
        );
        assert_eq!(
            events,
            vec![Event::PrizesRemoved {
                gacha: gacha_id(),
                prizes: vec![PrizeId::new("1"), PrizeId::new("2")],
            }]
        );
        let names: Vec<_> = query::prizes(&world, &gacha_id())
            .expect("gacha")
            .iter()
            .map(|prize| prize.name.as_str())
            .collect();
        assert_eq!(names, vec!["Card3", "Badge"]);
    }

    #[test]
    fn removing_category_moves_prizes_to_sentinel() {
        let mut world = world_with_gacha();
        let goods = CategoryId::new("goods");
        let _ = run(
            &mut world,
            Command::AddCategory {
                gacha: gacha_id(),
                category: Category::new(goods.clone(), "Goods"),
            },
        );
        let _ = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![
                    prize("a", "A").with_category(goods.clone()),
                    prize("b", "B"),
                ],
            },
        );
        let events = run(
            &mut world,
            Command::RemoveCategory {
                gacha: gacha_id(),
                category: goods.clone(),
            },
        );
        assert_eq!(
            events,
            vec![Event::CategoryRemoved {
                gacha: gacha_id(),
                category: goods,
                reassigned: vec![PrizeId::new("a")],
            }]
        );
        assert!(query::prizes(&world, &gacha_id())
            .expect("gacha")
            .iter()
            .all(|prize| prize.category_id.is_sentinel()));
    }

    #[test]
    fn sentinels_are_protected() {
        let mut world = world_with_gacha();
        for command in [
            Command::RemoveCategory {
                gacha: gacha_id(),
                category: CategoryId::sentinel(),
            },
            Command::RenameCategory {
                gacha: gacha_id(),
                category: CategoryId::sentinel(),
                name: "Other".to_owned(),
            },
            Command::RemoveTarget {
                gacha: gacha_id(),
                target: TargetId::sentinel(),
            },
            Command::RenameTarget {
                gacha: gacha_id(),
                target: TargetId::sentinel(),
                name: "Other".to_owned(),
            },
        ] {
            let events = run(&mut world, command);
            assert_eq!(
                events,
                vec![Event::CommandRejected {
                    gacha: Some(gacha_id()),
                    reason: Rejection::ProtectedSentinel,
                }]
            );
        }
        assert_eq!(
            query::targets(&world, &gacha_id()).expect("gacha"),
            &[Target::sentinel()]
        );
    }

    #[test]
    fn deleted_target_name_falls_back_to_sentinel() {
        let mut world = world_with_gacha();
        let alice = TargetId::new("alice");
        let _ = run(
            &mut world,
            Command::AddTarget {
                gacha: gacha_id(),
                target: Target::new(alice.clone(), "Alice"),
            },
        );
        assert_eq!(query::target_name(&world, &gacha_id(), &alice), "Alice");

        let _ = run(
            &mut world,
            Command::RemoveTarget {
                gacha: gacha_id(),
                target: alice.clone(),
            },
        );
        assert_eq!(
            query::target_name(&world, &gacha_id(), &alice),
            SENTINEL_NAME
        );
        assert_eq!(
            query::category_name(&world, &gacha_id(), &CategoryId::new("gone")),
            SENTINEL_NAME
        );
    }

    #[test]
    fn undo_and_clear_remove_whole_records() {
        let mut world = world_with_gacha();
        for (id, millis) in [("op1", 10), ("op2", 20), ("op3", 30)] {
            let events = run(
                &mut world,
                Command::RecordOperation {
                    gacha: gacha_id(),
                    operation: operation(id, millis, "none", &[("a", 1)]),
                },
            );
            assert!(matches!(
                events.as_slice(),
                [Event::OperationRecorded {
                    requested: 1,
                    performed: 1,
                    ..
                }]
            ));
        }

        let events = run(
            &mut world,
            Command::UndoOperation {
                gacha: gacha_id(),
                operation: OperationId::new("op2"),
            },
        );
        assert_eq!(
            events,
            vec![Event::OperationUndone {
                gacha: gacha_id(),
                operation: OperationId::new("op2"),
            }]
        );

        let events = run(
            &mut world,
            Command::UndoOperation {
                gacha: gacha_id(),
                operation: OperationId::new("op2"),
            },
        );
        assert!(matches!(
            events.as_slice(),
            [Event::CommandRejected {
                reason: Rejection::UnknownOperation,
                ..
            }]
        ));

        let events = run(&mut world, Command::ClearHistory { gacha: gacha_id() });
        assert_eq!(
            events,
            vec![Event::HistoryCleared {
                gacha: gacha_id(),
                removed: 2,
            }]
        );
    }

    #[test]
    fn history_is_listed_newest_first_with_stable_ties() {
        let mut world = world_with_gacha();
        for (id, millis, target) in [
            ("old", 10, "none"),
            ("tie-a", 50, "alice"),
            ("tie-b", 50, "none"),
            ("new", 90, "alice"),
        ] {
            let _ = run(
                &mut world,
                Command::RecordOperation {
                    gacha: gacha_id(),
                    operation: operation(id, millis, target, &[]),
                },
            );
        }

        let ids: Vec<_> = query::history_newest_first(&world, &gacha_id(), None)
            .expect("gacha")
            .into_iter()
            .map(|operation| operation.id().as_str().to_owned())
            .collect();
        assert_eq!(ids, vec!["new", "tie-a", "tie-b", "old"]);

        let alice = TargetId::new("alice");
        let ids: Vec<_> = query::history_newest_first(&world, &gacha_id(), Some(&alice))
            .expect("gacha")
            .into_iter()
            .map(|operation| operation.id().as_str().to_owned())
            .collect();
        assert_eq!(ids, vec!["new", "tie-a"]);
    }

    #[test]
    fn category_order_places_uncategorised_last() {
        let mut world = world_with_gacha();
        let _ = run(
            &mut world,
            Command::AddCategory {
                gacha: gacha_id(),
                category: Category::new(CategoryId::new("b"), "Badges"),
            },
        );
        let _ = run(
            &mut world,
            Command::AddCategory {
                gacha: gacha_id(),
                category: Category::new(CategoryId::new("a"), "Acrylic"),
            },
        );
        let _ = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![
                    prize("1", "Loose"),
                    prize("2", "Pin 10").with_category(CategoryId::new("b")),
                    prize("3", "Pin 9").with_category(CategoryId::new("b")),
                    prize("4", "Stand").with_category(CategoryId::new("a")),
                ],
            },
        );

        let names = |order| -> Vec<String> {
            query::sorted_prizes(&world, &gacha_id(), order)
                .expect("gacha")
                .into_iter()
                .map(|prize| prize.name.clone())
                .collect()
        };

        assert_eq!(
            names(PrizeOrder::Category(SortDirection::Ascending)),
            vec!["Stand", "Pin 9", "Pin 10", "Loose"]
        );
        assert_eq!(
            names(PrizeOrder::Category(SortDirection::Descending)),
            vec!["Loose", "Pin 9", "Pin 10", "Stand"]
        );
        assert_eq!(
            names(PrizeOrder::Name(SortDirection::Ascending)),
            vec!["Loose", "Pin 9", "Pin 10", "Stand"]
        );
        assert_eq!(
            names(PrizeOrder::Insertion),
            vec!["Loose", "Pin 10", "Pin 9", "Stand"]
        );
    }

    #[test]
    fn snapshot_restores_equivalent_world() {
        let mut world = world_with_gacha();
        let _ = run(
            &mut world,
            Command::AddPrizes {
                gacha: gacha_id(),
                prizes: vec![prize("a", "A")],
            },
        );
        let _ = run(
            &mut world,
            Command::RecordOperation {
                gacha: gacha_id(),
                operation: operation("op", 5, "none", &[("a", 1)]),
            },
        );
        let snapshot = query::snapshot(&world);
        let restored = World::from_snapshot(snapshot.clone());
        assert_eq!(query::snapshot(&restored), snapshot);
    }

    #[test]
    fn from_snapshot_repairs_invariants() {
        let legacy = Gacha {
            id: gacha_id(),
            name: "Legacy".to_owned(),
            targets: Vec::new(),
            prizes: vec![prize("a", "A").with_category(CategoryId::new("deleted"))],
            categories: Vec::new(),
            operation_history: Vec::new(),
        };
        let world = World::from_snapshot(StateSnapshot {
            gacha_list: vec![legacy],
            current_gacha_id: Some(GachaId::new("stale")),
        });

        assert_eq!(query::current_gacha_id(&world), Some(&gacha_id()));
        let gacha = query::gacha(&world, &gacha_id()).expect("gacha");
        assert_eq!(gacha.categories, vec![Category::sentinel()]);
        assert_eq!(gacha.targets, vec![Target::sentinel()]);
        assert!(gacha.prizes[0].category_id.is_sentinel());
    }

    #[test]
    fn saved_fallback_target_with_foreign_id_is_kept_as_is() {
        let fallback = Target::new(TargetId::new("3f0c6b9e-uuid"), SENTINEL_NAME);
        let saved = Gacha {
            id: gacha_id(),
            name: "Saved".to_owned(),
            targets: vec![fallback.clone()],
            prizes: vec![prize("a", "A")],
            categories: vec![Category::sentinel()],
            operation_history: vec![operation("op", 1, "3f0c6b9e-uuid", &[("a", 1)])],
        };
        let snapshot = StateSnapshot {
            gacha_list: vec![saved],
            current_gacha_id: Some(gacha_id()),
        };

        let world = World::from_snapshot(snapshot.clone());
        assert_eq!(query::targets(&world, &gacha_id()), Some(&[fallback.clone()][..]));
        assert_eq!(query::default_target(&world, &gacha_id()), fallback.id);
        assert_eq!(query::snapshot(&world), snapshot);
    }

    #[test]
    fn removing_the_last_target_restores_the_sentinel() {
        let foreign = TargetId::new("3f0c6b9e-uuid");
        let world_snapshot = StateSnapshot {
            gacha_list: vec![Gacha {
                id: gacha_id(),
                name: "Saved".to_owned(),
                targets: vec![Target::new(foreign.clone(), SENTINEL_NAME)],
                prizes: Vec::new(),
                categories: vec![Category::sentinel()],
                operation_history: Vec::new(),
            }],
            current_gacha_id: Some(gacha_id()),
        };
        let mut world = World::from_snapshot(world_snapshot);

        let events = run(
            &mut world,
            Command::RemoveTarget {
                gacha: gacha_id(),
                target: foreign.clone(),
            },
        );
        assert_eq!(
            events,
            vec![Event::TargetRemoved {
                gacha: gacha_id(),
                target: foreign,
            }]
        );
        assert_eq!(
            query::targets(&world, &gacha_id()),
            Some(&[Target::sentinel()][..])
        );
        assert_eq!(query::default_target(&world, &gacha_id()), TargetId::sentinel());
    }

    #[test]
    fn unknown_gacha_is_rejected_without_side_effects() {
        let mut world = world_with_gacha();
        let before = query::snapshot(&world);
        let events = run(
            &mut world,
            Command::ClearHistory {
                gacha: GachaId::new("missing"),
            },
        );
        assert_eq!(
            events,
            vec![Event::CommandRejected {
                gacha: Some(GachaId::new("missing")),
                reason: Rejection::UnknownGacha,
            }]
        );
        assert_eq!(query::snapshot(&world), before);
    }
}
