//! Turns parsed requests into world commands and renders their outcome.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::Utc;
use gacha_sim_core::{
    Category, CategoryId, Command, DrawCount, Event, GachaId, OperationId, OperationStamp, Prize,
    PrizeId, PrizeSeries, SeriesRange, Target, TargetId, Timestamp, Weight,
};
use gacha_sim_system_aggregation::{
    for_target, format_fixed_trimmed, overall, preview_relative_probability, total_weight,
};
use gacha_sim_system_draw::DrawEngine;
use gacha_sim_world::{apply, query, PrizeOrder, SortDirection, World};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    args::{CategoryRequest, GachaRequest, PrizeRequest, PrizeSettings, Request, SortKey, TargetRequest},
    render,
    store::StateStore,
    transfer::GachaTransfer,
};

const PREVIEW_DIGITS: usize = 4;

/// One invocation's view of the persisted state.
pub(crate) struct Session<S> {
    store: S,
    world: World,
    engine: DrawEngine<ChaCha8Rng>,
    dirty: bool,
}

impl<S: StateStore> Session<S> {
    /// Loads the saved state and seeds the random source, drawing a seed from
    /// the operating system when none is configured.
    pub(crate) fn open(store: S, seed: Option<u64>) -> Result<Self> {
        let snapshot = store.load().context("failed to load saved state")?;
        let seed = seed.unwrap_or_else(rand::random);
        info!(seed, "draw engine seeded");
        Ok(Self {
            store,
            world: World::from_snapshot(snapshot),
            engine: DrawEngine::seeded(seed),
            dirty: false,
        })
    }

    /// Persists the state when any command changed it.
    pub(crate) fn finish(self) -> Result<()> {
        if !self.dirty {
            debug!("state unchanged; skipping save");
            return Ok(());
        }
        self.store
            .save(&query::snapshot(&self.world))
            .context("failed to save state")
    }

    /// Executes one request. `gacha` names the gacha to operate on instead of
    /// the selected one.
    pub(crate) fn run(&mut self, request: Request, gacha: Option<&str>) -> Result<String> {
        match request {
            Request::Gacha(request) => self.run_gacha(request),
            Request::Prize(request) => {
                let gacha = self.working_gacha(gacha)?;
                self.run_prize(gacha, request)
            }
            Request::Category(request) => {
                let gacha = self.working_gacha(gacha)?;
                self.run_category(gacha, request)
            }
            Request::Target(request) => {
                let gacha = self.working_gacha(gacha)?;
                self.run_target(gacha, request)
            }
            Request::Draw { count, target } => {
                let gacha = self.working_gacha(gacha)?;
                let count = DrawCount::parse_or_default(count.as_deref().unwrap_or_default());
                self.draw(gacha, count, target.as_deref())
            }
            Request::Results { target, hide_zero } => {
                let gacha = self.working_gacha(gacha)?;
                self.results(&gacha, target.as_deref(), hide_zero)
            }
            Request::History { target } => {
                let gacha = self.working_gacha(gacha)?;
                self.history(&gacha, target.as_deref())
            }
            Request::Undo { id } => {
                let gacha = self.working_gacha(gacha)?;
                let _ = self.submit(Command::UndoOperation {
                    gacha,
                    operation: OperationId::new(id.as_str()),
                })?;
                Ok(format!("removed history record {id}\n"))
            }
            Request::Clear => {
                let gacha = self.working_gacha(gacha)?;
                let events = self.submit(Command::ClearHistory { gacha })?;
                let removed = events
                    .iter()
                    .find_map(|event| match event {
                        Event::HistoryCleared { removed, .. } => Some(*removed),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(format!("removed {removed} history records\n"))
            }
            Request::Export => {
                let gacha = self.working_gacha(gacha)?;
                let gacha = query::gacha(&self.world, &gacha).context("selected gacha vanished")?;
                let encoded = GachaTransfer::from_gacha(&gacha)
                    .encode()
                    .context("failed to export gacha")?;
                Ok(format!("{encoded}\n"))
            }
            Request::Import { payload } => self.import(&payload),
        }
    }

    fn run_gacha(&mut self, request: GachaRequest) -> Result<String> {
        match request {
            GachaRequest::Create { name } => {
                let id = GachaId::new(fresh_id());
                let events = self.submit(Command::CreateGacha {
                    id: id.clone(),
                    name,
                })?;
                let name = events
                    .iter()
                    .find_map(|event| match event {
                        Event::GachaCreated { name, .. } => Some(name.as_str()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(format!("created gacha {id} ({name})\n"))
            }
            GachaRequest::List => Ok(render::gacha_list(&query::gachas(&self.world))),
            GachaRequest::Rename { gacha, name } => {
                let gacha = self.resolve_gacha(&gacha)?;
                let _ = self.submit(Command::RenameGacha {
                    gacha: gacha.clone(),
                    name: name.clone(),
                })?;
                Ok(format!("renamed gacha {gacha} to {name}\n"))
            }
            GachaRequest::Delete { gacha } => {
                let gacha = self.resolve_gacha(&gacha)?;
                let _ = self.submit(Command::DeleteGacha {
                    gacha: gacha.clone(),
                })?;
                let mut out = format!("deleted gacha {gacha}\n");
                match query::current_gacha_id(&self.world) {
                    Some(current) => {
                        let _ = writeln!(out, "selected gacha is now {current}");
                    }
                    None => out.push_str("no gachas remain\n"),
                }
                Ok(out)
            }
            GachaRequest::Select { gacha } => {
                let gacha = self.resolve_gacha(&gacha)?;
                let _ = self.submit(Command::SelectGacha {
                    gacha: gacha.clone(),
                })?;
                Ok(format!("selected gacha {gacha}\n"))
            }
        }
    }

    fn run_prize(&mut self, gacha: GachaId, request: PrizeRequest) -> Result<String> {
        match request {
            PrizeRequest::Add { name, settings } => {
                let (weight, category) = self.prize_settings(&gacha, &settings)?;
                let prize = Prize::new(PrizeId::new(fresh_id()), name, weight)
                    .with_limit(settings.limit)
                    .with_category(category);
                let preview = self.preview(&gacha, weight, 1);
                let id = prize.id.clone();
                let _ = self.submit(Command::AddPrizes {
                    gacha,
                    prizes: vec![prize],
                })?;
                Ok(format!("added prize {id} at {preview}% of the pool\n"))
            }
            PrizeRequest::Series {
                stem,
                first,
                last,
                settings,
            } => {
                let range = SeriesRange::new(first, last)?;
                let (weight, category_id) = self.prize_settings(&gacha, &settings)?;
                let series = PrizeSeries {
                    stem,
                    range,
                    weight,
                    limit: settings.limit,
                    category_id,
                };
                let preview = self.preview(&gacha, weight, range.len());
                let prizes = series.expand(|| PrizeId::new(fresh_id()));
                let added = prizes.len();
                let _ = self.submit(Command::AddPrizes { gacha, prizes })?;
                Ok(format!(
                    "added {added} prizes {stem}{first} to {stem}{last}, each at {preview}% of the pool\n",
                    stem = series.stem
                ))
            }
            PrizeRequest::Update {
                id,
                name,
                weight,
                limit,
                no_limit,
                category,
            } => {
                let id = PrizeId::new(id);
                let mut prize = query::prizes(&self.world, &gacha)
                    .and_then(|prizes| prizes.iter().find(|prize| prize.id == id))
                    .cloned()
                    .with_context(|| format!("no prize with id {id}"))?;
                if let Some(name) = name {
                    prize.name = name;
                }
                if let Some(weight) = weight {
                    prize.weight = Weight::new(weight)?;
                }
                if no_limit {
                    prize.limit = None;
                } else if limit.is_some() {
                    prize.limit = limit;
                }
                if let Some(category) = category {
                    prize.category_id = self.resolve_category(&gacha, &category)?;
                }
                let _ = self.submit(Command::UpdatePrize { gacha, prize })?;
                Ok(format!("updated prize {id}\n"))
            }
            PrizeRequest::Remove { ids } => {
                let prizes: Vec<PrizeId> = ids.into_iter().map(PrizeId::new).collect();
                let removed = prizes.len();
                let _ = self.submit(Command::RemovePrizes { gacha, prizes })?;
                Ok(format!("removed {removed} prizes\n"))
            }
            PrizeRequest::RemoveSeries { stem, first, last } => {
                let names = SeriesRange::new(first, last)?.names(&stem);
                let events = self.submit(Command::RemovePrizesNamed { gacha, names })?;
                let removed = events
                    .iter()
                    .find_map(|event| match event {
                        Event::PrizesRemoved { prizes, .. } => Some(prizes.len()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(format!("removed {removed} prizes\n"))
            }
            PrizeRequest::List { sort, desc } => {
                let direction = if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                };
                let order = match sort {
                    None => PrizeOrder::Insertion,
                    Some(SortKey::Name) => PrizeOrder::Name(direction),
                    Some(SortKey::Category) => PrizeOrder::Category(direction),
                };
                Ok(render::prize_table(&self.world, &gacha, order))
            }
        }
    }

    fn run_category(&mut self, gacha: GachaId, request: CategoryRequest) -> Result<String> {
        match request {
            CategoryRequest::Add { name } => {
                let id = CategoryId::new(fresh_id());
                let _ = self.submit(Command::AddCategory {
                    gacha,
                    category: Category::new(id.clone(), name),
                })?;
                Ok(format!("added category {id}\n"))
            }
            CategoryRequest::Rename { category, name } => {
                let category = self.resolve_category(&gacha, &category)?;
                let _ = self.submit(Command::RenameCategory {
                    gacha,
                    category: category.clone(),
                    name,
                })?;
                Ok(format!("renamed category {category}\n"))
            }
            CategoryRequest::Remove { category } => {
                let category = self.resolve_category(&gacha, &category)?;
                let events = self.submit(Command::RemoveCategory {
                    gacha,
                    category: category.clone(),
                })?;
                let reassigned = events
                    .iter()
                    .find_map(|event| match event {
                        Event::CategoryRemoved { reassigned, .. } => Some(reassigned.len()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(format!(
                    "removed category {category}; {reassigned} prizes are now uncategorised\n"
                ))
            }
            CategoryRequest::List => {
                let categories = query::categories(&self.world, &gacha).unwrap_or_default();
                Ok(render::entry_list(
                    categories
                        .iter()
                        .map(|category| (category.id.as_str(), category.name.as_str())),
                ))
            }
        }
    }

    fn run_target(&mut self, gacha: GachaId, request: TargetRequest) -> Result<String> {
        match request {
            TargetRequest::Add { name } => {
                let id = TargetId::new(fresh_id());
                let _ = self.submit(Command::AddTarget {
                    gacha,
                    target: Target::new(id.clone(), name),
                })?;
                Ok(format!("added target {id}\n"))
            }
            TargetRequest::Rename { target, name } => {
                let target = self.resolve_target(&gacha, &target)?;
                let _ = self.submit(Command::RenameTarget {
                    gacha,
                    target: target.clone(),
                    name,
                })?;
                Ok(format!("renamed target {target}\n"))
            }
            TargetRequest::Remove { target } => {
                let target = self.resolve_target(&gacha, &target)?;
                let _ = self.submit(Command::RemoveTarget {
                    gacha,
                    target: target.clone(),
                })?;
                Ok(format!("removed target {target}; its history is kept\n"))
            }
            TargetRequest::List => {
                let targets = query::targets(&self.world, &gacha).unwrap_or_default();
                Ok(render::entry_list(
                    targets
                        .iter()
                        .map(|target| (target.id.as_str(), target.name.as_str())),
                ))
            }
        }
    }

    fn draw(&mut self, gacha: GachaId, count: DrawCount, target: Option<&str>) -> Result<String> {
        let target = match target {
            Some(reference) => self.resolve_target(&gacha, reference)?,
            None => query::default_target(&self.world, &gacha),
        };
        let prizes = query::prizes(&self.world, &gacha).unwrap_or_default();
        let history = query::history(&self.world, &gacha).unwrap_or_default();
        let stamp = OperationStamp::new(OperationId::new(fresh_id()), now());
        let operation = self.engine.draw(prizes, history, count, target, stamp);

        let mut out = render::history_entry(&self.world, &gacha, &operation);
        if operation.performed() < u64::from(count.get()) {
            out.push_str("the pool ran out of drawable prizes before the batch finished\n");
        }
        let _ = self.submit(Command::RecordOperation { gacha, operation })?;
        Ok(out)
    }

    fn results(&self, gacha: &GachaId, target: Option<&str>, hide_zero: bool) -> Result<String> {
        let prizes = query::prizes(&self.world, gacha).unwrap_or_default();
        let history = query::history(&self.world, gacha).unwrap_or_default();

        if let Some(reference) = target {
            let target = self.resolve_target(gacha, reference)?;
            let aggregation = for_target(prizes, history, &target);
            return Ok(render::aggregation_table(prizes, &aggregation, hide_zero));
        }

        let mut out = String::from("overall\n");
        out.push_str(&render::aggregation_table(
            prizes,
            &overall(prizes, history),
            hide_zero,
        ));
        for target in query::targets(&self.world, gacha).unwrap_or_default() {
            let _ = writeln!(out, "\n{}", target.name);
            out.push_str(&render::aggregation_table(
                prizes,
                &for_target(prizes, history, &target.id),
                hide_zero,
            ));
        }
        Ok(out)
    }

    fn history(&self, gacha: &GachaId, target: Option<&str>) -> Result<String> {
        let filter = target
            .map(|reference| self.resolve_target(gacha, reference))
            .transpose()?;
        let records =
            query::history_newest_first(&self.world, gacha, filter.as_ref()).unwrap_or_default();
        if records.is_empty() {
            return Ok("no draws recorded\n".to_owned());
        }
        Ok(records
            .into_iter()
            .map(|operation| render::history_entry(&self.world, gacha, operation))
            .collect())
    }

    fn import(&mut self, payload: &str) -> Result<String> {
        let transfer = GachaTransfer::decode(payload).context("failed to import gacha")?;
        let id = GachaId::new(fresh_id());
        let prizes = transfer.prizes.len();
        for command in transfer.into_commands(id.clone(), fresh_id) {
            let _ = self.submit(command)?;
        }
        Ok(format!("imported gacha {id} with {prizes} prizes\n"))
    }

    /// Applies a command, turning a rejection into an error.
    fn submit(&mut self, command: Command) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        apply(&mut self.world, command, &mut events);
        let rejection = events.iter().find_map(|event| match event {
            Event::CommandRejected { reason, .. } => Some(*reason),
            _ => None,
        });
        if let Some(reason) = rejection {
            return Err(anyhow::Error::new(reason).context("command rejected"));
        }
        self.dirty = true;
        Ok(events)
    }

    fn working_gacha(&self, reference: Option<&str>) -> Result<GachaId> {
        match reference {
            Some(reference) => self.resolve_gacha(reference),
            None => query::current_gacha_id(&self.world)
                .cloned()
                .context("no gacha selected; create one with `gacha create`"),
        }
    }

    fn resolve_gacha(&self, reference: &str) -> Result<GachaId> {
        let summaries = query::gachas(&self.world);
        find_entry(&summaries, reference, |summary| (summary.id.as_str(), summary.name.as_str()))
            .map(|summary| summary.id.clone())
            .with_context(|| format!("no gacha called '{reference}'"))
    }

    fn resolve_category(&self, gacha: &GachaId, reference: &str) -> Result<CategoryId> {
        let categories = query::categories(&self.world, gacha).unwrap_or_default();
        find_entry(categories, reference, |category| {
            (category.id.as_str(), category.name.as_str())
        })
        .map(|category| category.id.clone())
        .with_context(|| format!("no category called '{reference}'"))
    }

    fn resolve_target(&self, gacha: &GachaId, reference: &str) -> Result<TargetId> {
        let targets = query::targets(&self.world, gacha).unwrap_or_default();
        find_entry(targets, reference, |target| (target.id.as_str(), target.name.as_str()))
            .map(|target| target.id.clone())
            .with_context(|| format!("no target called '{reference}'"))
    }

    fn prize_settings(&self, gacha: &GachaId, settings: &PrizeSettings) -> Result<(Weight, CategoryId)> {
        let weight = Weight::new(settings.weight)?;
        let category = match &settings.category {
            Some(reference) => self.resolve_category(gacha, reference)?,
            None => CategoryId::sentinel(),
        };
        Ok((weight, category))
    }

    /// Formatted share each of `copies` new prizes would carry once added.
    fn preview(&self, gacha: &GachaId, weight: Weight, copies: u64) -> String {
        let total = query::prizes(&self.world, gacha).map_or(0.0, total_weight);
        format_fixed_trimmed(
            preview_relative_probability(total, weight.get(), copies),
            PREVIEW_DIGITS,
        )
    }
}

/// Matches by id first, then by exact name.
fn find_entry<'a, T>(
    entries: &'a [T],
    reference: &str,
    key: impl Fn(&T) -> (&str, &str),
) -> Option<&'a T> {
    entries
        .iter()
        .find(|entry| key(entry).0 == reference)
        .or_else(|| entries.iter().find(|entry| key(entry).1 == reference))
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn now() -> Timestamp {
    Timestamp::from_millis(Utc::now().timestamp_millis())
}
