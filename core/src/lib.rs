#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the gacha simulator.
//!
//! This crate defines the data model and the message surface that connects
//! adapters, the authoritative world, and the pure systems. Adapters submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! describing what changed. The aggregation and draw systems operate on plain
//! slices of [`Prize`] and [`Operation`] values and never touch storage.

use std::{collections::BTreeMap, fmt, num::NonZeroU32, ops::RangeInclusive};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier reserved for the sentinel category and the sentinel target.
pub const SENTINEL_ID: &str = "none";

/// Display name carried by the sentinel category and the sentinel target.
pub const SENTINEL_NAME: &str = "なし";

/// Prefix used when a gacha is created without an explicit name.
pub const DEFAULT_GACHA_NAME_PREFIX: &str = "ガチャの種類";

/// Builds the fallback name for a new gacha given how many already exist.
#[must_use]
pub fn default_gacha_name(existing: usize) -> String {
    format!("{DEFAULT_GACHA_NAME_PREFIX} {}", existing.saturating_add(1))
}

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps the provided string as an identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the textual representation of the identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier!(
    /// Unique identifier assigned to a gacha.
    GachaId
);
string_identifier!(
    /// Unique identifier assigned to a prize within its gacha.
    PrizeId
);
string_identifier!(
    /// Unique identifier assigned to a prize category.
    CategoryId
);
string_identifier!(
    /// Unique identifier assigned to a draw target.
    TargetId
);
string_identifier!(
    /// Unique identifier assigned to a recorded draw operation.
    OperationId
);

impl CategoryId {
    /// Identifier of the category every prize falls back to.
    #[must_use]
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_ID)
    }

    /// Reports whether this is the sentinel category identifier.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_ID
    }
}

impl TargetId {
    /// Identifier of the target that represents "no specific target".
    #[must_use]
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_ID)
    }

    /// Reports whether this is the sentinel target identifier.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_ID
    }
}

/// Errors raised when constructing validated numeric values.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ValueError {
    /// The weight was negative, NaN, or infinite.
    #[error("weight must be a finite, non-negative number (got {0})")]
    InvalidWeight(f64),
    /// A draw count of zero was requested.
    #[error("draw count must be a positive integer")]
    ZeroDrawCount,
    /// A numbered series ended before it started.
    #[error("series range starts at {first} but ends at {last}")]
    InvertedRange {
        /// First number requested for the series.
        first: u32,
        /// Last number requested for the series.
        last: u32,
    },
    /// A numbered series covered more members than one request may add.
    #[error("series of {len} prizes exceeds the limit of {max}")]
    SeriesTooLong {
        /// Members the range would cover.
        len: u64,
        /// Largest accepted series.
        max: u64,
    },
}

/// Relative draw weight of a prize.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Weight(f64);

impl Weight {
    /// Weight that never wins a draw.
    pub const ZERO: Self = Self(0.0);

    /// Validates and wraps a weight value.
    pub fn new(value: f64) -> Result<Self, ValueError> {
        if value.is_finite() && value >= 0.0 {
            // Normalises negative zero.
            Ok(Self(value + 0.0))
        } else {
            Err(ValueError::InvalidWeight(value))
        }
    }

    /// Retrieves the raw weight.
    #[must_use]
    pub const fn get(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Weight {
    type Error = ValueError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Weight> for f64 {
    fn from(weight: Weight) -> Self {
        weight.0
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Number of individual draws requested for one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawCount(NonZeroU32);

impl DrawCount {
    /// Single draw.
    pub const ONE: Self = Self::preset(1);
    /// Five draws.
    pub const FIVE: Self = Self::preset(5);
    /// Ten draws.
    pub const TEN: Self = Self::preset(10);
    /// One hundred draws.
    pub const HUNDRED: Self = Self::preset(100);

    const fn preset(value: u32) -> Self {
        match NonZeroU32::new(value) {
            Some(count) => Self(count),
            None => panic!("draw count presets must be non-zero"),
        }
    }

    /// Wraps a positive draw count.
    pub fn new(value: u32) -> Result<Self, ValueError> {
        NonZeroU32::new(value)
            .map(Self)
            .ok_or(ValueError::ZeroDrawCount)
    }

    /// Parses free-form input, falling back to a single draw when the text is
    /// blank, non-numeric, or not positive.
    #[must_use]
    pub fn parse_or_default(input: &str) -> Self {
        input
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|value| Self::new(value).ok())
            .unwrap_or(Self::ONE)
    }

    /// Retrieves the requested number of draws.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for DrawCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Wall-clock instant expressed in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Epoch milliseconds represented by the timestamp.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

/// Weighted, optionally limited, categorised drawable item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prize {
    /// Identity of the prize, immutable once created.
    pub id: PrizeId,
    /// Display name of the prize.
    pub name: String,
    /// Relative draw weight.
    pub weight: Weight,
    /// Maximum number of times the prize may ever be drawn, across all targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Category the prize belongs to.
    #[serde(default = "CategoryId::sentinel")]
    pub category_id: CategoryId,
}

impl Prize {
    /// Creates an unlimited prize in the sentinel category.
    #[must_use]
    pub fn new(id: PrizeId, name: impl Into<String>, weight: Weight) -> Self {
        Self {
            id,
            name: name.into(),
            weight,
            limit: None,
            category_id: CategoryId::sentinel(),
        }
    }

    /// Replaces the draw limit.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Replaces the category assignment.
    #[must_use]
    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = category_id;
        self
    }

    /// Reports whether the prize may still be drawn after `drawn` prior wins.
    #[must_use]
    pub fn admits(&self, drawn: u64) -> bool {
        self.limit.map_or(true, |limit| drawn < u64::from(limit))
    }
}

/// Grouping used to organise prizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identity of the category.
    pub id: CategoryId,
    /// Display name of the category.
    pub name: String,
}

impl Category {
    /// Creates a category.
    #[must_use]
    pub fn new(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The undeletable category assigned to new prizes by default.
    #[must_use]
    pub fn sentinel() -> Self {
        Self::new(CategoryId::sentinel(), SENTINEL_NAME)
    }
}

/// Attribution bucket for a batch of draws.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Identity of the target.
    pub id: TargetId,
    /// Display name of the target.
    pub name: String,
}

impl Target {
    /// Creates a target.
    #[must_use]
    pub fn new(id: TargetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The fallback target representing "no specific target".
    #[must_use]
    pub fn sentinel() -> Self {
        Self::new(TargetId::sentinel(), SENTINEL_NAME)
    }
}

/// Number of wins per prize produced by one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawResults(BTreeMap<PrizeId, u32>);

impl DrawResults {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single win for the provided prize.
    pub fn record(&mut self, prize: &PrizeId) {
        let wins = self.0.entry(prize.clone()).or_insert(0);
        *wins = wins.saturating_add(1);
    }

    /// Number of wins recorded for the prize, if it was drawn at all.
    #[must_use]
    pub fn get(&self, prize: &PrizeId) -> Option<u32> {
        self.0.get(prize).copied()
    }

    /// Iterates over `(prize, wins)` pairs ordered by prize id.
    pub fn iter(&self) -> impl Iterator<Item = (&PrizeId, u32)> {
        self.0.iter().map(|(prize, wins)| (prize, *wins))
    }

    /// Total number of successful draws represented by the results.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|wins| u64::from(*wins)).sum()
    }

    /// Reports whether no prize was drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct prizes drawn.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(PrizeId, u32)> for DrawResults {
    fn from_iter<I: IntoIterator<Item = (PrizeId, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fresh identity and creation time supplied by the caller for a new record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationStamp {
    /// Identifier to assign to the record.
    pub id: OperationId,
    /// Creation time of the record.
    pub timestamp: Timestamp,
}

impl OperationStamp {
    /// Creates a stamp.
    #[must_use]
    pub fn new(id: OperationId, timestamp: Timestamp) -> Self {
        Self { id, timestamp }
    }
}

/// Immutable record of one batch draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    id: OperationId,
    count: u32,
    results: DrawResults,
    timestamp: Timestamp,
    target: TargetId,
}

impl Operation {
    /// Creates a record. `count` is the requested count, not the number of
    /// draws actually performed.
    #[must_use]
    pub fn new(
        stamp: OperationStamp,
        count: DrawCount,
        results: DrawResults,
        target: TargetId,
    ) -> Self {
        Self {
            id: stamp.id,
            count: count.get(),
            results,
            timestamp: stamp.timestamp,
            target,
        }
    }

    /// Identifier of the record.
    #[must_use]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// Number of draws that were requested.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Wins per prize.
    #[must_use]
    pub fn results(&self) -> &DrawResults {
        &self.results
    }

    /// Creation time of the record.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Target the batch is attributed to.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Number of draws that actually succeeded.
    #[must_use]
    pub fn performed(&self) -> u64 {
        self.results.total()
    }
}

/// Named configuration of prizes, categories, targets, and draw history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gacha {
    /// Identity of the gacha.
    pub id: GachaId,
    /// Display name of the gacha.
    pub name: String,
    /// Draw recipients, always containing the sentinel.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Prize pool in display order.
    #[serde(default)]
    pub prizes: Vec<Prize>,
    /// Prize categories, always containing the sentinel.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Append-only log of batch draws in insertion order.
    #[serde(default)]
    pub operation_history: Vec<Operation>,
}

impl Gacha {
    /// Creates an empty gacha holding only the sentinel category and target.
    #[must_use]
    pub fn new(id: GachaId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            targets: vec![Target::sentinel()],
            prizes: Vec::new(),
            categories: vec![Category::sentinel()],
            operation_history: Vec::new(),
        }
    }
}

/// Complete persisted state: every gacha plus the selected one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// All gachas in creation order.
    #[serde(default)]
    pub gacha_list: Vec<Gacha>,
    /// Gacha currently selected by the user, if any.
    #[serde(default)]
    pub current_gacha_id: Option<GachaId>,
}

/// Cumulative draw counts per prize derived from an operation history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregation {
    counts: BTreeMap<PrizeId, u64>,
}

impl Aggregation {
    /// Seeds every provided prize with a count of zero.
    #[must_use]
    pub fn seeded<'a>(prizes: impl IntoIterator<Item = &'a Prize>) -> Self {
        Self {
            counts: prizes
                .into_iter()
                .map(|prize| (prize.id.clone(), 0))
                .collect(),
        }
    }

    /// Adds wins to a tracked prize. Returns `false` and ignores the wins when
    /// the prize is not tracked.
    pub fn add(&mut self, prize: &PrizeId, wins: u64) -> bool {
        match self.counts.get_mut(prize) {
            Some(count) => {
                *count = count.saturating_add(wins);
                true
            }
            None => false,
        }
    }

    /// Cumulative count for the prize; untracked prizes report zero.
    #[must_use]
    pub fn get(&self, prize: &PrizeId) -> u64 {
        self.counts.get(prize).copied().unwrap_or(0)
    }

    /// Reports whether the prize is tracked.
    #[must_use]
    pub fn contains(&self, prize: &PrizeId) -> bool {
        self.counts.contains_key(prize)
    }

    /// Iterates over `(prize, count)` pairs ordered by prize id.
    pub fn iter(&self) -> impl Iterator<Item = (&PrizeId, u64)> {
        self.counts.iter().map(|(prize, count)| (prize, *count))
    }

    /// Sum of all tracked counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of tracked prizes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Reports whether no prize is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Inclusive range of numbers used to address a numbered prize series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeriesRange {
    first: u32,
    last: u32,
}

impl SeriesRange {
    /// Largest number of members a single series may cover.
    pub const MAX_LEN: u64 = 10_000;

    /// Creates a range, rejecting ranges that end before they start or that
    /// cover more than [`SeriesRange::MAX_LEN`] members.
    pub fn new(first: u32, last: u32) -> Result<Self, ValueError> {
        if first > last {
            return Err(ValueError::InvertedRange { first, last });
        }
        let len = u64::from(last - first) + 1;
        if len > Self::MAX_LEN {
            return Err(ValueError::SeriesTooLong {
                len,
                max: Self::MAX_LEN,
            });
        }
        Ok(Self { first, last })
    }

    /// First number of the series.
    #[must_use]
    pub const fn first(&self) -> u32 {
        self.first
    }

    /// Last number of the series.
    #[must_use]
    pub const fn last(&self) -> u32 {
        self.last
    }

    /// Number of members in the series.
    #[must_use]
    pub fn len(&self) -> u64 {
        u64::from(self.last - self.first) + 1
    }

    /// Numbers covered by the series.
    #[must_use]
    pub fn numbers(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }

    /// Prize names addressed by the series, e.g. `stem1`, `stem2`, ...
    #[must_use]
    pub fn names(&self, stem: &str) -> Vec<String> {
        self.numbers().map(|number| format!("{stem}{number}")).collect()
    }
}

/// Template for adding a numbered run of identically configured prizes.
#[derive(Clone, Debug, PartialEq)]
pub struct PrizeSeries {
    /// Name shared by every member, followed by its number.
    pub stem: String,
    /// Numbers to generate.
    pub range: SeriesRange,
    /// Weight applied to every member.
    pub weight: Weight,
    /// Limit applied to every member.
    pub limit: Option<u32>,
    /// Category applied to every member.
    pub category_id: CategoryId,
}

impl PrizeSeries {
    /// Expands the template into prizes, drawing fresh ids from `next_id`.
    pub fn expand(&self, mut next_id: impl FnMut() -> PrizeId) -> Vec<Prize> {
        self.range
            .names(&self.stem)
            .into_iter()
            .map(|name| {
                Prize::new(next_id(), name, self.weight)
                    .with_limit(self.limit)
                    .with_category(self.category_id.clone())
            })
            .collect()
    }
}

/// Commands that express all permissible state mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Creates a gacha containing only the sentinel category and target.
    CreateGacha {
        /// Identifier to assign to the gacha.
        id: GachaId,
        /// Requested name; blank or absent names fall back to a numbered default.
        name: Option<String>,
    },
    /// Renames a gacha.
    RenameGacha {
        /// Gacha to rename.
        gacha: GachaId,
        /// New display name.
        name: String,
    },
    /// Deletes a gacha together with every nested entity.
    DeleteGacha {
        /// Gacha to delete.
        gacha: GachaId,
    },
    /// Marks a gacha as the one the user is working with.
    SelectGacha {
        /// Gacha to select.
        gacha: GachaId,
    },
    /// Appends prizes to a gacha; either every prize is added or none is.
    AddPrizes {
        /// Gacha receiving the prizes.
        gacha: GachaId,
        /// Prizes to append in order.
        prizes: Vec<Prize>,
    },
    /// Replaces a prize with a new value carrying the same id.
    UpdatePrize {
        /// Gacha owning the prize.
        gacha: GachaId,
        /// Replacement value.
        prize: Prize,
    },
    /// Removes prizes by id. Historical operations are left untouched.
    RemovePrizes {
        /// Gacha owning the prizes.
        gacha: GachaId,
        /// Prizes to remove.
        prizes: Vec<PrizeId>,
    },
    /// Removes every prize whose name appears in the list.
    RemovePrizesNamed {
        /// Gacha owning the prizes.
        gacha: GachaId,
        /// Names to match exactly.
        names: Vec<String>,
    },
    /// Adds a category.
    AddCategory {
        /// Gacha receiving the category.
        gacha: GachaId,
        /// Category to add.
        category: Category,
    },
    /// Renames a category.
    RenameCategory {
        /// Gacha owning the category.
        gacha: GachaId,
        /// Category to rename.
        category: CategoryId,
        /// New display name.
        name: String,
    },
    /// Removes a category, moving its prizes to the sentinel category.
    RemoveCategory {
        /// Gacha owning the category.
        gacha: GachaId,
        /// Category to remove.
        category: CategoryId,
    },
    /// Adds a draw target.
    AddTarget {
        /// Gacha receiving the target.
        gacha: GachaId,
        /// Target to add.
        target: Target,
    },
    /// Renames a draw target.
    RenameTarget {
        /// Gacha owning the target.
        gacha: GachaId,
        /// Target to rename.
        target: TargetId,
        /// New display name.
        name: String,
    },
    /// Removes a draw target. Historical operations keep the stale id.
    RemoveTarget {
        /// Gacha owning the target.
        gacha: GachaId,
        /// Target to remove.
        target: TargetId,
    },
    /// Appends a batch draw record to the history log.
    RecordOperation {
        /// Gacha the draw was performed against.
        gacha: GachaId,
        /// Record produced by the draw system.
        operation: Operation,
    },
    /// Deletes one whole record from the history log.
    UndoOperation {
        /// Gacha owning the record.
        gacha: GachaId,
        /// Record to delete.
        operation: OperationId,
    },
    /// Deletes every record from the history log.
    ClearHistory {
        /// Gacha whose history is cleared.
        gacha: GachaId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A gacha was created.
    GachaCreated {
        /// Identifier of the new gacha.
        gacha: GachaId,
        /// Name the gacha was given.
        name: String,
    },
    /// A gacha was renamed.
    GachaRenamed {
        /// Gacha that changed.
        gacha: GachaId,
        /// New display name.
        name: String,
    },
    /// A gacha and everything it owned was deleted.
    GachaDeleted {
        /// Gacha that was deleted.
        gacha: GachaId,
    },
    /// The selected gacha changed.
    CurrentGachaChanged {
        /// Newly selected gacha, or `None` when no gacha remains.
        gacha: Option<GachaId>,
    },
    /// Prizes were appended.
    PrizesAdded {
        /// Gacha that changed.
        gacha: GachaId,
        /// Identifiers of the new prizes in order.
        prizes: Vec<PrizeId>,
    },
    /// A prize was replaced.
    PrizeUpdated {
        /// Gacha that changed.
        gacha: GachaId,
        /// Prize that was replaced.
        prize: PrizeId,
    },
    /// Prizes were removed.
    PrizesRemoved {
        /// Gacha that changed.
        gacha: GachaId,
        /// Identifiers of the removed prizes.
        prizes: Vec<PrizeId>,
    },
    /// A category was added.
    CategoryAdded {
        /// Gacha that changed.
        gacha: GachaId,
        /// New category.
        category: CategoryId,
    },
    /// A category was renamed.
    CategoryRenamed {
        /// Gacha that changed.
        gacha: GachaId,
        /// Category that changed.
        category: CategoryId,
        /// New display name.
        name: String,
    },
    /// A category was removed.
    CategoryRemoved {
        /// Gacha that changed.
        gacha: GachaId,
        /// Removed category.
        category: CategoryId,
        /// Prizes moved to the sentinel category as a consequence.
        reassigned: Vec<PrizeId>,
    },
    /// A target was added.
    TargetAdded {
        /// Gacha that changed.
        gacha: GachaId,
        /// New target.
        target: TargetId,
    },
    /// A target was renamed.
    TargetRenamed {
        /// Gacha that changed.
        gacha: GachaId,
        /// Target that changed.
        target: TargetId,
        /// New display name.
        name: String,
    },
    /// A target was removed.
    TargetRemoved {
        /// Gacha that changed.
        gacha: GachaId,
        /// Removed target.
        target: TargetId,
    },
    /// A batch draw record was appended to the history log.
    OperationRecorded {
        /// Gacha that changed.
        gacha: GachaId,
        /// Identifier of the record.
        operation: OperationId,
        /// Draws requested for the batch.
        requested: u32,
        /// Draws that actually succeeded.
        performed: u64,
    },
    /// A record was removed from the history log.
    OperationUndone {
        /// Gacha that changed.
        gacha: GachaId,
        /// Record that was removed.
        operation: OperationId,
    },
    /// The history log was emptied.
    HistoryCleared {
        /// Gacha that changed.
        gacha: GachaId,
        /// Number of records removed.
        removed: usize,
    },
    /// A command was rejected and left the state untouched.
    CommandRejected {
        /// Gacha the command addressed, when it named one.
        gacha: Option<GachaId>,
        /// Why the command was rejected.
        reason: Rejection,
    },
}

/// Reasons a command may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum Rejection {
    /// No gacha with the requested id exists.
    #[error("no gacha with that id exists")]
    UnknownGacha,
    /// No prize with the requested id exists in the gacha.
    #[error("no prize with that id exists")]
    UnknownPrize,
    /// No category with the requested id exists in the gacha.
    #[error("no category with that id exists")]
    UnknownCategory,
    /// No target with the requested id exists in the gacha.
    #[error("no target with that id exists")]
    UnknownTarget,
    /// No history record with the requested id exists in the gacha.
    #[error("no history record with that id exists")]
    UnknownOperation,
    /// An entry with the same id already exists.
    #[error("an entry with that id already exists")]
    DuplicateId,
    /// The sentinel category or target cannot be renamed or removed.
    #[error("the \"none\" entry cannot be renamed or removed")]
    ProtectedSentinel,
    /// Names must contain at least one non-whitespace character.
    #[error("names must not be blank")]
    BlankName,
}

#[cfg(test)]
mod tests {
    use super::{
        default_gacha_name, Aggregation, CategoryId, DrawCount, DrawResults, Gacha, GachaId,
        Operation, OperationId, OperationStamp, Prize, PrizeId, PrizeSeries, SeriesRange,
        TargetId, Timestamp, ValueError, Weight,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    fn weight(value: f64) -> Weight {
        Weight::new(value).expect("valid weight")
    }

    #[test]
    fn weight_rejects_negative_and_non_finite_values() {
        assert_eq!(Weight::new(-1.0), Err(ValueError::InvalidWeight(-1.0)));
        assert!(Weight::new(f64::NAN).is_err());
        assert!(Weight::new(f64::INFINITY).is_err());
        assert_eq!(weight(2.5).get(), 2.5);
        assert_eq!(weight(-0.0).get().to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn weight_deserialisation_is_validated() {
        assert!(serde_json::from_str::<Weight>("-3").is_err());
        assert_eq!(serde_json::from_str::<Weight>("1.5").ok(), Some(weight(1.5)));
    }

    #[test]
    fn draw_count_falls_back_to_one_for_unusable_input() {
        assert_eq!(DrawCount::parse_or_default(""), DrawCount::ONE);
        assert_eq!(DrawCount::parse_or_default("   "), DrawCount::ONE);
        assert_eq!(DrawCount::parse_or_default("many"), DrawCount::ONE);
        assert_eq!(DrawCount::parse_or_default("0"), DrawCount::ONE);
        assert_eq!(DrawCount::parse_or_default("-4"), DrawCount::ONE);
        assert_eq!(DrawCount::parse_or_default(" 25 ").get(), 25);
        assert_eq!(DrawCount::new(0), Err(ValueError::ZeroDrawCount));
    }

    #[test]
    fn presets_match_their_names() {
        assert_eq!(DrawCount::ONE.get(), 1);
        assert_eq!(DrawCount::FIVE.get(), 5);
        assert_eq!(DrawCount::TEN.get(), 10);
        assert_eq!(DrawCount::HUNDRED.get(), 100);
    }

    #[test]
    fn default_gacha_names_are_numbered_from_one() {
        assert_eq!(default_gacha_name(0), "ガチャの種類 1");
        assert_eq!(default_gacha_name(2), "ガチャの種類 3");
    }

    #[test]
    fn prize_json_uses_browser_field_names() {
        let prize = Prize::new(PrizeId::new("p1"), "Sticker", weight(3.0))
            .with_category(CategoryId::new("c1"));
        let json = serde_json::to_value(&prize).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "id": "p1",
                "name": "Sticker",
                "weight": 3.0,
                "categoryId": "c1",
            })
        );

        let limited = prize.with_limit(Some(2));
        let json = serde_json::to_value(&limited).expect("serialize");
        assert_eq!(json["limit"], 2);
    }

    #[test]
    fn prize_without_category_loads_into_sentinel() {
        let prize: Prize =
            serde_json::from_str(r#"{"id":"p","name":"Badge","weight":1}"#).expect("parse");
        assert!(prize.category_id.is_sentinel());
        assert_eq!(prize.limit, None);
    }

    #[test]
    fn gacha_json_matches_persisted_schema() {
        let gacha = Gacha::new(GachaId::new("g"), "Stream");
        let json = serde_json::to_value(&gacha).expect("serialize");
        assert_eq!(json["operationHistory"], serde_json::json!([]));
        assert_eq!(json["targets"][0]["id"], "none");
        assert_eq!(json["categories"][0]["name"], "なし");
    }

    #[test]
    fn legacy_gacha_without_targets_or_categories_loads() {
        let gacha: Gacha = serde_json::from_str(
            r#"{"id":"g","name":"Old","prizes":[],"operationHistory":[]}"#,
        )
        .expect("parse");
        assert!(gacha.targets.is_empty());
        assert!(gacha.categories.is_empty());
    }

    #[test]
    fn operation_round_trips_through_bincode() {
        let results: DrawResults = [(PrizeId::new("a"), 2), (PrizeId::new("b"), 1)]
            .into_iter()
            .collect();
        let operation = Operation::new(
            OperationStamp::new(OperationId::new("op"), Timestamp::from_millis(1_700_000_000_000)),
            DrawCount::FIVE,
            results,
            TargetId::sentinel(),
        );
        assert_round_trip(&operation);
        assert_eq!(operation.count(), 5);
        assert_eq!(operation.performed(), 3);
    }

    #[test]
    fn draw_results_count_every_win() {
        let mut results = DrawResults::new();
        assert!(results.is_empty());
        let prize = PrizeId::new("a");
        results.record(&prize);
        results.record(&prize);
        results.record(&PrizeId::new("b"));
        assert_eq!(results.get(&prize), Some(2));
        assert_eq!(results.len(), 2);
        assert_eq!(results.total(), 3);
    }

    #[test]
    fn aggregation_ignores_untracked_prizes() {
        let prizes = vec![Prize::new(PrizeId::new("a"), "A", weight(1.0))];
        let mut aggregation = Aggregation::seeded(&prizes);
        assert!(aggregation.add(&PrizeId::new("a"), 4));
        assert!(!aggregation.add(&PrizeId::new("gone"), 7));
        assert_eq!(aggregation.get(&PrizeId::new("a")), 4);
        assert_eq!(aggregation.get(&PrizeId::new("gone")), 0);
        assert!(!aggregation.contains(&PrizeId::new("gone")));
        assert_eq!(aggregation.total(), 4);
    }

    #[test]
    fn prize_limit_admission() {
        let unlimited = Prize::new(PrizeId::new("u"), "U", weight(1.0));
        assert!(unlimited.admits(u64::MAX));

        let limited = unlimited.with_limit(Some(2));
        assert!(limited.admits(1));
        assert!(!limited.admits(2));
        assert!(!limited.clone().with_limit(Some(0)).admits(0));
    }

    #[test]
    fn series_range_rejects_inverted_bounds() {
        assert_eq!(
            SeriesRange::new(5, 3),
            Err(ValueError::InvertedRange { first: 5, last: 3 })
        );
        let range = SeriesRange::new(8, 10).expect("valid range");
        assert_eq!(range.len(), 3);
        assert_eq!(range.names("Card"), vec!["Card8", "Card9", "Card10"]);
    }

    #[test]
    fn series_range_caps_its_length() {
        assert_eq!(
            SeriesRange::new(1, 4_000_000_000),
            Err(ValueError::SeriesTooLong {
                len: 4_000_000_000,
                max: SeriesRange::MAX_LEN,
            })
        );
        assert_eq!(
            SeriesRange::new(0, u32::MAX).map(|range| range.len()),
            Err(ValueError::SeriesTooLong {
                len: u64::from(u32::MAX) + 1,
                max: SeriesRange::MAX_LEN,
            })
        );
        let widest = SeriesRange::new(1, 10_000).expect("largest accepted series");
        assert_eq!(widest.len(), SeriesRange::MAX_LEN);
    }

    #[test]
    fn series_expansion_shares_configuration() {
        let series = PrizeSeries {
            stem: "Acrylic".to_owned(),
            range: SeriesRange::new(1, 3).expect("valid range"),
            weight: weight(2.0),
            limit: Some(1),
            category_id: CategoryId::new("goods"),
        };
        let mut next = 0;
        let prizes = series.expand(|| {
            next += 1;
            PrizeId::new(format!("id-{next}"))
        });

        assert_eq!(prizes.len(), 3);
        assert_eq!(prizes[0].id, PrizeId::new("id-1"));
        assert_eq!(prizes[2].name, "Acrylic3");
        assert!(prizes
            .iter()
            .all(|prize| prize.limit == Some(1) && prize.category_id == CategoryId::new("goods")));
    }
}
