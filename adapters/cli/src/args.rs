use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments accepted by the gacha simulator.
#[derive(Debug, Parser)]
#[command(name = "gacha-sim", version, about = "Weighted gacha draw simulator")]
pub(crate) struct CliArgs {
    /// TOML configuration file (defaults to ./gacha-sim.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,
    /// JSON state file, overriding the configured one.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) state: Option<PathBuf>,
    /// Seed for the random source, making draws reproducible.
    #[arg(long, global = true)]
    pub(crate) seed: Option<u64>,
    /// Gacha to operate on (id or name) instead of the selected one.
    #[arg(long, global = true)]
    pub(crate) gacha: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Request,
}

/// Top-level operations.
#[derive(Debug, Subcommand)]
pub(crate) enum Request {
    /// Manage gacha types.
    #[command(subcommand)]
    Gacha(GachaRequest),
    /// Manage the prize pool.
    #[command(subcommand)]
    Prize(PrizeRequest),
    /// Manage prize categories.
    #[command(subcommand)]
    Category(CategoryRequest),
    /// Manage draw targets.
    #[command(subcommand)]
    Target(TargetRequest),
    /// Draw a batch of prizes.
    Draw {
        /// Number of draws; blank or invalid input draws once.
        count: Option<String>,
        /// Target (id or name) the batch is attributed to.
        #[arg(long)]
        target: Option<String>,
    },
    /// Show cumulative counts overall and per target.
    Results {
        /// Only show counts attributed to this target (id or name).
        #[arg(long)]
        target: Option<String>,
        /// Hide prizes that were never drawn.
        #[arg(long)]
        hide_zero: bool,
    },
    /// Show the draw history, newest first.
    History {
        /// Only show records attributed to this target (id or name).
        #[arg(long)]
        target: Option<String>,
    },
    /// Remove one history record.
    Undo {
        /// Identifier of the record.
        id: String,
    },
    /// Remove every history record.
    Clear,
    /// Print a shareable string holding the gacha's prizes and categories.
    Export,
    /// Create a new gacha from an exported string.
    Import {
        /// String produced by `export`.
        payload: String,
    },
}

#[derive(Debug, Subcommand)]
pub(crate) enum GachaRequest {
    /// Create a gacha; it becomes selected when none is.
    Create {
        /// Display name; defaults to a numbered name.
        name: Option<String>,
    },
    /// List every gacha; the selected one is marked with `*`.
    List,
    /// Rename a gacha.
    Rename {
        /// Gacha id or name.
        gacha: String,
        /// New name.
        name: String,
    },
    /// Delete a gacha with its prizes and history.
    Delete {
        /// Gacha id or name.
        gacha: String,
    },
    /// Select the gacha subsequent commands operate on.
    Select {
        /// Gacha id or name.
        gacha: String,
    },
}

#[derive(Debug, Subcommand)]
pub(crate) enum PrizeRequest {
    /// Add a single prize.
    Add {
        /// Prize name.
        name: String,
        #[command(flatten)]
        settings: PrizeSettings,
    },
    /// Add a numbered run of prizes, e.g. `Card1` to `Card10`.
    Series {
        /// Name shared by every prize, followed by its number.
        stem: String,
        /// First number of the run.
        first: u32,
        /// Last number of the run.
        last: u32,
        #[command(flatten)]
        settings: PrizeSettings,
    },
    /// Change an existing prize.
    Update {
        /// Prize id.
        id: String,
        /// New name.
        #[arg(long)]
        name: Option<String>,
        /// New weight.
        #[arg(long)]
        weight: Option<f64>,
        /// New draw limit.
        #[arg(long, conflicts_with = "no_limit")]
        limit: Option<u32>,
        /// Remove the draw limit.
        #[arg(long)]
        no_limit: bool,
        /// New category (id or name).
        #[arg(long)]
        category: Option<String>,
    },
    /// Remove prizes by id.
    Remove {
        /// Prize ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Remove a numbered run of prizes by name.
    RemoveSeries {
        /// Name shared by every prize, followed by its number.
        stem: String,
        /// First number of the run.
        first: u32,
        /// Last number of the run.
        last: u32,
    },
    /// List the prize pool.
    List {
        /// Sort key; insertion order when omitted.
        #[arg(long, value_enum)]
        sort: Option<SortKey>,
        /// Reverse the sort key.
        #[arg(long, requires = "sort")]
        desc: bool,
    },
}

/// Settings shared by every prize created in one command.
#[derive(Debug, Args)]
pub(crate) struct PrizeSettings {
    /// Relative draw weight.
    #[arg(long, default_value_t = 1.0)]
    pub(crate) weight: f64,
    /// Maximum number of times the prize may be drawn across all targets.
    #[arg(long)]
    pub(crate) limit: Option<u32>,
    /// Category (id or name); uncategorised when omitted.
    #[arg(long)]
    pub(crate) category: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum SortKey {
    /// Natural order of prize names.
    Name,
    /// Category name, uncategorised prizes last.
    Category,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CategoryRequest {
    /// Add a category.
    Add {
        /// Category name.
        name: String,
    },
    /// Rename a category.
    Rename {
        /// Category id or name.
        category: String,
        /// New name.
        name: String,
    },
    /// Remove a category; its prizes become uncategorised.
    Remove {
        /// Category id or name.
        category: String,
    },
    /// List categories.
    List,
}

#[derive(Debug, Subcommand)]
pub(crate) enum TargetRequest {
    /// Add a draw target.
    Add {
        /// Target name.
        name: String,
    },
    /// Rename a draw target.
    Rename {
        /// Target id or name.
        target: String,
        /// New name.
        name: String,
    },
    /// Remove a draw target; its history is kept.
    Remove {
        /// Target id or name.
        target: String,
    },
    /// List draw targets.
    List,
}
