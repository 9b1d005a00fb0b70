use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stockpile_core::conflict::ConflictStrategy;
use stockpile_core::EntityType;

#[derive(Parser)]
#[command(name = "stockpile")]
#[command(about = "Queue inventory mutations offline and sync them when connectivity returns")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local queue database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a product mutation
    Product {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Queue a warehouse mutation
    Warehouse {
        #[command(subcommand)]
        command: WarehouseCommands,
    },
    /// Queue a stock operation
    Op {
        #[command(subcommand)]
        command: OpCommands,
    },
    /// List queued actions with their delivery status
    Queue {
        /// Number of actions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show queue counts and connectivity
    Status {
        /// Probe the sync endpoint for link quality
        #[arg(long)]
        probe: bool,
    },
    /// Deliver pending actions to the sync endpoint
    Sync,
    /// Requeue failed actions and deliver them
    Retry,
    /// Reconcile a local and a remote snapshot of the same entity
    Reconcile {
        /// Kind of the diverging entity
        #[arg(long, value_enum)]
        entity_type: EntityTypeArg,
        /// Id of the diverging entity
        #[arg(long, value_name = "ID")]
        entity_id: String,
        /// Local snapshot as JSON
        #[arg(long, value_name = "JSON")]
        local: String,
        /// Remote snapshot as JSON
        #[arg(long, value_name = "JSON")]
        remote: String,
        /// Device that produced the remote snapshot
        #[arg(long, value_name = "DEVICE")]
        origin: String,
        /// Resolution strategy (defaults to last-write-wins)
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },
    /// List recorded conflict resolutions
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// Queue creation of a product
    Add {
        /// Product fields as JSON (stdin when omitted)
        payload: Option<String>,
    },
    /// Queue an update of a product
    Update {
        /// Product fields as JSON (stdin when omitted)
        payload: Option<String>,
    },
    /// Queue deletion of a product
    Delete {
        /// Product id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum WarehouseCommands {
    /// Queue creation of a warehouse
    Add {
        /// Warehouse fields as JSON (stdin when omitted)
        payload: Option<String>,
    },
    /// Queue an update of a warehouse
    Update {
        /// Warehouse fields as JSON (stdin when omitted)
        payload: Option<String>,
    },
    /// Queue deletion of a warehouse
    Delete {
        /// Warehouse id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum OpCommands {
    /// Queue a stock operation record
    Add {
        /// Operation fields as JSON (stdin when omitted)
        payload: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EntityTypeArg {
    Product,
    Warehouse,
    Operation,
}

impl From<EntityTypeArg> for EntityType {
    fn from(value: EntityTypeArg) -> Self {
        match value {
            EntityTypeArg::Product => Self::Product,
            EntityTypeArg::Warehouse => Self::Warehouse,
            EntityTypeArg::Operation => Self::Operation,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    LastWriteWins,
    MergeFields,
    KeepBoth,
    UserChoice,
}

impl From<StrategyArg> for ConflictStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::LastWriteWins => Self::LastWriteWins,
            StrategyArg::MergeFields => Self::MergeFields,
            StrategyArg::KeepBoth => Self::KeepBoth,
            StrategyArg::UserChoice => Self::UserChoice,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
