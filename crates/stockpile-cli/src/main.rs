//! Stockpile CLI - queue inventory mutations offline, sync them later
//!
//! Mutations queued here survive restarts and are delivered to the remote
//! endpoint on the next `stockpile sync` (or a background trigger in the
//! embedding application).

mod cli;
mod commands;
mod error;

use clap::Parser;
use stockpile_core::ActionType;

use cli::{Cli, Commands, OpCommands, ProductCommands, WarehouseCommands};
use commands::common::resolve_db_path;
use commands::completions::run_completions;
use commands::conflicts::run_conflicts;
use commands::enqueue::{run_enqueue, run_enqueue_delete};
use commands::queue::run_queue;
use commands::reconcile::{run_reconcile, ReconcileArgs};
use commands::status::run_status;
use commands::sync::{run_retry, run_sync};
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stockpile=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Product { command } => match command {
            ProductCommands::Add { payload } => {
                run_enqueue(ActionType::AddProduct, payload, &db_path).await?;
            }
            ProductCommands::Update { payload } => {
                run_enqueue(ActionType::UpdateProduct, payload, &db_path).await?;
            }
            ProductCommands::Delete { id } => {
                run_enqueue_delete(ActionType::DeleteProduct, &id, &db_path).await?;
            }
        },
        Commands::Warehouse { command } => match command {
            WarehouseCommands::Add { payload } => {
                run_enqueue(ActionType::AddWarehouse, payload, &db_path).await?;
            }
            WarehouseCommands::Update { payload } => {
                run_enqueue(ActionType::UpdateWarehouse, payload, &db_path).await?;
            }
            WarehouseCommands::Delete { id } => {
                run_enqueue_delete(ActionType::DeleteWarehouse, &id, &db_path).await?;
            }
        },
        Commands::Op { command } => match command {
            OpCommands::Add { payload } => {
                run_enqueue(ActionType::AddOperation, payload, &db_path).await?;
            }
        },
        Commands::Queue { limit, json } => run_queue(limit, json, &db_path).await?,
        Commands::Status { probe } => run_status(probe, &db_path).await?,
        Commands::Sync => run_sync(&db_path).await?,
        Commands::Retry => run_retry(&db_path).await?,
        Commands::Reconcile {
            entity_type,
            entity_id,
            local,
            remote,
            origin,
            strategy,
        } => {
            run_reconcile(
                ReconcileArgs {
                    entity_type: entity_type.into(),
                    entity_id: &entity_id,
                    local: &local,
                    remote: &remote,
                    origin_device_id: &origin,
                    strategy: strategy
                        .map_or(stockpile_core::conflict::ConflictStrategy::LastWriteWins, Into::into),
                },
                &db_path,
            )
            .await?;
        }
        Commands::Conflicts { limit, json } => run_conflicts(limit, json, &db_path).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
