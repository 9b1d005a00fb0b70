use std::path::Path;

use stockpile_core::conflict::{
    ConflictConfig, ConflictResolver, ConflictStrategy, Resolution,
};
use stockpile_core::db::{ConflictRepository, LibSqlConflictRepository};
use stockpile_core::EntityType;

use crate::commands::common::{open_queue, parse_payload};
use crate::error::CliError;

pub struct ReconcileArgs<'a> {
    pub entity_type: EntityType,
    pub entity_id: &'a str,
    pub local: &'a str,
    pub remote: &'a str,
    pub origin_device_id: &'a str,
    pub strategy: ConflictStrategy,
}

pub async fn run_reconcile(args: ReconcileArgs<'_>, db_path: &Path) -> Result<(), CliError> {
    let local = parse_payload(args.local)?;
    let remote = parse_payload(args.remote)?;

    let resolver = ConflictResolver::new(ConflictConfig {
        default_strategy: args.strategy,
        ..ConflictConfig::default()
    });

    let Some(conflict) = resolver.detect(
        args.entity_type,
        args.entity_id,
        Some(&local),
        Some(&remote),
        args.origin_device_id,
    ) else {
        println!("No conflict detected.");
        return Ok(());
    };

    println!("Conflicting fields: {}", conflict.conflict_fields.join(", "));

    match resolver.resolve(&conflict) {
        Resolution::Resolved(value) => {
            record_resolution(&conflict, args.strategy, db_path).await?;
            println!("Resolved via {}:", args.strategy);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Resolution::KeptBoth { local, remote } => {
            record_resolution(&conflict, args.strategy, db_path).await?;
            println!("Both versions kept.");
            println!("Local:");
            println!("{}", serde_json::to_string_pretty(&local)?);
            println!("Remote (device-qualified):");
            println!("{}", serde_json::to_string_pretty(&remote)?);
        }
        Resolution::Deferred => {
            // Never auto-resolve under user choice; surface and stop
            println!("Conflict requires an explicit decision:");
            println!("{}", serde_json::to_string_pretty(&conflict)?);
        }
    }

    Ok(())
}

async fn record_resolution(
    conflict: &stockpile_core::SyncConflict,
    strategy: ConflictStrategy,
    db_path: &Path,
) -> Result<(), CliError> {
    let queue = open_queue(db_path).await?;
    let db = queue.database();
    let db = db.lock().await;
    let repo = LibSqlConflictRepository::new(db.connection());
    repo.record(
        conflict,
        strategy.as_str(),
        chrono::Utc::now().timestamp_millis(),
    )
    .await?;
    Ok(())
}
