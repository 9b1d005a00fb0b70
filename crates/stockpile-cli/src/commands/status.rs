use std::path::Path;

use stockpile_core::net::ConnectivityMonitor;
use stockpile_core::SyncSettings;

use crate::commands::common::{open_queue, timeout_for_probe};
use crate::error::CliError;

pub async fn run_status(probe: bool, db_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(db_path).await?;
    let pending = queue.count().await?;
    let failed = queue.failed_count().await?;

    println!("Pending actions:  {pending}");
    println!("Failed actions:   {failed}");

    let settings = SyncSettings::from_env();
    match settings.endpoint.as_deref() {
        Some(endpoint) => println!("Sync endpoint:    {endpoint}"),
        None => println!("Sync endpoint:    not configured"),
    }

    if probe {
        let monitor = ConnectivityMonitor::new(
            settings.effective_probe_url().map(str::to_string),
            timeout_for_probe(),
            true,
        )?;
        let report = monitor.check_quality().await?;
        match report.latency_ms {
            Some(latency_ms) => {
                println!("Connectivity:     {} ({latency_ms}ms)", report.quality);
            }
            None => println!("Connectivity:     offline"),
        }
    }

    Ok(())
}
