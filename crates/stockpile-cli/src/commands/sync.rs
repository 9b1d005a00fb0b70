use std::path::Path;

use crate::commands::common::build_engine;
use crate::error::CliError;

pub async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let (engine, monitor) = build_engine(db_path).await?;

    // The probe is ground truth; a dead endpoint means nothing is drained
    // and every action stays queued for a later attempt.
    monitor.check_quality().await?;

    let report = engine.drain().await?;
    let remaining = engine.queue().count().await?;

    if !monitor.is_online() {
        println!("Offline; actions remain queued.");
    } else if report.attempted == 0 {
        println!("Nothing to sync.");
    } else {
        println!(
            "Delivered {}, retried {}, failed {} (attempted {})",
            report.delivered, report.retried, report.failed, report.attempted
        );
    }

    if remaining > 0 {
        println!("{remaining} action(s) still pending.");
    }

    Ok(())
}

pub async fn run_retry(db_path: &Path) -> Result<(), CliError> {
    let (engine, monitor) = build_engine(db_path).await?;

    let requeued = engine.queue().retry_failed().await?;
    println!("Requeued {requeued} failed action(s).");
    if requeued == 0 {
        return Ok(());
    }

    monitor.check_quality().await?;
    let report = engine.drain().await?;
    if !monitor.is_online() {
        println!("Offline; actions remain queued.");
    } else {
        println!(
            "Delivered {}, retried {}, failed {} (attempted {})",
            report.delivered, report.retried, report.failed, report.attempted
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn run_sync_requires_sync_configuration() {
        // The endpoint env var is deliberately not set in the test env
        if std::env::var_os("STOCKPILE_SYNC_ENDPOINT").is_some() {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sync.db");

        let error = run_sync(&db_path).await.unwrap_err();
        assert!(matches!(error, CliError::SyncNotConfigured));
    }
}
