use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use stockpile_core::net::ConnectivityMonitor;
use stockpile_core::sync::{HttpSyncClient, SyncEngine};
use stockpile_core::{ActionQueue, QueuedAction, SyncSettings};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ActionListItem {
    pub id: String,
    pub action_type: String,
    pub status: String,
    pub retry_count: u32,
    pub enqueued_at: i64,
    pub relative_time: String,
    pub last_error: Option<String>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("STOCKPILE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockpile")
        .join("queue.db")
}

pub async fn open_queue(db_path: &Path) -> Result<ActionQueue, CliError> {
    Ok(ActionQueue::open_path(db_path).await?)
}

/// Build the engine and monitor from environment settings.
/// Errors when no sync endpoint is configured.
pub async fn build_engine(
    db_path: &Path,
) -> Result<(SyncEngine<HttpSyncClient>, Arc<ConnectivityMonitor>), CliError> {
    let settings = SyncSettings::from_env();
    let Some(endpoint) = settings.endpoint.clone() else {
        return Err(CliError::SyncNotConfigured);
    };

    let queue = open_queue(db_path).await?;
    let client = HttpSyncClient::new(endpoint, settings.request_timeout)?;
    tracing::info!(endpoint = client.endpoint(), "Sync endpoint configured");
    let monitor = Arc::new(ConnectivityMonitor::new(
        settings.effective_probe_url().map(str::to_string),
        settings.request_timeout,
        true,
    )?);
    let engine = SyncEngine::new(queue, client, Arc::clone(&monitor), &settings);

    Ok((engine, monitor))
}

/// Resolve a payload from the argument or piped stdin; must be a JSON object.
pub fn resolve_payload(argument: Option<String>) -> Result<serde_json::Value, CliError> {
    let raw = match argument.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => value,
        _ => read_piped_stdin()?.ok_or(CliError::EmptyPayload)?,
    };

    parse_payload(&raw)
}

pub fn parse_payload(raw: &str) -> Result<serde_json::Value, CliError> {
    let payload: serde_json::Value = serde_json::from_str(raw)
        .map_err(|error| CliError::InvalidPayload(error.to_string()))?;
    if payload.is_object() {
        Ok(payload)
    } else {
        Err(CliError::InvalidPayload(
            "expected a top-level JSON object".to_string(),
        ))
    }
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

pub fn action_to_list_item(action: &QueuedAction) -> ActionListItem {
    let now_ms = chrono::Utc::now().timestamp_millis();

    ActionListItem {
        id: action.id.to_string(),
        action_type: action.action_type.to_string(),
        status: action.status.to_string(),
        retry_count: action.retry_count,
        enqueued_at: action.enqueued_at,
        relative_time: format_relative_time(action.enqueued_at, now_ms),
        last_error: action.last_error.clone(),
    }
}

pub fn format_action_lines(actions: &[QueuedAction]) -> Vec<String> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    actions
        .iter()
        .map(|action| {
            let id = action.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let action_type = action.action_type.to_string();
            let status = action.status.to_string();
            let relative_time = format_relative_time(action.enqueued_at, now_ms);

            if action.retry_count == 0 {
                format!("{short_id:<13}  {action_type:<16}  {status:<8}  {relative_time}")
            } else {
                format!(
                    "{short_id:<13}  {action_type:<16}  {status:<8}  {relative_time:<10}  retries: {}",
                    action.retry_count
                )
            }
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub const fn timeout_for_probe() -> Duration {
    Duration::from_secs(4)
}
