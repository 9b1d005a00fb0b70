use std::path::Path;

use serde_json::json;
use stockpile_core::ActionType;

use crate::commands::common::{open_queue, resolve_payload};
use crate::error::CliError;

/// Queue a mutation carrying a JSON payload. Prints the assigned action id.
pub async fn run_enqueue(
    action_type: ActionType,
    payload: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = resolve_payload(payload)?;

    let queue = open_queue(db_path).await?;
    let id = queue.enqueue(action_type, payload).await?;

    println!("{id}");
    Ok(())
}

/// Queue a deletion for the given entity id.
pub async fn run_enqueue_delete(
    action_type: ActionType,
    entity_id: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let entity_id = entity_id.trim();
    if entity_id.is_empty() {
        return Err(CliError::EmptyEntityId);
    }

    let queue = open_queue(db_path).await?;
    let id = queue.enqueue(action_type, json!({"id": entity_id})).await?;

    println!("{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_core::ActionStatus;

    fn unique_test_db_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        dir.path().join(format!("{name}.db"))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_enqueue_persists_a_pending_action() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = unique_test_db_path(&dir, "enqueue");

        run_enqueue(
            ActionType::AddProduct,
            Some(r#"{"id": "P1", "name": "Widget"}"#.to_string()),
            &db_path,
        )
        .await
        .unwrap();

        let queue = open_queue(&db_path).await.unwrap();
        let actions = queue.all().await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::AddProduct);
        assert_eq!(actions[0].status, ActionStatus::Pending);
        assert_eq!(actions[0].payload["name"], "Widget");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_enqueue_rejects_non_object_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = unique_test_db_path(&dir, "enqueue-bad");

        let error = run_enqueue(
            ActionType::AddProduct,
            Some("[1, 2, 3]".to_string()),
            &db_path,
        )
        .await
        .unwrap_err();
        assert!(matches!(error, CliError::InvalidPayload(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_enqueue_delete_wraps_the_id() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = unique_test_db_path(&dir, "delete");

        run_enqueue_delete(ActionType::DeleteProduct, "  P9  ", &db_path)
            .await
            .unwrap();

        let queue = open_queue(&db_path).await.unwrap();
        let actions = queue.all().await.unwrap();
        assert_eq!(actions[0].payload, serde_json::json!({"id": "P9"}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_enqueue_delete_rejects_blank_ids() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = unique_test_db_path(&dir, "delete-bad");

        let error = run_enqueue_delete(ActionType::DeleteProduct, "   ", &db_path)
            .await
            .unwrap_err();
        assert!(matches!(error, CliError::EmptyEntityId));
    }
}
