use std::path::Path;

use crate::commands::common::{action_to_list_item, format_action_lines, open_queue, ActionListItem};
use crate::error::CliError;

pub async fn run_queue(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(db_path).await?;
    let mut actions = queue.all().await?;
    actions.truncate(limit);

    if as_json {
        let json_items = actions
            .iter()
            .map(action_to_list_item)
            .collect::<Vec<ActionListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if actions.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for line in format_action_lines(&actions) {
        println!("{line}");
    }
    Ok(())
}
