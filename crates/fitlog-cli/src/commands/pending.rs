use chrono::Utc;
use fitlog_core::models::{MutationRecord, Operation};
use fitlog_core::Domain;
use serde::Serialize;

use crate::config::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct PendingItem {
    domain: String,
    item_id: String,
    operation: String,
    local_timestamp: i64,
    relative_time: String,
}

/// List unsynced change-log entries, for one domain or all of them.
pub async fn run_pending(
    ctx: &AppContext,
    domain: Option<Domain>,
    as_json: bool,
) -> Result<(), CliError> {
    let domains = domain.map_or_else(|| Domain::ALL.to_vec(), |domain| vec![domain]);

    let mut entries: Vec<MutationRecord> = Vec::new();
    for domain in domains {
        entries.extend(
            ctx.engine
                .change_log()
                .unsynced_entries(domain)
                .await?
                .into_values(),
        );
    }
    entries.sort_by_key(|entry| entry.local_timestamp);

    if as_json {
        let items = entries
            .iter()
            .map(entry_to_item)
            .collect::<Vec<PendingItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    let now_ms = Utc::now().timestamp_millis();
    for entry in &entries {
        println!(
            "{:<17} {:<38} {:<8} {}",
            entry.domain.as_str(),
            entry.item_id,
            operation_name(entry.operation),
            format_relative_time(entry.local_timestamp, now_ms)
        );
    }
    Ok(())
}

fn entry_to_item(entry: &MutationRecord) -> PendingItem {
    let now_ms = Utc::now().timestamp_millis();
    PendingItem {
        domain: entry.domain.as_str().to_string(),
        item_id: entry.item_id.clone(),
        operation: operation_name(entry.operation).to_string(),
        local_timestamp: entry.local_timestamp,
        relative_time: format_relative_time(entry.local_timestamp, now_ms),
    }
}

const fn operation_name(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "create",
        Operation::Update => "update",
        Operation::Delete => "delete",
    }
}

fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
