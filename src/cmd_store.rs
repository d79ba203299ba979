//! Lifecycle store inspection commands.

use tracing::info;

use reqflow_config::Config;
use reqflow_store::{LifecycleStore, RequestStatus, StoredRequest};

use crate::backends::open_lifecycle_store;

type BoxError = Box<dyn std::error::Error>;

fn describe(stored: &StoredRequest) -> String {
    let mut out = format!(
        "{}\n  name:       {}\n  identifier: {}\n  status:     {}\n  priority:   {}\n  retries:    {}/{}\n  polls:      {}\n  updated:    {}",
        stored.request_id(),
        stored.record.request_name,
        stored.record.identifier,
        stored.status,
        stored.record.priority,
        stored.record.retry_count,
        stored.record.max_retries,
        stored.poll_count,
        stored.updated_at.to_rfc3339(),
    );
    if let Some(message) = &stored.error_message {
        out.push_str(&format!("\n  error:      {}", message));
    }
    out
}

pub(crate) async fn status(config: Config, request_id: &str) -> Result<(), BoxError> {
    let store = open_lifecycle_store(&config.store).await?;
    let result = show_status(store.as_ref(), request_id).await;
    store.close().await?;
    println!("{}", result?);
    Ok(())
}

async fn show_status(store: &dyn LifecycleStore, request_id: &str) -> Result<String, BoxError> {
    let stored = store
        .get(request_id)
        .await?
        .ok_or_else(|| format!("request {} is not tracked", request_id))?;
    let mut out = describe(&stored);
    for response in store.responses(request_id).await? {
        out.push_str(&format!(
            "\n  response:   {} {} ({} bytes)",
            response.kind.as_str(),
            response.key.as_deref().unwrap_or("-"),
            response.content.len()
        ));
    }
    Ok(out)
}

pub(crate) async fn list(config: Config, status: RequestStatus) -> Result<(), BoxError> {
    let store = open_lifecycle_store(&config.store).await?;
    let records = store.list_by_status(status).await;
    store.close().await?;

    let records = records?;
    if records.is_empty() {
        println!("No requests in status {}", status);
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {}  priority {}  retries {}/{}",
            record.request_id,
            record.identifier,
            record.priority,
            record.retry_count,
            record.max_retries
        );
    }
    println!("{} requests in status {}", records.len(), status);
    Ok(())
}

pub(crate) async fn purge(config: Config, days: Option<u32>) -> Result<(), BoxError> {
    let days = days.unwrap_or(config.store.retention_days);
    let store = open_lifecycle_store(&config.store).await?;
    let removed = store.purge_older_than(days).await;
    store.close().await?;

    let removed = removed?;
    info!("Purged {} records older than {} days", removed, days);
    println!("Purged {} records older than {} days", removed, days);
    Ok(())
}
