//! Provider wire types.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use reqflow_runloop::PollItem;

/// Body of a content-responses listing.
///
/// Newer API versions list items under `contains`, older ones under `responses`.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseListing {
    #[serde(default)]
    pub contains: Vec<Value>,
    #[serde(default)]
    pub responses: Vec<Value>,
}

impl ResponseListing {
    /// Convert the listed items into poll items, skipping entries without a key.
    pub fn into_items(self) -> Vec<PollItem> {
        self.contains
            .into_iter()
            .chain(self.responses)
            .filter_map(|item| {
                let Some(key) = item_key(&item) else {
                    warn!("Skipping response item without key: {}", item);
                    return None;
                };
                let mut poll_item = PollItem::new(key);
                if let Some(content_type) = header_content_type(&item) {
                    poll_item = poll_item.with_content_type(content_type);
                }
                Some(poll_item.with_metadata(item))
            })
            .collect()
    }
}

fn item_key(item: &Value) -> Option<String> {
    item.get("key")
        .or_else(|| item.get("responseId"))
        .and_then(Value::as_str)
        .map(String::from)
}

fn header_content_type(item: &Value) -> Option<String> {
    let headers = item.get("headers")?.as_object()?;
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .and_then(|(_, value)| value.as_str())
        .map(String::from)
}

/// Pull a human-readable message out of an error body.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value["error"]["message"]
        .as_str()
        .or_else(|| value["message"].as_str())
        .or_else(|| value["description"].as_str())
        .map(String::from)
}
