//! First-match response handler registry.
//!
//! Handlers are `(name, predicate, action)` triples evaluated in
//! registration order. The first predicate that matches has its action run
//! and evaluation stops there, so each response is handled at most once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use reqflow_queue::RequestRecord;

use crate::error::RunLoopError;
use crate::provider::PollItem;

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;

/// Content type assumed when the provider gives none.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// One completed response handed to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePayload {
    pub request_id: String,
    pub identifier: String,
    pub request_name: String,
    /// Download key of the ready item.
    pub key: String,
    pub content_type: String,
    pub metadata: serde_json::Value,
    /// HTTP status of the poll that produced this payload.
    pub status: u16,
    pub error: Option<String>,
}

impl ResponsePayload {
    /// Build the payload for one poll item of `record`.
    pub fn from_item(record: &RequestRecord, item: &PollItem, status: u16) -> Self {
        Self {
            request_id: record.request_id.clone(),
            identifier: record.identifier.clone(),
            request_name: record.request_name.clone(),
            key: item.key.clone(),
            content_type: resolve_content_type(item),
            metadata: item.metadata.clone(),
            status,
            error: item
                .metadata
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string),
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Error message present or status >= 400.
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.status >= 400
    }

    /// Case-insensitive substring match on the content type.
    pub fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    }
}

/// The item's own content type, then `metadata.headers["Content-Type"]`, then `text/plain`.
pub fn resolve_content_type(item: &PollItem) -> String {
    if let Some(ct) = item.content_type.as_deref().filter(|ct| !ct.is_empty()) {
        return ct.to_string();
    }
    item.metadata
        .get("headers")
        .and_then(|h| h.as_object())
        .and_then(|headers| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                .and_then(|(_, value)| value.as_str())
        })
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Handler predicate.
pub type Predicate = Box<dyn Fn(&ResponsePayload) -> bool + Send + Sync>;

/// Handler action.
#[async_trait]
pub trait ResponseAction: Send + Sync {
    async fn handle(&self, payload: &ResponsePayload) -> Result<(), RunLoopError>;
}

/// A named predicate and action pair.
pub struct ResponseHandler {
    name: String,
    predicate: Predicate,
    action: Arc<dyn ResponseAction>,
}

impl ResponseHandler {
    pub fn new<P>(name: impl Into<String>, predicate: P, action: Arc<dyn ResponseAction>) -> Self
    where
        P: Fn(&ResponsePayload) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            action,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, payload: &ResponsePayload) -> bool {
        (self.predicate)(payload)
    }
}

impl std::fmt::Debug for ResponseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandler").field("name", &self.name).finish()
    }
}

/// Result of dispatching one payload.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The named handler's action ran successfully.
    Handled(String),
    /// The named handler matched but its action failed.
    Failed { handler: String, error: RunLoopError },
    /// No predicate matched.
    Unmatched,
}

impl DispatchOutcome {
    /// Name of the handler that matched, if any.
    pub fn handler(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Handled(name) => Some(name),
            DispatchOutcome::Failed { handler, .. } => Some(handler),
            DispatchOutcome::Unmatched => None,
        }
    }
}

/// Ordered handler list.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<ResponseHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; it is evaluated after every handler already registered.
    pub fn register(&mut self, handler: ResponseHandler) -> &mut Self {
        debug!("Registered response handler {}", handler.name());
        self.handlers.push(handler);
        self
    }

    /// Prepend a handler so it overrides every existing one.
    pub fn register_front(&mut self, handler: ResponseHandler) -> &mut Self {
        debug!("Registered response handler {} at front", handler.name());
        self.handlers.insert(0, handler);
        self
    }

    /// Insert before the handler called `before`. Appends when there is no such handler.
    pub fn register_before(&mut self, before: &str, handler: ResponseHandler) -> &mut Self {
        match self.handlers.iter().position(|h| h.name() == before) {
            Some(index) => self.handlers.insert(index, handler),
            None => {
                warn!("No handler named {}; appending {}", before, handler.name());
                self.handlers.push(handler);
            }
        }
        self
    }

    /// Handler names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the first matching handler's action.
    pub async fn dispatch(&self, payload: &ResponsePayload) -> DispatchOutcome {
        let Some(handler) = self.handlers.iter().find(|h| h.matches(payload)) else {
            warn!("No handler matched response {} ({})", payload.key, payload.content_type);
            return DispatchOutcome::Unmatched;
        };

        debug!(
            "Dispatching {} for {} to handler {}",
            payload.key, payload.request_id, handler.name()
        );
        match handler.action.handle(payload).await {
            Ok(()) => DispatchOutcome::Handled(handler.name().to_string()),
            Err(e) => {
                error!(
                    "Handler {} failed for {}: {}",
                    handler.name(),
                    payload.request_id,
                    e
                );
                DispatchOutcome::Failed {
                    handler: handler.name().to_string(),
                    error: RunLoopError::HandlerFault {
                        name: handler.name().to_string(),
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}
