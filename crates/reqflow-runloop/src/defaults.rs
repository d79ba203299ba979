//! Default response handlers: CSV, JSON, error, raw.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use reqflow_store::{LifecycleStore, ResponseKind, ResponseRecord};

use crate::error::RunLoopError;
use crate::handler::{HandlerRegistry, ResponseAction, ResponseHandler, ResponsePayload};
use crate::provider::DataProvider;

pub const CSV_HANDLER: &str = "csv";
pub const JSON_HANDLER: &str = "json";
pub const ERROR_HANDLER: &str = "error";
pub const RAW_HANDLER: &str = "raw";

/// Downloads the item and stores it as CSV.
pub struct CsvAction {
    provider: Arc<dyn DataProvider>,
    store: Arc<dyn LifecycleStore>,
}

impl CsvAction {
    pub fn new(provider: Arc<dyn DataProvider>, store: Arc<dyn LifecycleStore>) -> Self {
        Self { provider, store }
    }
}

#[async_trait]
impl ResponseAction for CsvAction {
    async fn handle(&self, payload: &ResponsePayload) -> Result<(), RunLoopError> {
        let content = self.provider.download(&payload.key).await?;
        info!(
            "Downloaded {} ({} bytes) for {}",
            payload.key,
            content.len(),
            payload.identifier
        );
        self.store
            .store_response(
                ResponseRecord::new(
                    &payload.request_id,
                    &payload.identifier,
                    ResponseKind::Csv,
                    &payload.content_type,
                    content,
                )
                .with_key(&payload.key),
            )
            .await?;
        Ok(())
    }
}

/// Stores the item metadata as JSON.
pub struct JsonAction {
    store: Arc<dyn LifecycleStore>,
}

impl JsonAction {
    pub fn new(store: Arc<dyn LifecycleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResponseAction for JsonAction {
    async fn handle(&self, payload: &ResponsePayload) -> Result<(), RunLoopError> {
        let content = serde_json::to_string(&payload.metadata)
            .map_err(|e| RunLoopError::Internal(e.to_string()))?;
        self.store
            .store_response(
                ResponseRecord::new(
                    &payload.request_id,
                    &payload.identifier,
                    ResponseKind::Json,
                    &payload.content_type,
                    content,
                )
                .with_key(&payload.key),
            )
            .await?;
        Ok(())
    }
}

/// Records the error message against the request.
pub struct ErrorAction {
    store: Arc<dyn LifecycleStore>,
}

impl ErrorAction {
    pub fn new(store: Arc<dyn LifecycleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResponseAction for ErrorAction {
    async fn handle(&self, payload: &ResponsePayload) -> Result<(), RunLoopError> {
        let message = payload
            .error
            .clone()
            .unwrap_or_else(|| format!("HTTP {}", payload.status));
        self.store.record_error(&payload.request_id, &message).await?;
        self.store
            .store_response(ResponseRecord::new(
                &payload.request_id,
                &payload.identifier,
                ResponseKind::Error,
                &payload.content_type,
                message,
            ))
            .await?;
        Ok(())
    }
}

/// Stores the raw item as returned by the poll.
pub struct RawAction {
    store: Arc<dyn LifecycleStore>,
}

impl RawAction {
    pub fn new(store: Arc<dyn LifecycleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResponseAction for RawAction {
    async fn handle(&self, payload: &ResponsePayload) -> Result<(), RunLoopError> {
        let raw = serde_json::json!({
            "key": payload.key,
            "content_type": payload.content_type,
            "metadata": payload.metadata,
        });
        self.store
            .store_response(
                ResponseRecord::new(
                    &payload.request_id,
                    &payload.identifier,
                    ResponseKind::Raw,
                    &payload.content_type,
                    raw.to_string(),
                )
                .with_key(&payload.key),
            )
            .await?;
        Ok(())
    }
}

impl HandlerRegistry {
    /// Registry holding the CSV, JSON, error and raw handlers, in that order.
    pub fn with_defaults(provider: Arc<dyn DataProvider>, store: Arc<dyn LifecycleStore>) -> Self {
        let mut registry = HandlerRegistry::new();
        registry
            .register(ResponseHandler::new(
                CSV_HANDLER,
                |p: &ResponsePayload| p.content_type_contains("csv"),
                Arc::new(CsvAction::new(provider, Arc::clone(&store))),
            ))
            .register(ResponseHandler::new(
                JSON_HANDLER,
                |p: &ResponsePayload| p.content_type_contains("json"),
                Arc::new(JsonAction::new(Arc::clone(&store))),
            ))
            .register(ResponseHandler::new(
                ERROR_HANDLER,
                |p: &ResponsePayload| p.is_error(),
                Arc::new(ErrorAction::new(Arc::clone(&store))),
            ))
            .register(ResponseHandler::new(
                RAW_HANDLER,
                |_: &ResponsePayload| true,
                Arc::new(RawAction::new(store)),
            ));
        registry
    }
}
