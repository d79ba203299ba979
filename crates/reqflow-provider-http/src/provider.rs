//! HTTP data provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use reqflow_config::ProviderConfig;
use reqflow_runloop::{DataProvider, PollResponse, ProviderError, SubmitResponse};

use crate::api::{ResponseListing, error_message};

const PROVIDER_ID: &str = "http";
const API_VERSION_HEADER: &str = "api-version";

/// Data provider speaking the catalog REST API over reqwest.
pub struct HttpDataProvider {
    client: reqwest::Client,
    base: Url,
    catalog: String,
    api_version: String,
    static_token: Option<String>,
    token_env: Option<String>,
    token: RwLock<Option<String>>,
}

impl HttpDataProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        if config.catalog.trim().is_empty() {
            return Err(ProviderError::Config("provider.catalog is empty".to_string()));
        }

        let mut base = Url::parse(&config.base_url)
            .map_err(|e| ProviderError::Config(format!("invalid base_url: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        let token = resolve_token(config.token.as_deref(), config.token_env.as_deref());
        if token.is_none() {
            warn!("No provider token configured; requests will be sent unauthenticated");
        }

        Ok(Self {
            client,
            base,
            catalog: config.catalog.clone(),
            api_version: config.api_version.clone(),
            static_token: config.token.clone(),
            token_env: config.token_env.clone(),
            token: RwLock::new(token),
        })
    }

    fn endpoint(&self, tail: &str) -> Result<Url, ProviderError> {
        self.base
            .join(&format!("eap/catalogs/{}/{}", self.catalog, tail))
            .map_err(|e| ProviderError::Config(format!("invalid endpoint {}: {}", tail, e)))
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(API_VERSION_HEADER, &self.api_version);
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn resolve_token(token: Option<&str>, token_env: Option<&str>) -> Option<String> {
    token_env
        .and_then(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
        .or_else(|| token.map(String::from))
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_builder() {
        ProviderError::Config(e.to_string())
    } else {
        ProviderError::Transport(e.to_string())
    }
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, ProviderError> {
        let url = self.endpoint("requests/")?;
        debug!("Submitting request to {}", url);

        let response = self
            .request(Method::POST, url)
            .await
            .json(payload)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_send_error)?;
        Ok(SubmitResponse::new(status, body))
    }

    async fn poll(&self, identifier: &str) -> Result<PollResponse, ProviderError> {
        let mut url = self.endpoint("content/responses/")?;
        url.query_pairs_mut()
            .append_pair("requestIdentifier", identifier);
        debug!("Polling {}", url);

        let response = self
            .request(Method::GET, url)
            .await
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_send_error)?;

        if status != StatusCode::OK {
            let reply = PollResponse::status(status.as_u16());
            return Ok(match error_message(&body) {
                Some(message) => reply.with_message(message),
                None => reply,
            });
        }

        let listing: ResponseListing = if body.trim().is_empty() {
            ResponseListing::default()
        } else {
            serde_json::from_str(&body).map_err(|e| {
                ProviderError::InvalidResponse(format!("poll reply for {}: {}", identifier, e))
            })?
        };
        Ok(PollResponse::ready(listing.into_items()))
    }

    async fn download(&self, key: &str) -> Result<String, ProviderError> {
        let url = self.endpoint(&format!("content/responses/{}", key))?;
        debug!("Downloading {}", url);

        let response = self
            .request(Method::GET, url)
            .await
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_send_error)?;
        match status {
            s if s.is_success() => Ok(body),
            StatusCode::UNAUTHORIZED => Err(ProviderError::Auth(format!(
                "download of {} rejected",
                key
            ))),
            s => Err(ProviderError::InvalidResponse(format!(
                "download of {} failed with HTTP {}",
                key,
                s.as_u16()
            ))),
        }
    }

    async fn refresh_auth(&self) -> Result<(), ProviderError> {
        let resolved = resolve_token(self.static_token.as_deref(), self.token_env.as_deref());
        let Some(token) = resolved else {
            return Err(ProviderError::Auth(
                "no token available to refresh".to_string(),
            ));
        };

        let mut current = self.token.write().await;
        if current.as_deref() != Some(token.as_str()) {
            info!("Provider token refreshed");
        } else {
            debug!("Provider token unchanged after refresh");
        }
        *current = Some(token);
        Ok(())
    }

    async fn close(&self) -> Result<(), ProviderError> {
        debug!("Closing HTTP provider session");
        Ok(())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
