//! Opens the configured queue backend, lifecycle store and provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use reqflow_config::{BackendKind, Config, ConfigLoader, QueueConfig, StoreConfig};
use reqflow_provider_http::HttpDataProvider;
use reqflow_queue::{PriorityQueue, open_backend};
use reqflow_store::{LifecycleStore, open_store};

type BoxError = Box<dyn std::error::Error>;

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy()))
}

/// Expand `path` and make sure its parent directory exists.
fn prepare_db_path(path: &Path) -> Result<PathBuf, BoxError> {
    let path = expand(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}

/// Open the queue backend and return a handle on the request queue.
pub(crate) async fn open_request_queue(config: &QueueConfig) -> Result<PriorityQueue, BoxError> {
    let mut config = config.clone();
    match config.backend {
        BackendKind::Memory => {
            warn!("Using the in-memory queue backend; entries are not shared between processes");
        }
        BackendKind::Sqlite => {
            if let Some(path) = config.db_path.take() {
                let path = prepare_db_path(&path)?;
                info!("Opening queue database {}", path.display());
                config.db_path = Some(path);
            }
        }
    }
    let backend = open_backend(&config).await?;
    Ok(PriorityQueue::new(backend, config.request_queue.clone()))
}

pub(crate) async fn open_lifecycle_store(
    config: &StoreConfig,
) -> Result<Arc<dyn LifecycleStore>, BoxError> {
    let mut config = config.clone();
    let sqlite_path = match config.backend {
        BackendKind::Sqlite => config.db_path.take(),
        BackendKind::Memory => None,
    };
    if let Some(path) = sqlite_path {
        let path = prepare_db_path(&path)?;
        info!("Opening lifecycle database {}", path.display());
        config.db_path = Some(path);
    }
    Ok(open_store(&config).await?)
}

pub(crate) fn open_provider(config: &Config) -> Result<Arc<HttpDataProvider>, BoxError> {
    Ok(Arc::new(HttpDataProvider::new(&config.provider)?))
}
