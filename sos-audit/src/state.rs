//! Application state for sos-audit

use std::sync::Arc;

use crate::config::{Config, ConfigError, MAX_BATCH_SIZE, StoreBackend};
use crate::error::{ProcessError, StoreError};
use crate::processor::AuditQueueProcessor;
use crate::store::{AuditStore, PgAuditStore, RestAuditStore};

/// Shared application state
///
/// A broken configuration does not stop the handler from starting: each
/// invocation then answers with the fatal error instead.
#[derive(Clone)]
pub struct AppState {
    store: Result<Arc<dyn AuditStore>, ConfigError>,
    batch_size: i64,
}

impl AppState {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store: Ok(store),
            batch_size: MAX_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn misconfigured(err: ConfigError) -> Self {
        Self {
            store: Err(err),
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Build the backend named by the configuration
    ///
    /// A store that cannot be constructed (unparseable `DATABASE_URL`, service
    /// key that is not a valid header value) leaves the state misconfigured.
    pub async fn from_config(config: &Config) -> Self {
        match build_store(config).await {
            Ok(store) => Self::new(store).with_batch_size(config.batch_size),
            Err(e) => {
                tracing::error!(error = %e, "Audit backend could not be initialised");
                Self::misconfigured(ConfigError::Backend(e.to_string()))
            }
        }
    }

    pub fn store(&self) -> Result<&Arc<dyn AuditStore>, ProcessError> {
        self.store.as_ref().map_err(|e| ProcessError::Config(e.clone()))
    }

    pub fn processor(&self) -> Result<AuditQueueProcessor, ProcessError> {
        let store = self.store()?.clone();
        Ok(AuditQueueProcessor::new(store).with_batch_size(self.batch_size))
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn AuditStore>, StoreError> {
    let store: Arc<dyn AuditStore> = match &config.backend {
        StoreBackend::Postgres { database_url } => {
            let store = PgAuditStore::connect_lazy(database_url)?;
            if config.run_migrations {
                // 迁移失败不阻止启动：取批时再以 500 暴露
                match store.migrate().await {
                    Ok(()) => tracing::info!("Audit tables migrated"),
                    Err(e) => tracing::error!(error = %e, "Migration failed"),
                }
            }
            Arc::new(store)
        }
        StoreBackend::Rest { url, service_key } => Arc::new(RestAuditStore::new(url, service_key)?),
    };
    Ok(store)
}
