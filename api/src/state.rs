use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use common::config::Settings;
use common::db::DbPool;
use common::engine::EngineClient;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub redis_client: redis::Client,
    pub engine: Arc<EngineClient>,
    pub config: Arc<Settings>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        db_pool: DbPool,
        redis_client: redis::Client,
        engine: EngineClient,
        config: Settings,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            db_pool,
            redis_client,
            engine: Arc::new(engine),
            config: Arc::new(config),
            metrics_handle,
        }
    }
}
