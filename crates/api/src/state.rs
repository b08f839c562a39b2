use std::sync::Arc;

use applaude_db::DbPool;
use applaude_pipeline::queue::PgTaskQueue;
use applaude_pipeline::store::PgProjectStore;
use applaude_pipeline::{Dispatcher, ProjectStore};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cloning is cheap: every field is a pool handle or an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
    /// Row-locked project access shared with the pipeline.
    pub store: Arc<dyn ProjectStore>,
    /// Enqueues the first stage of new projects.
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Wire the Postgres-backed store and queue around `pool`.
    pub fn new(pool: DbPool, config: ServerConfig) -> Self {
        let store: Arc<dyn ProjectStore> = Arc::new(PgProjectStore::new(pool.clone()));
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(PgTaskQueue::new(pool.clone())));
        Self {
            pool,
            config: Arc::new(config),
            ws_manager: Arc::new(WsManager::new()),
            store,
            dispatcher,
        }
    }
}
