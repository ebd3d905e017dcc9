use std::sync::Arc;

use cache::UserCache;
use config::Config;
use queue::UserBackend;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod queue;
pub mod result;
pub mod router;
pub mod routes;
pub mod store;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cache: UserCache,
    pub backend: Arc<dyn UserBackend>,
}
