// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use services::{email::EmailService, knowledge::EmbeddingsClient};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: redis::aio::MultiplexedConnection,
    pub config: Arc<Config>,
    pub email: Option<Arc<EmailService>>,
    pub embeddings: Option<Arc<EmbeddingsClient>>,
}
