use std::sync::Arc;

use cache::ReadThroughCache;
use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;

pub mod cache;
pub mod common;
pub mod config;
pub mod database;
pub mod middleware;
pub mod sync;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub cache: Arc<ReadThroughCache>,
}
