mod schema;
pub mod from_row;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::csrf::OriginGuard;
use crate::gateway::GatewayClient;
use crate::rate_limit::RateLimiter;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub gateway: GatewayClient,
    pub limiter: RateLimiter,
    pub origin_guard: OriginGuard,
    /// Ceiling on payment amounts, minor units.
    pub max_amount_minor: i64,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
