pub mod activity;
pub mod auth_sessions;
pub mod stories;

use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions};

/// Default number of PostgreSQL connections in the pool.
/// Can be overridden via the `GITFABLES_PG_MAX_CONNECTIONS` environment variable.
const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Gets the maximum number of PostgreSQL connections from the environment.
///
/// Returns the value of `GITFABLES_PG_MAX_CONNECTIONS` when it is a positive
/// integer, `DEFAULT_MAX_CONNECTIONS` otherwise.
pub fn get_max_connections() -> u32 {
    std::env::var("GITFABLES_PG_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(get_max_connections())
        .connect(database_url)
        .await
}
