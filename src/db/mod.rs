use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use thiserror::Error;
use tracing::instrument;

pub mod models;
pub mod repositories;
pub mod schema;
pub mod session;

pub mod prelude {
    pub use crate::db::models::score::{NewScore, Score};
    pub use crate::db::repositories::score::ScoreRepository;
    pub use crate::db::schema::{SCORES, init_schema};
    pub use crate::db::session::Session;
    pub use crate::db::{DbError, connect};
}

/// Opens the connection pool for `database_url`, creating the database file if it does not exist.
#[instrument]
pub async fn connect(database_url: &str) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    tracing::debug!(size = pool.size(), "database pool opened");
    Ok(pool)
}

pub type DbResult<T> = core::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    SqlxError(#[from] sqlx::Error),
}
