use std::ops::{Deref, DerefMut};

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::instrument;

use crate::db::DbResult;

/// A pooled connection held for the duration of one request.
///
/// The connection goes back to the pool when the session is dropped, which happens on every exit
/// path of the owning handler (including `?` returns and unwinding).
pub struct Session {
    conn: PoolConnection<Sqlite>,
}

impl Session {
    #[instrument(skip(pool), level = "trace")]
    pub async fn acquire(pool: &SqlitePool) -> DbResult<Self> {
        let conn = pool.acquire().await?;
        tracing::trace!(idle = pool.num_idle(), "session acquired");

        Ok(Self { conn })
    }
}

impl Deref for Session {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::trace!("session released");
    }
}
