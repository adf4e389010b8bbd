//! Static table definitions and the startup routine that materializes them.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::db::DbResult;

#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indexes: &'static [Index],
}

/// A column name plus its SQL type and constraints.
#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub definition: &'static str,
}

#[derive(Debug)]
pub struct Index {
    pub name: &'static str,
    pub column: &'static str,
}

/// Longest accepted `player_name`, in characters.
pub const PLAYER_NAME_MAX_LEN: usize = 15;

pub const SCORES: Table = Table {
    name: "scores",
    columns: &[
        Column {
            name: "id",
            definition: "INTEGER PRIMARY KEY AUTOINCREMENT",
        },
        Column {
            name: "player_name",
            definition: "TEXT NOT NULL CHECK (length(player_name) <= 15)",
        },
        Column {
            name: "score",
            definition: "INTEGER NOT NULL CHECK (score >= 0)",
        },
        Column {
            name: "created_at",
            definition: "TEXT NOT NULL",
        },
    ],
    indexes: &[
        Index {
            name: "ix_scores_player_name",
            column: "player_name",
        },
        Index {
            name: "ix_scores_score",
            column: "score",
        },
    ],
};

impl Table {
    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.definition))
            .collect::<Vec<_>>()
            .join(",\n    ");

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name, columns
        )
    }

    pub fn index_statements(&self) -> impl Iterator<Item = String> + '_ {
        self.indexes.iter().map(|ix| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                ix.name, self.name, ix.column
            )
        })
    }
}

/// Creates every table (and its indexes) that does not exist yet. Existing tables are left as-is,
/// so this is safe to run on every start.
#[instrument(skip(pool, tables), fields(count = tables.len()))]
pub async fn init_schema(pool: &SqlitePool, tables: &[&Table]) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    for table in tables {
        sqlx::query(&table.create_statement())
            .execute(&mut *tx)
            .await?;

        for stmt in table.index_statements() {
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }

        tracing::debug!(table = table.name, "table checked/created");
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    use super::*;

    /// Single-connection in-memory pool; every connection to `:memory:` is its own database, so the
    /// pool must never open a second one.
    pub async fn memory_pool() -> SqlitePool {
        let opts = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .expect("failed to create in-memory pool")
    }

    pub async fn scores_pool() -> SqlitePool {
        let pool = memory_pool().await;
        init_schema(&pool, &[&SCORES])
            .await
            .expect("failed to init schema");
        pool
    }

    #[test]
    fn test_create_statement() {
        let stmt = SCORES.create_statement();

        assert!(stmt.starts_with("CREATE TABLE IF NOT EXISTS scores ("));
        assert!(stmt.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(stmt.contains("created_at TEXT NOT NULL"));
        assert_eq!(SCORES.index_statements().count(), 2);
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let pool = memory_pool().await;

        init_schema(&pool, &[&SCORES]).await.unwrap();
        init_schema(&pool, &[&SCORES]).await.unwrap();

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(SCORES.name)
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(tables, vec!["scores".to_string()]);

        let indexes: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'scores' AND name LIKE 'ix_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(indexes, 2);
    }

    #[tokio::test]
    async fn test_init_schema_keeps_rows() {
        let pool = scores_pool().await;
        sqlx::query("INSERT INTO scores (player_name, score, created_at) VALUES ('alice', 5, '2024-01-01T00:00:00Z')")
            .execute(&pool)
            .await
            .unwrap();

        init_schema(&pool, &[&SCORES]).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scores")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
