use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::DbResult;
use crate::db::models::score::{NewScore, Score};
use crate::db::repositories::sql_fragment::SCORE_FIELDS;
use crate::db::schema::SCORES;
use crate::db::session::Session;

pub struct ScoreRepository<'s> {
    conn: &'s mut SqliteConnection,
}

impl<'s> ScoreRepository<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { conn: session }
    }

    /// Inserts a score, stamping `created_at` with the current time, and returns the stored row.
    #[instrument(skip(self, item), fields(player_name = %item.player_name, score = item.score))]
    pub async fn create(&mut self, item: &NewScore) -> DbResult<Score> {
        let created = sqlx::query_as::<_, Score>(&format!(
            r#"
            INSERT INTO {} (
                player_name,
                score,
                created_at
            )
            VALUES (?, ?, ?)
            RETURNING {}
            "#,
            SCORES.name, SCORE_FIELDS
        ))
        .bind(&item.player_name)
        .bind(item.score)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await;

        match created {
            Ok(score) => {
                tracing::debug!(id = score.id, "score created");
                Ok(score)
            }
            Err(e) => {
                tracing::error!(error = ?e, "score insert failure");
                Err(e.into())
            }
        }
    }

    /// Ranked page of scores: highest score first, earlier submissions first among equal scores.
    ///
    /// `id` breaks any remaining tie, so rows stamped within the same clock tick keep submission
    /// order.
    #[instrument(skip(self))]
    pub async fn list(&mut self, skip: i64, limit: i64) -> DbResult<Vec<Score>> {
        let scores = sqlx::query_as::<_, Score>(&format!(
            r#"
            SELECT {}
            FROM {}
            ORDER BY score DESC, created_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
            SCORE_FIELDS, SCORES.name
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(scores)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&mut self, id: i64) -> DbResult<Option<Score>> {
        let score = sqlx::query_as::<_, Score>(&format!(
            "SELECT {} FROM {} WHERE id = ?",
            SCORE_FIELDS, SCORES.name
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(score)
    }

    #[instrument(skip(self))]
    pub async fn count(&mut self) -> DbResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", SCORES.name))
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(total)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::schema::test::scores_pool;

    async fn seed(session: &mut Session, rows: &[(&str, i64)]) -> Vec<Score> {
        let mut repo = ScoreRepository::new(session);
        let mut out = Vec::new();
        for (name, score) in rows {
            out.push(repo.create(&NewScore::new(*name, *score)).await.unwrap());
        }
        out
    }

    fn names(scores: &[Score]) -> Vec<&str> {
        scores.iter().map(|s| s.player_name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_returns_populated_row() {
        let pool = scores_pool().await;
        let mut session = Session::acquire(&pool).await.unwrap();

        let before = Utc::now();
        let created = ScoreRepository::new(&mut session)
            .create(&NewScore::new("alice", 50))
            .await
            .unwrap();

        assert_eq!(created.player_name, "alice");
        assert_eq!(created.score, 50);
        assert!(created.id > 0);
        assert!(created.created_at >= before);
    }

    #[tokio::test]
    async fn test_ids_and_timestamps_increase() {
        let pool = scores_pool().await;
        let mut session = Session::acquire(&pool).await.unwrap();

        let rows = seed(&mut session, &[("a", 1), ("b", 2), ("c", 3), ("d", 0)]).await;

        for pair in rows.windows(2) {
            assert!(pair[1].id > pair[0].id);
            assert!(pair[1].created_at >= pair[0].created_at);
        }
    }

    #[tokio::test]
    async fn test_list_orders_by_score_then_submission() {
        let pool = scores_pool().await;
        let mut session = Session::acquire(&pool).await.unwrap();
        seed(&mut session, &[("alice", 50), ("bob", 70), ("carol", 70)]).await;

        let ranked = ScoreRepository::new(&mut session).list(0, 10).await.unwrap();

        assert_eq!(names(&ranked), vec!["bob", "carol", "alice"]);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let pool = scores_pool().await;
        let mut session = Session::acquire(&pool).await.unwrap();
        seed(
            &mut session,
            &[("e", 10), ("d", 20), ("c", 30), ("b", 40), ("a", 50)],
        )
        .await;

        let mut repo = ScoreRepository::new(&mut session);

        assert_eq!(names(&repo.list(0, 2).await.unwrap()), vec!["a", "b"]);
        assert_eq!(names(&repo.list(2, 2).await.unwrap()), vec!["c", "d"]);
        assert_eq!(names(&repo.list(4, 2).await.unwrap()), vec!["e"]);
        assert!(repo.list(5, 10).await.unwrap().is_empty());
        assert!(repo.list(500, 100).await.unwrap().is_empty());
        assert_eq!(repo.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_list_empty_table() {
        let pool = scores_pool().await;
        let mut session = Session::acquire(&pool).await.unwrap();

        let ranked = ScoreRepository::new(&mut session).list(0, 10).await.unwrap();
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let pool = scores_pool().await;
        let mut session = Session::acquire(&pool).await.unwrap();
        let created = seed(&mut session, &[("alice", 50)]).await.remove(0);

        let mut repo = ScoreRepository::new(&mut session);

        assert_eq!(repo.get_by_id(created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(repo.get_by_id(created.id + 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_storage_constraint_violation_is_error() {
        let pool = scores_pool().await;
        let mut session = Session::acquire(&pool).await.unwrap();

        let res = ScoreRepository::new(&mut session)
            .create(&NewScore::new("alice", -1))
            .await;

        assert!(res.is_err());
    }
}
