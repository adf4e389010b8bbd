use chrono::{DateTime, Utc};

/// Row in the `scores` table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Score {
    pub id: i64,
    pub player_name: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// Values supplied by the client for an insert; `id` and `created_at` are assigned on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScore {
    pub player_name: String,
    pub score: i64,
}

impl NewScore {
    pub fn new(player_name: impl Into<String>, score: i64) -> Self {
        Self {
            player_name: player_name.into(),
            score,
        }
    }
}
