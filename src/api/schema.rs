//! Wire shapes for the score API and the checks applied to them before anything touches storage.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::prelude::{NewScore, Score};
use crate::db::schema::PLAYER_NAME_MAX_LEN;

pub const MAX_PAGE_LIMIT: i64 = 100;

#[inline]
const fn default_skip() -> i64 {
    0
}

#[inline]
const fn default_limit() -> i64 {
    10
}

/// Create-request body: `{"player_name": "...", "score": 0}`
pub struct ScoreCreate;

impl ScoreCreate {
    /// Checks every field of the request body and returns all violations at once.
    ///
    /// `player_name` is only bounded above; empty or whitespace-only names are accepted and stored
    /// as sent.
    pub fn parse(body: &Value) -> Result<NewScore, ValidationError> {
        let Some(fields) = body.as_object() else {
            return Err(ValidationError::single(
                &["body"],
                "value is not a valid dict",
                "type_error.dict",
            ));
        };

        let mut errors = ValidationError::default();

        let player_name = match fields.get("player_name") {
            None | Some(Value::Null) => {
                errors.push(&["body", "player_name"], "field required", "value_error.missing");
                None
            }
            Some(Value::String(name)) if name.chars().count() > PLAYER_NAME_MAX_LEN => {
                errors.push(
                    &["body", "player_name"],
                    &format!("ensure this value has at most {PLAYER_NAME_MAX_LEN} characters"),
                    "value_error.any_str.max_length",
                );
                None
            }
            Some(Value::String(name)) => Some(name.clone()),
            Some(_) => {
                errors.push(&["body", "player_name"], "str type expected", "type_error.str");
                None
            }
        };

        let score = match fields.get("score") {
            None | Some(Value::Null) => {
                errors.push(&["body", "score"], "field required", "value_error.missing");
                None
            }
            Some(Value::Number(n)) => match n.as_i64() {
                Some(v) if v < 0 => {
                    errors.push(
                        &["body", "score"],
                        "ensure this value is greater than or equal to 0",
                        "value_error.number.not_ge",
                    );
                    None
                }
                Some(v) => Some(v),
                None => {
                    errors.push(
                        &["body", "score"],
                        "value is not a valid integer",
                        "type_error.integer",
                    );
                    None
                }
            },
            Some(_) => {
                errors.push(
                    &["body", "score"],
                    "value is not a valid integer",
                    "type_error.integer",
                );
                None
            }
        };

        match (player_name, score) {
            (Some(player_name), Some(score)) if errors.is_empty() => {
                Ok(NewScore::new(player_name, score))
            }
            _ => Err(errors),
        }
    }
}

/// Query parameters for the ranked listing
#[derive(Clone, Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: default_skip(),
            limit: default_limit(),
        }
    }
}

impl ListParams {
    /// Returns `(skip, limit)` once `skip >= 0` and `0 < limit <= 100` hold.
    pub fn validate(&self) -> Result<(i64, i64), ValidationError> {
        let mut errors = ValidationError::default();

        if self.skip < 0 {
            errors.push(
                &["query", "skip"],
                "ensure this value is greater than or equal to 0",
                "value_error.number.not_ge",
            );
        }

        if self.limit <= 0 {
            errors.push(
                &["query", "limit"],
                "ensure this value is greater than 0",
                "value_error.number.not_gt",
            );
        } else if self.limit > MAX_PAGE_LIMIT {
            errors.push(
                &["query", "limit"],
                &format!("ensure this value is less than or equal to {MAX_PAGE_LIMIT}"),
                "value_error.number.not_le",
            );
        }

        if errors.is_empty() {
            Ok((self.skip, self.limit))
        } else {
            Err(errors)
        }
    }
}

/// Score record as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRead {
    pub id: i64,
    pub player_name: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Score> for ScoreRead {
    fn from(row: Score) -> Self {
        Self {
            id: row.id,
            player_name: row.player_name,
            score: row.score,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationError {
    pub detail: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request validation failed: {}", self.summary())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn single(loc: &[&str], msg: &str, kind: &str) -> Self {
        let mut err = Self::default();
        err.push(loc, msg, kind);
        err
    }

    pub fn push(&mut self, loc: &[&str], msg: &str, kind: &str) {
        self.detail.push(FieldError {
            loc: loc.iter().map(|s| s.to_string()).collect(),
            msg: msg.to_string(),
            kind: kind.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.detail.is_empty()
    }

    fn summary(&self) -> String {
        self.detail
            .iter()
            .map(|e| format!("{} - {}", e.loc.join("."), e.msg))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn locs(err: &ValidationError) -> Vec<String> {
        err.detail.iter().map(|e| e.loc.join(".")).collect()
    }

    #[test]
    fn test_parse_valid() {
        let parsed = ScoreCreate::parse(&json!({"player_name": "alice", "score": 50})).unwrap();
        assert_eq!(parsed, NewScore::new("alice", 50));
    }

    #[test]
    fn test_parse_name_length_bounds() {
        let fifteen = "a".repeat(15);
        let sixteen = "a".repeat(16);

        assert!(ScoreCreate::parse(&json!({"player_name": fifteen, "score": 1})).is_ok());

        let err = ScoreCreate::parse(&json!({"player_name": sixteen, "score": 1})).unwrap_err();
        assert_eq!(locs(&err), vec!["body.player_name"]);
        assert_eq!(err.detail[0].kind, "value_error.any_str.max_length");
    }

    #[test]
    fn test_parse_counts_characters_not_bytes() {
        // 15 characters, 45 bytes
        let name = "ñ".repeat(15);
        assert!(ScoreCreate::parse(&json!({"player_name": name, "score": 1})).is_ok());
    }

    #[test]
    fn test_parse_empty_name_accepted() {
        let parsed = ScoreCreate::parse(&json!({"player_name": "", "score": 0})).unwrap();
        assert_eq!(parsed.player_name, "");

        let parsed = ScoreCreate::parse(&json!({"player_name": "   ", "score": 0})).unwrap();
        assert_eq!(parsed.player_name, "   ");
    }

    #[test]
    fn test_parse_negative_score() {
        let err = ScoreCreate::parse(&json!({"player_name": "bob", "score": -1})).unwrap_err();
        assert_eq!(locs(&err), vec!["body.score"]);
        assert_eq!(err.detail[0].kind, "value_error.number.not_ge");
    }

    #[test]
    fn test_parse_type_errors() {
        let err = ScoreCreate::parse(&json!({"player_name": 7, "score": 1.5})).unwrap_err();
        assert_eq!(locs(&err), vec!["body.player_name", "body.score"]);

        let err = ScoreCreate::parse(&json!({"player_name": "x", "score": "10"})).unwrap_err();
        assert_eq!(err.detail[0].kind, "type_error.integer");

        let err = ScoreCreate::parse(&json!({"player_name": "x", "score": 50.0})).unwrap_err();
        assert_eq!(err.detail[0].kind, "type_error.integer");

        let err =
            ScoreCreate::parse(&json!({"player_name": "x", "score": u64::MAX})).unwrap_err();
        assert_eq!(err.detail[0].kind, "type_error.integer");
    }

    #[test]
    fn test_parse_collects_missing_fields() {
        let err = ScoreCreate::parse(&json!({})).unwrap_err();
        assert_eq!(locs(&err), vec!["body.player_name", "body.score"]);

        let err = ScoreCreate::parse(&json!([1, 2])).unwrap_err();
        assert_eq!(locs(&err), vec!["body"]);
    }

    #[test]
    fn test_list_params_bounds() {
        assert_eq!(ListParams::default().validate().unwrap(), (0, 10));
        assert_eq!(ListParams { skip: 3, limit: 100 }.validate().unwrap(), (3, 100));
        assert_eq!(ListParams { skip: 0, limit: 1 }.validate().unwrap(), (0, 1));

        let err = ListParams { skip: -1, limit: 0 }.validate().unwrap_err();
        assert_eq!(locs(&err), vec!["query.skip", "query.limit"]);

        let err = ListParams { skip: 0, limit: 101 }.validate().unwrap_err();
        assert_eq!(err.detail[0].kind, "value_error.number.not_le");
    }

    #[test]
    fn test_score_read_serialization() {
        let created_at = "2024-05-01T12:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let read = ScoreRead::from(Score {
            id: 3,
            player_name: "carol".into(),
            score: 70,
            created_at,
        });

        let value = serde_json::to_value(&read).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["player_name"], "carol");
        assert_eq!(value["score"], 70);
        assert_eq!(value["created_at"], "2024-05-01T12:30:00Z");
    }

    #[test]
    fn test_validation_error_body() {
        let err = ValidationError::single(&["body", "score"], "field required", "value_error.missing");
        let value = serde_json::to_value(&err).unwrap();

        assert_eq!(
            value,
            json!({"detail": [{"loc": ["body", "score"], "msg": "field required", "type": "value_error.missing"}]})
        );
        assert_eq!(err.to_string(), "request validation failed: body.score - field required");
    }
}
