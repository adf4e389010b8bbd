use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::api::schema::{ListParams, ScoreCreate, ScoreRead, ValidationError};
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::prelude::ScoreRepository;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        message: "API is healthy",
    })
}

#[instrument(skip(state, payload))]
pub async fn create_score(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, RouteError> {
    let Json(body) = payload.map_err(|rejection| {
        ValidationError::single(&["body"], &rejection.body_text(), "value_error.jsondecode")
    })?;
    let new_score = ScoreCreate::parse(&body)?;

    let mut session = state.session().await?;
    let created = ScoreRepository::new(&mut session).create(&new_score).await?;

    Ok((StatusCode::CREATED, Json(ScoreRead::from(created))))
}

#[instrument(skip(state))]
pub async fn list_scores(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> JsonResult<Vec<ScoreRead>> {
    let Query(params) = params.map_err(|rejection| {
        ValidationError::single(&["query"], &rejection.body_text(), "type_error.integer")
    })?;
    let (skip, limit) = params.validate()?;

    let mut session = state.session().await?;
    let scores = ScoreRepository::new(&mut session).list(skip, limit).await?;

    Ok(Json(scores.into_iter().map(ScoreRead::from).collect()))
}

#[instrument(skip(state))]
pub async fn score_by_id(
    State(state): State<Arc<AppState>>,
    score_id: Result<Path<i64>, PathRejection>,
) -> JsonResult<ScoreRead> {
    let Path(score_id) = score_id.map_err(|rejection| {
        ValidationError::single(
            &["path", "score_id"],
            &rejection.body_text(),
            "type_error.integer",
        )
    })?;

    let mut session = state.session().await?;
    match ScoreRepository::new(&mut session).get_by_id(score_id).await? {
        Some(score) => Ok(Json(score.into())),
        None => Err(RouteError::NotFound(String::from("Score not found"))),
    }
}
