use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::frontend::Frontend;
use crate::api::handler::*;
use crate::api::schema::ValidationError;
use crate::db::prelude::*;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

/// Body sent for every 500; internal error text stays in the logs.
pub const INTERNAL_ERROR_DETAIL: &str = "Internal server error";

#[derive(Clone, Debug)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

impl AppState {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Storage session for the current request; released when dropped.
    pub async fn session(&self) -> Result<Session, RouteError> {
        Ok(Session::acquire(&self.db_pool).await?)
    }
}

/// Builds the full application: API routes, front-end routes, and the shared middleware stack.
pub fn router(state: Arc<AppState>, frontend: &Frontend, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/api/health", get(health))
        // the front-end posts without the trailing slash
        .route("/api/scores", get(list_scores).post(create_score))
        .route("/api/scores/", get(list_scores).post(create_score))
        .route("/api/scores/{score_id}", get(score_by_id))
        .with_state(state);

    with_middleware(api.merge(frontend.router()), cors)
}

/// Wraps `app` in panic recovery, error logging, request tracing and CORS (innermost first).
pub fn with_middleware(app: Router, cors: CorsLayer) -> Router {
    app.layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(log_route_errors))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(cors)
}

/// Logs any response that carries a `RouteError`, with the request line it belongs to.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        match err.as_ref() {
            RouteError::Validation(_) | RouteError::NotFound(_) => {
                tracing::debug!(%method, %path, error = %err, "request rejected");
            }
            _ => {
                tracing::error!(%method, %path, error = ?err, "error occurred inside route handler");
            }
        }
    }

    res
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        String::from("unknown panic payload")
    };

    RouteError::Panic(message).into_response()
}

/// Binds `addr` and serves `app` until `shutdown` resolves.
#[instrument(skip(app, shutdown))]
pub async fn start_server<F>(addr: &str, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    let local: SocketAddr = listener.local_addr()?;

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}", local.port()),
        "server ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] DbError),

    #[error("handler panicked: {0}")]
    Panic(String),
}

#[derive(Serialize)]
pub struct ErrorResponse<T> {
    pub detail: T,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let mut response = match &self {
            RouteError::Validation(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(err.clone())).into_response()
            }

            RouteError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    detail: what.clone(),
                }),
            )
                .into_response(),

            RouteError::Storage(_) | RouteError::Panic(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: INTERNAL_ERROR_DETAIL,
                }),
            )
                .into_response(),
        };

        response.extensions_mut().insert(Arc::new(self));
        response
    }
}
