use std::sync::Arc;

use thiserror::Error;

use crate::api::frontend::Frontend;
use crate::api::middleware::cors::cors_layer;
use crate::api::server::{AppState, router, start_server};
use crate::db::prelude::*;
use crate::util::env::{Env, EnvErr};
use crate::util::telemetry;

mod api;
mod db;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error + Send + Sync>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let env = Env::load()?;
    let telemetry = telemetry::Telemetry::new(&env)?.register()?;

    tracing::info!(database_url = %env.database_url, "starting scoreboard server");

    let pool = connect(&env.database_url).await?;
    init_schema(&pool, &[&SCORES]).await?;

    let existing = {
        let mut session = Session::acquire(&pool).await?;
        ScoreRepository::new(&mut session).count().await?
    };
    tracing::info!(existing, "database tables checked/created");

    let state = Arc::new(AppState::new(pool.clone()));
    let frontend = Frontend::new(&env.frontend_dist);
    let app = router(state, &frontend, cors_layer(&env.cors_allow_origins));

    let served = start_server(&env.bind_addr(), app, shutdown_signal()).await;

    pool.close().await;
    tracing::info!("server stopped");
    telemetry.shutdown();

    Ok(served?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
