//! Serves the pre-built front-end bundle.
//!
//! Known files under the build directory are served as-is; every other path gets `index.html` so
//! the client-side router can take over.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{self, Request, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use http::StatusCode;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::instrument;

pub const ENTRY_DOCUMENT: &str = "index.html";

const PLACEHOLDER_PAGE: &str = r#"<html>
    <head><title>Snake Game</title></head>
    <body style='font-family: sans-serif; text-align: center; padding-top: 50px;'>
        <h1>Snake Game</h1>
        <p>Frontend not found. Please build the frontend application.</p>
        <p>Navigate to the <code>frontend</code> directory and run <code>npm install &amp;&amp; npm run build</code>.</p>
    </body>
</html>
"#;

const MISSING_ENTRY_PAGE: &str = "<html><head><title>Error</title></head><body><h1>Frontend Error</h1>\
<p>index.html not found. Please rebuild the frontend.</p></body></html>";

#[derive(Debug, Clone)]
pub struct Frontend {
    build_dir: PathBuf,
}

#[derive(Debug)]
struct BuildDir {
    root: PathBuf,
}

impl Frontend {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    /// Routes for every non-API path. Whether the bundle exists is decided once, here.
    pub fn router(&self) -> Router {
        let root = match self.build_dir.canonicalize() {
            Ok(root) if root.is_dir() => root,
            _ => {
                tracing::warn!(
                    build_dir = %self.build_dir.display(),
                    "frontend build directory not found, serving placeholder page"
                );
                return Router::new().fallback(placeholder);
            }
        };

        let mut router = Router::new()
            .route("/", get(serve_entry))
            .route("/{*path}", get(serve_spa))
            .nest_service("/static-root", ServeDir::new(&root));

        let assets = root.join("assets");
        if assets.is_dir() {
            router = router.nest_service("/assets", ServeDir::new(assets));
        } else {
            tracing::warn!(assets = %assets.display(), "frontend assets directory not found");
        }

        tracing::info!(build_dir = %root.display(), "serving frontend bundle");
        router.with_state(Arc::new(BuildDir { root }))
    }
}

async fn placeholder() -> Html<&'static str> {
    Html(PLACEHOLDER_PAGE)
}

async fn serve_entry(State(dir): State<Arc<BuildDir>>, request: Request) -> Response {
    entry_document(&dir, request).await
}

#[instrument(skip(dir, request))]
async fn serve_spa(
    State(dir): State<Arc<BuildDir>>,
    path: Result<extract::Path<String>, PathRejection>,
    request: Request,
) -> Response {
    // undecodable paths cannot name a file in the bundle
    let extract::Path(path) = match path {
        Ok(path) => path,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "undecodable path, serving entry document");
            return entry_document(&dir, request).await;
        }
    };

    let requested = path.strip_prefix('/').unwrap_or(&path);
    if requested.is_empty() || requested == ENTRY_DOCUMENT {
        return entry_document(&dir, request).await;
    }

    let Some(resolved) = resolve(&dir.root, requested) else {
        tracing::warn!(path = requested, "path escapes the frontend build directory");
        return StatusCode::NOT_FOUND.into_response();
    };

    if resolved.is_file() {
        serve_file(&resolved, request).await
    } else {
        entry_document(&dir, request).await
    }
}

async fn entry_document(dir: &BuildDir, request: Request) -> Response {
    let index = dir.root.join(ENTRY_DOCUMENT);
    if !index.is_file() {
        tracing::error!(index = %index.display(), "frontend entry document missing");
        return (StatusCode::INTERNAL_SERVER_ERROR, Html(MISSING_ENTRY_PAGE)).into_response();
    }

    serve_file(&index, request).await
}

/// Streams `path` with a content type guessed from its extension.
async fn serve_file(path: &Path, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(res) => res.map(Body::new).into_response(),
        Err(never) => match never {},
    }
}

/// Resolves `requested` below `root` (which must already be canonical).
///
/// Resolution is lexical first so that non-existent paths can be judged too; anything that climbs
/// above `root` or carries an absolute component yields `None`. Existing paths are canonicalized
/// again so a symlink cannot point outside the bundle.
fn resolve(root: &Path, requested: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => (),
            Component::ParentDir => {
                if resolved == root || !resolved.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if resolved.exists() {
        let canonical = resolved.canonicalize().ok()?;
        if !canonical.starts_with(root) {
            return None;
        }
        return Some(canonical);
    }

    Some(resolved)
}
