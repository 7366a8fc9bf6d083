//! In-process HTTP server serving canned repository files.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;

#[derive(Clone, Default)]
struct ServerState {
    routes: Routes,
    hits: Arc<Mutex<Vec<String>>>,
}

/// A static file server bound to an ephemeral localhost port.
///
/// Unknown paths answer `404`. The server stops when dropped.
pub struct StaticRepoServer {
    addr: SocketAddr,
    state: ServerState,
    task: JoinHandle<()>,
}

impl StaticRepoServer {
    /// Bind and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = ServerState::default();

        let app = Router::new()
            .fallback(serve_file)
            .with_state(state.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                debug!(error = %e, "test server stopped");
            }
        });

        Ok(Self { addr, state, task })
    }

    /// Base URL, e.g. `http://127.0.0.1:40123`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Serve `body` with status 200 at `path`.
    pub fn serve(&self, path: &str, body: impl Into<String>) {
        self.serve_status(path, 200, body);
    }

    /// Serve `body` with `status` at `path`.
    pub fn serve_status(&self, path: &str, status: u16, body: impl Into<String>) {
        self.state
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(path), (status, body.into()));
    }

    /// Paths requested so far, in arrival order.
    #[must_use]
    pub fn hits(&self) -> Vec<String> {
        self.state
            .hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `path` was requested.
    #[must_use]
    pub fn hit_count(&self, path: &str) -> usize {
        let path = normalize(path);
        self.hits().iter().filter(|p| **p == path).count()
    }
}

impl Drop for StaticRepoServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for StaticRepoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticRepoServer")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

async fn serve_file(State(state): State<ServerState>, uri: Uri) -> (StatusCode, String) {
    let path = uri.path().to_string();
    state
        .hits
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(path.clone());

    let (status, body) = state
        .routes
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&path)
        .cloned()
        .unwrap_or_else(|| (404, "not found".to_string()));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, body)
}
