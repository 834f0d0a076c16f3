//! Metrics HTTP server and its lifecycle.
//!
//! ```text
//! Created ──run()──▶ Running ──cancel──▶ Draining ──drained / grace elapsed──▶ Stopped
//! ```
//!
//! While running, `/metrics` triggers one pull pass per request and the push
//! reader, if any, ticks on its own task. Cancellation stops the listener and
//! the push timer; in-flight scrapes and an export already underway get
//! `grace` to finish before they are abandoned.

use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tracing::{error, info, warn};

use otlp_network_core::telemetry::{CONTENT_TYPE, PullReader, Readers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Draining,
    Stopped,
}

pub struct MetricsServer {
    readers: Readers,
    grace: Duration,
    state: watch::Sender<ServerState>,
}

impl MetricsServer {
    pub fn new(readers: Readers, grace: Duration) -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        Self {
            readers,
            grace,
            state,
        }
    }

    /// Subscribes to lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serves scrapes on `listener` until `cancel` fires, then drains.
    pub async fn run(self, listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
        let Self {
            readers,
            grace,
            state,
        } = self;
        let addr = listener.local_addr()?;

        // The push timer gets its own token so it stops with the listener
        // but never outlives the server.
        let push_cancel = cancel.child_token();
        let push_task = readers
            .push
            .map(|push| tokio::spawn(push.run(push_cancel.clone())));

        let app = router(readers.pull);
        let shutdown = cancel.clone();
        let mut server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        set_state(&state, ServerState::Running);
        info!(%addr, push = push_task.is_some(), "metrics server running");

        // The server task only finishes early if serving itself fails.
        let early = tokio::select! {
            _ = cancel.cancelled() => None,
            result = &mut server_task => Some(result),
        };
        if let Some(result) = early {
            push_cancel.cancel();
            if let Some(task) = push_task {
                task.abort();
            }
            set_state(&state, ServerState::Stopped);
            return match result {
                Ok(served) => served,
                Err(e) => Err(std::io::Error::other(e)),
            };
        }

        set_state(&state, ServerState::Draining);
        info!(grace_ms = grace.as_millis() as u64, "draining metrics server");

        let deadline = tokio::time::Instant::now() + grace;
        let mut result = Ok(());
        match tokio::time::timeout_at(deadline, &mut server_task).await {
            Ok(Ok(served)) => result = served,
            Ok(Err(e)) => error!(error = %e, "metrics server task failed"),
            Err(_) => {
                warn!("grace period elapsed with scrapes in flight, abandoning them");
                server_task.abort();
            }
        }
        if let Some(mut task) = push_task {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "push reader task failed"),
                Err(_) => {
                    warn!("grace period elapsed with an export in flight, abandoning it");
                    task.abort();
                }
            }
        }

        set_state(&state, ServerState::Stopped);
        info!("metrics server stopped");
        result
    }
}

fn set_state(state: &watch::Sender<ServerState>, next: ServerState) {
    state.send_replace(next);
}

/// Routes of the scrape endpoint.
pub fn router(pull: PullReader) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/healthz", get(handle_health))
        .with_state(pull)
        .layer(CompressionLayer::new())
}

async fn handle_metrics(State(pull): State<PullReader>) -> Response {
    // Collection reads /proc synchronously.
    match tokio::task::spawn_blocking(move || pull.render()).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "rendering exposition failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "scrape pass panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_health() -> &'static str {
    "ok"
}
