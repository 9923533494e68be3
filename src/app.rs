use std::{net::SocketAddr, time::Duration};

use axum::{
    http::{Request, Response},
    routing::get,
    Router,
};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::{field, info_span, Span};

use crate::{auth, state::AppState, todos};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(todos::router())
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(http_trace())
}

async fn health() -> &'static str {
    "ok"
}

// Spans carry the path only; query strings never reach the logs.
fn http_trace() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    impl Fn(&Request<axum::body::Body>) -> Span + Clone,
    tower_http::trace::DefaultOnRequest,
    impl Fn(&Response<axum::body::Body>, Duration, &Span) + Clone,
> {
    TraceLayer::new_for_http()
        .make_span_with(|req: &Request<axum::body::Body>| {
            info_span!(
                "http",
                method = %req.method(),
                path = req.uri().path(),
                version = ?req.version(),
                status = field::Empty,
            )
        })
        .on_response(
            |res: &Response<axum::body::Body>, latency: Duration, span: &Span| {
                let status = res.status().as_u16();
                span.record("status", status);
                let latency_ms = latency.as_millis() as u64;
                if res.status().is_server_error() {
                    tracing::error!(status, latency_ms, "request failed");
                } else {
                    tracing::debug!(status, latency_ms, "request done");
                }
            },
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "todo api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("todo api stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            tracing::error!(error = %e, "ctrl-c listener failed");
                        }
                    }
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM listener failed; waiting on ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c listener failed");
        }
    }

    tracing::info!("shutdown signal received, draining connections");
}
