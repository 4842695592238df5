//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every API route
//! - Wire up middleware (body limit, timeout, request ID, tracing)
//! - Bind server to listener and shut down gracefully
//! - Run the rate-limit sweeper alongside the server

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::http::AppState;
use crate::observability::metrics;

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();

        api::router()
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router with state applied, for serving on a custom listener.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweep_secs = self.state.config.rate_limit.sweep_interval_secs;
        if sweep_secs > 0 {
            let limiter = self.state.limiter.clone();
            let mut stop = shutdown.resubscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(sweep_secs));
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let purged = limiter.purge_expired();
                            let tracked = limiter.store().len();
                            metrics::record_tracked_keys(tracked);
                            tracing::debug!(purged, tracked, "Rate-limit windows swept");
                        }
                        _ = stop.recv() => break,
                    }
                }
            });
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::ai::Unconfigured;
    use crate::backends::MemoryBackends;
    use crate::clock::{Clock, ManualClock};
    use crate::config::AppConfig;

    fn router(max_body_bytes: usize) -> Router {
        let mut config = AppConfig::default();
        config.listener.max_body_bytes = max_body_bytes;
        let config = Arc::new(config);
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_000_000));
        let backends = MemoryBackends::new(&config, clock.clone());
        HttpServer::new(backends.app_state(config, clock, Arc::new(Unconfigured))).into_router()
    }

    #[tokio::test]
    async fn test_responses_carry_request_id() {
        let response = router(1024)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_propagated() {
        let response = router(1024)
            .oneshot(
                Request::get("/api/health")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let response = router(16)
            .oneshot(
                Request::post("/api/auth/sign-in")
                    .header("content-length", "64")
                    .body(Body::from(vec![b'a'; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
