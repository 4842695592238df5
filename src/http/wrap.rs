//! Request wrapper: timing, outcome logging, and the error boundary.
//!
//! Every route body runs inside [`wrap`]. Whatever the body does, the caller
//! gets a well-formed envelope response:
//!
//! ```text
//! start ─▶ handler ─┬─ Ok(response)          ─▶ info  "api.request"
//!                   ├─ Err(RateLimited)      ─▶ warn  "api.response_thrown"
//!                   ├─ Err(client error)     ─▶ info  "api.request"
//!                   └─ Err(Internal) / panic ─▶ error "api.error", generic 500
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::http::envelope;
use crate::http::error::{ApiError, INTERNAL_SERVER_ERROR};
use crate::observability::metrics;

/// Run one route body and turn its outcome into a response.
pub async fn wrap<F>(name: &'static str, handler: F) -> Response
where
    F: Future<Output = Result<Response, ApiError>>,
{
    let start = Instant::now();
    let outcome = AssertUnwindSafe(handler).catch_unwind().await;
    let elapsed = start.elapsed();
    let duration_ms = elapsed.as_millis() as u64;

    let response = match outcome {
        Ok(Ok(response)) => {
            tracing::info!(
                event = "api.request",
                name = name,
                status = response.status().as_u16(),
                duration_ms
            );
            response
        }
        Ok(Err(err)) if err.is_rate_limited() => {
            let response = err.into_response();
            tracing::warn!(
                event = "api.response_thrown",
                name = name,
                status = response.status().as_u16(),
                duration_ms
            );
            response
        }
        Ok(Err(err)) if err.is_internal() => internal_error(name, duration_ms, &err.to_string()),
        Ok(Err(err)) => {
            let response = err.into_response();
            tracing::info!(
                event = "api.request",
                name = name,
                status = response.status().as_u16(),
                duration_ms
            );
            response
        }
        Err(panic) => internal_error(name, duration_ms, &panic_message(panic.as_ref())),
    };

    metrics::record_request(name, response.status().as_u16(), elapsed);
    response
}

fn internal_error(name: &'static str, duration_ms: u64, message: &str) -> Response {
    tracing::error!(
        event = "api.error",
        name = name,
        status = 500u16,
        duration_ms,
        message = %message
    );
    envelope::fail(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;
    use std::sync::{Arc, Mutex};

    use axum::http::header;
    use serde_json::{json, Value};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    #[derive(Debug, Clone)]
    struct Captured {
        level: Level,
        fields: Vec<(String, String)>,
    }

    impl Captured {
        fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    #[derive(Clone, Default)]
    struct CaptureLayer {
        events: Arc<Mutex<Vec<Captured>>>,
    }

    struct FieldVisitor<'a>(&'a mut Vec<(String, String)>);

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.push((field.name().to_string(), value.to_string()));
        }

        fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
            self.0.push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = Vec::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.events.lock().unwrap().push(Captured {
                level: *event.metadata().level(),
                fields,
            });
        }
    }

    async fn run_captured<F>(name: &'static str, handler: F) -> (Response, Vec<Captured>)
    where
        F: Future<Output = Result<Response, ApiError>>,
    {
        let layer = CaptureLayer::default();
        let events = layer.events.clone();
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);
        let response = wrap(name, handler).await;
        let captured = events.lock().unwrap().clone();
        (response, captured)
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn outcome_event<'a>(events: &'a [Captured], event: &str) -> &'a Captured {
        events
            .iter()
            .find(|e| e.field("event") == Some(event))
            .unwrap_or_else(|| panic!("no {} event in {:?}", event, events))
    }

    #[tokio::test]
    async fn test_success_passes_through_and_logs_info() {
        let (response, events) = run_captured("health.get", async {
            Ok(envelope::ok(json!({"status": "ok"})))
        })
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["status"], "ok");

        let logged = outcome_event(&events, "api.request");
        assert_eq!(logged.level, Level::INFO);
        assert_eq!(logged.field("name"), Some("health.get"));
        assert_eq!(logged.field("status"), Some("200"));
        assert!(logged.field("duration_ms").is_some());
    }

    #[tokio::test]
    async fn test_internal_error_becomes_generic_500() {
        let (response, events) = run_captured("uploads.outfits.sign.post", async {
            Err(ApiError::internal("connection to 10.0.0.5:5432 refused, secret=abc"))
        })
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"ok": false, "error": "Internal Server Error"})
        );

        let logged = outcome_event(&events, "api.error");
        assert_eq!(logged.level, Level::ERROR);
        assert!(logged
            .field("message")
            .unwrap()
            .contains("connection to 10.0.0.5:5432 refused"));
    }

    #[tokio::test]
    async fn test_panic_becomes_generic_500() {
        let (response, events) = run_captured("clothes.wear.post", async {
            let parts: Vec<&str> = Vec::new();
            if parts.is_empty() {
                panic!("index out of range in wear handler");
            }
            Ok(envelope::ok(parts))
        })
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"ok": false, "error": "Internal Server Error"})
        );
        assert_eq!(
            outcome_event(&events, "api.error").field("message"),
            Some("index out of range in wear handler")
        );
    }

    #[tokio::test]
    async fn test_rate_limit_signal_is_returned_verbatim_at_warn() {
        let (response, events) = run_captured("auth.sign-in.post", async {
            Err(ApiError::RateLimited { retry_after_secs: 17 })
        })
        .await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "17");
        assert_eq!(
            body_json(response).await,
            json!({"ok": false, "error": "Too many requests"})
        );

        let logged = outcome_event(&events, "api.response_thrown");
        assert_eq!(logged.level, Level::WARN);
        assert_eq!(logged.field("status"), Some("429"));
        assert!(events.iter().all(|e| e.field("event") != Some("api.error")));
    }

    #[tokio::test]
    async fn test_client_error_keeps_its_status() {
        let (response, events) = run_captured("uploads.outfits.signed-url.post", async {
            Err(ApiError::Forbidden)
        })
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            json!({"ok": false, "error": "Forbidden"})
        );
        assert_eq!(outcome_event(&events, "api.request").level, Level::INFO);
    }
}
