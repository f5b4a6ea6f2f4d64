use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the CORS layer from configured origins; `*` or an empty list allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    let api_routes = Router::new()
        // Trigger endpoints
        .route(
            "/triggers",
            get(handlers::triggers::list_triggers).post(handlers::triggers::create_trigger),
        )
        .route("/triggers/test", post(handlers::triggers::test_trigger))
        .route(
            "/triggers/schedule",
            post(handlers::triggers::schedule_trigger),
        )
        .route(
            "/triggers/:id",
            get(handlers::triggers::get_trigger).delete(handlers::triggers::delete_trigger),
        )
        .route("/triggers/:id/logs", get(handlers::triggers::recent_logs))
        .route(
            "/triggers/:id/execute",
            post(handlers::triggers::execute_trigger),
        )
        // Event log endpoints
        .route("/events", get(handlers::events::list_events))
        .route("/events/sweep", post(handlers::events::sweep));

    // Unversioned operational endpoints
    let ops_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(ops_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::cache::MemoryCache;
    use common::config::Settings;
    use common::db::InMemoryStore;
    use common::TriggerService;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = Arc::new(InMemoryStore::new());
        let service = TriggerService::new(store.clone(), store, Arc::new(MemoryCache::new()));
        create_router(AppState::new(Arc::new(service), Settings::default()))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_create_get_and_list_trigger() {
        let app = app();

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/triggers",
            Some(json!({"type": "api", "name": "hook", "endpoint": "/hooks/a"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["is_active"], true);
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, fetched) = send(&app, "GET", &format!("/api/v1/triggers/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["name"], "hook");

        let (_, listed) = send(&app, "GET", "/api/v1/triggers", None).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_schedule_is_bad_request() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/triggers",
            Some(json!({"type": "scheduled", "name": "t1", "schedule": "whenever"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_unknown_trigger_is_not_found() {
        let app = app();
        let id = uuid::Uuid::new_v4();

        let (status, body) = send(&app, "DELETE", &format!("/api/v1/triggers/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = send(&app, "POST", &format!("/api/v1/triggers/{}/execute", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_execute_then_read_logs_and_events() {
        let app = app();
        let (_, created) = send(
            &app,
            "POST",
            "/api/v1/triggers",
            Some(json!({"type": "api", "name": "hook"})),
        )
        .await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, fired) = send(&app, "POST", &format!("/api/v1/triggers/{}/execute", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fired["data"]["status"], "executed");

        let (_, logs) = send(&app, "GET", &format!("/api/v1/triggers/{}/logs", id), None).await;
        assert_eq!(logs["data"].as_array().unwrap().len(), 1);

        let (_, events) = send(&app, "GET", "/api/v1/events?archived=true", None).await;
        assert_eq!(events["data"].as_array().unwrap().len(), 1);

        let (status, report) = send(&app, "POST", "/api/v1/events/sweep", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["data"], json!({"archived": 0, "purged": 0}));
    }

    #[tokio::test]
    async fn test_test_trigger_records_dry_run() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/triggers/test",
            Some(json!({"type": "scheduled", "name": "draft", "schedule": "@hourly"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "test_executed");
        assert_eq!(body["data"]["trigger_id"], uuid::Uuid::nil().to_string());
    }

    #[tokio::test]
    async fn test_schedule_endpoint_rejects_api_trigger() {
        let app = app();
        let (_, created) = send(
            &app,
            "POST",
            "/api/v1/triggers",
            Some(json!({"type": "api", "name": "hook"})),
        )
        .await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/triggers/schedule",
            Some(json!({"id": created["data"]["id"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_without_backends() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "not_configured");
        assert_eq!(body["scheduled_timers"], 0);
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_lists() {
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }
}
