use crate::infra::{AppState, Services};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use kindred::activity::activity_router;
use kindred::content::content_router;
use kindred::contributions::contribution_router;
use kindred::import::import_router;
use kindred::messaging::messaging_router;
use kindred::records::records_router;
use kindred::tree::tree_router;
use serde_json::json;
use std::sync::atomic::Ordering;

/// Every `/api/v1` router plus the operational endpoints.
pub(crate) fn with_family_routes(services: &Services) -> Router {
    records_router(services.records.clone())
        .merge(tree_router(services.tree.clone()))
        .merge(contribution_router(services.contributions.clone()))
        .merge(content_router(services.content.clone()))
        .merge(messaging_router(services.messaging.clone()))
        .merge(activity_router(services.activity.clone()))
        .merge(import_router(services.importer.clone()))
        .merge(operational_routes())
}

fn operational_routes() -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/ready", get(readiness))
        .route("/metrics", get(prometheus_text))
}

async fn readiness(Extension(state): Extension<AppState>) -> impl IntoResponse {
    match state.readiness.load(Ordering::Acquire) {
        true => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        false => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        ),
    }
}

async fn prometheus_text(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let exposition = state.metrics.render();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], exposition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use kindred::activity::ScoringConfig;
    use kindred::audit::USER_HEADER;
    use kindred::config::ArchiveConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(ready: bool) -> (Router, Arc<AtomicBool>) {
        let services = Services::in_memory(ArchiveConfig::default(), ScoringConfig::default());
        let readiness = Arc::new(AtomicBool::new(ready));
        let state = AppState {
            readiness: readiness.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        (
            with_family_routes(&services).layer(Extension(state)),
            readiness,
        )
    }

    async fn read_json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let (router, readiness) = app(false);
        let response = router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.store(true, Ordering::Release);
        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json_body(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn health_and_metrics_respond() {
        let (router, _) = app(true);
        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn merged_routers_share_one_store() {
        let (router, _) = app(true);
        let response = router
            .clone()
            .oneshot(
                Request::post("/api/v1/people")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(USER_HEADER, "ada")
                    .body(Body::from(
                        json!({ "given_name": "Astrid", "surname": "Lund" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let person = read_json_body(response).await;
        let id = person["id"].as_str().expect("id").to_string();

        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/tree/{id}/mini"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::get("/api/v1/activity/leaderboard")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        let leaderboard = read_json_body(response).await;
        assert_eq!(leaderboard[0]["user"], "ada");
        assert_eq!(leaderboard[0]["points"], 10);
    }
}
