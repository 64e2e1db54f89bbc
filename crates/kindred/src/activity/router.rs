use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::repository::ActivityRepository;
use super::service::ActivityService;
use crate::audit::UserId;
use crate::error::error_response;

const DEFAULT_PAGE: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    limit: Option<usize>,
}

impl PageQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE)
    }
}

/// Router exposing the activity feed and leaderboard.
pub fn activity_router<A>(service: Arc<ActivityService<A>>) -> Router
where
    A: ActivityRepository + 'static,
{
    Router::new()
        .route("/api/v1/activity", get(recent_handler::<A>))
        .route("/api/v1/activity/leaderboard", get(leaderboard_handler::<A>))
        .route("/api/v1/activity/users/:user_id", get(user_handler::<A>))
        .with_state(service)
}

pub(crate) async fn recent_handler<A>(
    State(service): State<Arc<ActivityService<A>>>,
    Query(page): Query<PageQuery>,
) -> Response
where
    A: ActivityRepository + 'static,
{
    match service.recent(page.limit()) {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn leaderboard_handler<A>(
    State(service): State<Arc<ActivityService<A>>>,
    Query(page): Query<PageQuery>,
) -> Response
where
    A: ActivityRepository + 'static,
{
    match service.leaderboard(page.limit.unwrap_or(10)) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn user_handler<A>(
    State(service): State<Arc<ActivityService<A>>>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Response
where
    A: ActivityRepository + 'static,
{
    let user = UserId(user_id);
    let points = match service.points_for(&user) {
        Ok(points) => points,
        Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    match service.for_user(&user, page.limit()) {
        Ok(items) => {
            let payload = json!({
                "user": user,
                "points": points,
                "items": items,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityKind, ActivityRecorder, ActivitySubject, ScoringConfig};
    use crate::store::InMemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn seeded_router() -> Router {
        let store = Arc::new(InMemoryStore::default());
        let recorder = ActivityRecorder::new(store.clone(), ScoringConfig::default());
        let entries = [
            ("ada", ActivityKind::PersonAdded, "added Olav"),
            ("ben", ActivityKind::CommentPosted, "commented on a story"),
            ("ada", ActivityKind::RelationshipAdded, "linked Olav and Ingrid"),
            ("cy", ActivityKind::ContentPublished, "published a recipe"),
        ];
        for (user, kind, summary) in entries {
            recorder
                .record(
                    &UserId::new(user),
                    kind,
                    ActivitySubject::Person("per-1".to_string()),
                    summary,
                )
                .expect("recorded");
        }
        activity_router(Arc::new(ActivityService::new(store)))
    }

    async fn get_json(router: Router, uri: &str) -> Value {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    #[tokio::test]
    async fn leaderboard_ranks_by_points_then_user() {
        let payload = get_json(seeded_router(), "/api/v1/activity/leaderboard?limit=2").await;
        let entries = payload.as_array().expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["user"], "ada");
        assert_eq!(entries[0]["points"], 15);
        assert_eq!(entries[0]["rank"], 1);
        assert_eq!(entries[1]["user"], "cy");
        assert_eq!(entries[1]["rank"], 2);
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_filterable_by_user() {
        let router = seeded_router();
        let feed = get_json(router.clone(), "/api/v1/activity?limit=2").await;
        let items = feed.as_array().expect("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["summary"], "published a recipe");
        assert_eq!(items[1]["kind"], "relationship_added");

        let ada = get_json(router, "/api/v1/activity/users/ada").await;
        assert_eq!(ada["user"], "ada");
        assert_eq!(ada["points"], 15);
        assert_eq!(ada["items"].as_array().expect("items").len(), 2);
    }
}
