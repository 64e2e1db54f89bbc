use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use super::domain::{
    CommentId, ContentFilter, ContentId, ContentKind, ContentUpdate, NewComment, NewContent,
};
use super::repository::ContentRepository;
use super::service::{ContentService, ContentServiceError};
use crate::activity::ActivityRepository;
use crate::audit::UserId;
use crate::error::{error_response, missing_identity};
use crate::messaging::Notifier;
use crate::records::{FamilyRepository, HouseholdId, PersonId};

type SharedService<R, F, A, N> = Arc<ContentService<R, F, A, N>>;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContentQuery {
    #[serde(default)]
    kind: Option<ContentKind>,
    #[serde(default)]
    person: Option<String>,
    #[serde(default)]
    household: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

impl ContentQuery {
    fn into_filter(self) -> ContentFilter {
        ContentFilter {
            kind: self.kind,
            person: self.person.map(PersonId),
            household: self.household.map(HouseholdId),
            tag: self.tag,
        }
    }
}

/// Router builder exposing stories, media, wiki pages, and comments.
pub fn content_router<R, F, A, N>(service: SharedService<R, F, A, N>) -> Router
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/content",
            post(publish_handler::<R, F, A, N>).get(list_handler::<R, F, A, N>),
        )
        .route(
            "/api/v1/content/:content_id",
            get(get_handler::<R, F, A, N>)
                .patch(update_handler::<R, F, A, N>)
                .delete(delete_handler::<R, F, A, N>),
        )
        .route(
            "/api/v1/content/:content_id/comments",
            get(comments_handler::<R, F, A, N>).post(comment_handler::<R, F, A, N>),
        )
        .route(
            "/api/v1/comments/:comment_id",
            delete(delete_comment_handler::<R, F, A, N>),
        )
        .route("/api/v1/wiki/:slug", get(wiki_handler::<R, F, A, N>))
        .with_state(service)
}

pub(crate) fn status_for(error: &ContentServiceError) -> StatusCode {
    match error {
        ContentServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ContentServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ContentServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ContentServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, ContentServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(status_for(&err), err.to_string()),
    }
}

fn no_content(result: Result<(), ContentServiceError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(status_for(&err), err.to_string()),
    }
}

pub(crate) async fn publish_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Json(new_content): Json<NewContent>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(StatusCode::CREATED, service.publish(&actor, new_content))
}

pub(crate) async fn list_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Query(query): Query<ContentQuery>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let actor = UserId::from_headers(&headers);
    respond(
        StatusCode::OK,
        service.list(actor.as_ref(), &query.into_filter()),
    )
}

pub(crate) async fn get_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Path(content_id): Path<String>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let actor = UserId::from_headers(&headers);
    respond(
        StatusCode::OK,
        service.get(actor.as_ref(), &ContentId(content_id)),
    )
}

pub(crate) async fn wiki_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let actor = UserId::from_headers(&headers);
    respond(StatusCode::OK, service.wiki_page(actor.as_ref(), &slug))
}

pub(crate) async fn update_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Path(content_id): Path<String>,
    Json(update): Json<ContentUpdate>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.update(&actor, &ContentId(content_id), update),
    )
}

pub(crate) async fn delete_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Path(content_id): Path<String>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    no_content(service.delete(&actor, &ContentId(content_id)))
}

pub(crate) async fn comments_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Path(content_id): Path<String>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let actor = UserId::from_headers(&headers);
    respond(
        StatusCode::OK,
        service.comments(actor.as_ref(), &ContentId(content_id)),
    )
}

pub(crate) async fn comment_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Path(content_id): Path<String>,
    Json(comment): Json<NewComment>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::CREATED,
        service.comment(&actor, &ContentId(content_id), comment),
    )
}

pub(crate) async fn delete_comment_handler<R, F, A, N>(
    State(service): State<SharedService<R, F, A, N>>,
    headers: HeaderMap,
    Path(comment_id): Path<String>,
) -> Response
where
    R: ContentRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    no_content(service.delete_comment(&actor, &CommentId(comment_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityRecorder, ScoringConfig};
    use crate::audit::USER_HEADER;
    use crate::store::InMemoryStore;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let store = Arc::new(InMemoryStore::default());
        let recorder = Arc::new(ActivityRecorder::new(store.clone(), ScoringConfig::default()));
        let service = ContentService::new(store.clone(), store.clone(), recorder, store, 1 << 20);
        content_router(Arc::new(service))
    }

    fn post_as(uri: &str, user: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(USER_HEADER, user)
            .body(Body::from(serde_json::to_vec(&body).expect("encode")))
            .expect("request")
    }

    async fn read_json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn publish_requires_identity() {
        let response = router()
            .oneshot(
                Request::post("/api/v1/content")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "kind": "story", "title": "Midsummer" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wiki_page_is_reachable_by_slug_and_filterable_by_tag() {
        let router = router();
        let response = router
            .clone()
            .oneshot(post_as(
                "/api/v1/content",
                "ada",
                json!({
                    "kind": "wiki_page",
                    "title": "The Lund Farm",
                    "body": "Built in 1880.",
                    "tags": ["Farm"]
                }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = read_json_body(response).await;
        assert_eq!(created["slug"], "the-lund-farm");
        assert_eq!(created["revision"], 1);

        let response = router
            .clone()
            .oneshot(
                Request::get("/api/v1/wiki/the-lund-farm")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::get("/api/v1/content?tag=farm&kind=wiki_page")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        let listed = read_json_body(response).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn content_errors_map_to_status_codes() {
        let router = router();
        let response = router
            .clone()
            .oneshot(post_as(
                "/api/v1/content",
                "ada",
                json!({ "kind": "photo", "title": "Wedding" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = router
            .clone()
            .oneshot(post_as(
                "/api/v1/content",
                "ada",
                json!({ "kind": "story", "title": "Midsummer" }),
            ))
            .await
            .expect("route executes");
        let id = read_json_body(response).await["id"]
            .as_str()
            .expect("id")
            .to_string();

        let response = router
            .clone()
            .oneshot(
                Request::delete(format!("/api/v1/content/{id}"))
                    .header(USER_HEADER, "cy")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .clone()
            .oneshot(post_as(
                &format!("/api/v1/content/{id}/comments"),
                "cy",
                json!({ "body": "Lovely story" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .oneshot(
                Request::get("/api/v1/content/cnt-missing")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
