use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{MessageId, NewMessage, NotificationId};
use super::repository::{MessageRepository, Notifier};
use super::service::{MessagingService, MessagingServiceError};
use crate::activity::ActivityRepository;
use crate::audit::UserId;
use crate::error::{error_response, missing_identity};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotificationQuery {
    #[serde(default)]
    unread: bool,
}

/// Router builder for direct messages and notifications.
pub fn messaging_router<M, A>(service: Arc<MessagingService<M, A>>) -> Router
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    Router::new()
        .route("/api/v1/messages", post(send_handler::<M, A>))
        .route("/api/v1/messages/inbox", get(inbox_handler::<M, A>))
        .route("/api/v1/messages/sent", get(sent_handler::<M, A>))
        .route(
            "/api/v1/messages/:message_id/read",
            post(read_message_handler::<M, A>),
        )
        .route(
            "/api/v1/notifications",
            get(notifications_handler::<M, A>),
        )
        .route(
            "/api/v1/notifications/read-all",
            post(read_all_handler::<M, A>),
        )
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(read_notification_handler::<M, A>),
        )
        .with_state(service)
}

fn failure(error: MessagingServiceError) -> Response {
    let status = match &error {
        MessagingServiceError::EmptyBody | MessagingServiceError::NoRecipients => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MessagingServiceError::NotFound => StatusCode::NOT_FOUND,
        MessagingServiceError::Forbidden => StatusCode::FORBIDDEN,
        MessagingServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.to_string())
}

pub(crate) async fn send_handler<M, A>(
    State(service): State<Arc<MessagingService<M, A>>>,
    headers: HeaderMap,
    Json(message): Json<NewMessage>,
) -> Response
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.send(&actor, message) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn inbox_handler<M, A>(
    State(service): State<Arc<MessagingService<M, A>>>,
    headers: HeaderMap,
) -> Response
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.inbox(&actor) {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn sent_handler<M, A>(
    State(service): State<Arc<MessagingService<M, A>>>,
    headers: HeaderMap,
) -> Response
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.sent(&actor) {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn read_message_handler<M, A>(
    State(service): State<Arc<MessagingService<M, A>>>,
    headers: HeaderMap,
    Path(message_id): Path<String>,
) -> Response
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.mark_message_read(&actor, &MessageId(message_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn notifications_handler<M, A>(
    State(service): State<Arc<MessagingService<M, A>>>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> Response
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    let unread = match service.unread_count(&actor) {
        Ok(count) => count,
        Err(err) => return failure(err),
    };
    match service.notifications(&actor, query.unread) {
        Ok(items) => {
            let payload = json!({ "unread": unread, "items": items });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => failure(err),
    }
}

pub(crate) async fn read_notification_handler<M, A>(
    State(service): State<Arc<MessagingService<M, A>>>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> Response
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.mark_notification_read(&actor, &NotificationId(notification_id)) {
        Ok(notification) => (StatusCode::OK, Json(notification)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn read_all_handler<M, A>(
    State(service): State<Arc<MessagingService<M, A>>>,
    headers: HeaderMap,
) -> Response
where
    M: MessageRepository + Notifier + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.mark_all_read(&actor) {
        Ok(updated) => (StatusCode::OK, Json(json!({ "updated": updated }))).into_response(),
        Err(err) => failure(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityRecorder, ScoringConfig};
    use crate::audit::USER_HEADER;
    use crate::store::InMemoryStore;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> Router {
        let store = Arc::new(InMemoryStore::default());
        let recorder = Arc::new(ActivityRecorder::new(store.clone(), ScoringConfig::default()));
        messaging_router(Arc::new(MessagingService::new(store, recorder)))
    }

    fn request(method: &str, uri: &str, user: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_HEADER, user)
            .header(header::CONTENT_TYPE, "application/json");
        let body = match body {
            Some(body) => Body::from(serde_json::to_vec(&body).expect("encode")),
            None => Body::empty(),
        };
        builder.body(body).expect("request")
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    async fn send(router: &Router, from: &str, to: &[&str]) -> String {
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/messages",
                from,
                Some(json!({
                    "recipients": to,
                    "subject": "Reunion",
                    "body": "Saturday at the farm"
                })),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["id"]
            .as_str()
            .expect("message id")
            .to_string()
    }

    #[tokio::test]
    async fn only_recipients_may_mark_a_message_read() {
        let router = router();
        let id = send(&router, "ada", &["ben"]).await;
        let uri = format!("/api/v1/messages/{id}/read");

        let response = router
            .clone()
            .oneshot(request("POST", &uri, "cy", None))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .clone()
            .oneshot(request("POST", &uri, "ben", None))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["read"], true);

        let response = router
            .oneshot(request("POST", "/api/v1/messages/msg-missing/read", "ben", None))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn notification_listing_reports_the_unread_count() {
        let router = router();
        send(&router, "ada", &["ben"]).await;
        send(&router, "cy", &["ben"]).await;

        let response = router
            .clone()
            .oneshot(request("GET", "/api/v1/notifications?unread=true", "ben", None))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["unread"], 2);
        let items = payload["items"].as_array().expect("items");
        assert_eq!(items.len(), 2);
        let first = items[1]["id"].as_str().expect("id").to_string();

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/v1/notifications/{first}/read"),
                "ada",
                None,
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .clone()
            .oneshot(request("POST", "/api/v1/notifications/read-all", "ben", None))
            .await
            .expect("route executes");
        assert_eq!(json_body(response).await["updated"], 2);

        let response = router
            .oneshot(request("GET", "/api/v1/notifications", "ben", None))
            .await
            .expect("route executes");
        let payload = json_body(response).await;
        assert_eq!(payload["unread"], 0);
        assert_eq!(payload["items"].as_array().expect("items").len(), 2);
    }

    #[tokio::test]
    async fn inbox_requires_identity() {
        let response = router()
            .oneshot(
                Request::get("/api/v1/messages/inbox")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
