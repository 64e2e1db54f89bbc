use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    HouseholdId, HouseholdRole, NewHousehold, NewParentChild, NewPartnership, NewPerson,
    ParentChildId, PartnershipId, PersonId, PersonUpdate,
};
use super::repository::FamilyRepository;
use super::service::{FamilyRecordService, RecordServiceError};
use crate::activity::ActivityRepository;
use crate::audit::UserId;
use crate::error::{error_response, missing_identity};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PeopleQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    household: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRequest {
    person: PersonId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleRequest {
    role: HouseholdRole,
}

/// Router builder exposing people, household, and relationship endpoints.
pub fn records_router<F, A>(service: Arc<FamilyRecordService<F, A>>) -> Router
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/people",
            post(create_person_handler::<F, A>).get(search_people_handler::<F, A>),
        )
        .route(
            "/api/v1/people/:person_id",
            get(get_person_handler::<F, A>)
                .patch(update_person_handler::<F, A>)
                .delete(delete_person_handler::<F, A>),
        )
        .route(
            "/api/v1/people/:person_id/restore",
            post(restore_person_handler::<F, A>),
        )
        .route(
            "/api/v1/households",
            post(create_household_handler::<F, A>).get(my_households_handler::<F, A>),
        )
        .route(
            "/api/v1/households/:household_id",
            get(get_household_handler::<F, A>),
        )
        .route(
            "/api/v1/households/:household_id/members",
            post(add_member_handler::<F, A>),
        )
        .route(
            "/api/v1/households/:household_id/members/:person_id",
            delete(remove_member_handler::<F, A>),
        )
        .route(
            "/api/v1/households/:household_id/permissions/:user_id",
            put(grant_role_handler::<F, A>).delete(revoke_role_handler::<F, A>),
        )
        .route(
            "/api/v1/relationships/parent-child",
            post(link_parent_child_handler::<F, A>),
        )
        .route(
            "/api/v1/relationships/parent-child/:link_id",
            delete(unlink_parent_child_handler::<F, A>),
        )
        .route(
            "/api/v1/relationships/partnerships",
            post(link_partnership_handler::<F, A>),
        )
        .route(
            "/api/v1/relationships/partnerships/:partnership_id",
            delete(unlink_partnership_handler::<F, A>),
        )
        .with_state(service)
}

pub(crate) fn status_for(error: &RecordServiceError) -> StatusCode {
    match error {
        RecordServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RecordServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        RecordServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        RecordServiceError::Conflict(_) => StatusCode::CONFLICT,
        RecordServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: RecordServiceError) -> Response {
    error_response(status_for(&error), error.to_string())
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, RecordServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn create_person_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Json(person): Json<NewPerson>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(StatusCode::CREATED, service.create_person(&actor, person))
}

pub(crate) async fn search_people_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    Query(query): Query<PeopleQuery>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let household = query.household.map(HouseholdId);
    respond(
        StatusCode::OK,
        service.search_people(query.q.as_deref(), household.as_ref()),
    )
}

pub(crate) async fn get_person_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    Path(person_id): Path<String>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let id = PersonId(person_id);
    let person = match service.get_person(&id) {
        Ok(person) => person,
        Err(err) => return failure(err),
    };
    match service.relationships_of(&id) {
        Ok(relationships) => {
            let payload = json!({ "person": person, "relationships": relationships });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => failure(err),
    }
}

pub(crate) async fn update_person_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path(person_id): Path<String>,
    Json(update): Json<PersonUpdate>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.update_person(&actor, &PersonId(person_id), update),
    )
}

pub(crate) async fn delete_person_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path(person_id): Path<String>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.delete_person(&actor, &PersonId(person_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn restore_person_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path(person_id): Path<String>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.restore_person(&actor, &PersonId(person_id)),
    )
}

pub(crate) async fn create_household_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Json(household): Json<NewHousehold>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::CREATED,
        service.create_household(&actor, household),
    )
}

pub(crate) async fn my_households_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(StatusCode::OK, service.households_for(&actor))
}

pub(crate) async fn get_household_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path(household_id): Path<String>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.get_household(&actor, &HouseholdId(household_id)),
    )
}

pub(crate) async fn add_member_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path(household_id): Path<String>,
    Json(request): Json<MemberRequest>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.add_household_member(&actor, &HouseholdId(household_id), &request.person),
    )
}

pub(crate) async fn remove_member_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path((household_id, person_id)): Path<(String, String)>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.remove_household_member(
            &actor,
            &HouseholdId(household_id),
            &PersonId(person_id),
        ),
    )
}

pub(crate) async fn grant_role_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path((household_id, user_id)): Path<(String, String)>,
    Json(request): Json<RoleRequest>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.grant_household_role(
            &actor,
            &HouseholdId(household_id),
            &UserId(user_id),
            request.role,
        ),
    )
}

pub(crate) async fn revoke_role_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path((household_id, user_id)): Path<(String, String)>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.revoke_household_role(&actor, &HouseholdId(household_id), &UserId(user_id)),
    )
}

pub(crate) async fn link_parent_child_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Json(link): Json<NewParentChild>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(StatusCode::CREATED, service.link_parent_child(&actor, link))
}

pub(crate) async fn unlink_parent_child_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path(link_id): Path<String>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.unlink_parent_child(&actor, &ParentChildId(link_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn link_partnership_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Json(link): Json<NewPartnership>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(StatusCode::CREATED, service.link_partnership(&actor, link))
}

pub(crate) async fn unlink_partnership_handler<F, A>(
    State(service): State<Arc<FamilyRecordService<F, A>>>,
    headers: HeaderMap,
    Path(partnership_id): Path<String>,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    match service.unlink_partnership(&actor, &PartnershipId(partnership_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
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
        records_router(Arc::new(FamilyRecordService::new(store, recorder)))
    }

    async fn read_json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        builder
            .body(Body::from(serde_json::to_vec(&body).expect("encode")))
            .expect("request")
    }

    #[tokio::test]
    async fn create_person_requires_identity() {
        let response = router()
            .oneshot(post_json(
                "/api/v1/people",
                None,
                json!({ "given_name": "Astrid" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn created_person_is_searchable() {
        let app = router();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/people",
                Some("ada"),
                json!({ "given_name": "Astrid", "surname": "Lund", "gender": "female" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = read_json_body(response).await;
        let id = created["id"].as_str().expect("id").to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/v1/people?q=lund")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let found = read_json_body(response).await;
        assert_eq!(found.as_array().map(Vec::len), Some(1));

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/people/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        let detail = read_json_body(response).await;
        assert_eq!(detail["person"]["given_name"], "Astrid");
        assert!(detail["relationships"]["parents"]
            .as_array()
            .expect("array")
            .is_empty());
    }

    #[tokio::test]
    async fn invalid_person_is_unprocessable_and_missing_is_not_found() {
        let app = router();
        let response = app
            .clone()
            .oneshot(post_json("/api/v1/people", Some("ada"), json!({})))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .oneshot(
                Request::get("/api/v1/people/per-missing")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
