use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::domain::{ContributionFilter, ContributionId, ContributionStatus, ContributionSubmission};
use super::repository::ContributionRepository;
use super::review::ContributionViolation;
use super::service::{ContributionService, ContributionServiceError};
use crate::activity::ActivityRepository;
use crate::audit::UserId;
use crate::error::{error_response, missing_identity};
use crate::messaging::Notifier;
use crate::records::router::status_for as record_status;
use crate::records::{FamilyRepository, PersonId};
use crate::store::RepositoryError;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContributionQuery {
    #[serde(default)]
    status: Option<ContributionStatus>,
    #[serde(default)]
    person: Option<String>,
    #[serde(default)]
    contributor: Option<String>,
}

impl From<ContributionQuery> for ContributionFilter {
    fn from(query: ContributionQuery) -> Self {
        ContributionFilter {
            status: query.status,
            person: query.person.map(PersonId),
            contributor: query.contributor.map(UserId),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApproveRequest {
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    reason: String,
}

/// Router builder exposing the proposal and review endpoints.
pub fn contribution_router<C, F, A, N>(service: Arc<ContributionService<C, F, A, N>>) -> Router
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/contributions",
            post(submit_handler::<C, F, A, N>).get(list_handler::<C, F, A, N>),
        )
        .route(
            "/api/v1/contributions/reviewable",
            get(reviewable_handler::<C, F, A, N>),
        )
        .route(
            "/api/v1/contributions/:contribution_id",
            get(get_handler::<C, F, A, N>),
        )
        .route(
            "/api/v1/contributions/:contribution_id/approve",
            post(approve_handler::<C, F, A, N>),
        )
        .route(
            "/api/v1/contributions/:contribution_id/reject",
            post(reject_handler::<C, F, A, N>),
        )
        .route(
            "/api/v1/contributions/:contribution_id/withdraw",
            post(withdraw_handler::<C, F, A, N>),
        )
        .with_state(service)
}

pub(crate) fn status_for(error: &ContributionServiceError) -> StatusCode {
    match error {
        ContributionServiceError::Violation(ContributionViolation::SelfReview) => {
            StatusCode::FORBIDDEN
        }
        ContributionServiceError::Violation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ContributionServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ContributionServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ContributionServiceError::Conflict(_)
        | ContributionServiceError::InvalidTransition { .. }
        | ContributionServiceError::Stale(_) => StatusCode::CONFLICT,
        ContributionServiceError::Records(inner) => record_status(inner),
        ContributionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ContributionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ContributionServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, ContributionServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(status_for(&err), err.to_string()),
    }
}

pub(crate) async fn submit_handler<C, F, A, N>(
    State(service): State<Arc<ContributionService<C, F, A, N>>>,
    headers: HeaderMap,
    Json(submission): Json<ContributionSubmission>,
) -> Response
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(StatusCode::CREATED, service.submit(&actor, submission))
}

pub(crate) async fn list_handler<C, F, A, N>(
    State(service): State<Arc<ContributionService<C, F, A, N>>>,
    Query(query): Query<ContributionQuery>,
) -> Response
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let filter = ContributionFilter::from(query);
    respond(StatusCode::OK, service.list(&filter))
}

pub(crate) async fn reviewable_handler<C, F, A, N>(
    State(service): State<Arc<ContributionService<C, F, A, N>>>,
    headers: HeaderMap,
) -> Response
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(reviewer) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(StatusCode::OK, service.reviewable_by(&reviewer))
}

pub(crate) async fn get_handler<C, F, A, N>(
    State(service): State<Arc<ContributionService<C, F, A, N>>>,
    Path(contribution_id): Path<String>,
) -> Response
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.get(&ContributionId(contribution_id)),
    )
}

pub(crate) async fn approve_handler<C, F, A, N>(
    State(service): State<Arc<ContributionService<C, F, A, N>>>,
    headers: HeaderMap,
    Path(contribution_id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> Response
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(reviewer) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    let note = body.and_then(|Json(request)| request.note);
    respond(
        StatusCode::OK,
        service.approve(&reviewer, &ContributionId(contribution_id), note),
    )
}

pub(crate) async fn reject_handler<C, F, A, N>(
    State(service): State<Arc<ContributionService<C, F, A, N>>>,
    headers: HeaderMap,
    Path(contribution_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(reviewer) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.reject(&reviewer, &ContributionId(contribution_id), &request.reason),
    )
}

pub(crate) async fn withdraw_handler<C, F, A, N>(
    State(service): State<Arc<ContributionService<C, F, A, N>>>,
    headers: HeaderMap,
    Path(contribution_id): Path<String>,
) -> Response
where
    C: ContributionRepository + 'static,
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
    N: Notifier + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    respond(
        StatusCode::OK,
        service.withdraw(&actor, &ContributionId(contribution_id)),
    )
}
