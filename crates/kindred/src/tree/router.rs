use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::service::{TreeError, TreeService};
use crate::error::error_response;
use crate::records::{FamilyRepository, PersonId};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MiniTreeQuery {
    #[serde(default)]
    up: Option<u8>,
    #[serde(default)]
    down: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RelativesQuery {
    #[serde(default)]
    degree: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RelationshipQuery {
    from: String,
    to: String,
}

pub fn tree_router<F>(service: Arc<TreeService<F>>) -> Router
where
    F: FamilyRepository + 'static,
{
    Router::new()
        .route("/api/v1/tree/relationship", get(relationship_handler::<F>))
        .route("/api/v1/tree/:person_id/mini", get(mini_tree_handler::<F>))
        .route(
            "/api/v1/tree/:person_id/relatives",
            get(relatives_handler::<F>),
        )
        .with_state(service)
}

fn failure(error: TreeError) -> Response {
    let status = match &error {
        TreeError::NotFound(_) => StatusCode::NOT_FOUND,
        TreeError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.to_string())
}

pub(crate) async fn mini_tree_handler<F>(
    State(service): State<Arc<TreeService<F>>>,
    Path(person_id): Path<String>,
    Query(query): Query<MiniTreeQuery>,
) -> Response
where
    F: FamilyRepository + 'static,
{
    match service.mini_tree(&PersonId(person_id), query.up, query.down) {
        Ok(tree) => (StatusCode::OK, Json(tree)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn relatives_handler<F>(
    State(service): State<Arc<TreeService<F>>>,
    Path(person_id): Path<String>,
    Query(query): Query<RelativesQuery>,
) -> Response
where
    F: FamilyRepository + 'static,
{
    match service.relatives_within(&PersonId(person_id), query.degree) {
        Ok(relatives) => (StatusCode::OK, Json(relatives)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn relationship_handler<F>(
    State(service): State<Arc<TreeService<F>>>,
    Query(query): Query<RelationshipQuery>,
) -> Response
where
    F: FamilyRepository + 'static,
{
    let from = PersonId(query.from);
    let to = PersonId(query.to);
    match service.relationship(&from, &to) {
        Ok(Some(relationship)) => (StatusCode::OK, Json(relationship)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("no relationship between {from} and {to}"),
        ),
        Err(err) => failure(err),
    }
}
