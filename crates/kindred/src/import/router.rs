use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::service::FamilyImporter;
use super::ImportError;
use crate::activity::ActivityRepository;
use crate::audit::UserId;
use crate::error::{error_response, missing_identity};
use crate::records::{FamilyRepository, HouseholdId};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImportQuery {
    #[serde(default)]
    household: Option<String>,
    #[serde(default)]
    dry_run: bool,
}

/// `POST /api/v1/import` takes the raw CSV export as the request body.
pub fn import_router<F, A>(importer: Arc<FamilyImporter<F, A>>) -> Router
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    Router::new()
        .route("/api/v1/import", post(import_handler::<F, A>))
        .with_state(importer)
}

pub(crate) fn status_for(error: &ImportError) -> StatusCode {
    match error {
        ImportError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ImportError::Csv(_) => StatusCode::BAD_REQUEST,
        ImportError::Records(err) => crate::records::router::status_for(err),
    }
}

pub(crate) async fn import_handler<F, A>(
    State(importer): State<Arc<FamilyImporter<F, A>>>,
    headers: HeaderMap,
    Query(query): Query<ImportQuery>,
    body: String,
) -> Response
where
    F: FamilyRepository + 'static,
    A: ActivityRepository + 'static,
{
    let Some(actor) = UserId::from_headers(&headers) else {
        return missing_identity();
    };
    let result = if query.dry_run {
        FamilyImporter::dry_run(body.as_bytes())
    } else {
        let household = query.household.map(HouseholdId);
        importer.import(&actor, body.as_bytes(), household.as_ref())
    };
    match result {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(status_for(&err), err.to_string()),
    }
}
