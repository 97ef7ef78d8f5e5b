//! Axum route handlers for projects and applicant detail.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::comparison::engine::MAX_APPLICANTS;
use crate::errors::AppError;
use crate::models::applicant::{Applicant, ApplicantProfile};
use crate::models::project::ProjectSummary;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default, alias = "total_applicants")]
    pub total_applicants: Option<usize>,
    #[serde(default)]
    pub applicants: Option<Vec<ApplicantProfile>>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicantQuery {
    pub id: Uuid,
}

/// Resolves the roster from either an explicit applicant list or a bare count.
fn resolve_roster(request: CreateProjectRequest) -> Result<(String, Vec<ApplicantProfile>), AppError> {
    let requested = request
        .applicants
        .as_ref()
        .map(Vec::len)
        .into_iter()
        .chain(request.total_applicants)
        .max()
        .unwrap_or(0);
    if requested > MAX_APPLICANTS {
        return Err(AppError::Validation(format!(
            "A project can hold at most {MAX_APPLICANTS} applicants"
        )));
    }
    let roster = match (request.applicants, request.total_applicants) {
        (Some(list), Some(total)) if list.len() != total => {
            return Err(AppError::Validation(format!(
                "totalApplicants is {total} but {} applicants were supplied",
                list.len()
            )));
        }
        (Some(list), _) => list,
        (None, Some(total)) => (1..=total).map(ApplicantProfile::placeholder).collect(),
        (None, None) => {
            return Err(AppError::Validation(
                "Either totalApplicants or applicants is required".to_string(),
            ));
        }
    };
    if roster.iter().any(|p| p.first_name.trim().is_empty()) {
        return Err(AppError::Validation(
            "Every applicant needs a first_name".to_string(),
        ));
    }
    Ok((request.name, roster))
}

/// GET /api/projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectSummary>>, AppError> {
    let projects = state.engine.store().list_projects().await?;
    Ok(Json(projects.iter().map(ProjectSummary::from).collect()))
}

/// POST /api/projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectSummary>), AppError> {
    let (name, roster) = resolve_roster(request)?;
    let project = state.engine.create_project(name, roster).await?;
    Ok((StatusCode::CREATED, Json(ProjectSummary::from(&project))))
}

/// GET /api/projects/:id
pub async fn handle_get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectSummary>, AppError> {
    let project = state.engine.store().get_project(project_id).await?;
    Ok(Json(ProjectSummary::from(&project)))
}

/// GET /api/applicants?id=
pub async fn handle_get_applicant(
    State(state): State<AppState>,
    Query(params): Query<ApplicantQuery>,
) -> Result<Json<Applicant>, AppError> {
    Ok(Json(state.engine.store().get_applicant(params.id).await?))
}
