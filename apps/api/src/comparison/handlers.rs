//! Axum route handlers for the review loop and rankings.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::comparison::engine::{NextPair, OutcomeReceipt, PairOffer};
use crate::comparison::ranking::RankedApplicant;
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub project_id: Uuid,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub project_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEloRequest {
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePairRequest {
    pub project_id: Uuid,
    pub session_id: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/getTwoForComparison?project_id=&session_id=
///
/// Reserves and returns the next pair. 409 once the project is complete,
/// which the review page treats as "go to results".
pub async fn handle_get_two_for_comparison(
    State(state): State<AppState>,
    Query(params): Query<PairQuery>,
) -> Result<Json<PairOffer>, AppError> {
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match state.engine.next_pair(params.project_id, &session_id).await? {
        NextPair::Offer(offer) => Ok(Json(offer)),
        NextPair::Complete => Err(AppError::NoMoreComparisons),
    }
}

/// POST /api/updateElo
pub async fn handle_update_elo(
    State(state): State<AppState>,
    Json(request): Json<UpdateEloRequest>,
) -> Result<Json<OutcomeReceipt>, AppError> {
    let receipt = state
        .engine
        .record_outcome(request.project_id, request.winner_id, request.loser_id)
        .await?;
    Ok(Json(receipt))
}

/// POST /api/releasePair
pub async fn handle_release_pair(
    State(state): State<AppState>,
    Json(request): Json<ReleasePairRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .release_reservation(request.project_id, &request.session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/rankings?project_id=
pub async fn handle_rankings(
    State(state): State<AppState>,
    Query(params): Query<ProjectQuery>,
) -> Result<Json<Vec<RankedApplicant>>, AppError> {
    Ok(Json(state.engine.ranking(params.project_id).await?))
}
