pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::comparison::handlers as review;
use crate::projects::handlers as projects;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Projects
        .route(
            "/api/projects",
            get(projects::handle_list_projects).post(projects::handle_create_project),
        )
        .route("/api/projects/:id", get(projects::handle_get_project))
        .route("/api/applicants", get(projects::handle_get_applicant))
        // Review loop
        .route(
            "/api/getTwoForComparison",
            get(review::handle_get_two_for_comparison),
        )
        .route("/api/updateElo", post(review::handle_update_elo))
        .route("/api/releasePair", post(review::handle_release_pair))
        .route("/api/rankings", get(review::handle_rankings))
        .with_state(state)
}
