//! Rating Store: durable per-applicant state keyed by project.
//!
//! All rating mutation goes through `apply_outcome`; nothing else writes
//! `rating`, `wins`, `losses` or `comparisons`.
//!
//! `ComparisonEngine` holds an `Arc<dyn RatingStore>`, picked at startup: PostgreSQL
//! when `DATABASE_URL` is set, in-memory otherwise.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::comparison::elo::EloRater;
use crate::errors::AppError;
use crate::models::applicant::{Applicant, ApplicantProfile};
use crate::models::comparison::Comparison;
use crate::models::project::Project;

pub use memory::MemoryRatingStore;
pub use postgres::PgRatingStore;

/// Everything needed to persist a new project with its roster.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub per_applicant_target: i32,
    pub target_comparisons: i32,
    pub baseline_rating: f64,
    pub roster: Vec<ApplicantProfile>,
}

/// Result of one successfully applied outcome.
#[derive(Debug, Clone)]
pub struct AppliedOutcome {
    pub winner: Applicant,
    pub loser: Applicant,
    pub comparison: Comparison,
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn create_project(&self, new_project: NewProject) -> Result<Project, AppError>;

    async fn list_projects(&self) -> Result<Vec<Project>, AppError>;

    async fn get_project(&self, project_id: Uuid) -> Result<Project, AppError>;

    async fn get_applicant(&self, applicant_id: Uuid) -> Result<Applicant, AppError>;

    async fn list_applicants(&self, project_id: Uuid) -> Result<Vec<Applicant>, AppError>;

    async fn list_comparisons(&self, project_id: Uuid) -> Result<Vec<Comparison>, AppError>;

    /// Applies one judgment atomically: both applicant rows and the new
    /// comparison record land together or not at all.
    ///
    /// Fails with `NotFound` if either applicant is outside `project_id`,
    /// `InvalidOutcome` if they are the same applicant, and
    /// `AlreadyCompared` if the pair already has a record.
    async fn apply_outcome(
        &self,
        project_id: Uuid,
        winner_id: Uuid,
        loser_id: Uuid,
        rater: &EloRater,
    ) -> Result<AppliedOutcome, AppError>;

    /// Flips the project to `complete`. Never reverts; a no-op when already complete.
    async fn mark_complete(&self, project_id: Uuid) -> Result<Project, AppError>;
}

pub(crate) fn applicant_not_in_project(applicant_id: Uuid, project_id: Uuid) -> AppError {
    AppError::NotFound(format!(
        "Applicant {applicant_id} not found in project {project_id}"
    ))
}

pub(crate) fn already_compared(winner_id: Uuid, loser_id: Uuid) -> AppError {
    AppError::AlreadyCompared(format!(
        "Applicants {winner_id} and {loser_id} have already been compared"
    ))
}

pub(crate) fn self_comparison(applicant_id: Uuid) -> AppError {
    AppError::InvalidOutcome(format!(
        "Applicant {applicant_id} cannot be compared against itself"
    ))
}
