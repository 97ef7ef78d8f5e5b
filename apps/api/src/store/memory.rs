use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::comparison::elo::EloRater;
use crate::errors::AppError;
use crate::models::applicant::Applicant;
use crate::models::comparison::{Comparison, PairKey};
use crate::models::project::{Project, ProjectStatus};
use crate::store::{
    already_compared, applicant_not_in_project, self_comparison, AppliedOutcome, NewProject,
    RatingStore,
};

#[derive(Debug)]
struct ProjectRecords {
    project: Project,
    applicant_ids: Vec<Uuid>,
    comparisons: Vec<Comparison>,
    compared: HashSet<PairKey>,
}

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashMap<Uuid, ProjectRecords>,
    applicants: HashMap<Uuid, Applicant>,
    /// Insertion order for stable listings.
    project_order: Vec<Uuid>,
}

/// In-process store used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryRatingStore {
    state: Mutex<MemoryState>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("rating store lock poisoned")))
    }
}

fn project_not_found(project_id: Uuid) -> AppError {
    AppError::NotFound(format!("Project {project_id} not found"))
}

#[async_trait]
impl RatingStore for MemoryRatingStore {
    async fn create_project(&self, new_project: NewProject) -> Result<Project, AppError> {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: new_project.name,
            total_applicants: i32::try_from(new_project.roster.len())
                .map_err(|_| AppError::Validation("Too many applicants".to_string()))?,
            per_applicant_target: new_project.per_applicant_target,
            target_comparisons: new_project.target_comparisons,
            completed_comparisons: 0,
            status: ProjectStatus::Active,
            created_at: now,
            completed_at: None,
        };

        let applicants: Vec<Applicant> = new_project
            .roster
            .into_iter()
            .map(|profile| Applicant::new(project.id, profile, new_project.baseline_rating))
            .collect();

        let mut state = self.lock()?;
        let records = ProjectRecords {
            project: project.clone(),
            applicant_ids: applicants.iter().map(|a| a.id).collect(),
            comparisons: Vec::new(),
            compared: HashSet::new(),
        };
        for applicant in applicants {
            state.applicants.insert(applicant.id, applicant);
        }
        state.projects.insert(project.id, records);
        state.project_order.push(project.id);
        Ok(project)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        let state = self.lock()?;
        Ok(state
            .project_order
            .iter()
            .filter_map(|id| state.projects.get(id).map(|r| r.project.clone()))
            .collect())
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Project, AppError> {
        let state = self.lock()?;
        state
            .projects
            .get(&project_id)
            .map(|r| r.project.clone())
            .ok_or_else(|| project_not_found(project_id))
    }

    async fn get_applicant(&self, applicant_id: Uuid) -> Result<Applicant, AppError> {
        let state = self.lock()?;
        state
            .applicants
            .get(&applicant_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Applicant {applicant_id} not found")))
    }

    async fn list_applicants(&self, project_id: Uuid) -> Result<Vec<Applicant>, AppError> {
        let state = self.lock()?;
        let records = state
            .projects
            .get(&project_id)
            .ok_or_else(|| project_not_found(project_id))?;
        Ok(records
            .applicant_ids
            .iter()
            .filter_map(|id| state.applicants.get(id).cloned())
            .collect())
    }

    async fn list_comparisons(&self, project_id: Uuid) -> Result<Vec<Comparison>, AppError> {
        let state = self.lock()?;
        let records = state
            .projects
            .get(&project_id)
            .ok_or_else(|| project_not_found(project_id))?;
        Ok(records.comparisons.clone())
    }

    async fn apply_outcome(
        &self,
        project_id: Uuid,
        winner_id: Uuid,
        loser_id: Uuid,
        rater: &EloRater,
    ) -> Result<AppliedOutcome, AppError> {
        if winner_id == loser_id {
            return Err(self_comparison(winner_id));
        }

        let mut state = self.lock()?;
        let state = &mut *state;

        // Validate everything before touching anything.
        let records = state
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| project_not_found(project_id))?;
        let winner = state
            .applicants
            .get(&winner_id)
            .filter(|a| a.project_id == project_id)
            .ok_or_else(|| applicant_not_in_project(winner_id, project_id))?;
        let loser = state
            .applicants
            .get(&loser_id)
            .filter(|a| a.project_id == project_id)
            .ok_or_else(|| applicant_not_in_project(loser_id, project_id))?;
        let pair = PairKey::new(winner_id, loser_id);
        if records.compared.contains(&pair) {
            return Err(already_compared(winner_id, loser_id));
        }

        let change = rater.rate(winner.rating, loser.rating);
        let now = Utc::now();

        let mut winner = winner.clone();
        winner.rating = change.winner_rating;
        winner.wins += 1;
        winner.comparisons += 1;
        winner.last_compared_at = Some(now);

        let mut loser = loser.clone();
        loser.rating = change.loser_rating;
        loser.losses += 1;
        loser.comparisons += 1;
        loser.last_compared_at = Some(now);

        let comparison = Comparison {
            id: Uuid::new_v4(),
            project_id,
            winner_id,
            loser_id,
            created_at: now,
        };

        state.applicants.insert(winner_id, winner.clone());
        state.applicants.insert(loser_id, loser.clone());
        records.compared.insert(pair);
        records.comparisons.push(comparison.clone());
        records.project.completed_comparisons += 1;

        Ok(AppliedOutcome {
            winner,
            loser,
            comparison,
        })
    }

    async fn mark_complete(&self, project_id: Uuid) -> Result<Project, AppError> {
        let mut state = self.lock()?;
        let project = state
            .projects
            .get_mut(&project_id)
            .map(|r| &mut r.project)
            .ok_or_else(|| project_not_found(project_id))?;
        if project.status == ProjectStatus::Active {
            project.status = ProjectStatus::Complete;
            project.completed_at = Some(Utc::now());
        }
        Ok(project.clone())
    }
}
