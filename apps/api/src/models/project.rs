use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Complete,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Complete => "complete",
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "complete" => Ok(ProjectStatus::Complete),
            other => Err(AppError::Internal(anyhow::anyhow!(
                "unknown project status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub total_applicants: i32,
    pub per_applicant_target: i32,
    pub target_comparisons: i32,
    pub completed_comparisons: i32,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_complete(&self) -> bool {
        self.status == ProjectStatus::Complete
    }

    /// Percentage of the target comparison count already recorded, 0-100.
    pub fn progress(&self) -> f64 {
        if self.target_comparisons <= 0 {
            return 100.0;
        }
        (100.0 * f64::from(self.completed_comparisons) / f64::from(self.target_comparisons))
            .min(100.0)
    }
}

/// Wire shape consumed by the project list page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub total_applicants: i32,
    pub completed_comparisons: i32,
    pub total_comparisons: i32,
    pub progress: f64,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            status: project.status,
            total_applicants: project.total_applicants,
            completed_comparisons: project.completed_comparisons,
            total_comparisons: project.target_comparisons,
            progress: project.progress(),
        }
    }
}
