use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One candidate being ranked within a project.
///
/// `rating`, `wins`, `losses`, `comparisons` and `last_compared_at` are only
/// ever written by `RatingStore::apply_outcome`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Applicant {
    pub id: Uuid,
    pub project_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub major: Option<String>,
    pub year: Option<String>,
    /// Opaque resume / cover letter / image references owned by blob storage.
    pub attachments: Option<Value>,
    #[serde(rename = "elo")]
    pub rating: f64,
    pub wins: i32,
    pub losses: i32,
    pub comparisons: i32,
    pub last_compared_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Applicant {
    pub fn new(project_id: Uuid, profile: ApplicantProfile, baseline_rating: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            major: profile.major,
            year: profile.year,
            attachments: profile.attachments,
            rating: baseline_rating,
            wins: 0,
            losses: 0,
            comparisons: 0,
            last_compared_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Roster fields supplied when a project is created.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplicantProfile {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub attachments: Option<Value>,
}

impl ApplicantProfile {
    pub fn placeholder(position: usize) -> Self {
        Self {
            first_name: "Applicant".to_string(),
            last_name: position.to_string(),
            ..Self::default()
        }
    }
}
