use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::comparison::elo::EloRater;
use crate::errors::AppError;
use crate::models::applicant::Applicant;
use crate::models::comparison::Comparison;
use crate::models::project::{Project, ProjectStatus};
use crate::store::{
    already_compared, applicant_not_in_project, self_comparison, AppliedOutcome, NewProject,
    RatingStore,
};

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    total_applicants: i32,
    per_applicant_target: i32,
    target_comparisons: i32,
    completed_comparisons: i32,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            total_applicants: row.total_applicants,
            per_applicant_target: row.per_applicant_target,
            target_comparisons: row.target_comparisons,
            completed_comparisons: row.completed_comparisons,
            status: row.status.parse()?,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// PostgreSQL-backed store. Every outcome is one transaction.
#[derive(Clone)]
pub struct PgRatingStore {
    pool: PgPool,
}

impl PgRatingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_project(&self, project_id: Uuid) -> Result<Project, AppError> {
        sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?
            .try_into()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

/// Locks both applicant rows in id order so concurrent outcomes sharing an
/// applicant cannot deadlock.
async fn lock_pair(
    tx: &mut Transaction<'_, Postgres>,
    project_id: Uuid,
    winner_id: Uuid,
    loser_id: Uuid,
) -> Result<(Applicant, Applicant), AppError> {
    let rows = sqlx::query_as::<_, Applicant>(
        r#"
        SELECT * FROM applicants
        WHERE project_id = $1 AND id = ANY($2)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(project_id)
    .bind(vec![winner_id, loser_id])
    .fetch_all(&mut **tx)
    .await?;

    let winner = rows
        .iter()
        .find(|a| a.id == winner_id)
        .cloned()
        .ok_or_else(|| applicant_not_in_project(winner_id, project_id))?;
    let loser = rows
        .iter()
        .find(|a| a.id == loser_id)
        .cloned()
        .ok_or_else(|| applicant_not_in_project(loser_id, project_id))?;
    Ok((winner, loser))
}

#[async_trait]
impl RatingStore for PgRatingStore {
    async fn create_project(&self, new_project: NewProject) -> Result<Project, AppError> {
        let total = i32::try_from(new_project.roster.len())
            .map_err(|_| AppError::Validation("Too many applicants".to_string()))?;
        let project_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            INSERT INTO projects
                (id, name, total_applicants, per_applicant_target, target_comparisons)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(&new_project.name)
        .bind(total)
        .bind(new_project.per_applicant_target)
        .bind(new_project.target_comparisons)
        .fetch_one(&mut *tx)
        .await?;

        for profile in new_project.roster {
            let applicant = Applicant::new(project_id, profile, new_project.baseline_rating);
            sqlx::query(
                r#"
                INSERT INTO applicants
                    (id, project_id, first_name, last_name, major, year, attachments, rating)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(applicant.id)
            .bind(project_id)
            .bind(&applicant.first_name)
            .bind(&applicant.last_name)
            .bind(&applicant.major)
            .bind(&applicant.year)
            .bind(&applicant.attachments)
            .bind(applicant.rating)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!("Inserted project {project_id} with {total} applicants");
        row.try_into()
    }

    async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Project::try_from)
            .collect()
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Project, AppError> {
        self.fetch_project(project_id).await
    }

    async fn get_applicant(&self, applicant_id: Uuid) -> Result<Applicant, AppError> {
        sqlx::query_as::<_, Applicant>("SELECT * FROM applicants WHERE id = $1")
            .bind(applicant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Applicant {applicant_id} not found")))
    }

    async fn list_applicants(&self, project_id: Uuid) -> Result<Vec<Applicant>, AppError> {
        // Surface NotFound for unknown projects rather than an empty list.
        self.fetch_project(project_id).await?;
        Ok(sqlx::query_as::<_, Applicant>(
            "SELECT * FROM applicants WHERE project_id = $1 ORDER BY created_at, id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_comparisons(&self, project_id: Uuid) -> Result<Vec<Comparison>, AppError> {
        self.fetch_project(project_id).await?;
        Ok(sqlx::query_as::<_, Comparison>(
            "SELECT * FROM comparisons WHERE project_id = $1 ORDER BY created_at, id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
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

        let mut tx = self.pool.begin().await?;
        let (winner, loser) = lock_pair(&mut tx, project_id, winner_id, loser_id).await?;

        let seen: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM comparisons
                WHERE project_id = $1
                  AND LEAST(winner_id, loser_id) = LEAST($2::uuid, $3::uuid)
                  AND GREATEST(winner_id, loser_id) = GREATEST($2::uuid, $3::uuid)
            )
            "#,
        )
        .bind(project_id)
        .bind(winner_id)
        .bind(loser_id)
        .fetch_one(&mut *tx)
        .await?;
        if seen {
            // Dropping the transaction rolls it back.
            return Err(already_compared(winner_id, loser_id));
        }

        let change = rater.rate(winner.rating, loser.rating);
        let now = Utc::now();

        let winner = sqlx::query_as::<_, Applicant>(
            r#"
            UPDATE applicants
            SET rating = $2, wins = wins + 1, comparisons = comparisons + 1, last_compared_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(winner_id)
        .bind(change.winner_rating)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let loser = sqlx::query_as::<_, Applicant>(
            r#"
            UPDATE applicants
            SET rating = $2, losses = losses + 1, comparisons = comparisons + 1, last_compared_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(loser_id)
        .bind(change.loser_rating)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let comparison = sqlx::query_as::<_, Comparison>(
            r#"
            INSERT INTO comparisons (id, project_id, winner_id, loser_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(winner_id)
        .bind(loser_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                already_compared(winner_id, loser_id)
            } else {
                AppError::Database(e)
            }
        })?;

        sqlx::query(
            "UPDATE projects SET completed_comparisons = completed_comparisons + 1 WHERE id = $1",
        )
        .bind(project_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AppliedOutcome {
            winner,
            loser,
            comparison,
        })
    }

    async fn mark_complete(&self, project_id: Uuid) -> Result<Project, AppError> {
        // The status guard keeps the transition one-way and completed_at stable.
        sqlx::query(
            "UPDATE projects SET status = $2, completed_at = now() WHERE id = $1 AND status = $3",
        )
        .bind(project_id)
        .bind(ProjectStatus::Complete.as_str())
        .bind(ProjectStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        self.fetch_project(project_id).await
    }
}
