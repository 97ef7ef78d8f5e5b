//! `ComparisonEngine` orchestrates pair selection, outcome application and
//! completion for every project.
//!
//! Each project gets its own `tokio::sync::Mutex` guarding its reservation
//! book. "Select + reserve" and "validate + apply + release + completion
//! check" both run inside that critical section, so two sessions can never
//! be dealt the same unresolved pair. Different projects never share a lock;
//! the registry mutex is only held long enough to look up the project's lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::comparison::completion::{self, ComparisonTargets};
use crate::comparison::elo::EloRater;
use crate::comparison::pairing::{select_pair, NoPair};
use crate::comparison::ranking::{build_ranking, RankedApplicant};
use crate::comparison::reservations::{Reservation, ReservationBook};
use crate::errors::AppError;
use crate::models::applicant::{Applicant, ApplicantProfile};
use crate::models::comparison::PairKey;
use crate::models::project::{Project, ProjectStatus};
use crate::store::{NewProject, RatingStore};

/// Upper bound on applicants per project.
pub const MAX_APPLICANTS: usize = 5000;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub k_factor: f64,
    pub baseline_rating: f64,
    pub comparisons_per_applicant: u32,
    pub reservation_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            baseline_rating: 1500.0,
            comparisons_per_applicant: 5,
            reservation_ttl: Duration::from_secs(300),
        }
    }
}

/// A pair handed to one reviewing session.
#[derive(Debug, Clone, Serialize)]
pub struct PairOffer {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub applicants: [Applicant; 2],
}

#[derive(Debug, Clone)]
pub enum NextPair {
    Offer(PairOffer),
    /// The project is complete; switch to the ranking.
    Complete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReceipt {
    pub winner: Applicant,
    pub loser: Applicant,
    pub project_status: ProjectStatus,
}

type ProjectLock = Arc<AsyncMutex<ReservationBook>>;

pub struct ComparisonEngine {
    store: Arc<dyn RatingStore>,
    settings: EngineSettings,
    rater: EloRater,
    locks: Mutex<HashMap<Uuid, ProjectLock>>,
}

impl ComparisonEngine {
    pub fn new(store: Arc<dyn RatingStore>, settings: EngineSettings) -> Self {
        let rater = EloRater::new(settings.k_factor);
        Self {
            store,
            settings,
            rater,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RatingStore> {
        &self.store
    }

    /// Looks up the project's lock, creating it on first use. Unknown
    /// projects fail with `NotFound` before any registry entry is made.
    async fn project_lock(&self, project_id: Uuid) -> Result<ProjectLock, AppError> {
        let existing = self.registry()?.get(&project_id).cloned();
        if let Some(lock) = existing {
            return Ok(lock);
        }
        self.store.get_project(project_id).await?;
        Ok(Arc::clone(
            self.registry()?
                .entry(project_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(ReservationBook::new()))),
        ))
    }

    fn registry(&self) -> Result<MutexGuard<'_, HashMap<Uuid, ProjectLock>>, AppError> {
        self.locks
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("project lock registry poisoned")))
    }

    /// Creates a project, seeding applicants at the baseline rating and
    /// fixing its comparison targets.
    pub async fn create_project(
        &self,
        name: String,
        roster: Vec<ApplicantProfile>,
    ) -> Result<Project, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Project name is required".to_string()));
        }
        if roster.len() > MAX_APPLICANTS {
            return Err(AppError::Validation(format!(
                "A project can hold at most {MAX_APPLICANTS} applicants"
            )));
        }
        let targets = ComparisonTargets::for_pool(roster.len(), self.settings.comparisons_per_applicant);
        let project = self
            .store
            .create_project(NewProject {
                name: name.trim().to_string(),
                per_applicant_target: targets.per_applicant,
                target_comparisons: targets.total,
                baseline_rating: self.settings.baseline_rating,
                roster,
            })
            .await?;
        info!(
            "Created project {} ({} applicants, target {} comparisons)",
            project.id, project.total_applicants, project.target_comparisons
        );
        Ok(project)
    }

    /// Returns the next pair for `session_id`, or `Complete`.
    ///
    /// A session that still holds a live reservation gets the same pair back.
    pub async fn next_pair(&self, project_id: Uuid, session_id: &str) -> Result<NextPair, AppError> {
        let lock = self.project_lock(project_id).await?;
        let mut book = lock.lock().await;

        let project = self.store.get_project(project_id).await?;
        if project.is_complete() {
            return Ok(NextPair::Complete);
        }

        let applicants = self.store.list_applicants(project_id).await?;
        let compared: HashSet<PairKey> = self
            .store
            .list_comparisons(project_id)
            .await?
            .iter()
            .map(|c| c.pair())
            .collect();

        if completion::evaluate(&project, &applicants, compared.len()).is_complete() {
            self.complete(project_id, &mut book).await?;
            return Ok(NextPair::Complete);
        }

        let now = Instant::now();
        let expired = book.purge_expired(now);
        if expired > 0 {
            info!("Released {expired} expired pair reservation(s) in project {project_id}");
        }

        let pair = match book.held_by(session_id) {
            Some(held) if !compared.contains(&held.pair) => held.pair,
            _ => match select_pair(&applicants, &compared, &book.reserved_by_others(session_id)) {
                Ok(pair) => pair,
                Err(NoPair::AllReserved) => {
                    warn!(
                        "All open pairs in project {project_id} are reserved; session {session_id} must retry"
                    );
                    return Err(AppError::Conflict(
                        "Every remaining pair is being reviewed by another session".to_string(),
                    ));
                }
                Err(NoPair::Exhausted) => {
                    self.complete(project_id, &mut book).await?;
                    return Ok(NextPair::Complete);
                }
            },
        };

        let reservation = book.reserve(session_id, pair, now, self.settings.reservation_ttl);
        let offer = self.build_offer(session_id, &applicants, reservation, now)?;
        Ok(NextPair::Offer(offer))
    }

    fn build_offer(
        &self,
        session_id: &str,
        applicants: &[Applicant],
        reservation: Reservation,
        now: Instant,
    ) -> Result<PairOffer, AppError> {
        let find = |id: Uuid| {
            applicants.iter().find(|a| a.id == id).cloned().ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("reserved applicant {id} missing from pool"))
            })
        };
        let remaining = reservation.expires_at.saturating_duration_since(now);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(remaining)
                .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(PairOffer {
            session_id: session_id.to_string(),
            expires_at,
            applicants: [find(reservation.pair.low)?, find(reservation.pair.high)?],
        })
    }

    /// Records one judgment and re-checks completion.
    ///
    /// When `project_id` is omitted it is taken from the winner's record; the
    /// store still rejects a loser from a different project.
    pub async fn record_outcome(
        &self,
        project_id: Option<Uuid>,
        winner_id: Uuid,
        loser_id: Uuid,
    ) -> Result<OutcomeReceipt, AppError> {
        if winner_id == loser_id {
            warn!("Rejected self-comparison for applicant {winner_id}");
            return Err(AppError::InvalidOutcome(
                "winnerId and loserId must be different applicants".to_string(),
            ));
        }
        let project_id = match project_id {
            Some(id) => id,
            None => self.store.get_applicant(winner_id).await?.project_id,
        };

        let lock = self.project_lock(project_id).await?;
        let mut book = lock.lock().await;

        let applied = match self
            .store
            .apply_outcome(project_id, winner_id, loser_id, &self.rater)
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Rejected outcome {winner_id} > {loser_id} in project {project_id}: {e}");
                return Err(e);
            }
        };
        book.release_pair(PairKey::new(winner_id, loser_id));
        info!(
            "Applied outcome {} ({winner_id} > {loser_id}) in project {project_id}: {:.1} / {:.1}",
            applied.comparison.id, applied.winner.rating, applied.loser.rating
        );

        let mut project = self.store.get_project(project_id).await?;
        if !project.is_complete() {
            let applicants = self.store.list_applicants(project_id).await?;
            let count = self.store.list_comparisons(project_id).await?.len();
            if completion::evaluate(&project, &applicants, count).is_complete() {
                project = self.complete(project_id, &mut book).await?;
            }
        }

        Ok(OutcomeReceipt {
            winner: applied.winner,
            loser: applied.loser,
            project_status: project.status,
        })
    }

    /// Drops the session's reservation early, e.g. when a reviewer leaves.
    pub async fn release_reservation(&self, project_id: Uuid, session_id: &str) -> Result<(), AppError> {
        let lock = self.project_lock(project_id).await?;
        let mut book = lock.lock().await;
        if book.release_session(session_id).is_some() {
            info!("Session {session_id} released its pair in project {project_id}");
        }
        Ok(())
    }

    /// Ordered ranking; best-effort while the project is still active.
    pub async fn ranking(&self, project_id: Uuid) -> Result<Vec<RankedApplicant>, AppError> {
        let applicants = self.store.list_applicants(project_id).await?;
        Ok(build_ranking(&applicants))
    }

    async fn complete(&self, project_id: Uuid, book: &mut ReservationBook) -> Result<Project, AppError> {
        let project = self.store.mark_complete(project_id).await?;
        if !book.is_empty() {
            info!("Dropping {} outstanding reservation(s) in project {project_id}", book.len());
        }
        book.clear();
        info!(
            "Project {project_id} complete after {} comparisons",
            project.completed_comparisons
        );
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRatingStore;

    fn engine() -> Arc<ComparisonEngine> {
        engine_with(EngineSettings::default())
    }

    fn engine_with(settings: EngineSettings) -> Arc<ComparisonEngine> {
        Arc::new(ComparisonEngine::new(
            Arc::new(MemoryRatingStore::new()),
            settings,
        ))
    }

    async fn project(engine: &ComparisonEngine, n: usize) -> Project {
        engine
            .create_project(
                "Fall recruitment".to_string(),
                (1..=n).map(ApplicantProfile::placeholder).collect(),
            )
            .await
            .unwrap()
    }

    fn offer(next: NextPair) -> PairOffer {
        match next {
            NextPair::Offer(offer) => offer,
            NextPair::Complete => panic!("expected a pair, project was complete"),
        }
    }

    fn pair_of(offer: &PairOffer) -> PairKey {
        PairKey::new(offer.applicants[0].id, offer.applicants[1].id)
    }

    #[tokio::test]
    async fn test_create_project_sets_targets() {
        let engine = engine();
        let project = project(&engine, 10).await;
        assert_eq!(project.per_applicant_target, 5);
        assert_eq!(project.target_comparisons, 25);
        assert_eq!(project.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn test_create_project_validates_input() {
        let engine = engine();
        let err = engine
            .create_project("   ".to_string(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let too_many = (1..=MAX_APPLICANTS + 1)
            .map(ApplicantProfile::placeholder)
            .collect();
        let err = engine
            .create_project("Huge".to_string(), too_many)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_review_loop_runs_to_completion() {
        let engine = engine();
        let project = project(&engine, 10).await;
        let mut seen = HashSet::new();

        let mut rounds = 0;
        while let NextPair::Offer(offer) = engine.next_pair(project.id, "reviewer").await.unwrap() {
            let pair = pair_of(&offer);
            assert!(seen.insert(pair), "pair {pair:?} offered twice");
            // Higher placeholder number always wins.
            let (a, b) = (&offer.applicants[0], &offer.applicants[1]);
            let strength = |x: &Applicant| x.last_name.parse::<u32>().unwrap();
            let (winner, loser) = if strength(a) > strength(b) { (a, b) } else { (b, a) };
            engine
                .record_outcome(Some(project.id), winner.id, loser.id)
                .await
                .unwrap();
            rounds += 1;
            assert!(rounds <= 45, "selection never terminated");
        }

        assert!(rounds >= 25);
        let store = engine.store();
        let finished = store.get_project(project.id).await.unwrap();
        assert!(finished.is_complete());
        assert_eq!(finished.completed_comparisons, rounds);

        let applicants = store.list_applicants(project.id).await.unwrap();
        assert!(applicants.iter().all(|a| a.comparisons == a.wins + a.losses));
        assert!(applicants.iter().all(|a| a.comparisons >= 5));

        let comparisons = store.list_comparisons(project.id).await.unwrap();
        let unique: HashSet<_> = comparisons.iter().map(|c| c.pair()).collect();
        assert_eq!(unique.len(), comparisons.len());
    }

    #[tokio::test]
    async fn test_complete_project_keeps_returning_complete() {
        let engine = engine();
        let project = project(&engine, 2).await;
        let first = offer(engine.next_pair(project.id, "s1").await.unwrap());
        let receipt = engine
            .record_outcome(None, first.applicants[0].id, first.applicants[1].id)
            .await
            .unwrap();
        assert_eq!(receipt.project_status, ProjectStatus::Complete);

        for session in ["s1", "s2", "s1"] {
            assert!(matches!(
                engine.next_pair(project.id, session).await.unwrap(),
                NextPair::Complete
            ));
        }
    }

    #[tokio::test]
    async fn test_concurrent_sessions_get_distinct_pairs() {
        let engine = engine();
        let project_id = project(&engine, 6).await.id;

        let mut handles = Vec::new();
        for i in 0..3 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.next_pair(project_id, &format!("session-{i}")).await
            }));
        }
        let mut pairs = HashSet::new();
        for handle in handles {
            let next = handle.await.unwrap().unwrap();
            assert!(pairs.insert(pair_of(&offer(next))));
        }
        assert_eq!(pairs.len(), 3);
    }

    #[tokio::test]
    async fn test_full_size_project_deals_distinct_pairs() {
        let engine = engine();
        let project = project(&engine, MAX_APPLICANTS).await;

        let mut dealt = HashSet::new();
        for session in ["desk-1", "desk-2", "desk-3"] {
            let offer = offer(engine.next_pair(project.id, session).await.unwrap());
            assert!(dealt.insert(pair_of(&offer)));
        }

        let first = dealt.iter().copied().min().unwrap();
        engine
            .record_outcome(Some(project.id), first.low, first.high)
            .await
            .unwrap();
        let applicants = engine.store().list_applicants(project.id).await.unwrap();
        let winner = applicants.iter().find(|a| a.id == first.low).unwrap();
        assert_eq!(winner.comparisons, 1);
    }

    #[tokio::test]
    async fn test_same_session_gets_its_pair_back() {
        let engine = engine();
        let project = project(&engine, 5).await;
        let first = offer(engine.next_pair(project.id, "alice").await.unwrap());
        let again = offer(engine.next_pair(project.id, "alice").await.unwrap());
        assert_eq!(pair_of(&first), pair_of(&again));
    }

    #[tokio::test]
    async fn test_conflict_when_only_pair_is_reserved() {
        let engine = engine();
        let project = project(&engine, 2).await;
        offer(engine.next_pair(project.id, "alice").await.unwrap());
        let err = engine.next_pair(project.id, "bob").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_reservation_is_reoffered() {
        let engine = engine_with(EngineSettings {
            reservation_ttl: Duration::from_secs(30),
            ..EngineSettings::default()
        });
        let project = project(&engine, 2).await;
        let held = offer(engine.next_pair(project.id, "alice").await.unwrap());
        assert!(engine.next_pair(project.id, "bob").await.is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        let reoffered = offer(engine.next_pair(project.id, "bob").await.unwrap());
        assert_eq!(pair_of(&held), pair_of(&reoffered));
    }

    #[tokio::test]
    async fn test_release_frees_pair_for_others() {
        let engine = engine();
        let project = project(&engine, 2).await;
        offer(engine.next_pair(project.id, "alice").await.unwrap());
        engine.release_reservation(project.id, "alice").await.unwrap();
        assert!(engine.next_pair(project.id, "bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_outcome_releases_reservation() {
        let engine = engine();
        let project = project(&engine, 4).await;
        let held = offer(engine.next_pair(project.id, "alice").await.unwrap());
        engine
            .record_outcome(
                Some(project.id),
                held.applicants[1].id,
                held.applicants[0].id,
            )
            .await
            .unwrap();
        let next = offer(engine.next_pair(project.id, "alice").await.unwrap());
        assert_ne!(pair_of(&held), pair_of(&next));
    }

    #[tokio::test]
    async fn test_duplicate_and_self_outcomes_rejected() {
        let engine = engine();
        let project = project(&engine, 3).await;
        let pool = engine.store().list_applicants(project.id).await.unwrap();
        let (a, b) = (pool[0].id, pool[1].id);

        let err = engine.record_outcome(Some(project.id), a, a).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOutcome(_)));

        engine.record_outcome(Some(project.id), a, b).await.unwrap();
        let err = engine.record_outcome(None, b, a).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyCompared(_)));

        let after = engine.store().get_applicant(b).await.unwrap();
        assert_eq!((after.wins, after.losses), (0, 1));
    }

    #[tokio::test]
    async fn test_unknown_ids_not_found() {
        let engine = engine();
        let project = project(&engine, 2).await;
        assert!(matches!(
            engine.next_pair(Uuid::new_v4(), "s").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            engine.record_outcome(None, Uuid::new_v4(), Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        let pool = engine.store().list_applicants(project.id).await.unwrap();
        assert!(matches!(
            engine
                .record_outcome(Some(project.id), pool[0].id, Uuid::new_v4())
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_disjoint_outcomes_commute() {
        let forward = engine();
        let backward = engine();
        let p1 = project(&forward, 4).await;
        let p2 = project(&backward, 4).await;
        let a = forward.store().list_applicants(p1.id).await.unwrap();
        let b = backward.store().list_applicants(p2.id).await.unwrap();

        forward.record_outcome(Some(p1.id), a[0].id, a[1].id).await.unwrap();
        forward.record_outcome(Some(p1.id), a[2].id, a[3].id).await.unwrap();
        backward.record_outcome(Some(p2.id), b[2].id, b[3].id).await.unwrap();
        backward.record_outcome(Some(p2.id), b[0].id, b[1].id).await.unwrap();

        let ratings = |r: Vec<RankedApplicant>| {
            let mut rows: Vec<_> = r
                .into_iter()
                .map(|x| (x.last_name, x.elo.to_bits(), x.wins))
                .collect();
            rows.sort();
            rows
        };
        assert_eq!(
            ratings(forward.ranking(p1.id).await.unwrap()),
            ratings(backward.ranking(p2.id).await.unwrap())
        );
    }

    #[tokio::test]
    async fn test_projects_do_not_share_state() {
        let engine = engine();
        let first = project(&engine, 2).await;
        let second = project(&engine, 2).await;
        offer(engine.next_pair(first.id, "alice").await.unwrap());
        // The same session id in another project holds its own reservation.
        offer(engine.next_pair(second.id, "alice").await.unwrap());
        assert!(matches!(
            engine.next_pair(first.id, "bob").await,
            Err(AppError::Conflict(_))
        ));
    }
}
