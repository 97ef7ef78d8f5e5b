use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::models::applicant::Applicant;

/// One row of the final ordered ranking.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedApplicant {
    pub rank: usize,
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub elo: f64,
    pub wins: i32,
    pub losses: i32,
}

/// Rating descending, then wins descending, then id ascending.
pub fn ranking_order(a: &Applicant, b: &Applicant) -> Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then_with(|| b.wins.cmp(&a.wins))
        .then_with(|| a.id.cmp(&b.id))
}

/// Builds the ordered ranking. Read-only; works on in-progress projects too.
pub fn build_ranking(applicants: &[Applicant]) -> Vec<RankedApplicant> {
    let mut ordered: Vec<&Applicant> = applicants.iter().collect();
    ordered.sort_by(|a, b| ranking_order(a, b));
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, a)| RankedApplicant {
            rank: i + 1,
            id: a.id,
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            elo: a.rating,
            wins: a.wins,
            losses: a.losses,
        })
        .collect()
}
