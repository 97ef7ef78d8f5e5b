use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable record of one judgment. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Comparison {
    pub id: Uuid,
    pub project_id: Uuid,
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Comparison {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.winner_id, self.loser_id)
    }
}

/// An unordered pair of applicant ids, normalized so `low < high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    pub low: Uuid,
    pub high: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }
}
