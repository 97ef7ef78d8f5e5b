//! Rating Updater math: a fixed-K Elo update for one pairwise outcome.

/// Fixed-K Elo rater. Both sides move by the same amount, so every update is
/// zero-sum unless the loser would drop below zero.
#[derive(Debug, Clone, Copy)]
pub struct EloRater {
    k_factor: f64,
}

/// New ratings for the two applicants involved in one outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingChange {
    pub winner_rating: f64,
    pub loser_rating: f64,
}

impl EloRater {
    pub fn new(k_factor: f64) -> Self {
        Self { k_factor }
    }

    /// expected(Rw, Rl) = 1 / (1 + 10^((Rl - Rw) / 400))
    pub fn expected_score(winner_rating: f64, loser_rating: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((loser_rating - winner_rating) / 400.0))
    }

    pub fn rate(&self, winner_rating: f64, loser_rating: f64) -> RatingChange {
        let expected = Self::expected_score(winner_rating, loser_rating);
        let delta = self.k_factor * (1.0 - expected);
        RatingChange {
            winner_rating: finite_or(winner_rating + delta, winner_rating),
            // Ratings never go negative.
            loser_rating: finite_or(loser_rating - delta, loser_rating).max(0.0),
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
