//! Comparison targets and the Completion Tracker.

use crate::comparison::pairing::max_pairs;
use crate::models::applicant::Applicant;
use crate::models::project::Project;

/// How many comparisons a project needs before it stops presenting pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonTargets {
    pub per_applicant: i32,
    pub total: i32,
}

impl ComparisonTargets {
    /// target = ceil(N * k / 2), capped by what the pool can actually produce:
    /// an applicant can meet at most N - 1 others, and there are N(N-1)/2 pairs.
    pub fn for_pool(applicant_count: usize, comparisons_per_applicant: u32) -> Self {
        if applicant_count < 2 {
            return Self {
                per_applicant: 0,
                total: 0,
            };
        }
        let per_applicant = (comparisons_per_applicant as usize).min(applicant_count - 1);
        let total = (applicant_count * per_applicant)
            .div_ceil(2)
            .min(max_pairs(applicant_count));
        Self {
            per_applicant: clamp_i32(per_applicant),
            total: clamp_i32(total),
        }
    }
}

fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Completion verdict for one project, recomputed from current counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionCheck {
    pub targets_met: bool,
    pub pool_exhausted: bool,
}

impl CompletionCheck {
    pub fn is_complete(&self) -> bool {
        self.targets_met || self.pool_exhausted
    }
}

/// A project is complete when every applicant reached the per-applicant
/// target and the total comparison count reached the project target, or
/// when no unseen pair is left.
pub fn evaluate(project: &Project, applicants: &[Applicant], comparison_count: usize) -> CompletionCheck {
    let every_applicant_met = applicants
        .iter()
        .all(|a| a.comparisons >= project.per_applicant_target);
    let total_met = comparison_count >= usize::try_from(project.target_comparisons).unwrap_or(0);

    CompletionCheck {
        targets_met: every_applicant_met && total_met,
        pool_exhausted: comparison_count >= max_pairs(applicants.len()),
    }
}
