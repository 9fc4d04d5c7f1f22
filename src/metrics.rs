use serde::{Deserialize, Serialize};

use crate::cohorts::Cohort;
use crate::experts::ExpertGroups;
use crate::ranking::ItemRanking;
use crate::types::CohortName;

/// Size and vote volume of one cohort's ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    /// Cohort name.
    pub cohort: CohortName,
    /// Number of members.
    pub members: usize,
    /// Items the cohort voted on.
    pub ranked_items: usize,
    /// Votes the cohort cast.
    pub total_votes: u64,
    /// Share of the population's votes cast by this cohort.
    pub vote_share: f64,
}

/// Summarize `cohort` given its ranking and the population's vote total.
pub fn cohort_summary(
    cohort: &Cohort,
    ranking: &ItemRanking,
    population_votes: u64,
) -> CohortSummary {
    let total_votes = ranking.total_votes();
    CohortSummary {
        cohort: cohort.name.clone(),
        members: cohort.len(),
        ranked_items: ranking.len(),
        total_votes,
        vote_share: if population_votes == 0 {
            0.0
        } else {
            total_votes as f64 / population_votes as f64
        },
    }
}

/// Pairwise and global overlap between the three expert rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertOverlap {
    /// Precision experts.
    pub precision: usize,
    /// F-beta experts.
    pub fscore: usize,
    /// CI experts.
    pub ci: usize,
    /// Precision and F-beta experts.
    pub precision_fscore: usize,
    /// Precision and CI experts.
    pub precision_ci: usize,
    /// F-beta and CI experts.
    pub fscore_ci: usize,
    /// Union of all rules.
    pub all: usize,
    /// Intersection of all rules.
    pub super_experts: usize,
}

/// Overlap counts for `groups`.
pub fn expert_overlap(groups: &ExpertGroups) -> ExpertOverlap {
    ExpertOverlap {
        precision: groups.precision.len(),
        fscore: groups.fscore.len(),
        ci: groups.ci.len(),
        precision_fscore: groups.precision.intersection_len(&groups.fscore),
        precision_ci: groups.precision.intersection_len(&groups.ci),
        fscore_ci: groups.fscore.intersection_len(&groups.ci),
        all: groups.all.len(),
        super_experts: groups.super_experts.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn cohort(name: &str, ids: &[&str]) -> Cohort {
        Cohort::new(name, ids.iter().map(|id| id.to_string()))
    }

    #[test]
    fn summary_reports_volume_and_share() {
        let mut counts = IndexMap::new();
        counts.insert("a", 3);
        counts.insert("b", 1);
        let summary = cohort_summary(
            &cohort("newsaholics", &["u1", "u2"]),
            &ItemRanking::from_counts(counts),
            16,
        );
        assert_eq!(summary.members, 2);
        assert_eq!(summary.ranked_items, 2);
        assert_eq!(summary.total_votes, 4);
        assert!((summary.vote_share - 0.25).abs() < 1e-6);

        let empty = cohort_summary(&cohort("x", &[]), &ItemRanking::default(), 0);
        assert_eq!(empty.vote_share, 0.0);
    }

    #[test]
    fn overlap_counts_pairs_and_extremes() {
        let groups = ExpertGroups::from_rules(
            cohort("p", &["a", "b", "c"]),
            cohort("f", &["b", "c", "d"]),
            cohort("c", &["c", "e"]),
        );
        let overlap = expert_overlap(&groups);
        assert_eq!(overlap.precision_fscore, 2);
        assert_eq!(overlap.precision_ci, 1);
        assert_eq!(overlap.fscore_ci, 1);
        assert_eq!(overlap.all, 5);
        assert_eq!(overlap.super_experts, 1);
    }
}
