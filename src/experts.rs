//! Expert selection from hits/misses tables.
//!
//! Three independent rules score every author in a [`HitsMissesTable`] and
//! keep the top `round(num_users * fraction)`:
//!
//! - precision: share of an author's votes that landed on target items,
//!   restricted to a candidate pool;
//! - F-beta: precision against recall over the target set;
//! - confidence interval: a Wilson-style interval around the hit rate.
//!
//! A fourth, social-bias rule ignores the tables and keeps the most-followed
//! users; it serves as a popularity baseline for the scored rules.
//!
//! Percent-valued scores (precision, recall, F) live on `0..=100`. Zero
//! denominators score `0.0`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

use crate::activity::HitsMissesTable;
use crate::cohorts::Cohort;
use crate::config::{CiScore, ExpertConfig};
use crate::constants::cohorts::{
    ALL_EXPERTS, EXPERTS_CI, EXPERTS_CI_HIGH, EXPERTS_CI_LOW, EXPERTS_FSCORE, EXPERTS_PRECISION,
    EXPERTS_SOCIAL_BIAS, SUPER_EXPERTS,
};
use crate::constants::experts::{WILSON_PSEUDO_HITS, WILSON_PSEUDO_TRIALS};
use crate::data::{FollowerCounts, HitsMisses};
use crate::types::AuthorId;

/// `100 * hits / (hits + misses)`.
pub fn precision(counts: HitsMisses) -> f64 {
    ratio(counts.hits, counts.hits + counts.misses)
}

/// `100 * hits / target_size`.
pub fn recall(counts: HitsMisses, target_size: usize) -> f64 {
    ratio(counts.hits, target_size as u64)
}

/// Weighted harmonic mean of `precision` and `recall`.
pub fn f_beta(precision: f64, recall: f64, beta: f64) -> f64 {
    let beta_sq = beta * beta;
    let denominator = beta_sq * precision + recall;
    if denominator == 0.0 {
        return 0.0;
    }
    (1.0 + beta_sq) * precision * recall / denominator
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        100.0 * numerator as f64 / denominator as f64
    }
}

/// Wilson-style interval around an author's hit rate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WilsonInterval {
    /// Smoothed hit rate.
    pub p: f64,
    /// Half-width of the interval.
    pub error: f64,
    /// Lower bound, clamped at 0.
    pub low: f64,
    /// Upper bound, clamped at 1.
    pub high: f64,
}

impl WilsonInterval {
    /// Ranking score under `mode`.
    pub fn score(&self, mode: CiScore) -> f64 {
        match mode {
            CiScore::LowerBound => self.low,
            CiScore::Midpoint => (self.low + self.high) / 2.0,
        }
    }
}

/// Interval for `counts` at critical value `z`.
///
/// Two pseudo-hits and four pseudo-trials keep the estimate defined for
/// authors with no votes.
pub fn wilson_interval(counts: HitsMisses, z: f64) -> WilsonInterval {
    let trials = (counts.hits + counts.misses) as f64 + WILSON_PSEUDO_TRIALS;
    let p = (counts.hits as f64 + WILSON_PSEUDO_HITS) / trials;
    let error = z * (p * (1.0 - p) / trials).sqrt();
    WilsonInterval {
        p,
        error,
        low: (p - error).max(0.0),
        high: (p + error).min(1.0),
    }
}

/// Number of experts each rule selects for a population of `num_users`.
pub fn expert_count(num_users: usize, fraction: f64) -> usize {
    ((num_users as f64) * fraction).round() as usize
}

struct Scored<'a> {
    author_id: &'a AuthorId,
    score: f64,
    volume: u64,
}

fn by_score_then_author(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.author_id.cmp(b.author_id))
}

fn take_top(
    name: &str,
    mut scored: Vec<Scored<'_>>,
    count: usize,
    order: fn(&Scored<'_>, &Scored<'_>) -> Ordering,
) -> Cohort {
    scored.sort_by(order);
    Cohort::new(
        name,
        scored
            .into_iter()
            .take(count)
            .map(|entry| entry.author_id.clone()),
    )
}

/// Top authors of `pool` by precision; ties prefer more votes.
pub fn select_precision(
    table: &HitsMissesTable,
    pool: &Cohort,
    num_users: usize,
    config: &ExpertConfig,
) -> Cohort {
    let scored: Vec<Scored<'_>> = table
        .iter()
        .filter(|(author_id, _)| pool.contains(author_id))
        .map(|(author_id, counts)| Scored {
            author_id,
            score: precision(*counts),
            volume: counts.hits + counts.misses,
        })
        .collect();
    take_top(
        EXPERTS_PRECISION,
        scored,
        expert_count(num_users, config.fraction),
        |a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.volume.cmp(&a.volume))
                .then_with(|| a.author_id.cmp(b.author_id))
        },
    )
}

/// Top authors by F-beta against a target set of `target_size` items.
pub fn select_fscore(
    table: &HitsMissesTable,
    target_size: usize,
    num_users: usize,
    config: &ExpertConfig,
) -> Cohort {
    let scored: Vec<Scored<'_>> = table
        .iter()
        .map(|(author_id, counts)| Scored {
            author_id,
            score: f_beta(precision(*counts), recall(*counts, target_size), config.beta),
            volume: counts.hits + counts.misses,
        })
        .collect();
    take_top(
        EXPERTS_FSCORE,
        scored,
        expert_count(num_users, config.fraction),
        by_score_then_author,
    )
}

fn ci_scores<'a>(
    table: &'a HitsMissesTable,
    config: &ExpertConfig,
) -> impl Iterator<Item = Scored<'a>> {
    let (z, mode) = (config.z_score, config.ci_score);
    table.iter().map(move |(author_id, counts)| Scored {
        author_id,
        score: wilson_interval(*counts, z).score(mode),
        volume: counts.hits + counts.misses,
    })
}

/// Top authors by confidence-interval score.
pub fn select_ci(table: &HitsMissesTable, num_users: usize, config: &ExpertConfig) -> Cohort {
    take_top(
        EXPERTS_CI,
        ci_scores(table, config).collect(),
        expert_count(num_users, config.fraction),
        by_score_then_author,
    )
}

/// Split `ci_experts` into its better-scoring half (rounded up) and the rest.
pub fn split_ci(
    table: &HitsMissesTable,
    ci_experts: &Cohort,
    config: &ExpertConfig,
) -> (Cohort, Cohort) {
    let mut scored: Vec<Scored<'_>> = ci_scores(table, config)
        .filter(|entry| ci_experts.contains(entry.author_id))
        .collect();
    scored.sort_by(by_score_then_author);
    let upper = scored.len().div_ceil(2);
    let low = Cohort::new(
        EXPERTS_CI_LOW,
        scored[upper..].iter().map(|entry| entry.author_id.clone()),
    );
    scored.truncate(upper);
    (take_top(EXPERTS_CI_HIGH, scored, upper, by_score_then_author), low)
}

/// The most-followed authors, up to the expert count for `num_users`.
///
/// Ties prefer the lower author id.
pub fn select_social_bias(
    followers: &FollowerCounts,
    num_users: usize,
    config: &ExpertConfig,
) -> Cohort {
    let scored: Vec<Scored<'_>> = followers
        .iter()
        .map(|(author_id, count)| Scored {
            author_id,
            score: *count as f64,
            volume: *count,
        })
        .collect();
    let experts = take_top(
        EXPERTS_SOCIAL_BIAS,
        scored,
        expert_count(num_users, config.fraction),
        |a, b| b.volume.cmp(&a.volume).then_with(|| a.author_id.cmp(b.author_id)),
    );
    info!(
        experts = experts.len(),
        known_users = followers.len(),
        "selected social-bias experts"
    );
    experts
}

/// The three rule outputs plus their union and intersection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertGroups {
    /// Precision rule output.
    pub precision: Cohort,
    /// F-beta rule output.
    pub fscore: Cohort,
    /// Confidence-interval rule output.
    pub ci: Cohort,
    /// Union of the three.
    pub all: Cohort,
    /// Intersection of the three.
    pub super_experts: Cohort,
}

impl ExpertGroups {
    /// Derive union and intersection groups from the rule outputs.
    pub fn from_rules(precision: Cohort, fscore: Cohort, ci: Cohort) -> Self {
        let all = precision.union(ALL_EXPERTS, &fscore).union(ALL_EXPERTS, &ci);
        let super_experts = Cohort::new(
            SUPER_EXPERTS,
            precision
                .members()
                .filter(|id| fscore.contains(id) && ci.contains(id))
                .cloned(),
        );
        Self {
            precision,
            fscore,
            ci,
            all,
            super_experts,
        }
    }

    /// Run all three rules over `table`.
    pub fn select(
        table: &HitsMissesTable,
        precision_pool: &Cohort,
        target_size: usize,
        num_users: usize,
        config: &ExpertConfig,
    ) -> Self {
        let groups = Self::from_rules(
            select_precision(table, precision_pool, num_users, config),
            select_fscore(table, target_size, num_users, config),
            select_ci(table, num_users, config),
        );
        info!(
            precision = groups.precision.len(),
            fscore = groups.fscore.len(),
            ci = groups.ci.len(),
            all = groups.all.len(),
            super_experts = groups.super_experts.len(),
            "selected experts"
        );
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TableKey;

    fn hm(hits: u64, misses: u64) -> HitsMisses {
        HitsMisses { hits, misses }
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn table(rows: &[(&str, u64, u64)]) -> HitsMissesTable {
        let mut table = HitsMissesTable::new(TableKey::default());
        for (author, hits, misses) in rows {
            table.add(author.to_string(), hm(*hits, *misses));
        }
        table
    }

    #[test]
    fn precision_recall_and_fscore_for_a_single_user() {
        let counts = hm(8, 2);
        assert!(close(precision(counts), 80.0, 1e-9));
        assert!(close(recall(counts, 50), 16.0, 1e-9));
        let f = f_beta(precision(counts), recall(counts, 50), 1.0);
        assert!(close(f, 26.666_666, 1e-3));
    }

    #[test]
    fn degenerate_denominators_score_zero() {
        assert_eq!(precision(hm(0, 0)), 0.0);
        assert_eq!(recall(hm(3, 0), 0), 0.0);
        assert_eq!(f_beta(0.0, 0.0, 2.0), 0.0);
        assert_eq!(f_beta(precision(hm(0, 5)), recall(hm(0, 5), 10), 0.5), 0.0);
        assert!(!f_beta(precision(hm(1, 5)), recall(hm(1, 5), 10), 2.0).is_nan());
    }

    #[test]
    fn wilson_interval_matches_reference_values() {
        let interval = wilson_interval(hm(8, 2), 1.645);
        assert!(close(interval.p, 10.0 / 14.0, 1e-9));
        assert!(close(interval.error, 0.199, 1e-3));
        assert!(close(interval.low, 0.516, 1e-3));
        assert!(close(interval.high, 0.913, 1e-3));
        assert!(close(interval.score(CiScore::Midpoint), 0.714, 1e-3));
    }

    #[test]
    fn wilson_interval_is_clamped() {
        let interval = wilson_interval(hm(0, 0), 10.0);
        assert_eq!(interval.low, 0.0);
        assert_eq!(interval.high, 1.0);
    }

    #[test]
    fn precision_rule_prefers_volume_and_respects_pool() {
        let table = table(&[
            ("small", 2, 0),
            ("big", 10, 0),
            ("outsider", 50, 0),
            ("weak", 1, 9),
        ]);
        let pool = Cohort::new("pool", ["small", "big", "weak"].map(String::from));
        let config = ExpertConfig {
            fraction: 0.5,
            ..ExpertConfig::default()
        };
        // round(4 * 0.5) = 2
        let experts = select_precision(&table, &pool, 4, &config);
        let ids: Vec<&str> = experts.members().map(String::as_str).collect();
        assert_eq!(ids, vec!["big", "small"]);
    }

    #[test]
    fn expert_count_is_clamped_to_scored_pool() {
        let table = table(&[("a", 1, 0)]);
        let config = ExpertConfig {
            fraction: 1.0,
            ..ExpertConfig::default()
        };
        assert_eq!(select_ci(&table, 10, &config).len(), 1);
        assert_eq!(expert_count(49, 0.02), 1);
        assert_eq!(expert_count(24, 0.02), 0);
    }

    #[test]
    fn derived_groups_are_union_and_intersection() {
        let table = table(&[
            ("a", 9, 1),
            ("b", 5, 0),
            ("c", 1, 20),
            ("d", 30, 30),
            ("e", 0, 3),
        ]);
        let pool = Cohort::new("pool", ["a", "b", "c", "d", "e"].map(String::from));
        let config = ExpertConfig {
            fraction: 0.4,
            beta: 1.0,
            ..ExpertConfig::default()
        };
        let groups = ExpertGroups::select(&table, &pool, 40, 5, &config);
        let union = groups
            .precision
            .union("u", &groups.fscore)
            .union("u", &groups.ci);
        assert_eq!(groups.all.member_set(), union.member_set());
        for id in groups.super_experts.members() {
            assert!(groups.precision.contains(id));
            assert!(groups.fscore.contains(id));
            assert!(groups.ci.contains(id));
        }
        for id in groups.precision.members() {
            if groups.fscore.contains(id) && groups.ci.contains(id) {
                assert!(groups.super_experts.contains(id));
            }
        }
    }

    #[test]
    fn social_bias_keeps_the_most_followed_users() {
        let followers: FollowerCounts = [("a", 10), ("b", 500), ("c", 40), ("d", 40)]
            .into_iter()
            .map(|(author, count)| (author.to_string(), count))
            .collect();
        let config = ExpertConfig {
            fraction: 0.3,
            ..ExpertConfig::default()
        };
        // round(10 * 0.3) = 3
        let experts = select_social_bias(&followers, 10, &config);
        let ids: Vec<&str> = experts.members().map(String::as_str).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
        assert_eq!(experts.name, EXPERTS_SOCIAL_BIAS);
        // clamped to the users with a known follower count
        assert_eq!(select_social_bias(&followers, 1_000, &config).len(), 4);
    }

    #[test]
    fn ci_split_puts_the_better_half_first() {
        let table = table(&[("a", 9, 1), ("b", 1, 9), ("c", 5, 5), ("d", 0, 0)]);
        let ci = Cohort::new("ci", ["a", "b", "c"].map(String::from));
        let (high, low) = split_ci(&table, &ci, &ExpertConfig::default());
        let high_ids: Vec<&str> = high.members().map(String::as_str).collect();
        let low_ids: Vec<&str> = low.members().map(String::as_str).collect();
        assert_eq!(high_ids, vec!["a", "c"]);
        assert_eq!(low_ids, vec!["b"]);
        assert_eq!(high.name, EXPERTS_CI_HIGH);
        assert_eq!(low.name, EXPERTS_CI_LOW);
    }
}
