//! Cohort construction: activity tiers, buckets and derived groups.
//!
//! Every partitioner works over a fixed order (activity rank, or ascending id
//! for set inputs), so the same inputs always produce the same cohorts.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::activity::ActivityRanking;
use crate::config::{BucketConfig, TierConfig};
use crate::constants::cohorts::{ACTIVE, COMMON, EVEN_BUCKET_PREFIX, NEWSAHOLICS, POPULATION};
use crate::types::{AuthorId, CohortName};

/// A named set of authors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    /// Name used in rankings and reports.
    pub name: CohortName,
    members: BTreeSet<AuthorId>,
}

impl Cohort {
    /// Cohort `name` holding `members`.
    pub fn new(name: impl Into<CohortName>, members: impl IntoIterator<Item = AuthorId>) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().collect(),
        }
    }

    /// True when `author_id` is a member.
    pub fn contains(&self, author_id: &str) -> bool {
        self.members.contains(author_id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the cohort has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in ascending id order.
    pub fn members(&self) -> impl Iterator<Item = &AuthorId> {
        self.members.iter()
    }

    /// Members as a set.
    pub fn member_set(&self) -> &BTreeSet<AuthorId> {
        &self.members
    }

    /// Members of `self` or `other`.
    pub fn union(&self, name: impl Into<CohortName>, other: &Cohort) -> Cohort {
        Cohort {
            name: name.into(),
            members: self.members.union(&other.members).cloned().collect(),
        }
    }

    /// Members of `self` that are not in `other`.
    pub fn difference(&self, name: impl Into<CohortName>, other: &Cohort) -> Cohort {
        Cohort {
            name: name.into(),
            members: self.members.difference(&other.members).cloned().collect(),
        }
    }

    /// Members shared with `other`.
    pub fn intersection_len(&self, other: &Cohort) -> usize {
        self.members.intersection(&other.members).count()
    }
}

/// The three activity tiers; together they cover the ranking exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicTiers {
    /// Users in the activity ranking.
    pub num_users: usize,
    /// Top tier.
    pub newsaholics: Cohort,
    /// Middle tier.
    pub active: Cohort,
    /// Everyone else.
    pub common: Cohort,
}

impl BasicTiers {
    /// Union of all tiers.
    pub fn population(&self) -> Cohort {
        self.newsaholics
            .union(POPULATION, &self.active)
            .union(POPULATION, &self.common)
    }

    /// Newsaholics plus active users: the pool scored by the precision rule.
    pub fn engaged(&self) -> Cohort {
        self.newsaholics.union("engaged", &self.active)
    }
}

fn threshold(num_users: usize, fraction: f64) -> usize {
    (((num_users as f64) * fraction).floor() as usize).min(num_users)
}

/// Slice the activity ranking at `floor(n * newsaholic)` and `floor(n * active_upper)`.
pub fn partition_basic(ranking: &ActivityRanking, tiers: &TierConfig) -> BasicTiers {
    let num_users = ranking.len();
    let first = threshold(num_users, tiers.newsaholic_fraction);
    let second = threshold(num_users, tiers.active_upper_fraction).max(first);
    let ids: Vec<&AuthorId> = ranking.author_ids().collect();
    let slice = |name: &str, range: std::ops::Range<usize>| {
        Cohort::new(name, ids[range].iter().map(|id| (*id).clone()))
    };
    let partition = BasicTiers {
        num_users,
        newsaholics: slice(NEWSAHOLICS, 0..first),
        active: slice(ACTIVE, first..second),
        common: slice(COMMON, second..num_users),
    };
    debug!(
        num_users,
        newsaholics = partition.newsaholics.len(),
        active = partition.active.len(),
        common = partition.common.len(),
        "partitioned activity tiers"
    );
    partition
}

/// Consecutive rank slices of `floor(n * group_size_fraction)` users each.
///
/// Users past `num_groups` full slices stay ungrouped.
pub fn even_buckets(ranking: &ActivityRanking, buckets: &BucketConfig) -> Vec<Cohort> {
    let size = threshold(ranking.len(), buckets.group_size_fraction);
    let ids: Vec<&AuthorId> = ranking.author_ids().collect();
    (0..buckets.num_groups)
        .map(|idx| {
            let start = (idx * size).min(ids.len());
            let end = (start + size).min(ids.len());
            Cohort::new(
                format!("{EVEN_BUCKET_PREFIX}{idx}"),
                ids[start..end].iter().map(|id| (*id).clone()),
            )
        })
        .collect()
}

/// Deal `cohort` members, in ascending id order, into `num_groups` buckets.
pub fn round_robin_buckets(cohort: &Cohort, num_groups: usize, prefix: &str) -> Vec<Cohort> {
    if num_groups == 0 {
        return Vec::new();
    }
    let mut groups: Vec<Vec<AuthorId>> = vec![Vec::new(); num_groups];
    for (idx, author_id) in cohort.members().enumerate() {
        groups[idx % num_groups].push(author_id.clone());
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(idx, members)| Cohort::new(format!("{prefix}{idx}"), members))
        .collect()
}

/// Deterministic sample of `floor(|cohort| * fraction)` members.
///
/// The RNG is seeded from `seed` and the new cohort's name, so distinct
/// samples drawn under one seed are independent of each other.
pub fn sample_cohort(cohort: &Cohort, name: &str, fraction: f64, seed: u64) -> Cohort {
    let ids: Vec<&AuthorId> = cohort.members().collect();
    let amount = threshold(ids.len(), fraction);
    let mut rng = StdRng::seed_from_u64(cohort_seed(seed, name));
    Cohort::new(
        name,
        ids.choose_multiple(&mut rng, amount).map(|id| (*id).clone()),
    )
}

fn cohort_seed(seed: u64, name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    name.hash(&mut hasher);
    hasher.finish()
}
