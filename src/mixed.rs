//! Mixed model: one ranking assembled from several cohorts' evidence.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::config::MixPolicy;
use crate::constants::evaluation::MAX_ERROR;
use crate::evaluation::PrecisionRecallCurve;
use crate::ranking::ItemRanking;
use crate::types::{CohortName, ItemId, Rank};

/// One cohort's item ranks and evaluation curve.
#[derive(Clone, Debug)]
pub struct CohortEvidence<'a> {
    /// Cohort name.
    pub cohort: CohortName,
    /// 1-based rank of every item in the cohort's ranking.
    pub ranks: HashMap<ItemId, Rank>,
    /// The cohort's precision/recall curve.
    pub curve: &'a PrecisionRecallCurve,
}

impl<'a> CohortEvidence<'a> {
    /// Evidence from `cohort`'s ranking and curve.
    pub fn new(
        cohort: impl Into<CohortName>,
        ranking: &ItemRanking,
        curve: &'a PrecisionRecallCurve,
    ) -> Self {
        Self {
            cohort: cohort.into(),
            ranks: ranking.ranks(),
            curve,
        }
    }

    /// `100 - precision` at the item's rank, or the maximum error when the
    /// item is unranked or ranked past the end of the curve.
    pub fn error_for(&self, item_id: &str) -> f64 {
        self.ranks
            .get(item_id)
            .and_then(|rank| self.curve.precision_at(*rank))
            .map_or(MAX_ERROR, |precision| MAX_ERROR - precision)
    }
}

/// One mixed-ranking row; `score` is the combined error or rank that placed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixedEntry {
    /// Ranked item.
    pub item_id: ItemId,
    /// Rank in the ground truth.
    pub gt_rank: Rank,
    /// Combined error or rank, lower is better.
    pub score: f64,
}

/// Combined ranking in final order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixedRanking {
    /// Rule used to combine cohorts.
    pub policy: MixPolicy,
    /// Entries in final order.
    pub entries: Vec<MixedEntry>,
}

impl MixedRanking {
    /// Item ids in final order.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.iter().map(|entry| &entry.item_id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no item was ranked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn combined_score(evidence: &[CohortEvidence<'_>], item_id: &str, policy: MixPolicy) -> f64 {
    match policy {
        MixPolicy::MinError => evidence
            .iter()
            .map(|cohort| cohort.error_for(item_id))
            .fold(MAX_ERROR, f64::min),
        MixPolicy::MinRank => evidence
            .iter()
            .filter_map(|cohort| cohort.ranks.get(item_id))
            .min()
            .map_or(f64::INFINITY, |rank| *rank as f64),
    }
}

/// Fuse cohort rankings under `policy`.
///
/// Items ranked by any cohort are scored, then ordered by ascending score with
/// ties broken by ascending ground-truth rank. Items missing from the ground
/// truth are dropped.
pub fn mix_rankings(
    evidence: &[CohortEvidence<'_>],
    gt_ranks: &HashMap<ItemId, Rank>,
    policy: MixPolicy,
) -> MixedRanking {
    let items: HashSet<&ItemId> = evidence
        .iter()
        .flat_map(|cohort| cohort.ranks.keys())
        .collect();
    let mut dropped = 0usize;
    let mut entries: Vec<MixedEntry> = Vec::with_capacity(items.len());
    for item_id in items {
        let Some(gt_rank) = gt_ranks.get(item_id) else {
            dropped += 1;
            continue;
        };
        entries.push(MixedEntry {
            item_id: item_id.clone(),
            gt_rank: *gt_rank,
            score: combined_score(evidence, item_id, policy),
        });
    }
    entries.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.gt_rank.cmp(&b.gt_rank))
    });
    debug!(?policy, items = entries.len(), dropped, "mixed cohort rankings");
    MixedRanking {
        policy,
        entries,
    }
}

/// Count of mixed items won by each cohort under the minimum-error rule.
///
/// An item counts for every cohort that achieves its minimum error.
pub fn winning_cohorts(
    evidence: &[CohortEvidence<'_>],
    mixed: &MixedRanking,
) -> BTreeMap<CohortName, usize> {
    let mut wins: BTreeMap<CohortName, usize> = evidence
        .iter()
        .map(|cohort| (cohort.cohort.clone(), 0))
        .collect();
    for entry in &mixed.entries {
        let best = combined_score(evidence, &entry.item_id, MixPolicy::MinError);
        if best >= MAX_ERROR {
            continue;
        }
        for cohort in evidence {
            if cohort.error_for(&entry.item_id) == best
                && let Some(count) = wins.get_mut(&cohort.cohort)
            {
                *count += 1;
            }
        }
    }
    wins
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn ranking(items: &[&str]) -> ItemRanking {
        let mut counts = IndexMap::new();
        for (idx, item) in items.iter().enumerate() {
            counts.insert(*item, (items.len() - idx) as u64);
        }
        ItemRanking::from_counts(counts)
    }

    fn curve(precisions: &[f64]) -> PrecisionRecallCurve {
        PrecisionRecallCurve {
            precisions: precisions.to_vec(),
            recalls: vec![0.0; precisions.len()],
        }
    }

    fn ids(mixed: &MixedRanking) -> Vec<&str> {
        mixed.item_ids().map(String::as_str).collect()
    }

    #[test]
    fn min_error_groups_by_error_then_ground_truth() {
        let market = ranking(&["a", "b", "c", "d"]);
        let experts = ranking(&["d", "c"]);
        let market_curve = curve(&[50.0, 50.0, 40.0]);
        let expert_curve = curve(&[100.0, 50.0]);
        let evidence = vec![
            CohortEvidence::new("population", &market, &market_curve),
            CohortEvidence::new("experts", &experts, &expert_curve),
        ];
        let gt = ranking(&["c", "a", "b", "d", "e"]).ranks();
        let mixed = mix_rankings(&evidence, &gt, MixPolicy::MinError);
        // d: 0 via experts; a, b, c: 50 ordered by gt rank
        assert_eq!(ids(&mixed), vec!["d", "c", "a", "b"]);
        assert_eq!(mixed.entries[0].score, 0.0);
        assert_eq!(mixed.entries[1].score, 50.0);

        let wins = winning_cohorts(&evidence, &mixed);
        assert_eq!(wins["experts"], 2);
        assert_eq!(wins["population"], 2);
    }

    #[test]
    fn ranks_past_the_curve_get_maximum_error() {
        let market = ranking(&["a", "b", "c"]);
        let market_curve = curve(&[100.0]);
        let evidence = vec![CohortEvidence::new("population", &market, &market_curve)];
        assert_eq!(evidence[0].error_for("a"), 0.0);
        assert_eq!(evidence[0].error_for("c"), MAX_ERROR);
        assert_eq!(evidence[0].error_for("zzz"), MAX_ERROR);
    }

    #[test]
    fn min_rank_policy_uses_best_rank() {
        let market = ranking(&["a", "b", "c"]);
        let experts = ranking(&["c", "x"]);
        let empty = curve(&[]);
        let evidence = vec![
            CohortEvidence::new("population", &market, &empty),
            CohortEvidence::new("experts", &experts, &empty),
        ];
        let gt = ranking(&["b", "a", "c"]).ranks();
        let mixed = mix_rankings(&evidence, &gt, MixPolicy::MinRank);
        // a and c share rank 1; b is rank 2; x is not in the ground truth
        assert_eq!(ids(&mixed), vec!["a", "c", "b"]);
        assert_eq!(mixed.policy, MixPolicy::MinRank);
    }
}
