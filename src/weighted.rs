//! Weighted vote models.
//!
//! A model blends several cohorts into one ranking: every admitted vote by a
//! component's member adds that component's weight to the item's score.
//! Weights are either fixed or derived per author from follower counts.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::aggregator::AggregationQuery;
use crate::cohorts::Cohort;
use crate::constants::scan::SCAN_CHECK_INTERVAL;
use crate::constants::weights::UNKNOWN_FOLLOWER_WEIGHT;
use crate::data::{FollowerCounts, SeedTable, VoteRecord};
use crate::errors::EvalError;
use crate::scan::ScanControl;
use crate::types::{CohortName, ItemId, Rank};

/// Weight a component adds per vote.
#[derive(Clone, Copy, Debug)]
pub enum VoteWeight<'a> {
    /// The same weight for every member.
    Fixed(f64),
    /// `ln(followers + 1)`, or 1.0 for authors without a follower count.
    Followers(&'a FollowerCounts),
}

impl VoteWeight<'_> {
    /// Weight of one vote by `author_id`.
    pub fn for_author(&self, author_id: &str) -> f64 {
        match self {
            VoteWeight::Fixed(weight) => *weight,
            VoteWeight::Followers(followers) => followers
                .get(author_id)
                .map(|count| ((*count as f64) + 1.0).ln())
                .unwrap_or(UNKNOWN_FOLLOWER_WEIGHT),
        }
    }
}

/// One cohort's contribution to a model.
#[derive(Clone, Copy, Debug)]
pub struct WeightedComponent<'a> {
    /// Authors whose votes count.
    pub cohort: &'a Cohort,
    /// Weight per vote.
    pub weight: VoteWeight<'a>,
}

/// A named blend of cohorts.
#[derive(Clone, Debug)]
pub struct WeightedModel<'a> {
    /// Name the ranking is reported under.
    pub name: CohortName,
    /// Contributing cohorts.
    pub components: Vec<WeightedComponent<'a>>,
}

impl<'a> WeightedModel<'a> {
    /// Empty model called `name`.
    pub fn new(name: impl Into<CohortName>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Add `cohort` with a fixed per-vote weight.
    pub fn with_fixed(mut self, cohort: &'a Cohort, weight: f64) -> Self {
        self.components.push(WeightedComponent {
            cohort,
            weight: VoteWeight::Fixed(weight),
        });
        self
    }

    /// Add `cohort` with follower-derived weights.
    pub fn with_followers(mut self, cohort: &'a Cohort, followers: &'a FollowerCounts) -> Self {
        self.components.push(WeightedComponent {
            cohort,
            weight: VoteWeight::Followers(followers),
        });
        self
    }

    fn vote_weight(&self, author_id: &str) -> f64 {
        self.components
            .iter()
            .filter(|component| component.cohort.contains(author_id))
            .map(|component| component.weight.for_author(author_id))
            .sum()
    }
}

/// An item and its accumulated weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedItem {
    /// Ranked item.
    pub item_id: ItemId,
    /// Sum of vote weights.
    pub weight: f64,
}

/// Items ordered by accumulated weight, highest first; ties keep encounter order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedRanking {
    items: Vec<WeightedItem>,
}

impl WeightedRanking {
    /// Sort encounter-ordered weights descending.
    pub fn from_weights<K>(weights: IndexMap<K, f64>) -> Self
    where
        K: Into<ItemId>,
    {
        let mut items: Vec<WeightedItem> = weights
            .into_iter()
            .map(|(item_id, weight)| WeightedItem {
                item_id: item_id.into(),
                weight,
            })
            .collect();
        items.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        Self { items }
    }

    /// Ranked items.
    pub fn items(&self) -> &[WeightedItem] {
        &self.items
    }

    /// Number of ranked items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no vote reached the model.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item ids in rank order.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|item| &item.item_id)
    }

    /// 1-based rank of every item.
    pub fn ranks(&self) -> HashMap<ItemId, Rank> {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.item_id.clone(), idx + 1))
            .collect()
    }
}

/// Rank items under every model from one sequential pass over `votes`.
///
/// Votes are filtered exactly as in [`crate::aggregator::aggregate`]. Items
/// whose only votes come from authors outside every component are not ranked.
pub fn aggregate_weighted(
    votes: &[VoteRecord],
    seeds: &SeedTable,
    models: &[WeightedModel<'_>],
    query: &AggregationQuery<'_>,
    control: &ScanControl,
) -> Result<IndexMap<CohortName, WeightedRanking>, EvalError> {
    let mut scores: Vec<IndexMap<&str, f64>> = vec![IndexMap::new(); models.len()];
    for (idx, vote) in votes.iter().enumerate() {
        if idx % SCAN_CHECK_INTERVAL == 0 {
            control.check()?;
        }
        if !query.admits(vote, seeds) {
            continue;
        }
        for (model, score) in models.iter().zip(scores.iter_mut()) {
            if model
                .components
                .iter()
                .any(|component| component.cohort.contains(&vote.author_id))
            {
                *score.entry(vote.item_id.as_str()).or_insert(0.0) +=
                    model.vote_weight(&vote.author_id);
            }
        }
    }

    let mut rankings = IndexMap::new();
    for (model, weights) in models.iter().zip(scores) {
        let ranking = WeightedRanking::from_weights(weights);
        debug!(model = %model.name, items = ranking.len(), "aggregated weighted ranking");
        rankings.insert(model.name.clone(), ranking);
    }
    info!(models = rankings.len(), "aggregated weighted rankings");
    Ok(rankings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeltaWindow;
    use crate::data::SeedRecord;
    use crate::splits::{DatasetWindow, WindowBounds};
    use chrono::NaiveDate;

    fn seeds(items: &[&str]) -> SeedTable {
        items
            .iter()
            .map(|item| {
                (
                    item.to_string(),
                    SeedRecord {
                        tweet_id: format!("seed-{item}"),
                        author_id: "seeder".into(),
                        timestamp: NaiveDate::from_ymd_opt(2011, 11, 15)
                            .unwrap()
                            .and_hms_opt(12, 0, 0)
                            .unwrap(),
                        item_id: item.to_string(),
                    },
                )
            })
            .collect()
    }

    fn vote(author: &str, item: &str) -> VoteRecord {
        VoteRecord {
            tweet_id: format!("{author}/{item}"),
            author_id: author.into(),
            delta_seconds: 60,
            item_id: item.into(),
            category: None,
            source: None,
        }
    }

    #[test]
    fn blended_weights_can_reorder_raw_counts() {
        let crowd = Cohort::new("crowd", ["c1", "c2", "c3"].map(String::from));
        let experts = Cohort::new("experts", ["e1"].map(String::from));
        let votes = vec![
            vote("c1", "popular"),
            vote("c2", "popular"),
            vote("c3", "popular"),
            vote("e1", "niche"),
            vote("outsider", "ignored"),
        ];
        let models = vec![
            WeightedModel::new("blend")
                .with_fixed(&crowd, 0.15)
                .with_fixed(&experts, 0.85),
        ];
        let bounds = WindowBounds::default();
        let query = AggregationQuery::new(DatasetWindow::Testing, &bounds, DeltaWindow::Hours(1));
        let rankings = aggregate_weighted(
            &votes,
            &seeds(&["popular", "niche", "ignored"]),
            &models,
            &query,
            &ScanControl::new(),
        )
        .unwrap();
        let blend = &rankings["blend"];
        let ids: Vec<&str> = blend.item_ids().map(String::as_str).collect();
        // 0.85 beats 3 * 0.15
        assert_eq!(ids, vec!["niche", "popular"]);
        assert!((blend.items()[1].weight - 0.45).abs() < 1e-9);
        assert_eq!(blend.ranks()["popular"], 2);
    }

    #[test]
    fn follower_weights_use_log_counts() {
        let followers: FollowerCounts = [("a".to_string(), 0), ("b".to_string(), 99)]
            .into_iter()
            .collect();
        let weight = VoteWeight::Followers(&followers);
        assert_eq!(weight.for_author("a"), 0.0);
        assert!((weight.for_author("b") - 100f64.ln()).abs() < 1e-12);
        assert_eq!(weight.for_author("unknown"), UNKNOWN_FOLLOWER_WEIGHT);
    }

    #[test]
    fn cancellation_aborts_the_pass() {
        let cohort = Cohort::new("c", ["u1".to_string()]);
        let models = vec![WeightedModel::new("m").with_fixed(&cohort, 1.0)];
        let bounds = WindowBounds::default();
        let query = AggregationQuery::new(DatasetWindow::Testing, &bounds, DeltaWindow::Unbounded);
        let control = ScanControl::new();
        control.cancel();
        assert!(matches!(
            aggregate_weighted(&[vote("u1", "a")], &seeds(&["a"]), &models, &query, &control),
            Err(EvalError::Cancelled { .. })
        ));
    }
}
