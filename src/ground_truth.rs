//! Ground-truth popularity rankings and target sets.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::DeltaWindow;
use crate::data::{SeedTable, VoteRecord};
use crate::errors::EvalError;
use crate::ranking::ItemRanking;
use crate::splits::{DatasetWindow, WindowBounds};
use crate::types::{ItemId, TweetId};
use crate::utils::extract_category;

/// Vote filter for a ground-truth scan.
#[derive(Clone, Copy, Debug)]
pub struct GroundTruthQuery<'a> {
    /// Window whose seeds are counted.
    pub window: DatasetWindow,
    /// Window date ranges.
    pub bounds: &'a WindowBounds,
    /// Category matched against the item url.
    pub category: Option<&'a str>,
    /// Tweets to ignore, typically retweets.
    pub exclude_tweets: Option<&'a HashSet<TweetId>>,
    /// Drop votes at or past this age.
    pub max_delta: DeltaWindow,
}

impl<'a> GroundTruthQuery<'a> {
    /// Every vote on items seeded in `window`.
    pub fn new(window: DatasetWindow, bounds: &'a WindowBounds) -> Self {
        Self {
            window,
            bounds,
            category: None,
            exclude_tweets: None,
            max_delta: DeltaWindow::Unbounded,
        }
    }

    /// Restrict to items whose url carries `category`.
    pub fn with_category(mut self, category: Option<&'a str>) -> Self {
        self.category = category;
        self
    }

    /// Ignore votes carried by `tweets`.
    pub fn excluding(mut self, tweets: &'a HashSet<TweetId>) -> Self {
        self.exclude_tweets = Some(tweets);
        self
    }

    /// Drop votes at or past `delta`.
    pub fn with_max_delta(mut self, delta: DeltaWindow) -> Self {
        self.max_delta = delta;
        self
    }

    fn admits(&self, vote: &VoteRecord, seeds: &SeedTable) -> bool {
        let Some(seed) = seeds.get(&vote.item_id) else {
            return false;
        };
        if !self.bounds.contains(self.window, seed.timestamp) {
            return false;
        }
        if let Some(wanted) = self.category
            && extract_category(&vote.item_id) != Some(wanted)
        {
            return false;
        }
        if self
            .exclude_tweets
            .is_some_and(|excluded| excluded.contains(&vote.tweet_id))
        {
            return false;
        }
        self.max_delta.admits(vote.delta_seconds)
    }
}

/// Count votes per item over the query window and rank them.
///
/// Empty vote or seed inputs are a `MissingInput` error rather than an empty
/// ranking.
pub fn build_ground_truth(
    votes: &[VoteRecord],
    seeds: &SeedTable,
    query: &GroundTruthQuery<'_>,
) -> Result<ItemRanking, EvalError> {
    if votes.is_empty() {
        return Err(EvalError::missing("vote log", "no vote records"));
    }
    if seeds.is_empty() {
        return Err(EvalError::missing("seed table", "no seed records"));
    }
    let mut counts: IndexMap<&str, u64> = IndexMap::new();
    for vote in votes.iter().filter(|vote| query.admits(vote, seeds)) {
        *counts.entry(vote.item_id.as_str()).or_insert(0) += 1;
    }
    let ranking = ItemRanking::from_counts(counts);
    info!(
        items = ranking.len(),
        votes = ranking.total_votes(),
        window = ?query.window,
        category = ?query.category,
        "built ground truth"
    );
    Ok(ranking)
}

/// Top `floor(len * fraction)` items of `ranking`.
pub fn find_target_news(ranking: &ItemRanking, fraction: f64) -> HashSet<ItemId> {
    let count = target_size(ranking.len(), fraction);
    let target: HashSet<ItemId> = ranking.item_ids().take(count).cloned().collect();
    debug!(target = target.len(), fraction, "selected target news");
    target
}

/// Number of items in a target set drawn from `len` ranked items.
pub fn target_size(len: usize, fraction: f64) -> usize {
    ((len as f64) * fraction).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeedRecord;
    use chrono::NaiveDate;

    fn seeds(items: &[(&str, u32)]) -> SeedTable {
        items
            .iter()
            .map(|(item, month)| {
                (
                    item.to_string(),
                    SeedRecord {
                        tweet_id: format!("seed-{item}"),
                        author_id: "seeder".into(),
                        timestamp: NaiveDate::from_ymd_opt(2011, *month, 5)
                            .unwrap()
                            .and_hms_opt(8, 30, 0)
                            .unwrap(),
                        item_id: item.to_string(),
                    },
                )
            })
            .collect()
    }

    fn votes(item: &str, n: usize) -> Vec<VoteRecord> {
        (0..n)
            .map(|idx| VoteRecord {
                tweet_id: format!("{item}-{idx}"),
                author_id: format!("user{idx}"),
                delta_seconds: (idx as i64) * 600,
                item_id: item.to_string(),
                category: None,
                source: None,
            })
            .collect()
    }

    #[test]
    fn ranks_testing_window_items_and_picks_target() {
        let seed_table = seeds(&[("A", 11), ("B", 12), ("C", 11), ("old", 9)]);
        let mut log = votes("C", 1);
        log.extend(votes("A", 5));
        log.extend(votes("old", 9));
        log.extend(votes("B", 3));
        let bounds = WindowBounds::default();
        let query = GroundTruthQuery::new(DatasetWindow::Testing, &bounds);
        let ranking = build_ground_truth(&log, &seed_table, &query).unwrap();
        let pairs: Vec<(&str, u64)> = ranking
            .items()
            .iter()
            .map(|item| (item.item_id.as_str(), item.count))
            .collect();
        assert_eq!(pairs, vec![("A", 5), ("B", 3), ("C", 1)]);
        let target = find_target_news(&ranking, 0.34);
        assert_eq!(target, ["A".to_string()].into_iter().collect());
    }

    #[test]
    fn filters_category_retweets_and_delta() {
        let world = "http://www.nytimes.com/2011/11/02/world/europe/a.html";
        let sports = "http://www.nytimes.com/2011/11/02/sports/b.html";
        let seed_table = seeds(&[(world, 11), (sports, 11)]);
        let mut log = votes(world, 4);
        log.extend(votes(sports, 6));
        let retweets: HashSet<TweetId> = [format!("{world}-0")].into_iter().collect();
        let bounds = WindowBounds::default();
        let query = GroundTruthQuery::new(DatasetWindow::All, &bounds)
            .with_category(Some("world"))
            .excluding(&retweets)
            .with_max_delta(DeltaWindow::Hours(1));
        let ranking = build_ground_truth(&log, &seed_table, &query).unwrap();
        assert_eq!(ranking.len(), 1);
        // votes 1..=3 are at 600s steps, all under an hour
        assert_eq!(ranking.items()[0].count, 3);
    }

    #[test]
    fn empty_inputs_are_missing() {
        let bounds = WindowBounds::default();
        let query = GroundTruthQuery::new(DatasetWindow::Testing, &bounds);
        assert!(matches!(
            build_ground_truth(&[], &seeds(&[("A", 11)]), &query),
            Err(EvalError::MissingInput { .. })
        ));
        assert!(matches!(
            build_ground_truth(&votes("A", 1), &SeedTable::new(), &query),
            Err(EvalError::MissingInput { .. })
        ));
    }

    #[test]
    fn target_size_floors() {
        assert_eq!(target_size(3, 0.34), 1);
        assert_eq!(target_size(49, 0.02), 0);
        assert_eq!(target_size(50, 0.02), 1);
    }
}
