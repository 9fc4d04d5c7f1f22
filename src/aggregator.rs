//! Per-cohort item rankings from one pass over the vote log.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::cohorts::Cohort;
use crate::config::DeltaWindow;
use crate::constants::cohorts::POPULATION;
use crate::constants::scan::SCAN_CHECK_INTERVAL;
use crate::data::{SeedTable, VoteRecord};
use crate::errors::EvalError;
use crate::ranking::ItemRanking;
use crate::scan::ScanControl;
use crate::splits::{DatasetWindow, WindowBounds};
use crate::types::CohortName;
use crate::utils::vote_category;

/// Vote filter for an aggregation pass.
#[derive(Clone, Debug)]
pub struct AggregationQuery<'a> {
    /// Window whose seeds are counted.
    pub window: DatasetWindow,
    /// Window date ranges.
    pub bounds: &'a WindowBounds,
    /// Vote age window.
    pub delta: DeltaWindow,
    /// Category filter on the vote's tag.
    pub category: Option<&'a str>,
    /// Votes whose source tag is listed here are ignored.
    pub exclude_sources: HashSet<&'a str>,
    /// Number of vote-log shards scanned in parallel; 0 or 1 scans sequentially.
    pub shards: usize,
}

impl<'a> AggregationQuery<'a> {
    /// Every vote in `window` younger than `delta`.
    pub fn new(window: DatasetWindow, bounds: &'a WindowBounds, delta: DeltaWindow) -> Self {
        Self {
            window,
            bounds,
            delta,
            category: None,
            exclude_sources: HashSet::new(),
            shards: 0,
        }
    }

    /// Restrict to one category.
    pub fn with_category(mut self, category: Option<&'a str>) -> Self {
        self.category = category;
        self
    }

    /// Ignore votes carrying any of `sources`.
    pub fn excluding_sources(mut self, sources: impl IntoIterator<Item = &'a str>) -> Self {
        self.exclude_sources.extend(sources);
        self
    }

    /// Split the pass across `shards` workers.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub(crate) fn admits(&self, vote: &VoteRecord, seeds: &SeedTable) -> bool {
        let Some(seed) = seeds.get(&vote.item_id) else {
            return false;
        };
        if !self.bounds.contains(self.window, seed.timestamp) {
            return false;
        }
        if !self.delta.admits(vote.delta_seconds) {
            return false;
        }
        if let Some(wanted) = self.category
            && vote_category(vote) != Some(wanted)
        {
            return false;
        }
        vote.source
            .as_deref()
            .is_none_or(|source| !self.exclude_sources.contains(source))
    }
}

/// Item rankings keyed by cohort name; the population ranking comes first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortRankings {
    rankings: IndexMap<CohortName, ItemRanking>,
}

impl CohortRankings {
    /// Ranking for `cohort`.
    pub fn get(&self, cohort: &str) -> Option<&ItemRanking> {
        self.rankings.get(cohort)
    }

    /// The all-users ranking.
    pub fn population(&self) -> Option<&ItemRanking> {
        self.get(POPULATION)
    }

    /// Rankings in cohort order.
    pub fn iter(&self) -> impl Iterator<Item = (&CohortName, &ItemRanking)> {
        self.rankings.iter()
    }

    /// Number of rankings, population included.
    pub fn len(&self) -> usize {
        self.rankings.len()
    }

    /// True when no ranking was produced.
    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty()
    }
}

type Counters<'v> = Vec<IndexMap<&'v str, u64>>;

/// Count admitted votes into the population slot and every cohort holding the author.
fn count_shard<'v>(
    votes: &'v [VoteRecord],
    seeds: &SeedTable,
    cohorts: &[Cohort],
    query: &AggregationQuery<'_>,
    control: &ScanControl,
) -> Result<Counters<'v>, EvalError> {
    let mut counters: Counters<'v> = vec![IndexMap::new(); cohorts.len() + 1];
    for (idx, vote) in votes.iter().enumerate() {
        if idx % SCAN_CHECK_INTERVAL == 0 {
            control.check()?;
        }
        if !query.admits(vote, seeds) {
            continue;
        }
        let item = vote.item_id.as_str();
        *counters[0].entry(item).or_insert(0) += 1;
        for (slot, cohort) in cohorts.iter().enumerate() {
            if cohort.contains(&vote.author_id) {
                *counters[slot + 1].entry(item).or_insert(0) += 1;
            }
        }
    }
    Ok(counters)
}

fn merge_into<'v>(merged: &mut Counters<'v>, partial: Counters<'v>) {
    for (target, counts) in merged.iter_mut().zip(partial) {
        for (item, count) in counts {
            *target.entry(item).or_insert(0) += count;
        }
    }
}

/// Rank items for the population and each of `cohorts` in one pass.
///
/// An author counts toward every cohort that contains them. With more than one
/// shard the log is split into contiguous chunks counted in parallel and
/// merged in chunk order, which reproduces the sequential tie order.
pub fn aggregate(
    votes: &[VoteRecord],
    seeds: &SeedTable,
    cohorts: &[Cohort],
    query: &AggregationQuery<'_>,
    control: &ScanControl,
) -> Result<CohortRankings, EvalError> {
    let counters = if query.shards <= 1 || votes.len() < query.shards {
        count_shard(votes, seeds, cohorts, query, control)?
    } else {
        let chunk = votes.len().div_ceil(query.shards);
        let partials = votes
            .par_chunks(chunk)
            .map(|shard| {
                control.check()?;
                count_shard(shard, seeds, cohorts, query, control)
            })
            .collect::<Result<Vec<_>, EvalError>>()?;
        debug!(shards = partials.len(), chunk, "merging aggregation shards");
        let mut merged: Counters<'_> = vec![IndexMap::new(); cohorts.len() + 1];
        for partial in partials {
            merge_into(&mut merged, partial);
        }
        merged
    };

    let names =
        std::iter::once(POPULATION).chain(cohorts.iter().map(|cohort| cohort.name.as_str()));
    let mut rankings = IndexMap::new();
    for (name, counts) in names.zip(counters) {
        let ranking = ItemRanking::from_counts(counts);
        debug!(
            cohort = name,
            items = ranking.len(),
            votes = ranking.total_votes(),
            "aggregated cohort ranking"
        );
        rankings.insert(name.to_string(), ranking);
    }
    info!(
        cohorts = rankings.len(),
        delta = ?query.delta,
        category = ?query.category,
        "aggregated cohort rankings"
    );
    Ok(CohortRankings { rankings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeedRecord;
    use chrono::NaiveDate;

    fn seed_table(items: &[&str]) -> SeedTable {
        items
            .iter()
            .map(|item| {
                (
                    item.to_string(),
                    SeedRecord {
                        tweet_id: format!("seed-{item}"),
                        author_id: "seeder".into(),
                        timestamp: NaiveDate::from_ymd_opt(2011, 11, 20)
                            .unwrap()
                            .and_hms_opt(0, 0, 0)
                            .unwrap(),
                        item_id: item.to_string(),
                    },
                )
            })
            .collect()
    }

    fn vote(author: &str, item: &str, delta: i64, source: Option<&str>) -> VoteRecord {
        VoteRecord {
            tweet_id: format!("{author}/{item}/{delta}"),
            author_id: author.into(),
            delta_seconds: delta,
            item_id: item.into(),
            category: None,
            source: source.map(String::from),
        }
    }

    #[test]
    fn counts_overlapping_cohorts_and_population() {
        let seeds = seed_table(&["a", "b", "c"]);
        let votes = vec![
            vote("u1", "a", 10, None),
            vote("u2", "a", 20, None),
            vote("u2", "b", 30, None),
            vote("u3", "c", 99_999, None),
            vote("u3", "b", 40, Some("twitterfeed")),
            vote("u3", "c", 50, Some("web")),
        ];
        let cohorts = vec![
            Cohort::new("first", ["u1", "u2"].map(String::from)),
            Cohort::new("second", ["u2", "u3"].map(String::from)),
        ];
        let bounds = WindowBounds::default();
        let query = AggregationQuery::new(DatasetWindow::Testing, &bounds, DeltaWindow::Hours(4))
            .excluding_sources(["twitterfeed"]);
        let rankings = aggregate(&votes, &seeds, &cohorts, &query, &ScanControl::new()).unwrap();
        let names: Vec<&str> = rankings.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["population", "first", "second"]);

        let population = rankings.population().unwrap();
        assert_eq!(population.total_votes(), 4);
        let second = rankings.get("second").unwrap();
        let ids: Vec<&str> = second.item_ids().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(rankings.get("first").unwrap().total_votes(), 3);
    }

    #[test]
    fn sharded_pass_matches_sequential_pass() {
        let items = ["a", "b", "c", "d", "e", "f", "g"];
        let seeds = seed_table(&items);
        let votes: Vec<VoteRecord> = (0..500)
            .map(|idx| {
                vote(
                    &format!("u{}", idx % 13),
                    items[(idx * 7 + idx / 5) % items.len()],
                    (idx as i64) * 17,
                    None,
                )
            })
            .collect();
        let cohorts = vec![
            Cohort::new("odd", (0..13).filter(|n| n % 2 == 1).map(|n| format!("u{n}"))),
            Cohort::new("low", (0..5).map(|n| format!("u{n}"))),
        ];
        let bounds = WindowBounds::default();
        let query = AggregationQuery::new(DatasetWindow::Testing, &bounds, DeltaWindow::Hours(2));
        let sequential = aggregate(&votes, &seeds, &cohorts, &query, &ScanControl::new()).unwrap();
        for shards in [2, 3, 8] {
            let parallel = aggregate(
                &votes,
                &seeds,
                &cohorts,
                &query.clone().with_shards(shards),
                &ScanControl::new(),
            )
            .unwrap();
            assert_eq!(parallel, sequential);
        }
    }

    #[test]
    fn cancellation_aborts_the_pass() {
        let seeds = seed_table(&["a"]);
        let votes = vec![vote("u1", "a", 0, None)];
        let bounds = WindowBounds::default();
        let query = AggregationQuery::new(DatasetWindow::Testing, &bounds, DeltaWindow::Unbounded);
        let control = ScanControl::new();
        control.cancel();
        assert!(matches!(
            aggregate(&votes, &seeds, &[], &query, &control),
            Err(EvalError::Cancelled { .. })
        ));
    }
}
