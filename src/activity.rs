//! Per-user training tables: activity rankings and hits/misses counts.
//!
//! Both tables are derived from the vote log restricted to the training
//! window, a vote-age window and an optional category, or loaded from the
//! per-(delta, category) TSV files produced by an earlier run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::DeltaWindow;
use crate::data::{
    ActivityEntry, HitsMisses, HitsMissesRecord, SeedTable, TableKey, VoteRecord,
};
use crate::errors::EvalError;
use crate::splits::{DatasetWindow, WindowBounds};
use crate::types::{AuthorId, ItemId};
use crate::utils::vote_category;

/// Vote filter used when deriving training tables.
#[derive(Clone, Copy, Debug)]
pub struct TrainingQuery<'a> {
    /// Window whose seeds are counted.
    pub window: DatasetWindow,
    /// Window date ranges.
    pub bounds: &'a WindowBounds,
    /// Vote age window.
    pub delta: DeltaWindow,
    /// Category filter on the vote's tag.
    pub category: Option<&'a str>,
}

impl TrainingQuery<'_> {
    /// Key identifying tables produced by this query.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(self.delta, self.category)
    }

    fn admits(&self, vote: &VoteRecord, seeds: &SeedTable) -> bool {
        let Some(seed) = seeds.get(&vote.item_id) else {
            return false;
        };
        self.bounds.contains(self.window, seed.timestamp)
            && self.delta.admits(vote.delta_seconds)
            && self
                .category
                .is_none_or(|wanted| vote_category(vote) == Some(wanted))
    }
}

/// Authors ordered by vote volume, most active first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRanking {
    /// Run the ranking was derived for.
    pub key: TableKey,
    entries: Vec<ActivityEntry>,
}

impl ActivityRanking {
    /// Wrap pre-sorted entries, rejecting ascending runs.
    pub fn new(key: TableKey, entries: Vec<ActivityEntry>) -> Result<Self, EvalError> {
        if let Some(pos) = entries
            .windows(2)
            .position(|pair| pair[0].vote_count < pair[1].vote_count)
        {
            return Err(EvalError::Configuration(format!(
                "activity ranking is not sorted by descending vote count (row {})",
                pos + 2
            )));
        }
        Ok(Self { key, entries })
    }

    /// Entries in rank order.
    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    /// Number of ranked users.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no user voted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Author ids in rank order.
    pub fn author_ids(&self) -> impl Iterator<Item = &AuthorId> {
        self.entries.iter().map(|entry| &entry.author_id)
    }
}

/// Hits/misses per author for one (delta, category).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitsMissesTable {
    /// Run the table was derived for.
    pub key: TableKey,
    records: IndexMap<AuthorId, HitsMisses>,
}

impl HitsMissesTable {
    /// Empty table for `key`.
    pub fn new(key: TableKey) -> Self {
        Self {
            key,
            records: IndexMap::new(),
        }
    }

    /// Table holding `records`; repeated authors accumulate.
    pub fn from_records(
        key: TableKey,
        records: impl IntoIterator<Item = HitsMissesRecord>,
    ) -> Self {
        let mut table = Self::new(key);
        for record in records {
            let counts = record.counts();
            table.add(record.author_id, counts);
        }
        table
    }

    /// Add counts for `author_id`, accumulating repeated rows.
    pub fn add(&mut self, author_id: AuthorId, counts: HitsMisses) {
        let entry = self.records.entry(author_id).or_default();
        entry.hits += counts.hits;
        entry.misses += counts.misses;
    }

    /// Counts for `author_id`, if present.
    pub fn get(&self, author_id: &str) -> Option<HitsMisses> {
        self.records.get(author_id).copied()
    }

    /// Number of authors.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has no authors.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&AuthorId, &HitsMisses)> {
        self.records.iter()
    }
}

/// Count votes per author and sort descending; ties keep first-encounter order.
pub fn build_activity_ranking(
    votes: &[VoteRecord],
    seeds: &SeedTable,
    query: &TrainingQuery<'_>,
) -> ActivityRanking {
    let mut counts: IndexMap<&str, u64> = IndexMap::new();
    for vote in votes.iter().filter(|vote| query.admits(vote, seeds)) {
        *counts.entry(vote.author_id.as_str()).or_insert(0) += 1;
    }
    let mut entries: Vec<ActivityEntry> = counts
        .into_iter()
        .map(|(author_id, vote_count)| ActivityEntry {
            author_id: author_id.to_string(),
            vote_count,
        })
        .collect();
    entries.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    debug!(
        users = entries.len(),
        delta = ?query.delta,
        category = ?query.category,
        "built activity ranking"
    );
    ActivityRanking {
        key: query.table_key(),
        entries,
    }
}

/// Split each author's admitted votes into hits (target items) and misses.
pub fn build_hits_misses(
    votes: &[VoteRecord],
    seeds: &SeedTable,
    target: &HashSet<ItemId>,
    query: &TrainingQuery<'_>,
) -> HitsMissesTable {
    let mut table = HitsMissesTable::new(query.table_key());
    for vote in votes.iter().filter(|vote| query.admits(vote, seeds)) {
        let counts = if target.contains(&vote.item_id) {
            HitsMisses { hits: 1, misses: 0 }
        } else {
            HitsMisses { hits: 0, misses: 1 }
        };
        table.add(vote.author_id.clone(), counts);
    }
    debug!(
        users = table.len(),
        target = target.len(),
        "built hits/misses table"
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeedRecord;
    use chrono::NaiveDate;

    fn seed(item: &str, month: u32) -> (ItemId, SeedRecord) {
        (
            item.to_string(),
            SeedRecord {
                tweet_id: format!("seed-{item}"),
                author_id: "seeder".to_string(),
                timestamp: NaiveDate::from_ymd_opt(2011, month, 10)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
                item_id: item.to_string(),
            },
        )
    }

    fn vote(author: &str, item: &str, delta: i64) -> VoteRecord {
        VoteRecord {
            tweet_id: format!("{author}-{item}-{delta}"),
            author_id: author.to_string(),
            delta_seconds: delta,
            item_id: item.to_string(),
            category: None,
            source: None,
        }
    }

    #[test]
    fn activity_ranking_counts_training_votes_inside_delta() {
        let seeds: SeedTable = [seed("a", 9), seed("b", 10), seed("late", 11)]
            .into_iter()
            .collect();
        let votes = vec![
            vote("u1", "a", 0),
            vote("u2", "a", 10),
            vote("u2", "b", 20),
            vote("u2", "late", 20),
            vote("u3", "b", 7200),
            vote("u1", "b", 30),
        ];
        let bounds = WindowBounds::default();
        let query = TrainingQuery {
            window: DatasetWindow::Training,
            bounds: &bounds,
            delta: DeltaWindow::Hours(1),
            category: None,
        };
        let ranking = build_activity_ranking(&votes, &seeds, &query);
        let ids: Vec<&str> = ranking.author_ids().map(String::as_str).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
        assert_eq!(ranking.entries()[0].vote_count, 2);
        assert_eq!(ranking.key, TableKey::new(DeltaWindow::Hours(1), None));
    }

    #[test]
    fn hits_misses_split_on_target_membership() {
        let seeds: SeedTable = [seed("a", 9), seed("b", 9)].into_iter().collect();
        let votes = vec![vote("u1", "a", 0), vote("u1", "b", 0), vote("u2", "b", 0)];
        let bounds = WindowBounds::default();
        let query = TrainingQuery {
            window: DatasetWindow::Training,
            bounds: &bounds,
            delta: DeltaWindow::Unbounded,
            category: None,
        };
        let target: HashSet<ItemId> = ["a".to_string()].into_iter().collect();
        let table = build_hits_misses(&votes, &seeds, &target, &query);
        assert_eq!(table.get("u1"), Some(HitsMisses { hits: 1, misses: 1 }));
        assert_eq!(table.get("u2"), Some(HitsMisses { hits: 0, misses: 1 }));
        assert_eq!(table.get("u3"), None);
    }

    #[test]
    fn unsorted_activity_rows_are_rejected() {
        let entries = vec![
            ActivityEntry {
                author_id: "a".into(),
                vote_count: 1,
            },
            ActivityEntry {
                author_id: "b".into(),
                vote_count: 3,
            },
        ];
        assert!(matches!(
            ActivityRanking::new(TableKey::default(), entries),
            Err(EvalError::Configuration(_))
        ));
    }
}
