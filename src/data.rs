use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::DeltaWindow;
use crate::errors::EvalError;
pub use crate::types::{AuthorId, CategoryTag, ItemId, Rank, TweetId};

/// One observed mention of an item by an author.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Tweet carrying the vote.
    pub tweet_id: TweetId,
    /// Voting user.
    pub author_id: AuthorId,
    /// Seconds elapsed since the item's seed vote.
    pub delta_seconds: i64,
    /// Voted item.
    pub item_id: ItemId,
    /// Category tag recorded with the vote; `None` when the column was empty.
    pub category: Option<CategoryTag>,
    /// Client/source tag recorded with the vote; `None` when the column was empty.
    pub source: Option<String>,
}

/// First observed vote for an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRecord {
    /// Tweet that first mentioned the item.
    pub tweet_id: TweetId,
    /// Author of that tweet.
    pub author_id: AuthorId,
    /// First-observed time.
    pub timestamp: NaiveDateTime,
    /// Seeded item.
    pub item_id: ItemId,
}

/// Seed lookup keyed by item id.
pub type SeedTable = HashMap<ItemId, SeedRecord>;

/// Follower count per author, from a crawled user-info table.
pub type FollowerCounts = HashMap<AuthorId, u64>;

/// Per-author votes inside vs. outside the target set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitsMisses {
    /// Votes on target items.
    pub hits: u64,
    /// Votes on other items.
    pub misses: u64,
}

/// Hits/misses row keyed by author.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitsMissesRecord {
    /// Scored user.
    pub author_id: AuthorId,
    /// Votes on target items.
    pub hits: u64,
    /// Votes on other items.
    pub misses: u64,
}

impl HitsMissesRecord {
    /// Counts without the author id.
    pub fn counts(&self) -> HitsMisses {
        HitsMisses {
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// One row of an activity ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Ranked user.
    pub author_id: AuthorId,
    /// Votes in the training window.
    pub vote_count: u64,
}

/// One row of an item ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem {
    /// Ranked item.
    pub item_id: ItemId,
    /// Votes counted for the item.
    pub count: u64,
}

impl RankedItem {
    /// Item `item_id` with `count` votes.
    pub fn new(item_id: impl Into<ItemId>, count: u64) -> Self {
        Self {
            item_id: item_id.into(),
            count,
        }
    }
}

/// The (delta, category) combination a per-user table was derived for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableKey {
    /// Vote age window.
    pub delta: DeltaWindow,
    /// Category filter, `None` for all news.
    pub category: Option<CategoryTag>,
}

impl TableKey {
    /// Key for (`delta`, `category`).
    pub fn new(delta: DeltaWindow, category: Option<&str>) -> Self {
        Self {
            delta,
            category: category.map(str::to_string),
        }
    }

    /// Fail when a table built for `self` is used for an `expected` run.
    pub fn ensure_matches(&self, expected: &TableKey, table: &str) -> Result<(), EvalError> {
        if self == expected {
            return Ok(());
        }
        Err(EvalError::Configuration(format!(
            "{table} was generated for delta {:?} / category {:?} but the run requested delta {:?} / category {:?}",
            self.delta, self.category, expected.delta, expected.category
        )))
    }
}
