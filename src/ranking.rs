//! Count-ordered item rankings.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::RankedItem;
use crate::types::{ItemId, Rank};

/// Items ordered by vote count, highest first.
///
/// Equal counts keep the order in which the items were first counted, so a
/// ranking built twice from the same vote sequence is identical.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRanking {
    items: Vec<RankedItem>,
}

impl ItemRanking {
    /// Sort encounter-ordered counts descending.
    pub fn from_counts<K>(counts: IndexMap<K, u64>) -> Self
    where
        K: Into<ItemId>,
    {
        let mut items: Vec<RankedItem> = counts
            .into_iter()
            .map(|(item_id, count)| RankedItem::new(item_id, count))
            .collect();
        // stable: ties stay in encounter order
        items.sort_by(|a, b| b.count.cmp(&a.count));
        Self { items }
    }

    /// Items in rank order.
    pub fn items(&self) -> &[RankedItem] {
        &self.items
    }

    /// Number of ranked items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing was ranked.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item ids in rank order.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|item| &item.item_id)
    }

    /// Sum of all counts.
    pub fn total_votes(&self) -> u64 {
        self.items.iter().map(|item| item.count).sum()
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
