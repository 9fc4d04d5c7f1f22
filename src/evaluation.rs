//! Precision/recall sweeps of candidate rankings against a target set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ground_truth::find_target_news;
use crate::ranking::ItemRanking;
use crate::types::{ItemId, Rank};

/// Precision and recall (percent) after each number of guesses, starting at one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    /// Precision after each rank, in percent.
    pub precisions: Vec<f64>,
    /// Recall after each rank, in percent.
    pub recalls: Vec<f64>,
}

impl PrecisionRecallCurve {
    /// Number of guess counts scored.
    pub fn len(&self) -> usize {
        self.precisions.len()
    }

    /// True when no rank was evaluated.
    pub fn is_empty(&self) -> bool {
        self.precisions.is_empty()
    }

    /// Precision after `rank` guesses, if the curve reaches that far.
    pub fn precision_at(&self, rank: Rank) -> Option<f64> {
        rank.checked_sub(1)
            .and_then(|idx| self.precisions.get(idx))
            .copied()
    }

    /// Precision at the last scored guess count.
    pub fn final_precision(&self) -> Option<f64> {
        self.precisions.last().copied()
    }

    /// Recall at the last scored guess count.
    pub fn final_recall(&self) -> Option<f64> {
        self.recalls.last().copied()
    }
}

/// Score the first 1..=min(|candidates|, |target|) candidates against `target`.
pub fn precision_recall<'a>(
    target: &HashSet<ItemId>,
    candidates: impl IntoIterator<Item = &'a ItemId>,
) -> PrecisionRecallCurve {
    let mut curve = PrecisionRecallCurve::default();
    if target.is_empty() {
        return curve;
    }
    let target_size = target.len() as f64;
    let mut hits = 0usize;
    for (idx, item_id) in candidates.into_iter().take(target.len()).enumerate() {
        if target.contains(item_id) {
            hits += 1;
        }
        let guesses = (idx + 1) as f64;
        curve.precisions.push(100.0 * hits as f64 / guesses);
        curve.recalls.push(100.0 * hits as f64 / target_size);
    }
    curve
}

/// Curve of `candidate` against the top `fraction` of `ground_truth`.
pub fn evaluate(
    ground_truth: &ItemRanking,
    candidate: &ItemRanking,
    fraction: f64,
) -> PrecisionRecallCurve {
    let target = find_target_news(ground_truth, fraction);
    precision_recall(&target, candidate.item_ids())
}
