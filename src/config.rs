use serde::{Deserialize, Serialize};

use crate::constants::evaluation::{
    CATEGORY_TARGET_FRACTION, DEFAULT_MIX_POLICY, DEFAULT_SEED, DEFAULT_TARGET_FRACTION,
};
use crate::constants::experts::{
    DEFAULT_BETA, DEFAULT_CI_SCORE, DEFAULT_EXPERT_FRACTION, DEFAULT_Z_SCORE,
};
use crate::constants::tiers::{
    ACTIVE_UPPER_FRACTION, DEFAULT_GROUP_SIZE_FRACTION, DEFAULT_NON_EXPERT_SAMPLE_FRACTION,
    DEFAULT_NUM_GROUPS, NEWSAHOLIC_FRACTION,
};
use crate::constants::weights::{DEFAULT_CI_HIGH_WEIGHT, DEFAULT_NON_EXPERT_WEIGHT};
use crate::errors::EvalError;
use crate::splits::{DatasetWindow, WindowBounds};
use crate::types::CategoryTag;

/// Which point of a Wilson interval ranks users under the confidence-interval rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CiScore {
    /// Rank by the interval's lower bound.
    LowerBound,
    /// Rank by `(low + high) / 2`.
    Midpoint,
}

/// How the mixed model picks the winning cohort for each item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixPolicy {
    /// Lowest `100 - precision` at the item's rank across cohorts.
    MinError,
    /// Lowest rank across cohorts.
    MinRank,
}

/// Maximum vote age, measured from the item's seed time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaWindow {
    /// Accept votes of any age.
    #[default]
    Unbounded,
    /// Accept votes strictly younger than this many hours.
    Hours(u32),
}

impl DeltaWindow {
    /// Window length in seconds, if bounded.
    pub fn seconds(self) -> Option<i64> {
        match self {
            DeltaWindow::Unbounded => None,
            DeltaWindow::Hours(hours) => Some(i64::from(hours) * 3600),
        }
    }

    /// True when a vote `delta_seconds` after the seed is inside the window.
    pub fn admits(self, delta_seconds: i64) -> bool {
        self.seconds().is_none_or(|limit| delta_seconds < limit)
    }

    /// Hours, if bounded.
    pub fn hours(self) -> Option<u32> {
        match self {
            DeltaWindow::Unbounded => None,
            DeltaWindow::Hours(hours) => Some(hours),
        }
    }
}

/// Expert selection parameters shared by the three scoring rules.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpertConfig {
    /// Share of the population selected by each rule.
    pub fraction: f64,
    /// F-beta weight; values above 1 favour recall.
    pub beta: f64,
    /// Critical value for the Wilson interval.
    pub z_score: f64,
    /// Interval point used as the ranking score.
    pub ci_score: CiScore,
}

impl Default for ExpertConfig {
    fn default() -> Self {
        Self {
            fraction: DEFAULT_EXPERT_FRACTION,
            beta: DEFAULT_BETA,
            z_score: DEFAULT_Z_SCORE,
            ci_score: DEFAULT_CI_SCORE,
        }
    }
}

/// Activity tier cut points, as shares of the activity ranking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Share of the ranking labelled newsaholics.
    pub newsaholic_fraction: f64,
    /// Share of the ranking (exclusive) that ends the active tier.
    pub active_upper_fraction: f64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            newsaholic_fraction: NEWSAHOLIC_FRACTION,
            active_upper_fraction: ACTIVE_UPPER_FRACTION,
        }
    }
}

/// Even-bucket partition parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Number of even and round-robin buckets.
    pub num_groups: usize,
    /// Size of each even bucket as a share of the population.
    pub group_size_fraction: f64,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            num_groups: DEFAULT_NUM_GROUPS,
            group_size_fraction: DEFAULT_GROUP_SIZE_FRACTION,
        }
    }
}

/// Vote weights for the blended models.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Weight of a non-expert vote; CI experts get `1 - non_expert_weight`.
    pub non_expert_weight: f64,
    /// Share of the expert weight given to the upper half of the CI experts.
    pub ci_high_weight: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            non_expert_weight: DEFAULT_NON_EXPERT_WEIGHT,
            ci_high_weight: DEFAULT_CI_HIGH_WEIGHT,
        }
    }
}

/// Top-level evaluation configuration for one (delta, category) run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Vote age window applied to cohort rankings and training tables.
    pub delta: DeltaWindow,
    /// Restrict the run to one category; `None` evaluates all news.
    pub category: Option<CategoryTag>,
    /// Share of ground-truth items forming the target set.
    pub target_fraction: f64,
    /// Only count ground-truth votes younger than `delta`.
    pub ground_truth_within_delta: bool,
    /// Expert rule parameters.
    pub expert: ExpertConfig,
    /// Activity tier cut points.
    pub tiers: TierConfig,
    /// Bucket partition parameters.
    pub buckets: BucketConfig,
    /// Blend weights for the weighted models.
    pub weights: WeightConfig,
    /// Share of non-experts kept in the sampled cohort.
    pub non_expert_sample_fraction: f64,
    /// RNG seed for sampled cohorts.
    pub seed: u64,
    /// Training and testing date ranges.
    pub windows: WindowBounds,
    /// Window whose items are ranked and scored. Must differ from
    /// `training_window`.
    pub evaluation_window: DatasetWindow,
    /// Window used to derive activity and hits/misses tables.
    pub training_window: DatasetWindow,
    /// Vote source tags ignored by the cohort aggregator.
    pub exclude_sources: Vec<String>,
    /// Cohort fusion rule for the mixed ranking.
    pub mix_policy: MixPolicy,
    /// Number of aggregation shards; 0 or 1 scans sequentially.
    pub parallel_shards: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            delta: DeltaWindow::Hours(4),
            category: None,
            target_fraction: DEFAULT_TARGET_FRACTION,
            ground_truth_within_delta: false,
            expert: ExpertConfig::default(),
            tiers: TierConfig::default(),
            buckets: BucketConfig::default(),
            weights: WeightConfig::default(),
            non_expert_sample_fraction: DEFAULT_NON_EXPERT_SAMPLE_FRACTION,
            seed: DEFAULT_SEED,
            windows: WindowBounds::default(),
            evaluation_window: DatasetWindow::Testing,
            training_window: DatasetWindow::Training,
            exclude_sources: Vec::new(),
            mix_policy: DEFAULT_MIX_POLICY,
            parallel_shards: 0,
        }
    }
}

impl EvalConfig {
    /// Defaults for a single-category run, which uses a wider target set.
    pub fn for_category(category: impl Into<CategoryTag>) -> Self {
        Self {
            category: Some(category.into()),
            target_fraction: CATEGORY_TARGET_FRACTION,
            ..Self::default()
        }
    }

    /// Swap the training and evaluation windows.
    pub fn switched(mut self) -> Self {
        std::mem::swap(&mut self.evaluation_window, &mut self.training_window);
        self
    }

    /// Reject inconsistent parameters before any input is scanned.
    pub fn validate(&self) -> Result<(), EvalError> {
        check_fraction("target_fraction", self.target_fraction)?;
        check_fraction("expert.fraction", self.expert.fraction)?;
        check_fraction("tiers.newsaholic_fraction", self.tiers.newsaholic_fraction)?;
        check_fraction(
            "tiers.active_upper_fraction",
            self.tiers.active_upper_fraction,
        )?;
        check_fraction("buckets.group_size_fraction", self.buckets.group_size_fraction)?;
        check_fraction(
            "non_expert_sample_fraction",
            self.non_expert_sample_fraction,
        )?;
        check_fraction("weights.non_expert_weight", self.weights.non_expert_weight)?;
        check_fraction("weights.ci_high_weight", self.weights.ci_high_weight)?;
        if self.tiers.newsaholic_fraction > self.tiers.active_upper_fraction {
            return Err(EvalError::Configuration(
                "newsaholic fraction must not exceed the active upper fraction".to_string(),
            ));
        }
        if self.expert.beta.is_nan() || self.expert.beta <= 0.0 {
            return Err(EvalError::Configuration(format!(
                "beta must be positive (got {})",
                self.expert.beta
            )));
        }
        if self.expert.z_score.is_nan() || self.expert.z_score <= 0.0 {
            return Err(EvalError::Configuration(format!(
                "z_score must be positive (got {})",
                self.expert.z_score
            )));
        }
        if self.buckets.num_groups == 0 {
            return Err(EvalError::Configuration(
                "num_groups must be at least 1".to_string(),
            ));
        }
        if self.evaluation_window == DatasetWindow::All
            || self.evaluation_window == self.training_window
        {
            return Err(EvalError::Configuration(format!(
                "evaluation window {:?} must be Training or Testing and differ from the training window {:?}",
                self.evaluation_window, self.training_window
            )));
        }
        if matches!(self.delta, DeltaWindow::Hours(0)) {
            return Err(EvalError::Configuration(
                "delta window of 0 hours admits no votes".to_string(),
            ));
        }
        self.windows.validated()?;
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<(), EvalError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(EvalError::Configuration(format!(
            "{name} must be in (0, 1] (got {value})"
        )))
    }
}
