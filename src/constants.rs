use crate::config::{CiScore, MixPolicy};

/// Column layout of the tab-separated input files.
pub mod columns {
    /// Minimum vote-log columns: tweet_id, author_id, delta_seconds, item_url.
    pub const VOTE_LOG_MIN_COLUMNS: usize = 4;
    /// Full vote-log width including category_tag and source_tag.
    pub const VOTE_LOG_MAX_COLUMNS: usize = 6;
    /// Seed table columns: tweet_id, author_id, timestamp, item_url.
    pub const SEED_TABLE_COLUMNS: usize = 4;
    /// Hits/misses table columns: author_id, hits, misses.
    pub const HITS_MISSES_COLUMNS: usize = 3;
    /// Activity table columns: author_id, vote_count.
    pub const ACTIVITY_COLUMNS: usize = 2;
    /// Minimum user-info columns: author_id, screen_name, name, followers_count.
    pub const USER_INFO_MIN_COLUMNS: usize = 4;
    /// Full user-info width as crawled.
    pub const USER_INFO_MAX_COLUMNS: usize = 13;
    /// Position of the follower count in a user-info row.
    pub const USER_INFO_FOLLOWERS_INDEX: usize = 3;
    /// Timestamp format used by the seed table.
    pub const SEED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    /// Field separator shared by every table.
    pub const FIELD_SEPARATOR: char = '\t';
}

/// Activity tier and bucket defaults.
pub mod tiers {
    /// Share of the most active users labelled newsaholics.
    pub const NEWSAHOLIC_FRACTION: f64 = 0.02;
    /// Upper activity bound (exclusive) for active users.
    pub const ACTIVE_UPPER_FRACTION: f64 = 0.25;
    /// Default number of even buckets.
    pub const DEFAULT_NUM_GROUPS: usize = 5;
    /// Default size of each even bucket as a share of the population.
    pub const DEFAULT_GROUP_SIZE_FRACTION: f64 = 0.02;
    /// Default share of non-experts kept by the sampled cohort.
    pub const DEFAULT_NON_EXPERT_SAMPLE_FRACTION: f64 = 0.33;
}

/// Expert selection defaults.
pub mod experts {
    use super::CiScore;

    /// Share of the population selected by each expert rule.
    pub const DEFAULT_EXPERT_FRACTION: f64 = 0.02;
    /// Default F-beta weight.
    pub const DEFAULT_BETA: f64 = 2.0;
    /// One-sided 95% critical value.
    pub const DEFAULT_Z_SCORE: f64 = 1.645;
    /// Pseudo-successes added to the Wilson estimate.
    pub const WILSON_PSEUDO_HITS: f64 = 2.0;
    /// Pseudo-trials added to the Wilson estimate.
    pub const WILSON_PSEUDO_TRIALS: f64 = 4.0;
    /// Score used to rank users under the confidence-interval rule.
    pub const DEFAULT_CI_SCORE: CiScore = CiScore::LowerBound;
}

/// Weighted vote model defaults.
pub mod weights {
    /// Weight of a non-expert vote in the blended models; experts get the rest.
    pub const DEFAULT_NON_EXPERT_WEIGHT: f64 = 0.15;
    /// Share of the expert weight given to the upper half of the CI experts.
    pub const DEFAULT_CI_HIGH_WEIGHT: f64 = 0.65;
    /// Vote weight for authors missing from the follower table.
    pub const UNKNOWN_FOLLOWER_WEIGHT: f64 = 1.0;
}

/// Evaluation defaults.
pub mod evaluation {
    use super::MixPolicy;

    /// Share of ground-truth items forming the target set for all-news runs.
    pub const DEFAULT_TARGET_FRACTION: f64 = 0.02;
    /// Share used for single-category runs.
    pub const CATEGORY_TARGET_FRACTION: f64 = 0.10;
    /// Error assigned when a cohort offers no evidence for an item.
    pub const MAX_ERROR: f64 = 100.0;
    /// Default cohort fusion rule.
    pub const DEFAULT_MIX_POLICY: MixPolicy = MixPolicy::MinError;
    /// Default RNG seed for sampled cohorts.
    pub const DEFAULT_SEED: u64 = 42;
}

/// Dataset window boundaries as (year, month, day), half-open.
pub mod windows {
    /// First day of the training window.
    pub const TRAINING_START: (i32, u32, u32) = (2011, 9, 1);
    /// First day after the training window.
    pub const TRAINING_END: (i32, u32, u32) = (2011, 11, 1);
    /// First day of the testing window.
    pub const TESTING_START: (i32, u32, u32) = (2011, 11, 1);
    /// First day after the testing window.
    pub const TESTING_END: (i32, u32, u32) = (2012, 1, 1);
}

/// Cohort names used in rankings and reports.
pub mod cohorts {
    /// Every voter; its ranking is the "market".
    pub const POPULATION: &str = "population";
    /// Top activity tier.
    pub const NEWSAHOLICS: &str = "newsaholics";
    /// Middle activity tier.
    pub const ACTIVE: &str = "active_users";
    /// Everyone below the active tier.
    pub const COMMON: &str = "common_users";
    /// Precision rule output.
    pub const EXPERTS_PRECISION: &str = "experts_precision";
    /// F-beta rule output.
    pub const EXPERTS_FSCORE: &str = "experts_fscore";
    /// Confidence-interval rule output.
    pub const EXPERTS_CI: &str = "experts_ci";
    /// Better-scoring half of the CI experts.
    pub const EXPERTS_CI_HIGH: &str = "experts_ci_high";
    /// Remaining CI experts.
    pub const EXPERTS_CI_LOW: &str = "experts_ci_low";
    /// Most-followed users.
    pub const EXPERTS_SOCIAL_BIAS: &str = "experts_social_bias";
    /// Union of the three rule outputs.
    pub const ALL_EXPERTS: &str = "all_experts";
    /// Intersection of the three rule outputs.
    pub const SUPER_EXPERTS: &str = "super_experts";
    /// Population minus every expert.
    pub const NON_EXPERTS: &str = "non_experts";
    /// Seeded sample of the non-experts.
    pub const NON_EXPERTS_SAMPLED: &str = "non_experts_sampled";
    /// Non-experts at weight `w` blended with CI experts at `1 - w`.
    pub const WEIGHTED: &str = "weighted";
    /// Like [`WEIGHTED`] with the expert share split across the CI halves.
    pub const WEIGHTED_BOTH: &str = "weighted_both";
    /// CI experts weighted by `ln(followers + 1)`.
    pub const WEIGHTED_FOLLOWERS: &str = "weighted_followers";
    /// Prefix for activity-ordered even buckets.
    pub const EVEN_BUCKET_PREFIX: &str = "even_bucket_";
    /// Prefix for round-robin common-user buckets.
    pub const COMMON_BUCKET_PREFIX: &str = "common_bucket_";
}

/// Table file naming.
pub mod files {
    /// Activity table filename prefix.
    pub const ACTIVITY_PREFIX: &str = "user_activity";
    /// Hits/misses table filename prefix.
    pub const HITS_MISSES_PREFIX: &str = "user_hits_and_misses";
    /// Placeholder for an absent delta or category in table filenames.
    pub const NONE_TOKEN: &str = "None";
    /// Table file extension.
    pub const TABLE_EXTENSION: &str = "tsv";
    /// Default report filename.
    pub const REPORT_FILENAME: &str = "report.json";
}

/// Scan control.
pub mod scan {
    /// Lines read between cancellation/deadline checks.
    pub const SCAN_CHECK_INTERVAL: usize = 4096;
    /// Log message used when malformed lines are skipped.
    pub const SKIP_MALFORMED_MSG: &str = "skipping malformed record";
}
