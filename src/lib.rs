#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Per-user training tables: activity rankings and hits/misses.
pub mod activity;
/// Single-pass per-cohort vote aggregation.
pub mod aggregator;
/// Cohort types and partitioners.
pub mod cohorts;
/// Evaluation configuration types.
pub mod config;
/// Centralized constants used across loaders, selectors, and the pipeline.
pub mod constants;
/// Vote, seed, and table record types.
pub mod data;
/// Precision/recall sweeps.
pub mod evaluation;
/// Expert selection rules and derived groups.
pub mod experts;
/// Ground-truth rankings and target sets.
pub mod ground_truth;
/// Cohort and expert-overlap metrics.
pub mod metrics;
/// Mixed-model ranking combiner.
pub mod mixed;
/// End-to-end experiment runs and reports.
pub mod pipeline;
/// Count-ordered item rankings.
pub mod ranking;
/// Cancellation and line accounting for scans.
pub mod scan;
/// Dataset windows and seed-time ranges.
pub mod splits;
/// Input transports for the tab-separated tables.
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Field normalization and url helpers.
pub mod utils;
/// Weighted vote models.
pub mod weighted;

mod errors;

pub use aggregator::{AggregationQuery, CohortRankings, aggregate};
pub use cohorts::{BasicTiers, Cohort};
pub use config::{
    BucketConfig, CiScore, DeltaWindow, EvalConfig, ExpertConfig, MixPolicy, TierConfig,
    WeightConfig,
};
pub use data::{
    ActivityEntry, FollowerCounts, HitsMisses, HitsMissesRecord, RankedItem, SeedRecord,
    SeedTable, TableKey, VoteRecord,
};
pub use errors::EvalError;
pub use evaluation::PrecisionRecallCurve;
pub use experts::{ExpertGroups, WilsonInterval};
pub use ground_truth::{GroundTruthQuery, build_ground_truth, find_target_news};
pub use mixed::{MixedEntry, MixedRanking, mix_rankings};
pub use pipeline::{Experiment, ExperimentInputs, ExperimentReport, TableSource, TrainingTables};
pub use ranking::ItemRanking;
pub use scan::{ScanControl, ScanReport};
pub use splits::{DatasetWindow, TimeRange, WindowBounds};
pub use types::{AuthorId, CategoryTag, CohortName, ItemId, Rank, TweetId};
pub use weighted::{WeightedModel, WeightedRanking, aggregate_weighted};
