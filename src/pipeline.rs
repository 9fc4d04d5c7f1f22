//! One evaluation run for a single (delta, category) combination.
//!
//! The run derives (or loads) the training tables, builds every cohort, ranks
//! items for all cohorts in a single aggregation pass, and scores each ranking
//! against the evaluation window's target set. The result is an
//! [`ExperimentReport`] that serializes to JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::activity::{
    ActivityRanking, HitsMissesTable, TrainingQuery, build_activity_ranking, build_hits_misses,
};
use crate::aggregator::{AggregationQuery, aggregate};
use crate::cohorts::{
    BasicTiers, Cohort, even_buckets, partition_basic, round_robin_buckets, sample_cohort,
};
use crate::config::{DeltaWindow, EvalConfig};
use crate::constants::cohorts::{
    COMMON_BUCKET_PREFIX, EXPERTS_CI, EXPERTS_CI_HIGH, EXPERTS_CI_LOW, EXPERTS_FSCORE,
    EXPERTS_PRECISION, NON_EXPERTS, NON_EXPERTS_SAMPLED, POPULATION, WEIGHTED, WEIGHTED_BOTH,
    WEIGHTED_FOLLOWERS,
};
use crate::constants::files::REPORT_FILENAME;
use crate::data::{FollowerCounts, SeedTable, TableKey, VoteRecord};
use crate::errors::EvalError;
use crate::evaluation::{PrecisionRecallCurve, precision_recall};
use crate::experts::{ExpertGroups, select_social_bias, split_ci};
use crate::ground_truth::{GroundTruthQuery, build_ground_truth, find_target_news};
use crate::metrics::{CohortSummary, ExpertOverlap, cohort_summary, expert_overlap};
use crate::mixed::{CohortEvidence, MixedRanking, mix_rankings, winning_cohorts};
use crate::scan::{ScanControl, ScanReport};
use crate::splits::DatasetWindow;
use crate::transport::fs::{
    activity_table_path, hits_misses_table_path, load_activity_table, load_follower_counts,
    load_hits_misses_table, load_seeds, load_tweet_ids, load_votes, write_activity_table,
    write_hits_misses_table,
};
use crate::types::{CategoryTag, CohortName, TweetId};
use crate::weighted::{WeightedModel, aggregate_weighted};

/// Where the per-user training tables come from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TableSource {
    /// Derive them from the vote log's training window.
    #[default]
    Derive,
    /// Derive them and persist both tables under this directory.
    DeriveAndWrite(PathBuf),
    /// Load previously generated tables from this directory.
    Load(PathBuf),
}

/// Input files for a run.
#[derive(Clone, Debug)]
pub struct ExperimentInputs {
    /// Vote log.
    pub votes: PathBuf,
    /// Seed table.
    pub seeds: PathBuf,
    /// Training table source.
    pub tables: TableSource,
    /// Optional user-info table enabling the follower-based cohorts.
    pub followers: Option<PathBuf>,
    /// Optional tweet-id list (typically retweets) left out of the ground truth.
    pub excluded_tweets: Option<PathBuf>,
}

impl ExperimentInputs {
    /// Derive tables from `votes` and `seeds` with no optional inputs.
    pub fn new(votes: impl Into<PathBuf>, seeds: impl Into<PathBuf>) -> Self {
        Self {
            votes: votes.into(),
            seeds: seeds.into(),
            tables: TableSource::Derive,
            followers: None,
            excluded_tweets: None,
        }
    }

    /// Use `tables` for the training tables.
    pub fn with_tables(mut self, tables: TableSource) -> Self {
        self.tables = tables;
        self
    }

    /// Read follower counts from the user-info table at `path`.
    pub fn with_followers(mut self, path: impl Into<PathBuf>) -> Self {
        self.followers = Some(path.into());
        self
    }

    /// Drop the tweets listed at `path` from the ground truth.
    pub fn excluding_tweets(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_tweets = Some(path.into());
        self
    }
}

/// Activity ranking and hits/misses table for one (delta, category).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainingTables {
    /// Users by training-window activity.
    pub activity: ActivityRanking,
    /// Per-user hits and misses.
    pub hits_misses: HitsMissesTable,
}

impl TrainingTables {
    /// Fail unless both tables were generated for `expected`.
    pub fn ensure_matches(&self, expected: &TableKey) -> Result<(), EvalError> {
        self.activity.key.ensure_matches(expected, "activity table")?;
        self.hits_misses
            .key
            .ensure_matches(expected, "hits/misses table")
    }
}

/// Everything measured by one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Vote age window of the run.
    pub delta: DeltaWindow,
    /// Category filter of the run.
    pub category: Option<CategoryTag>,
    /// Window whose items were scored.
    pub evaluation_window: DatasetWindow,
    /// Items in the evaluation ground truth.
    pub ground_truth_items: usize,
    /// Items in the target set.
    pub target_size: usize,
    /// Users in the activity ranking.
    pub num_users: usize,
    /// Size and vote share of every cohort.
    pub summaries: Vec<CohortSummary>,
    /// Expert group sizes and pairwise overlaps.
    pub expert_overlap: ExpertOverlap,
    /// Precision/recall curve per cohort, population first, then the
    /// weighted models.
    pub curves: IndexMap<CohortName, PrecisionRecallCurve>,
    /// Per-item cohort fusion.
    pub mixed: MixedRanking,
    /// Curve of the mixed ranking.
    pub mixed_curve: PrecisionRecallCurve,
    /// Mixed-ranking items for which each contributing cohort had the lowest error.
    pub mixed_wins: BTreeMap<CohortName, usize>,
    /// Line accounting across every file read by the run.
    pub scan: ScanReport,
}

impl ExperimentReport {
    /// Curve for `cohort`, if it was evaluated.
    pub fn curve(&self, cohort: &str) -> Option<&PrecisionRecallCurve> {
        self.curves.get(cohort)
    }

    /// Write the report as pretty JSON to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), EvalError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self).map_err(io::Error::from)?;
        out.flush()?;
        info!(path = %path.display(), "wrote experiment report");
        Ok(())
    }

    /// Write the report to `report.json` inside `dir`, returning the path.
    pub fn write_json_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, EvalError> {
        let path = dir.as_ref().join(REPORT_FILENAME);
        self.write_json(&path)?;
        Ok(path)
    }
}

/// Runs the evaluation for one configuration.
pub struct Experiment<'a> {
    config: &'a EvalConfig,
    control: &'a ScanControl,
    followers: Option<&'a FollowerCounts>,
    excluded_tweets: Option<&'a HashSet<TweetId>>,
}

impl<'a> Experiment<'a> {
    /// Validate `config` and bind it to `control`.
    pub fn new(config: &'a EvalConfig, control: &'a ScanControl) -> Result<Self, EvalError> {
        config.validate()?;
        Ok(Self {
            config,
            control,
            followers: None,
            excluded_tweets: None,
        })
    }

    /// Add the social-bias cohort and the follower-weighted model.
    pub fn with_followers(mut self, followers: &'a FollowerCounts) -> Self {
        self.followers = Some(followers);
        self
    }

    /// Leave `tweets` out of every ground-truth count.
    pub fn excluding_tweets(mut self, tweets: &'a HashSet<TweetId>) -> Self {
        self.excluded_tweets = Some(tweets);
        self
    }

    /// Load the input files and evaluate them.
    pub fn run(
        inputs: &ExperimentInputs,
        config: &EvalConfig,
        control: &ScanControl,
    ) -> Result<ExperimentReport, EvalError> {
        let mut experiment = Experiment::new(config, control)?;
        let mut scan = ScanReport::default();

        let votes = load_votes(&inputs.votes, control)?;
        scan.merge(votes.report);
        let seeds = load_seeds(&inputs.seeds, control)?;
        scan.merge(seeds.report);
        let followers = inputs
            .followers
            .as_ref()
            .map(|path| load_follower_counts(path, control))
            .transpose()?;
        if let Some(followers) = &followers {
            scan.merge(followers.report);
            experiment = experiment.with_followers(&followers.data);
        }
        let excluded = inputs
            .excluded_tweets
            .as_ref()
            .map(|path| load_tweet_ids(path, control))
            .transpose()?;
        if let Some(excluded) = &excluded {
            scan.merge(excluded.report);
            experiment = experiment.excluding_tweets(&excluded.data);
        }

        let key = experiment.table_key();
        let tables = match &inputs.tables {
            TableSource::Load(dir) => {
                let activity =
                    load_activity_table(activity_table_path(dir, &key), &key, control)?;
                scan.merge(activity.report);
                let hits_misses =
                    load_hits_misses_table(hits_misses_table_path(dir, &key), &key, control)?;
                scan.merge(hits_misses.report);
                Some(TrainingTables {
                    activity: activity.data,
                    hits_misses: hits_misses.data,
                })
            }
            TableSource::DeriveAndWrite(dir) => {
                let tables = experiment.derive_tables(&votes.data, &seeds.data)?;
                write_activity_table(activity_table_path(dir, &key), &tables.activity)?;
                write_hits_misses_table(hits_misses_table_path(dir, &key), &tables.hits_misses)?;
                Some(tables)
            }
            TableSource::Derive => None,
        };

        let mut report = experiment.evaluate(&votes.data, &seeds.data, tables)?;
        report.scan.merge(scan);
        if report.scan.skipped > 0 {
            info!(
                skipped = report.scan.skipped,
                lines = report.scan.lines_read,
                "skipped malformed input lines"
            );
        }
        Ok(report)
    }

    /// Ground-truth filter for `window` with the run's category, tweet
    /// exclusions and optional delta bound.
    fn ground_truth_query(&self, window: DatasetWindow) -> GroundTruthQuery<'a> {
        let config = self.config;
        let mut query =
            GroundTruthQuery::new(window, &config.windows).with_category(config.category.as_deref());
        if let Some(tweets) = self.excluded_tweets {
            query = query.excluding(tweets);
        }
        if config.ground_truth_within_delta {
            query = query.with_max_delta(config.delta);
        }
        query
    }

    /// Key the run's training tables must carry.
    pub fn table_key(&self) -> TableKey {
        TableKey::new(self.config.delta, self.config.category.as_deref())
    }

    /// Build activity and hits/misses tables from the training window.
    ///
    /// Hits are votes on the training window's own target set.
    pub fn derive_tables(
        &self,
        votes: &[VoteRecord],
        seeds: &SeedTable,
    ) -> Result<TrainingTables, EvalError> {
        let config = self.config;
        let category = config.category.as_deref();
        let training_gt =
            build_ground_truth(votes, seeds, &self.ground_truth_query(config.training_window))?;
        let training_target = find_target_news(&training_gt, config.target_fraction);
        self.control.check()?;

        let query = TrainingQuery {
            window: config.training_window,
            bounds: &config.windows,
            delta: config.delta,
            category,
        };
        Ok(TrainingTables {
            activity: build_activity_ranking(votes, seeds, &query),
            hits_misses: build_hits_misses(votes, seeds, &training_target, &query),
        })
    }

    /// Evaluate in-memory inputs; tables are derived when `tables` is `None`.
    pub fn evaluate(
        &self,
        votes: &[VoteRecord],
        seeds: &SeedTable,
        tables: Option<TrainingTables>,
    ) -> Result<ExperimentReport, EvalError> {
        let config = self.config;
        let category = config.category.as_deref();
        let tables = match tables {
            Some(tables) => {
                tables.ensure_matches(&self.table_key())?;
                tables
            }
            None => self.derive_tables(votes, seeds)?,
        };
        if tables.activity.is_empty() {
            return Err(EvalError::missing(
                "activity table",
                "no users voted inside the training window",
            ));
        }

        let ground_truth =
            build_ground_truth(votes, seeds, &self.ground_truth_query(config.evaluation_window))?;
        let target = find_target_news(&ground_truth, config.target_fraction);

        let tiers = partition_basic(&tables.activity, &config.tiers);
        let population = tiers.population();
        let experts = ExpertGroups::select(
            &tables.hits_misses,
            &tiers.engaged(),
            target.len(),
            tiers.num_users,
            &config.expert,
        );
        let mut cohorts = self.build_cohorts(&tiers, &population, &experts, &tables.activity);
        let (ci_high, ci_low) = split_ci(&tables.hits_misses, &experts.ci, &config.expert);
        cohorts.extend([ci_high, ci_low]);
        if let Some(followers) = self.followers {
            cohorts.push(select_social_bias(followers, tiers.num_users, &config.expert));
        }

        let query = AggregationQuery::new(config.evaluation_window, &config.windows, config.delta)
            .with_category(category)
            .excluding_sources(config.exclude_sources.iter().map(String::as_str))
            .with_shards(config.parallel_shards);
        let rankings = aggregate(votes, seeds, &cohorts, &query, self.control)?;
        let models = self.weighted_models(&cohorts);
        let weighted = aggregate_weighted(votes, seeds, &models, &query, self.control)?;

        let population_votes = rankings
            .population()
            .map(|ranking| ranking.total_votes())
            .unwrap_or(0);
        let mut curves = IndexMap::new();
        let mut summaries = Vec::new();
        for (name, ranking) in rankings.iter() {
            curves.insert(name.clone(), precision_recall(&target, ranking.item_ids()));
            let cohort = if name == POPULATION {
                &population
            } else {
                match cohorts.iter().find(|cohort| &cohort.name == name) {
                    Some(cohort) => cohort,
                    None => continue,
                }
            };
            summaries.push(cohort_summary(cohort, ranking, population_votes));
        }
        for (name, ranking) in &weighted {
            curves.insert(name.clone(), precision_recall(&target, ranking.item_ids()));
        }

        let (mixed, mixed_wins) = {
            let mut evidence = Vec::new();
            for name in [POPULATION, EXPERTS_PRECISION, EXPERTS_FSCORE, EXPERTS_CI] {
                if let (Some(ranking), Some(curve)) = (rankings.get(name), curves.get(name)) {
                    evidence.push(CohortEvidence::new(name, ranking, curve));
                }
            }
            let mixed = mix_rankings(&evidence, &ground_truth.ranks(), config.mix_policy);
            let wins = winning_cohorts(&evidence, &mixed);
            (mixed, wins)
        };
        let mixed_curve = precision_recall(&target, mixed.item_ids());

        let overlap = expert_overlap(&experts);
        info!(
            delta = ?config.delta,
            category = ?config.category,
            ground_truth = ground_truth.len(),
            target = target.len(),
            users = tiers.num_users,
            cohorts = cohorts.len() + 1,
            weighted = weighted.len(),
            mixed = mixed.len(),
            "experiment complete"
        );
        Ok(ExperimentReport {
            delta: config.delta,
            category: config.category.clone(),
            evaluation_window: config.evaluation_window,
            ground_truth_items: ground_truth.len(),
            target_size: target.len(),
            num_users: tiers.num_users,
            summaries,
            expert_overlap: overlap,
            curves,
            mixed,
            mixed_curve,
            mixed_wins,
            scan: ScanReport::default(),
        })
    }

    fn build_cohorts(
        &self,
        tiers: &BasicTiers,
        population: &Cohort,
        experts: &ExpertGroups,
        activity: &ActivityRanking,
    ) -> Vec<Cohort> {
        let config = self.config;
        let non_experts = population.difference(NON_EXPERTS, &experts.all);
        let sampled = sample_cohort(
            &non_experts,
            NON_EXPERTS_SAMPLED,
            config.non_expert_sample_fraction,
            config.seed,
        );
        let mut cohorts = vec![
            tiers.newsaholics.clone(),
            tiers.active.clone(),
            tiers.common.clone(),
            experts.precision.clone(),
            experts.fscore.clone(),
            experts.ci.clone(),
            experts.all.clone(),
            experts.super_experts.clone(),
            non_experts,
            sampled,
        ];
        cohorts.extend(even_buckets(activity, &config.buckets));
        cohorts.extend(round_robin_buckets(
            &tiers.common,
            config.buckets.num_groups,
            COMMON_BUCKET_PREFIX,
        ));
        cohorts
    }

    /// Blends of non-experts and CI experts, plus the follower-weighted CI
    /// model when follower counts were supplied.
    fn weighted_models<'c>(&self, cohorts: &'c [Cohort]) -> Vec<WeightedModel<'c>>
    where
        'a: 'c,
    {
        let (Some(non_experts), Some(ci)) = (
            find_cohort(cohorts, NON_EXPERTS),
            find_cohort(cohorts, EXPERTS_CI),
        ) else {
            return Vec::new();
        };
        let weights = self.config.weights;
        let expert_weight = 1.0 - weights.non_expert_weight;
        let mut models = vec![
            WeightedModel::new(WEIGHTED)
                .with_fixed(non_experts, weights.non_expert_weight)
                .with_fixed(ci, expert_weight),
        ];
        if let (Some(high), Some(low)) = (
            find_cohort(cohorts, EXPERTS_CI_HIGH),
            find_cohort(cohorts, EXPERTS_CI_LOW),
        ) {
            models.push(
                WeightedModel::new(WEIGHTED_BOTH)
                    .with_fixed(non_experts, weights.non_expert_weight)
                    .with_fixed(high, expert_weight * weights.ci_high_weight)
                    .with_fixed(low, expert_weight * (1.0 - weights.ci_high_weight)),
            );
        }
        if let Some(followers) = self.followers {
            models.push(WeightedModel::new(WEIGHTED_FOLLOWERS).with_followers(ci, followers));
        }
        models
    }
}

fn find_cohort<'c>(cohorts: &'c [Cohort], name: &str) -> Option<&'c Cohort> {
    cohorts.iter().find(|cohort| cohort.name == name)
}
