use std::collections::HashSet;

use indexmap::IndexMap;

use folkwisdom::activity::{ActivityRanking, HitsMissesTable};
use folkwisdom::cohorts::{even_buckets, partition_basic, round_robin_buckets};
use folkwisdom::config::{BucketConfig, ExpertConfig, TierConfig};
use folkwisdom::evaluation::precision_recall;
use folkwisdom::experts::ExpertGroups;
use folkwisdom::ranking::ItemRanking;
use folkwisdom::{ActivityEntry, Cohort, HitsMisses, ItemId, TableKey};

fn activity(n: usize) -> ActivityRanking {
    let entries = (0..n)
        .map(|idx| ActivityEntry {
            author_id: format!("user-{idx:05}"),
            vote_count: ((n - idx) / 3) as u64,
        })
        .collect();
    ActivityRanking::new(TableKey::default(), entries).unwrap()
}

fn hits_misses(n: usize) -> HitsMissesTable {
    let mut table = HitsMissesTable::new(TableKey::default());
    for idx in 0..n {
        table.add(
            format!("user-{idx:05}"),
            HitsMisses {
                hits: ((idx * 7) % 11) as u64,
                misses: ((idx * 13) % 17) as u64,
            },
        );
    }
    table
}

#[test]
fn basic_tiers_cover_every_population_size_once() {
    for n in (0..=400).step_by(7) {
        let ranking = activity(n);
        let tiers = partition_basic(&ranking, &TierConfig::default());
        let mut seen = HashSet::new();
        for cohort in [&tiers.newsaholics, &tiers.active, &tiers.common] {
            for id in cohort.members() {
                assert!(seen.insert(id.clone()), "{id} assigned twice (n = {n})");
            }
        }
        let expected: HashSet<String> = ranking.author_ids().cloned().collect();
        assert_eq!(seen, expected, "n = {n}");
    }
}

#[test]
fn buckets_never_overlap() {
    let ranking = activity(257);
    let buckets = even_buckets(
        &ranking,
        &BucketConfig {
            num_groups: 5,
            group_size_fraction: 0.07,
        },
    );
    let tiers = partition_basic(&ranking, &TierConfig::default());
    let round_robin = round_robin_buckets(&tiers.common, 4, "common_bucket_");
    for groups in [&buckets, &round_robin] {
        for (i, a) in groups.iter().enumerate() {
            for b in &groups[i + 1..] {
                assert_eq!(a.intersection_len(b), 0);
            }
        }
    }
    let dealt: usize = round_robin.iter().map(Cohort::len).sum();
    assert_eq!(dealt, tiers.common.len());
    assert!(buckets.iter().all(|bucket| bucket.len() == 17));
}

#[test]
fn derived_expert_groups_match_set_algebra() {
    for (n, fraction, beta) in [(50, 0.02, 2.0), (300, 0.1, 1.0), (120, 0.25, 0.5)] {
        let ranking = activity(n);
        let tiers = partition_basic(&ranking, &TierConfig::default());
        let config = ExpertConfig {
            fraction,
            beta,
            ..ExpertConfig::default()
        };
        let engaged = tiers.engaged();
        let groups = ExpertGroups::select(&hits_misses(n), &engaged, 40, n, &config);
        let sets = [&groups.precision, &groups.fscore, &groups.ci];
        let union: HashSet<&String> = sets.into_iter().flat_map(Cohort::members).collect();
        let all: HashSet<&String> = groups.all.members().collect();
        assert_eq!(all, union);
        let intersection: HashSet<&String> = groups
            .precision
            .members()
            .filter(|id| groups.fscore.contains(id) && groups.ci.contains(id))
            .collect();
        let super_experts: HashSet<&String> = groups.super_experts.members().collect();
        assert_eq!(super_experts, intersection);
        assert!(groups.precision.members().all(|id| engaged.contains(id)));
    }
}

#[test]
fn curves_stay_bounded_for_any_candidate_order() {
    let mut counts = IndexMap::new();
    for idx in 0..100u64 {
        counts.insert(format!("item-{idx}"), 1000 - idx * 3);
    }
    let ground_truth = ItemRanking::from_counts(counts);
    let target: HashSet<ItemId> = ground_truth.item_ids().take(20).cloned().collect();
    for stride in [1usize, 3, 7, 11] {
        let candidates: Vec<ItemId> = (0..100)
            .map(|idx| format!("item-{}", (idx * stride) % 100))
            .collect();
        let curve = precision_recall(&target, &candidates);
        assert_eq!(curve.len(), 20);
        for pair in curve.recalls.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(
            curve
                .precisions
                .iter()
                .chain(curve.recalls.iter())
                .all(|value| (0.0..=100.0).contains(value))
        );
    }
}
