/// Filesystem loaders and writers for the tab-separated tables.
pub mod fs;

pub use fs::{
    Loaded, TsvFile, VoteLog, activity_table_path, hits_misses_table_path, load_activity_table,
    load_follower_counts, load_hits_misses_table, load_seeds, load_tweet_ids, load_votes,
    scan_tsv, table_key_from_path, write_activity_table, write_hits_misses_table,
};
