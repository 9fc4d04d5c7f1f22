use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::activity::{ActivityRanking, HitsMissesTable};
use crate::config::DeltaWindow;
use crate::constants::columns::{
    ACTIVITY_COLUMNS, FIELD_SEPARATOR, HITS_MISSES_COLUMNS, SEED_TABLE_COLUMNS,
    SEED_TIMESTAMP_FORMAT, USER_INFO_FOLLOWERS_INDEX, USER_INFO_MAX_COLUMNS,
    USER_INFO_MIN_COLUMNS, VOTE_LOG_MAX_COLUMNS, VOTE_LOG_MIN_COLUMNS,
};
use crate::constants::files::{ACTIVITY_PREFIX, HITS_MISSES_PREFIX, NONE_TOKEN, TABLE_EXTENSION};
use crate::constants::scan::{SCAN_CHECK_INTERVAL, SKIP_MALFORMED_MSG};
use crate::data::{
    ActivityEntry, FollowerCounts, HitsMissesRecord, SeedRecord, SeedTable, TableKey, TweetId,
    VoteRecord,
};
use crate::errors::EvalError;
use crate::scan::{ScanControl, ScanReport};
use crate::utils::normalize_field;

/// Records parsed from one file plus the line accounting for the scan.
#[derive(Clone, Debug)]
pub struct Loaded<T> {
    /// Parsed records.
    pub data: T,
    /// Line accounting.
    pub report: ScanReport,
}

/// Tab-separated input file with a validated column count.
pub struct TsvFile {
    path: PathBuf,
    columns: RangeInclusive<usize>,
}

impl TsvFile {
    /// File at `path` expecting exactly `columns` fields per line.
    pub fn new(path: impl Into<PathBuf>, columns: usize) -> Self {
        Self {
            path: path.into(),
            columns: columns..=columns,
        }
    }

    /// Accept any field count within `columns`.
    pub fn with_column_range(mut self, columns: RangeInclusive<usize>) -> Self {
        self.columns = columns;
        self
    }

    /// Path being scanned.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every non-blank line, handing its fields to `parse`.
    ///
    /// Lines that are not UTF-8, have the wrong field count, or that `parse`
    /// rejects are logged and skipped. A missing or empty file is a
    /// `MissingInput` error. The file handle is dropped on every exit path,
    /// including cancellation.
    pub fn scan<F>(&self, control: &ScanControl, mut parse: F) -> Result<ScanReport, EvalError>
    where
        F: FnMut(&[&str]) -> Result<(), String>,
    {
        let file = File::open(&self.path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => EvalError::MissingInput {
                path: self.path.clone(),
                reason: "file does not exist".to_string(),
            },
            _ => EvalError::Io(err),
        })?;
        let reader = BufReader::new(file);
        let mut report = ScanReport::default();

        for (idx, bytes) in reader.split(b'\n').enumerate() {
            if idx % SCAN_CHECK_INTERVAL == 0 {
                control.check()?;
            }
            let bytes = bytes?;
            let outcome = match std::str::from_utf8(&bytes) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    report.lines_read += 1;
                    self.parse_line(line, &mut parse)
                }
                Err(err) => {
                    report.lines_read += 1;
                    Err(format!("line is not valid UTF-8: {err}"))
                }
            };
            match outcome {
                Ok(()) => report.records += 1,
                Err(reason) => {
                    let err = EvalError::MalformedRecord {
                        path: self.path.clone(),
                        line: idx + 1,
                        reason,
                    };
                    warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        error = %err,
                        SKIP_MALFORMED_MSG
                    );
                    report.skipped += 1;
                }
            }
        }

        if report.lines_read == 0 {
            return Err(EvalError::MissingInput {
                path: self.path.clone(),
                reason: "file is empty".to_string(),
            });
        }
        debug!(
            path = %self.path.display(),
            lines = report.lines_read,
            skipped = report.skipped,
            "scanned table"
        );
        Ok(report)
    }

    fn parse_line<F>(&self, line: &str, parse: &mut F) -> Result<(), String>
    where
        F: FnMut(&[&str]) -> Result<(), String>,
    {
        let fields: Vec<&str> = line
            .trim_end_matches(['\r', '\n'])
            .split(FIELD_SEPARATOR)
            .collect();
        if !self.columns.contains(&fields.len()) {
            return Err(format!(
                "expected {}..={} fields, found {}",
                self.columns.start(),
                self.columns.end(),
                fields.len()
            ));
        }
        parse(&fields)
    }
}

/// Scan `path` accepting any field count in `columns`.
pub fn scan_tsv<F>(
    path: impl AsRef<Path>,
    columns: RangeInclusive<usize>,
    control: &ScanControl,
    parse: F,
) -> Result<ScanReport, EvalError>
where
    F: FnMut(&[&str]) -> Result<(), String>,
{
    TsvFile::new(path.as_ref(), *columns.end())
        .with_column_range(columns)
        .scan(control, parse)
}

/// Parsed vote log.
pub type VoteLog = Loaded<Vec<VoteRecord>>;

fn required<'a>(fields: &[&'a str], idx: usize, name: &str) -> Result<&'a str, String> {
    fields
        .get(idx)
        .and_then(|raw| normalize_field(raw))
        .ok_or_else(|| format!("missing {name}"))
}

fn optional(fields: &[&str], idx: usize) -> Option<String> {
    fields
        .get(idx)
        .and_then(|raw| normalize_field(raw))
        .map(str::to_string)
}

fn parse_count(fields: &[&str], idx: usize, name: &str) -> Result<u64, String> {
    let raw = required(fields, idx, name)?;
    raw.parse::<u64>()
        .map_err(|err| format!("invalid {name} '{raw}': {err}"))
}

/// Load the vote log (tweet_id, author_id, delta_seconds, url[, category[, source]]).
pub fn load_votes(path: impl AsRef<Path>, control: &ScanControl) -> Result<VoteLog, EvalError> {
    let file = TsvFile::new(path.as_ref(), VOTE_LOG_MAX_COLUMNS)
        .with_column_range(VOTE_LOG_MIN_COLUMNS..=VOTE_LOG_MAX_COLUMNS);
    let mut votes = Vec::new();
    let report = file.scan(control, |fields| {
        let delta_raw = required(fields, 2, "delta_seconds")?;
        let delta_seconds = delta_raw
            .parse::<i64>()
            .map_err(|err| format!("invalid delta_seconds '{delta_raw}': {err}"))?;
        votes.push(VoteRecord {
            tweet_id: required(fields, 0, "tweet_id")?.to_string(),
            author_id: required(fields, 1, "author_id")?.to_string(),
            delta_seconds,
            item_id: required(fields, 3, "item_url")?.to_string(),
            category: optional(fields, 4),
            source: optional(fields, 5),
        });
        Ok(())
    })?;
    Ok(Loaded {
        data: votes,
        report,
    })
}

/// Load the seed table (tweet_id, author_id, timestamp, url).
///
/// When an item appears more than once, the earliest timestamp wins.
pub fn load_seeds(
    path: impl AsRef<Path>,
    control: &ScanControl,
) -> Result<Loaded<SeedTable>, EvalError> {
    let file = TsvFile::new(path.as_ref(), SEED_TABLE_COLUMNS);
    let mut seeds = SeedTable::new();
    let report = file.scan(control, |fields| {
        let raw_time = required(fields, 2, "timestamp")?;
        let timestamp = NaiveDateTime::parse_from_str(raw_time, SEED_TIMESTAMP_FORMAT)
            .map_err(|err| format!("invalid timestamp '{raw_time}': {err}"))?;
        let record = SeedRecord {
            tweet_id: required(fields, 0, "tweet_id")?.to_string(),
            author_id: required(fields, 1, "author_id")?.to_string(),
            timestamp,
            item_id: required(fields, 3, "item_url")?.to_string(),
        };
        match seeds.entry(record.item_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if record.timestamp < slot.get().timestamp {
                    slot.insert(record);
                }
            }
        }
        Ok(())
    })?;
    Ok(Loaded {
        data: seeds,
        report,
    })
}

/// Load follower counts from a user-info table (author_id, screen_name, name, followers, ...).
///
/// A later row for the same author replaces the earlier one.
pub fn load_follower_counts(
    path: impl AsRef<Path>,
    control: &ScanControl,
) -> Result<Loaded<FollowerCounts>, EvalError> {
    let file = TsvFile::new(path.as_ref(), USER_INFO_MAX_COLUMNS)
        .with_column_range(USER_INFO_MIN_COLUMNS..=USER_INFO_MAX_COLUMNS);
    let mut followers = FollowerCounts::new();
    let report = file.scan(control, |fields| {
        let count = parse_count(fields, USER_INFO_FOLLOWERS_INDEX, "followers_count")?;
        followers.insert(required(fields, 0, "author_id")?.to_string(), count);
        Ok(())
    })?;
    Ok(Loaded {
        data: followers,
        report,
    })
}

/// Load a set of tweet ids from the first column of `path`.
///
/// Accepts a bare id list or vote-log rows, so a retweet extract of the vote
/// log can be passed as is.
pub fn load_tweet_ids(
    path: impl AsRef<Path>,
    control: &ScanControl,
) -> Result<Loaded<HashSet<TweetId>>, EvalError> {
    let file = TsvFile::new(path.as_ref(), VOTE_LOG_MAX_COLUMNS)
        .with_column_range(1..=VOTE_LOG_MAX_COLUMNS);
    let mut tweets = HashSet::new();
    let report = file.scan(control, |fields| {
        tweets.insert(required(fields, 0, "tweet_id")?.to_string());
        Ok(())
    })?;
    Ok(Loaded {
        data: tweets,
        report,
    })
}

/// Canonical filename for a per-(delta, category) table.
pub fn table_file_name(prefix: &str, key: &TableKey) -> String {
    let delta = key
        .delta
        .hours()
        .map(|hours| hours.to_string())
        .unwrap_or_else(|| NONE_TOKEN.to_string());
    let category = key.category.as_deref().unwrap_or(NONE_TOKEN);
    format!("{prefix}_{delta}_{category}.{TABLE_EXTENSION}")
}

/// Path of the activity table for `key` inside `dir`.
pub fn activity_table_path(dir: impl AsRef<Path>, key: &TableKey) -> PathBuf {
    dir.as_ref().join(table_file_name(ACTIVITY_PREFIX, key))
}

/// Path of the hits/misses table for `key` inside `dir`.
pub fn hits_misses_table_path(dir: impl AsRef<Path>, key: &TableKey) -> PathBuf {
    dir.as_ref().join(table_file_name(HITS_MISSES_PREFIX, key))
}

/// Recover the key encoded in a canonical `{prefix}_{delta}_{category}.tsv` name.
pub fn table_key_from_path(path: &Path, prefix: &str) -> Option<TableKey> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(TABLE_EXTENSION)?.strip_suffix('.')?;
    let (delta, category) = stem.strip_prefix(prefix)?.strip_prefix('_')?.split_once('_')?;
    let delta = if delta == NONE_TOKEN {
        DeltaWindow::Unbounded
    } else {
        DeltaWindow::Hours(delta.parse().ok()?)
    };
    let category = (category != NONE_TOKEN).then_some(category);
    Some(TableKey::new(delta, category))
}

/// Key of the table at `path`, which must equal `expected`.
fn checked_table_key(
    path: &Path,
    prefix: &str,
    expected: &TableKey,
    table: &str,
) -> Result<TableKey, EvalError> {
    let found = table_key_from_path(path, prefix).ok_or_else(|| {
        EvalError::Configuration(format!(
            "{table} {} is not named {prefix}_{{delta}}_{{category}}.{TABLE_EXTENSION}",
            path.display()
        ))
    })?;
    found.ensure_matches(expected, table)?;
    Ok(found)
}

/// Load an activity table (author_id, vote_count) generated for `key`.
///
/// The key is read back from the canonical filename; a table written for a
/// different (delta, category) is a `Configuration` error.
pub fn load_activity_table(
    path: impl AsRef<Path>,
    key: &TableKey,
    control: &ScanControl,
) -> Result<Loaded<ActivityRanking>, EvalError> {
    let key = checked_table_key(path.as_ref(), ACTIVITY_PREFIX, key, "activity table")?;
    let file = TsvFile::new(path.as_ref(), ACTIVITY_COLUMNS);
    let mut entries = Vec::new();
    let report = file.scan(control, |fields| {
        entries.push(ActivityEntry {
            author_id: required(fields, 0, "author_id")?.to_string(),
            vote_count: parse_count(fields, 1, "vote_count")?,
        });
        Ok(())
    })?;
    Ok(Loaded {
        data: ActivityRanking::new(key, entries)?,
        report,
    })
}

/// Load a hits/misses table (author_id, hits, misses) generated for `key`.
pub fn load_hits_misses_table(
    path: impl AsRef<Path>,
    key: &TableKey,
    control: &ScanControl,
) -> Result<Loaded<HitsMissesTable>, EvalError> {
    let key = checked_table_key(path.as_ref(), HITS_MISSES_PREFIX, key, "hits/misses table")?;
    let file = TsvFile::new(path.as_ref(), HITS_MISSES_COLUMNS);
    let mut records = Vec::new();
    let report = file.scan(control, |fields| {
        records.push(HitsMissesRecord {
            author_id: required(fields, 0, "author_id")?.to_string(),
            hits: parse_count(fields, 1, "hits")?,
            misses: parse_count(fields, 2, "misses")?,
        });
        Ok(())
    })?;
    Ok(Loaded {
        data: HitsMissesTable::from_records(key, records),
        report,
    })
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, EvalError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write an activity table in rank order.
pub fn write_activity_table(
    path: impl AsRef<Path>,
    ranking: &ActivityRanking,
) -> Result<(), EvalError> {
    let mut out = create_writer(path.as_ref())?;
    for entry in ranking.entries() {
        writeln!(out, "{}\t{}", entry.author_id, entry.vote_count)?;
    }
    out.flush()?;
    Ok(())
}

/// Write a hits/misses table in insertion order.
pub fn write_hits_misses_table(
    path: impl AsRef<Path>,
    table: &HitsMissesTable,
) -> Result<(), EvalError> {
    let mut out = create_writer(path.as_ref())?;
    for (author_id, counts) in table.iter() {
        writeln!(out, "{author_id}\t{}\t{}", counts.hits, counts.misses)?;
    }
    out.flush()?;
    Ok(())
}
