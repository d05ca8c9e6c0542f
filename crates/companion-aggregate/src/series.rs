//! Time-bucketed count series.

use std::collections::BTreeMap;

use companion_core::NormalizedTimestamp;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

/// Bucket layout for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    /// One bucket per calendar day for the last `n` days, ending today.
    TrailingDays(u32),
    /// One bucket per calendar month that has at least one record.
    ByMonth,
}

/// Counts for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucket<K: Ord> {
    /// Display label, e.g. `Nov 15` or `Nov 2023`.
    pub label: String,
    /// First day of the period.
    pub start: Date,
    /// Count per key; every key of the series is present.
    pub counts: BTreeMap<K, usize>,
}

impl<K: Ord> TimeBucket<K> {
    /// Count for `key`, zero when absent.
    pub fn count(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum over all keys.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Ordered per-period counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucketSeries<K: Ord> {
    /// Buckets in ascending chronological order.
    pub buckets: Vec<TimeBucket<K>>,
    /// Keys in display order: seeded keys first, then keys seen in input order.
    pub keys: Vec<K>,
    /// Points dropped because their timestamp was invalid.
    pub skipped_invalid: usize,
    /// Valid points outside a fixed window, or not representable in the
    /// offset of `now`.
    pub outside_window: usize,
}

impl<K: Ord + Clone> TimeBucketSeries<K> {
    /// Per-key totals across all buckets.
    pub fn totals(&self) -> BTreeMap<K, usize> {
        let mut totals: BTreeMap<K, usize> =
            self.keys.iter().map(|key| (key.clone(), 0)).collect();
        for bucket in &self.buckets {
            for (key, count) in &bucket.counts {
                *totals.entry(key.clone()).or_insert(0) += count;
            }
        }
        totals
    }

    /// Bucket labels in order.
    pub fn labels(&self) -> Vec<&str> {
        self.buckets.iter().map(|bucket| bucket.label.as_str()).collect()
    }
}

/// Builds a time-bucketed count series.
///
/// # Parameters
/// - `points`: `(timestamp, key)` pairs, one per record.
/// - `window`: Bucket layout.
/// - `seed_keys`: Keys every bucket carries even at zero, in display order.
/// - `now`: Reference instant; its UTC offset decides calendar days.
///
/// For [`WindowSpec::TrailingDays`] the buckets depend only on `now` and the
/// window size; records never add or remove buckets. For
/// [`WindowSpec::ByMonth`] buckets come from the records and are ordered by
/// date, not by label.
pub fn build_time_bucket_series<K, I>(
    points: I,
    window: WindowSpec,
    seed_keys: &[K],
    now: OffsetDateTime,
) -> TimeBucketSeries<K>
where
    K: Ord + Clone,
    I: IntoIterator<Item = (NormalizedTimestamp, K)>,
{
    let offset = now.offset();
    let mut keys: Vec<K> = Vec::with_capacity(seed_keys.len());
    for key in seed_keys {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }

    let mut skipped_invalid = 0;
    let mut outside_window = 0;
    let mut dated: Vec<(Date, K)> = Vec::new();
    for (timestamp, key) in points {
        let Some(instant) = timestamp.value() else {
            skipped_invalid += 1;
            continue;
        };
        let Some(local) = instant.checked_to_offset(offset) else {
            outside_window += 1;
            continue;
        };
        if !keys.contains(&key) {
            keys.push(key.clone());
        }
        dated.push((local.date(), key));
    }

    let mut periods: BTreeMap<Date, BTreeMap<K, usize>> = BTreeMap::new();
    let zeroed = || keys.iter().map(|key| (key.clone(), 0)).collect::<BTreeMap<K, usize>>();

    match window {
        WindowSpec::TrailingDays(days) => {
            let today = now.date();
            for back in 0..i64::from(days) {
                if let Some(day) = today.checked_sub(Duration::days(back)) {
                    periods.insert(day, zeroed());
                }
            }
            for (day, key) in dated {
                match periods.get_mut(&day) {
                    Some(counts) => *counts.entry(key).or_insert(0) += 1,
                    None => outside_window += 1,
                }
            }
        }
        WindowSpec::ByMonth => {
            for (day, key) in dated {
                let month_start = day.replace_day(1).unwrap_or(day);
                *periods
                    .entry(month_start)
                    .or_insert_with(zeroed)
                    .entry(key)
                    .or_insert(0) += 1;
            }
        }
    }

    let buckets = periods
        .into_iter()
        .map(|(start, counts)| TimeBucket {
            label: bucket_label(start, window),
            start,
            counts,
        })
        .collect();

    TimeBucketSeries {
        buckets,
        keys,
        skipped_invalid,
        outside_window,
    }
}

fn bucket_label(start: Date, window: WindowSpec) -> String {
    let formatted = match window {
        WindowSpec::TrailingDays(_) => {
            start.format(format_description!("[month repr:short] [day padding:none]"))
        }
        WindowSpec::ByMonth => start.format(format_description!("[month repr:short] [year]")),
    };
    formatted.unwrap_or_else(|_| start.to_string())
}
