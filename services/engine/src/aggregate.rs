//! Aggregations over (filtered) records.
//!
//! All grouping results are sorted with an explicit tie-break so the output
//! never depends on hash iteration order:
//! - category counts: count descending, then value ascending
//! - time buckets: key ascending

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::date::{month_key, normalize_to_iso_date, start_of_iso_week_ymd, year_key};
use crate::error::EngineError;
use crate::record::{Field, Record};

// =============================================================================
// CATEGORY COUNTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
}

impl CategoryCount {
    /// Percentage of `total`, 0 when `total` is 0.
    pub fn share(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.count as f64 / total as f64 * 100.0
        }
    }
}

/// Completed vs outstanding rows for one category value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackedCount {
    pub value: String,
    pub complete: usize,
    pub incomplete: usize,
}

impl StackedCount {
    pub fn total(&self) -> usize {
        self.complete + self.incomplete
    }
}

/// A row counts as complete when its Actual date parses.
pub fn has_actual(record: &Record) -> bool {
    normalize_to_iso_date(record.get(Field::Actual)).is_some()
}

/// Tally every value of `field`, including "".
pub fn group_counts<R: Borrow<Record>>(rows: &[R], field: Field) -> Vec<CategoryCount> {
    let mut tally: IndexMap<&str, usize> = IndexMap::new();
    for row in rows {
        let row: &Record = row.borrow();
        *tally.entry(row.get(field)).or_insert(0) += 1;
    }

    let mut out: Vec<CategoryCount> = tally
        .into_iter()
        .map(|(value, count)| CategoryCount {
            value: value.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    out
}

/// Tally per value split into complete / incomplete. Rows with an empty
/// value for `field` are left out.
pub fn group_counts_stacked<R: Borrow<Record>>(rows: &[R], field: Field) -> Vec<StackedCount> {
    let mut tally: IndexMap<&str, (usize, usize)> = IndexMap::new();
    for row in rows {
        let row: &Record = row.borrow();
        let key = row.get(field);
        if key.is_empty() {
            continue;
        }
        let entry = tally.entry(key).or_insert((0, 0));
        if has_actual(row) {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut out: Vec<StackedCount> = tally
        .into_iter()
        .map(|(value, (complete, incomplete))| StackedCount {
            value: value.to_string(),
            complete,
            incomplete,
        })
        .collect();
    out.sort_by(|a, b| {
        b.total()
            .cmp(&a.total())
            .then_with(|| a.value.cmp(&b.value))
    });
    out
}

/// First `n` entries of an already sorted list.
pub fn top_n<T>(mut entries: Vec<T>, n: usize) -> Vec<T> {
    entries.truncate(n);
    entries
}

// =============================================================================
// TIME SERIES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Grain {
    pub const ALL: [Grain; 4] = [Grain::Daily, Grain::Weekly, Grain::Monthly, Grain::Yearly];

    pub fn title(self) -> &'static str {
        match self {
            Grain::Daily => "Daily",
            Grain::Weekly => "Weekly",
            Grain::Monthly => "Monthly",
            Grain::Yearly => "Yearly",
        }
    }

    /// Bucket key for a canonical "YYYY-MM-DD" date.
    pub fn bucket(self, iso: &str) -> Option<String> {
        match self {
            Grain::Daily => Some(iso.to_string()),
            Grain::Weekly => start_of_iso_week_ymd(iso),
            Grain::Monthly => Some(month_key(iso).to_string()),
            Grain::Yearly => Some(year_key(iso).to_string()),
        }
    }
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Grain::Daily => "daily",
            Grain::Weekly => "weekly",
            Grain::Monthly => "monthly",
            Grain::Yearly => "yearly",
        })
    }
}

impl FromStr for Grain {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Grain::Daily),
            "weekly" => Ok(Grain::Weekly),
            "monthly" => Ok(Grain::Monthly),
            "yearly" => Ok(Grain::Yearly),
            other => Err(EngineError::UnknownGrain(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeries {
    pub grain: Grain,
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total(&self) -> usize {
        self.points.iter().map(|p| p.count).sum()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.count).collect()
    }

    /// "first → last • N total", or None for an empty series.
    pub fn range_summary(&self) -> Option<String> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some(format!("{} → {} • {} total", first.label, last.label, self.total()))
    }

    /// Same labels, running totals as counts.
    pub fn cumulative(&self) -> TimeSeries {
        let running = to_cumulative(&self.counts());
        TimeSeries {
            grain: self.grain,
            points: self
                .points
                .iter()
                .zip(running)
                .map(|(p, count)| SeriesPoint {
                    label: p.label.clone(),
                    count,
                })
                .collect(),
        }
    }
}

/// Count rows per date bucket. Rows whose date does not parse are skipped.
pub fn build_time_series<R: Borrow<Record>>(rows: &[R], date_field: Field, grain: Grain) -> TimeSeries {
    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    for row in rows {
        let row: &Record = row.borrow();
        let Some(iso) = normalize_to_iso_date(row.get(date_field)) else {
            continue;
        };
        if let Some(key) = grain.bucket(&iso) {
            *buckets.entry(key).or_insert(0) += 1;
        }
    }

    TimeSeries {
        grain,
        points: buckets
            .into_iter()
            .map(|(label, count)| SeriesPoint { label, count })
            .collect(),
    }
}

/// Prefix sums, same length as the input.
pub fn to_cumulative(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |acc, c| {
            *acc += c;
            Some(*acc)
        })
        .collect()
}
