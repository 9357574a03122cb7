//! Systems completion matrix.
//!
//! One row per system with event counts, completed sheets, expected sheets
//! and percent complete. Rows are ordered by system code, numeric-aware.

use std::borrow::Borrow;
use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::aggregate::has_actual;
use crate::collate::natural_cmp;
use crate::headers::normalize_key;
use crate::record::{Field, Record};

/// Event columns that always lead the matrix, in this order.
pub const EVENT_PRIORITY: [&str; 3] = [
    "CONSTRUCTION (CC)",
    "PRE-COMMISSIONING (MC)",
    "COMMISSIONING (MC)",
];

/// Header spellings accepted for the expected sheet count, after lowercasing
/// and removing spaces and underscores.
const TOTAL_SHEETS_KEYS: [&str; 3] = ["totalsheets", "sheetstotal", "sheets"];

/// Distinct non-empty event descriptions: priority values first, then the
/// rest in lexical order.
pub fn ordered_event_descriptions<R: Borrow<Record>>(rows: &[R]) -> Vec<String> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    for row in rows {
        let row: &Record = row.borrow();
        let event = row.get(Field::EventDescription).trim();
        if !event.is_empty() {
            seen.insert(event);
        }
    }

    let rank = |e: &str| EVENT_PRIORITY.iter().position(|p| *p == e);
    let mut events: Vec<&str> = seen.into_iter().collect();
    events.sort_by(|a, b| match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    events.into_iter().map(str::to_string).collect()
}

fn is_total_sheets_header(header: &str) -> bool {
    let compact: String = normalize_key(header)
        .chars()
        .filter(|c| *c != ' ' && *c != '_')
        .collect();
    TOTAL_SHEETS_KEYS.contains(&compact.as_str())
}

fn parse_sheet_count(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != ' ').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n > 0.0)
}

/// Largest positive "total sheets" value in the group, else the row count.
pub fn infer_total_sheets(group: &[&Record]) -> f64 {
    let best = group
        .iter()
        .flat_map(|row| row.iter())
        .filter(|(header, _)| is_total_sheets_header(header))
        .filter_map(|(_, value)| parse_sheet_count(value))
        .fold(None, |best: Option<f64>, n| Some(best.map_or(n, |b| b.max(n))));
    best.unwrap_or(group.len() as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRecord {
    pub system: String,
    pub description: String,
    pub counts: IndexMap<String, usize>,
    pub actual_count: usize,
    pub total_sheets: f64,
    pub percent_complete: f64,
}

impl MatrixRecord {
    /// Rounded percentage, e.g. "50%".
    pub fn percent_label(&self) -> String {
        if self.percent_complete.is_finite() {
            format!("{}%", self.percent_complete.round())
        } else {
            "0%".to_string()
        }
    }

    pub fn count(&self, event: &str) -> usize {
        self.counts.get(event).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixTable {
    pub events: Vec<String>,
    pub records: Vec<MatrixRecord>,
}

impl MatrixTable {
    /// System, Description, one column per event, then the completion columns.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec!["System".to_string(), "Description".to_string()];
        headers.extend(self.events.iter().cloned());
        headers.extend(
            ["Actual Count", "Total Sheets", "% Complete"]
                .iter()
                .map(|h| h.to_string()),
        );
        headers
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn build_completion_matrix<R: Borrow<Record>>(rows: &[R]) -> MatrixTable {
    let events = ordered_event_descriptions(rows);

    let mut by_system: IndexMap<&str, Vec<&Record>> = IndexMap::new();
    for row in rows {
        let row: &Record = row.borrow();
        let system = row.get(Field::System).trim();
        if system.is_empty() {
            continue;
        }
        by_system.entry(system).or_default().push(row);
    }

    let mut records: Vec<MatrixRecord> = by_system
        .into_iter()
        .map(|(system, group)| {
            let description = group
                .iter()
                .map(|r| r.get(Field::SystemDescription).trim())
                .find(|d| !d.is_empty())
                .unwrap_or("")
                .to_string();

            let mut counts: IndexMap<String, usize> =
                events.iter().map(|e| (e.clone(), 0)).collect();
            for row in &group {
                if let Some(count) = counts.get_mut(row.get(Field::EventDescription).trim()) {
                    *count += 1;
                }
            }

            let actual_count = group.iter().filter(|r| has_actual(r)).count();
            let total_sheets = infer_total_sheets(&group);
            let percent_complete = if total_sheets > 0.0 {
                actual_count as f64 / total_sheets * 100.0
            } else {
                0.0
            };

            MatrixRecord {
                system: system.to_string(),
                description,
                counts,
                actual_count,
                total_sheets,
                percent_complete,
            }
        })
        .collect();
    records.sort_by(|a, b| natural_cmp(&a.system, &b.system));

    MatrixTable { events, records }
}
