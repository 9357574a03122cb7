//! Left join of checklist rows with the systems list.

use indexmap::IndexMap;
use tracing::debug;

use crate::record::{Field, RawRow, Record};
use crate::roles::DESCRIPTION;

/// System code -> description, first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemIndex {
    entries: IndexMap<String, String>,
}

impl SystemIndex {
    pub fn from_rows(systems_rows: &[RawRow]) -> Self {
        let mut entries = IndexMap::new();
        for row in systems_rows {
            let system = row
                .get(Field::System.name())
                .map(|s| s.trim())
                .unwrap_or("");
            if system.is_empty() {
                continue;
            }
            // "System Description" only stands in when the Description key is absent.
            let description = row
                .get(DESCRIPTION)
                .or_else(|| row.get(Field::SystemDescription.name()))
                .map(|s| s.trim())
                .unwrap_or("");
            entries
                .entry(system.to_string())
                .or_insert_with(|| description.to_string());
        }
        Self { entries }
    }

    /// Description for a system code; the code is trimmed before lookup.
    pub fn lookup(&self, system: &str) -> Option<&str> {
        self.entries.get(system.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Enrich every primary row with "System Description".
///
/// One output record per input row, same order. Unmatched or blank systems
/// get an empty description.
pub fn build_merged_rows(primary_rows: &[RawRow], systems_rows: &[RawRow]) -> Vec<Record> {
    let index = SystemIndex::from_rows(systems_rows);
    debug!(systems = index.len(), rows = primary_rows.len(), "merging rows");

    primary_rows
        .iter()
        .map(|row| {
            let system = row
                .get(Field::System.name())
                .map(|s| s.trim())
                .unwrap_or("");
            let description = if system.is_empty() {
                ""
            } else {
                index.lookup(system).unwrap_or("")
            };
            Record::new(row.clone(), description)
        })
        .collect()
}
