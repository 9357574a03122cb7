//! Facets and multi-select filtering.
//!
//! Facets list the distinct values of each filterable field. The active filter
//! set holds the user's checkbox selections: values within one field are OR-ed,
//! fields are AND-ed, and a field with no selection does not constrain.

use std::borrow::Borrow;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::collate::natural_cmp;
use crate::record::{Field, Record};

/// Label used for the empty value in facet listings.
pub const EMPTY_LABEL: &str = "<empty>";

pub fn display_label(value: &str) -> &str {
    if value.is_empty() {
        EMPTY_LABEL
    } else {
        value
    }
}

/// Distinct observed values per filterable field, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Facets {
    fields: IndexMap<Field, IndexSet<String>>,
}

impl Facets {
    pub fn build<R: Borrow<Record>>(rows: &[R]) -> Self {
        let mut fields: IndexMap<Field, IndexSet<String>> = Field::FILTERABLE
            .iter()
            .map(|f| (*f, IndexSet::new()))
            .collect();
        for row in rows {
            let row: &Record = row.borrow();
            for (field, values) in fields.iter_mut() {
                let value = row.get(*field);
                if !values.contains(value) {
                    values.insert(value.to_string());
                }
            }
        }
        Self { fields }
    }

    pub fn values(&self, field: Field) -> Option<&IndexSet<String>> {
        self.fields.get(&field)
    }

    /// Values of one field in numeric-aware order, as listed in the filter panel.
    pub fn sorted_values(&self, field: Field) -> Vec<&str> {
        let mut values: Vec<&str> = self
            .values(field)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default();
        values.sort_by(|a, b| natural_cmp(a, b));
        values
    }

    /// Sorted values whose label contains `query`, case-insensitively.
    pub fn search(&self, field: Field, query: &str) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        self.sorted_values(field)
            .into_iter()
            .filter(|v| display_label(v).to_lowercase().contains(&needle))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &IndexSet<String>)> {
        self.fields.iter().map(|(f, v)| (*f, v))
    }

    /// True when no field has observed any value.
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(IndexSet::is_empty)
    }
}

/// The user's current selection, field -> selected values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveFilterSet {
    selections: IndexMap<Field, IndexSet<String>>,
}

impl ActiveFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the value was newly selected.
    pub fn select(&mut self, field: Field, value: impl Into<String>) -> bool {
        self.selections.entry(field).or_default().insert(value.into())
    }

    /// Returns true if the value was selected before.
    pub fn deselect(&mut self, field: Field, value: &str) -> bool {
        self.selections
            .get_mut(&field)
            .is_some_and(|set| set.shift_remove(value))
    }

    /// Checkbox semantics: `checked` selects, unchecked deselects.
    pub fn toggle(&mut self, field: Field, value: &str, checked: bool) {
        if checked {
            self.select(field, value);
        } else {
            self.deselect(field, value);
        }
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    pub fn selection(&self, field: Field) -> Option<&IndexSet<String>> {
        self.selections.get(&field).filter(|set| !set.is_empty())
    }

    pub fn is_unconstrained(&self) -> bool {
        self.selections.values().all(IndexSet::is_empty)
    }

    /// Every filterable field with its selected values (empty when none).
    pub fn snapshot(&self) -> IndexMap<Field, Vec<String>> {
        Field::FILTERABLE
            .iter()
            .map(|f| {
                let values = self
                    .selections
                    .get(f)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default();
                (*f, values)
            })
            .collect()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.selections
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .all(|(field, set)| set.contains(record.get(*field)))
    }
}

/// Rows passing every active selection, in input order.
pub fn apply_filters<'a>(rows: &'a [Record], active: &ActiveFilterSet) -> Vec<&'a Record> {
    if active.is_unconstrained() {
        return rows.iter().collect();
    }
    rows.iter().filter(|row| active.matches(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;
    use proptest::prelude::*;

    fn sample() -> Vec<Record> {
        vec![
            record(&[("Status", "Open"), ("System", "S10"), ("Area", "A1")]),
            record(&[("Status", "Closed"), ("System", "S2"), ("Area", "A1")]),
            record(&[("Status", "Open"), ("System", "S2"), ("Area", "A2")]),
            record(&[("Status", ""), ("System", "S1"), ("Area", "A2")]),
        ]
    }

    // -------------------------------------------------------------------------
    // FACET TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_facets_include_empty_value() {
        let facets = Facets::build(&sample());
        let status = facets.values(Field::Status).unwrap();
        assert_eq!(status.len(), 3);
        assert!(status.contains(""));
        // Unused filterable fields still get a facet holding "".
        assert_eq!(facets.values(Field::TagNo).unwrap().len(), 1);
    }

    #[test]
    fn test_facets_cover_every_filterable_field() {
        let facets = Facets::build(&sample());
        for field in Field::FILTERABLE {
            assert!(facets.values(field).is_some(), "no facet for {}", field);
        }
        assert!(facets.values(Field::Actual).is_none());
    }

    #[test]
    fn test_facets_sorted_numeric_aware() {
        let facets = Facets::build(&sample());
        assert_eq!(facets.sorted_values(Field::System), vec!["S1", "S2", "S10"]);
    }

    #[test]
    fn test_facet_search_matches_labels() {
        let facets = Facets::build(&sample());
        assert_eq!(facets.search(Field::Status, "OP"), vec!["Open"]);
        assert_eq!(facets.search(Field::Status, "empty"), vec![""]);
        assert_eq!(facets.search(Field::Status, "").len(), 3);
    }

    #[test]
    fn test_facets_of_no_rows() {
        assert!(Facets::build::<Record>(&[]).is_empty());
    }

    // -------------------------------------------------------------------------
    // FILTER TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_no_selection_is_identity() {
        let rows = sample();
        let out = apply_filters(&rows, &ActiveFilterSet::new());
        assert_eq!(out.len(), rows.len());
        for (a, b) in out.iter().zip(rows.iter()) {
            assert!(std::ptr::eq(*a, b));
        }
    }

    #[test]
    fn test_or_within_field() {
        let rows = sample();
        let mut active = ActiveFilterSet::new();
        active.select(Field::System, "S1");
        active.select(Field::System, "S10");
        let out = apply_filters(&rows, &active);
        let systems: Vec<_> = out.iter().map(|r| r.get(Field::System)).collect();
        assert_eq!(systems, vec!["S10", "S1"]);
    }

    #[test]
    fn test_and_across_fields() {
        let rows = sample();
        let mut active = ActiveFilterSet::new();
        active.select(Field::Status, "Open");
        active.select(Field::Area, "A2");
        let out = apply_filters(&rows, &active);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(Field::System), "S2");
    }

    #[test]
    fn test_select_empty_value() {
        let rows = sample();
        let mut active = ActiveFilterSet::new();
        active.select(Field::Status, "");
        let out = apply_filters(&rows, &active);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(Field::System), "S1");
    }

    #[test]
    fn test_toggle_off_restores_identity() {
        let rows = sample();
        let mut active = ActiveFilterSet::new();
        active.toggle(Field::Status, "Closed", true);
        assert_eq!(apply_filters(&rows, &active).len(), 1);
        active.toggle(Field::Status, "Closed", false);
        assert!(active.is_unconstrained());
        assert_eq!(apply_filters(&rows, &active).len(), rows.len());
    }

    #[test]
    fn test_snapshot_lists_every_field() {
        let mut active = ActiveFilterSet::new();
        active.select(Field::Area, "A1");
        let snap = active.snapshot();
        assert_eq!(snap.len(), Field::FILTERABLE.len());
        assert_eq!(snap[&Field::Area], vec!["A1".to_string()]);
        assert!(snap[&Field::Status].is_empty());
    }

    #[test]
    fn test_clear() {
        let mut active = ActiveFilterSet::new();
        active.select(Field::Area, "A1");
        active.clear();
        assert!(active.is_unconstrained());
        assert_eq!(active.selection(Field::Area), None);
    }

    proptest! {
        #[test]
        fn prop_filtered_rows_satisfy_every_selection(
            cells in prop::collection::vec((0u8..3, 0u8..3), 0..40),
            status_sel in prop::collection::vec(0u8..3, 0..3),
            area_sel in prop::collection::vec(0u8..3, 0..3),
        ) {
            let rows: Vec<Record> = cells
                .iter()
                .map(|(s, a)| {
                    let status = format!("st{s}");
                    let area = format!("a{a}");
                    record(&[("Status", status.as_str()), ("Area", area.as_str())])
                })
                .collect();
            let mut active = ActiveFilterSet::new();
            for s in &status_sel {
                active.select(Field::Status, format!("st{s}"));
            }
            for a in &area_sel {
                active.select(Field::Area, format!("a{a}"));
            }

            let out = apply_filters(&rows, &active);
            for row in &out {
                if let Some(sel) = active.selection(Field::Status) {
                    prop_assert!(sel.contains(row.get(Field::Status)));
                }
                if let Some(sel) = active.selection(Field::Area) {
                    prop_assert!(sel.contains(row.get(Field::Area)));
                }
            }
            let expected = rows.iter().filter(|r| active.matches(r)).count();
            prop_assert_eq!(out.len(), expected);
        }
    }
}
