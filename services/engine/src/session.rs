//! Session - owns the uploaded files and every piece of derived state
//!
//! Responsibilities:
//! - Accept batches of decoded sheets and assign each one a role
//! - Keep at most one file per role (a newer file replaces the older one)
//! - Rebuild merged rows, facets and filters when the file set changes
//! - Expose filtered rows, the preview and the dashboard snapshot
//!
//! A validation failure stops the batch at the failing file. Files already
//! committed from the same batch stay committed.

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::Grain;
use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::error::{EngineError, Result};
use crate::filters::{apply_filters, ActiveFilterSet, Facets};
use crate::headers::normalize_rows;
use crate::merge::build_merged_rows;
use crate::record::{Field, RawRow, Record};
use crate::roles::{classify, Role};

/// Files a session can hold at once.
pub const MAX_FILES: usize = 2;

/// A decoded sheet: file name plus rows keyed by header text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub rows: Vec<RawRow>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, rows: Vec<RawRow>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub severity: Severity,
    pub text: String,
}

impl StatusMessage {
    fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

/// Entry of the attached-files list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileItem {
    pub role: Role,
    pub name: String,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Rows shown in the preview table.
    pub preview_limit: usize,
    /// Responsible parties kept in the stacked RespID distribution.
    pub resp_top_n: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            preview_limit: 200,
            resp_top_n: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct LoadedFile {
    name: String,
    rows: Vec<RawRow>,
}

#[derive(Debug, Clone)]
pub struct Session {
    settings: SessionSettings,
    primary: Option<LoadedFile>,
    systems: Option<LoadedFile>,
    merged: Vec<Record>,
    facets: Facets,
    active: ActiveFilterSet,
    dashboard: Dashboard,
    status: StatusMessage,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            primary: None,
            systems: None,
            merged: Vec::new(),
            facets: Facets::default(),
            active: ActiveFilterSet::new(),
            dashboard: Dashboard::new(),
            status: StatusMessage::new(
                Severity::Info,
                "Attach a data file and a systems list.",
            ),
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    // =========================================================================
    // FILE SET
    // =========================================================================

    fn file_count(&self) -> usize {
        usize::from(self.primary.is_some()) + usize::from(self.systems.is_some())
    }

    fn has(&self, role: Role) -> bool {
        let slot = match role {
            Role::Primary => &self.primary,
            Role::Systems => &self.systems,
        };
        slot.as_ref().is_some_and(|f| !f.rows.is_empty())
    }

    fn fail(&mut self, err: EngineError) -> EngineError {
        warn!(error = %err, "batch rejected");
        self.status = StatusMessage::new(Severity::Error, err.to_string());
        err
    }

    /// Record a failure raised outside the session (e.g. a file that could
    /// not be decoded) in the status line.
    pub fn report(&mut self, err: EngineError) -> EngineError {
        self.fail(err)
    }

    /// Classify, commit and merge a batch of decoded files.
    ///
    /// Returns the number of enriched rows on success.
    pub fn ingest_batch(&mut self, files: Vec<SourceFile>) -> Result<usize> {
        let existing = self.file_count();
        if existing + files.len() > MAX_FILES {
            return Err(self.fail(EngineError::TooManyFiles {
                existing,
                incoming: files.len(),
            }));
        }

        info!(files = files.len(), "ingesting batch");
        self.status = StatusMessage::new(Severity::Info, "Parsing ...");

        for file in files {
            let rows = normalize_rows(&file.rows);
            let role = match classify(&rows) {
                Ok(role) => role,
                Err(missing) => {
                    warn!(file = %file.name, "missing columns");
                    return Err(self.fail(missing.into()));
                }
            };
            info!(file = %file.name, %role, rows = rows.len(), "role committed");
            let loaded = Some(LoadedFile {
                name: file.name,
                rows,
            });
            match role {
                Role::Primary => self.primary = loaded,
                Role::Systems => self.systems = loaded,
            }
        }

        let has_primary = self.has(Role::Primary);
        let has_systems = self.has(Role::Systems);
        if !has_primary || !has_systems {
            self.reset_derived();
            let missing = [
                (!has_primary).then_some("data file (with required columns)"),
                (!has_systems).then_some("systems list (System + Description)"),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" and ");
            return Err(self.fail(EngineError::IncompleteFileSet(missing)));
        }

        self.rebuild();
        if self.merged.is_empty() {
            self.reset_derived();
            return Err(self.fail(EngineError::NoDataAfterMerge));
        }

        self.dashboard.set_levels_enabled(true);
        let text = format!(
            "Parsed {} • {} row(s) after enrichment.",
            self.file_parts().join(" + "),
            self.merged.len()
        );
        info!(rows = self.merged.len(), "{text}");
        self.status = StatusMessage::new(Severity::Success, text);
        Ok(self.merged.len())
    }

    /// Detach the file holding `role`. Both roles are required, so derived
    /// state is cleared. Returns false when no such file was attached.
    pub fn remove(&mut self, role: Role) -> bool {
        let removed = match role {
            Role::Primary => self.primary.take(),
            Role::Systems => self.systems.take(),
        };
        let Some(removed) = removed else {
            return false;
        };
        info!(file = %removed.name, %role, "file removed");

        self.reset_derived();
        self.status = StatusMessage::new(
            Severity::Error,
            "Both files are required. Please attach a data file and a systems list.",
        );
        true
    }

    fn file_parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(f) = &self.primary {
            parts.push(format!("data: \"{}\"", f.name));
        }
        if let Some(f) = &self.systems {
            parts.push(format!("systems: \"{}\"", f.name));
        }
        parts
    }

    pub fn file_items(&self) -> Vec<FileItem> {
        [(Role::Primary, &self.primary), (Role::Systems, &self.systems)]
            .into_iter()
            .filter_map(|(role, slot)| {
                slot.as_ref().map(|f| FileItem {
                    role,
                    name: f.name.clone(),
                    label: role.label(),
                })
            })
            .collect()
    }

    fn rebuild(&mut self) {
        let merged = match (&self.primary, &self.systems) {
            (Some(primary), Some(systems)) => build_merged_rows(&primary.rows, &systems.rows),
            _ => Vec::new(),
        };
        self.facets = Facets::build(&merged);
        self.merged = merged;
        self.active.clear();
    }

    fn reset_derived(&mut self) {
        self.merged.clear();
        self.facets = Facets::default();
        self.active.clear();
        self.dashboard.set_levels_enabled(false);
    }

    // =========================================================================
    // FILTERS
    // =========================================================================

    pub fn rows(&self) -> &[Record] {
        &self.merged
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn active_filters(&self) -> &ActiveFilterSet {
        &self.active
    }

    pub fn toggle_filter(&mut self, field: Field, value: &str, checked: bool) {
        self.active.toggle(field, value, checked);
    }

    pub fn clear_filters(&mut self) {
        self.active.clear();
    }

    pub fn filtered_rows(&self) -> Vec<&Record> {
        apply_filters(&self.merged, &self.active)
    }

    /// Columns shown in the preview table.
    pub fn preview_columns(&self) -> &'static [Field] {
        &Field::FILTERABLE
    }

    /// First rows of the filtered set, capped at the preview limit.
    pub fn preview(&self) -> Vec<&Record> {
        let mut rows = self.filtered_rows();
        rows.truncate(self.settings.preview_limit);
        rows
    }

    // =========================================================================
    // DASHBOARD
    // =========================================================================

    pub fn grain(&self) -> Grain {
        self.dashboard.grain()
    }

    /// Returns false when the grain is not selectable yet.
    pub fn set_grain(&mut self, grain: Grain) -> bool {
        self.dashboard.set_grain(grain)
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let filtered = self.filtered_rows();
        self.dashboard
            .render(&filtered, self.merged.len(), self.settings.resp_top_n)
    }

    pub fn status(&self) -> &StatusMessage {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::raw;

    fn primary_file(name: &str) -> SourceFile {
        let rows = vec![
            raw(&[
                ("Status", "Open"),
                ("Resp ID", "ELEC"),
                ("Cert ID", "C-1"),
                ("Event Description", "CONSTRUCTION (CC)"),
                ("Tag No", "T-1"),
                ("System", "S1"),
                ("Sub System", "S1-01"),
                ("CertDisc", "E"),
                ("Area", "A1"),
                ("actual (utc +8)", "2024-01-02"),
            ]),
            raw(&[
                ("Status", "Closed"),
                ("Resp ID", "MECH"),
                ("Cert ID", "C-2"),
                ("Event Description", "COMMISSIONING (MC)"),
                ("Tag No", "T-2"),
                ("System", "S2"),
                ("Sub System", "S2-01"),
                ("CertDisc", "M"),
                ("Area", "A2"),
                ("actual (utc +8)", ""),
            ]),
        ];
        SourceFile::new(name, rows)
    }

    fn systems_file(name: &str) -> SourceFile {
        SourceFile::new(
            name,
            vec![
                raw(&[("System", "S1"), ("Description", "Pump")]),
                raw(&[("System", "S2"), ("Description", "Valve")]),
            ],
        )
    }

    // -------------------------------------------------------------------------
    // INGEST TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_ingest_both_files_in_any_order() {
        let mut session = Session::default();
        let n = session
            .ingest_batch(vec![systems_file("sys.xlsx"), primary_file("data.xlsx")])
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(session.status().severity, Severity::Success);
        assert_eq!(
            session.status().text,
            "Parsed data: \"data.xlsx\" + systems: \"sys.xlsx\" • 2 row(s) after enrichment."
        );
        assert_eq!(session.rows()[1].get(Field::SystemDescription), "Valve");
        assert_eq!(session.rows()[0].get(Field::RespId), "ELEC");
        assert!(session.dashboard().levels_enabled());
    }

    #[test]
    fn test_ingest_one_file_reports_incomplete_set() {
        let mut session = Session::default();
        let err = session.ingest_batch(vec![primary_file("data.xlsx")]).unwrap_err();
        assert!(matches!(err, EngineError::IncompleteFileSet(_)));
        assert_eq!(
            session.status().text,
            "Both files are required. Missing: systems list (System + Description)."
        );
        assert_eq!(session.file_items().len(), 1);

        // Second batch completes the pair.
        assert_eq!(session.ingest_batch(vec![systems_file("sys.csv")]).unwrap(), 2);
    }

    #[test]
    fn test_too_many_files() {
        let mut session = Session::default();
        session
            .ingest_batch(vec![primary_file("a.xlsx"), systems_file("b.xlsx")])
            .unwrap();
        let err = session.ingest_batch(vec![systems_file("c.xlsx")]).unwrap_err();
        assert!(matches!(err, EngineError::TooManyFiles { existing: 2, incoming: 1 }));
        assert_eq!(session.status().severity, Severity::Error);
        assert_eq!(session.rows().len(), 2);
    }

    #[test]
    fn test_partial_batch_keeps_earlier_files() {
        let mut session = Session::default();
        let bad = SourceFile::new("bad.xlsx", vec![raw(&[("Status", "Open"), ("System", "S1")])]);
        let err = session
            .ingest_batch(vec![systems_file("sys.xlsx"), bad])
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingColumns(_)));
        assert!(session.status().text.starts_with("Checklists File: Missing Columns: RespID"));

        let items = session.file_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].role, Role::Systems);
        assert_eq!(items[0].label, "Systems list");
    }

    #[test]
    fn test_failed_file_aborts_rest_of_batch() {
        let mut session = Session::default();
        let bad = SourceFile::new("bad.xlsx", vec![raw(&[("Status", "Open"), ("System", "S1")])]);
        let err = session
            .ingest_batch(vec![bad, systems_file("sys.xlsx")])
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingColumns(_)));
        assert_eq!(session.status().severity, Severity::Error);
        assert!(session.file_items().is_empty());
        assert!(session.rows().is_empty());

        // The skipped file can still be attached afterwards.
        session
            .ingest_batch(vec![systems_file("sys.xlsx"), primary_file("data.xlsx")])
            .unwrap();
        assert_eq!(session.file_items().len(), 2);
    }

    #[test]
    fn test_empty_sheet_is_rejected() {
        let mut session = Session::default();
        let mut empty = primary_file("data.xlsx");
        empty.rows.clear();
        let err = session
            .ingest_batch(vec![systems_file("sys.xlsx"), empty])
            .unwrap_err();
        // No rows means no columns: the systems requirements are the shorter list.
        assert_eq!(err.to_string(), "Missing columns: System, Description/System Description");
        assert!(session.rows().is_empty());
        assert_eq!(session.file_items().len(), 1);
    }

    // -------------------------------------------------------------------------
    // REMOVAL TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_remove_resets_derived_state() {
        let mut session = Session::default();
        session
            .ingest_batch(vec![primary_file("a.xlsx"), systems_file("b.xlsx")])
            .unwrap();
        session.toggle_filter(Field::Status, "Open", true);
        assert!(session.set_grain(Grain::Monthly));

        assert!(session.remove(Role::Systems));
        assert!(session.rows().is_empty());
        assert!(session.facets().is_empty());
        assert!(session.active_filters().is_unconstrained());
        assert_eq!(session.grain(), Grain::Daily);
        assert_eq!(
            session.status().text,
            "Both files are required. Please attach a data file and a systems list."
        );
        assert!(!session.remove(Role::Systems));
    }

    // -------------------------------------------------------------------------
    // FILTER / PREVIEW TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_filters_and_preview_limit() {
        let mut session = Session::new(SessionSettings {
            preview_limit: 1,
            resp_top_n: 5,
        });
        session
            .ingest_batch(vec![primary_file("a.xlsx"), systems_file("b.xlsx")])
            .unwrap();
        assert_eq!(session.filtered_rows().len(), 2);
        assert_eq!(session.preview().len(), 1);

        session.toggle_filter(Field::SystemDescription, "Valve", true);
        let filtered = session.filtered_rows();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].get(Field::System), "S2");

        let snap = session.snapshot();
        assert_eq!(snap.total_rows, 2);
        assert_eq!(snap.filtered_rows, 1);

        session.clear_filters();
        assert_eq!(session.filtered_rows().len(), 2);
    }

    #[test]
    fn test_reingest_resets_filters() {
        let mut session = Session::default();
        session
            .ingest_batch(vec![primary_file("a.xlsx"), systems_file("b.xlsx")])
            .unwrap();
        session.toggle_filter(Field::Area, "A1", true);
        session.remove(Role::Primary);
        session.ingest_batch(vec![primary_file("c.xlsx")]).unwrap();
        assert!(session.active_filters().is_unconstrained());
        assert_eq!(session.file_items()[0].name, "c.xlsx");
    }

    #[test]
    fn test_grain_locked_before_data() {
        let mut session = Session::default();
        assert!(!session.set_grain(Grain::Weekly));
        assert!(session.set_grain(Grain::Daily));
    }
}
