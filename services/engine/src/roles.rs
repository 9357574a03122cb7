//! Role classification: checklist data vs systems list.
//!
//! Uploaded sheets carry no explicit type. The role is decided from the
//! content first (which columns hold values) and, when that is inconclusive,
//! from which role's required columns are all present.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::MissingColumnsError;
use crate::headers::collect_seen_headers;
use crate::record::{Field, RawRow};

/// Name reported when a systems list has neither description column.
pub const DESCRIPTION_REQUIREMENT: &str = "Description/System Description";

/// Header of the description column in a systems list.
pub const DESCRIPTION: &str = "Description";

/// Fields whose presence marks a sheet as checklist data.
const PRIMARY_MARKERS: [Field; 5] = [
    Field::Status,
    Field::RespId,
    Field::CertId,
    Field::TagNo,
    Field::Actual,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Systems,
}

impl Role {
    /// Label shown in the file list.
    pub fn label(self) -> &'static str {
        match self {
            Role::Primary => "Data file",
            Role::Systems => "Systems list",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Primary => "primary",
            Role::Systems => "systems",
        })
    }
}

/// Outcome of the content heuristics, before column validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleDecision {
    Primary,
    Systems,
    Ambiguous {
        missing_primary: Vec<String>,
        missing_systems: Vec<String>,
    },
}

fn non_empty(row: &RawRow, name: &str) -> bool {
    row.get(name).is_some_and(|v| !v.trim().is_empty())
}

pub fn looks_like_primary(rows: &[RawRow]) -> bool {
    rows.iter()
        .any(|row| PRIMARY_MARKERS.iter().any(|f| non_empty(row, f.name())))
}

pub fn looks_like_systems(rows: &[RawRow]) -> bool {
    if rows.is_empty() {
        return false;
    }
    let has_system = rows.iter().any(|row| non_empty(row, Field::System.name()));
    let has_description = rows.iter().any(|row| row.contains_key(DESCRIPTION));
    has_system && has_description && !looks_like_primary(rows)
}

/// Canonical checklist columns absent from the sheet, in canonical order.
pub fn missing_primary_headers(rows: &[RawRow]) -> Vec<String> {
    let seen = collect_seen_headers(rows);
    Field::PRIMARY
        .iter()
        .filter(|f| !seen.contains(f.name()))
        .map(|f| f.name().to_string())
        .collect()
}

/// Systems-list requirements absent from the sheet.
pub fn missing_systems_headers(rows: &[RawRow]) -> Vec<String> {
    let seen = collect_seen_headers(rows);
    let mut missing = Vec::new();
    if !seen.contains(Field::System.name()) {
        missing.push(Field::System.name().to_string());
    }
    if !seen.contains(DESCRIPTION) && !seen.contains(Field::SystemDescription.name()) {
        missing.push(DESCRIPTION_REQUIREMENT.to_string());
    }
    missing
}

/// Content heuristics. Pure: no validation, no side effects.
pub fn decide_role(rows: &[RawRow]) -> RoleDecision {
    if looks_like_systems(rows) {
        return RoleDecision::Systems;
    }
    if looks_like_primary(rows) {
        return RoleDecision::Primary;
    }
    RoleDecision::Ambiguous {
        missing_primary: missing_primary_headers(rows),
        missing_systems: missing_systems_headers(rows),
    }
}

/// Decide and validate the role of one header-normalized sheet.
pub fn classify(rows: &[RawRow]) -> Result<Role, MissingColumnsError> {
    let decision = decide_role(rows);
    debug!(?decision, rows = rows.len(), "role heuristics");

    match decision {
        RoleDecision::Systems => {
            let missing = missing_systems_headers(rows);
            if missing.is_empty() {
                Ok(Role::Systems)
            } else {
                Err(MissingColumnsError { role: Some(Role::Systems), missing })
            }
        }
        RoleDecision::Primary => {
            let missing = missing_primary_headers(rows);
            if missing.is_empty() {
                Ok(Role::Primary)
            } else {
                Err(MissingColumnsError { role: Some(Role::Primary), missing })
            }
        }
        RoleDecision::Ambiguous { missing_primary, missing_systems } => {
            if missing_systems.is_empty() {
                Ok(Role::Systems)
            } else if missing_primary.is_empty() {
                Ok(Role::Primary)
            } else {
                let missing = if missing_primary.len() <= missing_systems.len() {
                    missing_primary
                } else {
                    missing_systems
                };
                Err(MissingColumnsError { role: None, missing })
            }
        }
    }
}
