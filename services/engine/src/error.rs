//! Error types for the engine.
//!
//! Every message is the exact text shown to the user in the status line.

use thiserror::Error;

use crate::roles::Role;

/// A sheet lacks columns required by the role it was assigned (or by both
/// roles when the assignment was ambiguous).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", heading(.role), .missing.join(", "))]
pub struct MissingColumnsError {
    pub role: Option<Role>,
    pub missing: Vec<String>,
}

fn heading(role: &Option<Role>) -> &'static str {
    match role {
        Some(Role::Primary) => "Checklists File: Missing Columns",
        Some(Role::Systems) => "Systems File: Missing Columns",
        None => "Missing columns",
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    MissingColumns(#[from] MissingColumnsError),

    #[error("No data rows found after enrichment.")]
    NoDataAfterMerge,

    #[error("Failed to parse '{name}': {reason}")]
    UnparseableFile { name: String, reason: String },

    #[error("Both files are required. Missing: {0}.")]
    IncompleteFileSet(String),

    #[error("Max 2 Excel files total. Provide your data file and a systems list.")]
    TooManyFiles { existing: usize, incoming: usize },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Unknown grain '{0}' (expected daily, weekly, monthly or yearly)")]
    UnknownGrain(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
