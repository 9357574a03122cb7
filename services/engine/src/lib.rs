//! Engine - Normalizes, merges and aggregates checklist extracts
//!
//! Responsibilities:
//! - Normalize raw headers and heterogeneous date cells
//! - Decide which uploaded sheet is the checklist data and which the systems list
//! - Left-join checklist rows with system descriptions
//! - Build filter facets and evaluate multi-select filters
//! - Compute distributions, time series and the systems completion matrix
//!
//! CRITICAL: every stage is DETERMINISTIC
//! Same rows + same filters + same grain = same aggregates

pub mod aggregate;
pub mod collate;
pub mod dashboard;
pub mod date;
pub mod error;
pub mod filters;
pub mod headers;
pub mod matrix;
pub mod merge;
pub mod record;
pub mod roles;
pub mod session;

pub use aggregate::{CategoryCount, Grain, SeriesPoint, StackedCount, TimeSeries};
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use error::{EngineError, MissingColumnsError};
pub use filters::{ActiveFilterSet, Facets};
pub use matrix::{MatrixRecord, MatrixTable};
pub use record::{Field, RawRow, Record};
pub use roles::{Role, RoleDecision};
pub use session::{FileItem, Session, SessionSettings, Severity, SourceFile, StatusMessage};
