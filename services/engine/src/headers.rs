//! Header normalization: raw column titles -> canonical field names.
//!
//! Matching is explicit (a fixed alias table), never inferred. Unknown headers
//! are kept verbatim so extra columns survive the merge.

use indexmap::IndexSet;

use crate::record::{Field, RawRow};

/// Number of leading rows inspected when collecting headers.
pub const SAMPLE_SIZE: usize = 50;

/// Lower-case, trim, and collapse internal whitespace to single spaces.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolve a raw header to a canonical primary field.
pub fn canonical_field(raw: &str) -> Option<Field> {
    let field = match normalize_key(raw).as_str() {
        "status" => Field::Status,
        "resp id" | "respid" => Field::RespId,
        "cert id" | "certid" => Field::CertId,
        "event description" | "eventdescription" => Field::EventDescription,
        "tag no" | "tagno" => Field::TagNo,
        "system" => Field::System,
        "subsystem" | "sub system" => Field::SubSystem,
        "cert disc" | "certdisc" => Field::CertDisc,
        "area" => Field::Area,
        "actual (utc +8)" => Field::Actual,
        _ => return None,
    };
    Some(field)
}

/// Rename recognised headers and trim every cell value.
pub fn normalize_row(raw: &RawRow) -> RawRow {
    let mut out = RawRow::with_capacity(raw.len());
    for (header, value) in raw {
        let key = match canonical_field(header) {
            Some(field) => field.name().to_string(),
            None => header.clone(),
        };
        out.insert(key, value.trim().to_string());
    }
    out
}

pub fn normalize_rows(rows: &[RawRow]) -> Vec<RawRow> {
    rows.iter().map(normalize_row).collect()
}

/// Union of header keys across the first [`SAMPLE_SIZE`] rows.
///
/// Decoders may omit keys for blank trailing cells, so a single row is not
/// enough to know which columns a sheet exposes.
pub fn collect_seen_headers(rows: &[RawRow]) -> IndexSet<&str> {
    rows.iter()
        .take(SAMPLE_SIZE)
        .flat_map(|row| row.keys().map(String::as_str))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::raw;

    // -------------------------------------------------------------------------
    // KEY NORMALIZATION TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_normalize_key_collapses_whitespace() {
        assert_eq!(normalize_key("  Resp \t  ID "), "resp id");
        assert_eq!(normalize_key("Actual (UTC   +8)"), "actual (utc +8)");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_canonical_field_aliases() {
        assert_eq!(canonical_field("STATUS"), Some(Field::Status));
        assert_eq!(canonical_field("RespID"), Some(Field::RespId));
        assert_eq!(canonical_field("Cert  ID"), Some(Field::CertId));
        assert_eq!(canonical_field("Event Description"), Some(Field::EventDescription));
        assert_eq!(canonical_field("tagno"), Some(Field::TagNo));
        assert_eq!(canonical_field("Sub System"), Some(Field::SubSystem));
        assert_eq!(canonical_field("CertDisc"), Some(Field::CertDisc));
        assert_eq!(canonical_field(" area "), Some(Field::Area));
        assert_eq!(canonical_field("Actual (UTC +8)"), Some(Field::Actual));
    }

    #[test]
    fn test_canonical_field_unknown() {
        assert_eq!(canonical_field("Description"), None);
        assert_eq!(canonical_field("Actual"), None);
        assert_eq!(canonical_field("Total Sheets"), None);
    }

    // -------------------------------------------------------------------------
    // ROW NORMALIZATION TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_normalize_row_maps_and_trims() {
        let row = raw(&[("resp id", " ELEC "), ("Tag No", "T-1"), ("Remarks", "  keep me ")]);
        let out = normalize_row(&row);
        assert_eq!(out.get("RespID").map(String::as_str), Some("ELEC"));
        assert_eq!(out.get("TagNo").map(String::as_str), Some("T-1"));
        assert_eq!(out.get("Remarks").map(String::as_str), Some("keep me"));
        assert!(!out.contains_key("resp id"));
    }

    #[test]
    fn test_normalize_row_preserves_column_order() {
        let row = raw(&[("Area", "A1"), ("Extra", "x"), ("status", "Open")]);
        let keys: Vec<_> = normalize_row(&row).into_keys().collect();
        assert_eq!(keys, vec!["Area", "Extra", "Status"]);
    }

    #[test]
    fn test_collect_seen_headers_unions_sparse_rows() {
        let rows = vec![raw(&[("System", "S1")]), raw(&[("Description", "Pump")])];
        let seen = collect_seen_headers(&rows);
        assert!(seen.contains("System"));
        assert!(seen.contains("Description"));
    }

    #[test]
    fn test_collect_seen_headers_only_samples_leading_rows() {
        let mut rows: Vec<RawRow> = (0..SAMPLE_SIZE).map(|_| raw(&[("System", "S")])).collect();
        rows.push(raw(&[("Late", "x")]));
        assert!(!collect_seen_headers(&rows).contains("Late"));
    }
}
