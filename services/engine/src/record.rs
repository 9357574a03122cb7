//! Canonical field names and the enriched record type.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::headers;

/// One sheet row as handed over by the decoder: header text -> cell text.
pub type RawRow = IndexMap<String, String>;

/// Canonical fields known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "Status")]
    Status,
    #[serde(rename = "RespID")]
    RespId,
    #[serde(rename = "CertID")]
    CertId,
    #[serde(rename = "EventDescription")]
    EventDescription,
    #[serde(rename = "TagNo")]
    TagNo,
    #[serde(rename = "System")]
    System,
    #[serde(rename = "SubSystem")]
    SubSystem,
    #[serde(rename = "Cert Disc")]
    CertDisc,
    #[serde(rename = "Area")]
    Area,
    #[serde(rename = "Actual (UTC +8)")]
    Actual,
    #[serde(rename = "System Description")]
    SystemDescription,
}

impl Field {
    /// Columns a checklist file must expose.
    pub const PRIMARY: [Field; 10] = [
        Field::Status,
        Field::RespId,
        Field::CertId,
        Field::EventDescription,
        Field::TagNo,
        Field::System,
        Field::SubSystem,
        Field::CertDisc,
        Field::Area,
        Field::Actual,
    ];

    /// Columns offered as filter facets. The raw date column is not filterable.
    pub const FILTERABLE: [Field; 10] = [
        Field::Status,
        Field::RespId,
        Field::CertId,
        Field::EventDescription,
        Field::TagNo,
        Field::System,
        Field::SubSystem,
        Field::CertDisc,
        Field::Area,
        Field::SystemDescription,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Field::Status => "Status",
            Field::RespId => "RespID",
            Field::CertId => "CertID",
            Field::EventDescription => "EventDescription",
            Field::TagNo => "TagNo",
            Field::System => "System",
            Field::SubSystem => "SubSystem",
            Field::CertDisc => "Cert Disc",
            Field::Area => "Area",
            Field::Actual => "Actual (UTC +8)",
            Field::SystemDescription => "System Description",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = EngineError;

    /// Accepts a canonical name or any recognised header alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(field) = headers::canonical_field(s) {
            return Ok(field);
        }
        if headers::normalize_key(s) == "system description" {
            return Ok(Field::SystemDescription);
        }
        Err(EngineError::UnknownField(s.to_string()))
    }
}

/// A checklist row after the systems join.
///
/// Every canonical field is present (possibly empty). Extra columns from the
/// source sheet are kept under their original header text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    /// Build an enriched record from a header-normalized primary row.
    pub fn new(row: RawRow, system_description: impl Into<String>) -> Self {
        let mut fields = row;
        for field in Field::PRIMARY {
            fields.entry(field.name().to_string()).or_default();
        }
        fields.insert(
            Field::SystemDescription.name().to_string(),
            system_description.into(),
        );
        Self { fields }
    }

    /// Value of a canonical field, "" when absent.
    pub fn get(&self, field: Field) -> &str {
        self.value(field.name())
    }

    /// Value under an arbitrary header, "" when absent.
    pub fn value(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Row with the given cells; keys are used verbatim.
    pub(crate) fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Enriched record; a "System Description" pair sets the joined value.
    pub(crate) fn record(pairs: &[(&str, &str)]) -> Record {
        let desc = pairs
            .iter()
            .find(|(k, _)| *k == Field::SystemDescription.name())
            .map(|(_, v)| v.to_string())
            .unwrap_or_default();
        let row = pairs
            .iter()
            .filter(|(k, _)| *k != Field::SystemDescription.name())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Record::new(row, desc)
    }
}
