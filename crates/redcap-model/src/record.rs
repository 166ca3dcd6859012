use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::StudyEvent;

/// One flat REDCap export row: a (participant, event) pair plus whatever
/// sparse fields the export included for that event.
///
/// REDCap represents "not collected" as either an absent key or an empty
/// string; both are treated identically as "not present" by [`RawRecord::field`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub participant_id: String,
    pub event: StudyEvent,
    /// Sparse clinical fields keyed by REDCap field name.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(participant_id: impl Into<String>, event: StudyEvent) -> Self {
        Self {
            participant_id: participant_id.into(),
            event,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insert, used heavily in tests and fixtures.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a field, treating absent and empty-string identically.
    /// Never returns `Some("")`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(value) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    /// True when the field is present with a non-empty value.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn enrollment_date(&self) -> Option<&str> {
        self.field("enrollment_date")
    }

    pub fn randomization_code(&self) -> Option<&str> {
        self.field("randomization_code")
    }

    pub fn visit_date(&self) -> Option<&str> {
        self.field("visit_date")
    }

    /// Completeness marker for the visit date. A visit only "occurred" when
    /// this equals [`VISIT_DATE_FILLED`], not merely when a date is present.
    pub fn visit_date_status(&self) -> Option<&str> {
        self.field("visit_date_status")
    }

    pub fn conclusion_code(&self) -> Option<&str> {
        self.field("conclusion_code")
    }

    pub fn conclusion_date(&self) -> Option<&str> {
        self.field("conclusion_date")
    }
}

/// Sentinel value of `visit_date_status` marking the date as filled in.
pub const VISIT_DATE_FILLED: &str = "1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_absent() {
        let record = RawRecord::new("101", StudyEvent::Baseline)
            .with_field("enrollment_date", "")
            .with_field("randomization_code", "  ")
            .with_field("visit_date", "2024-03-01");
        assert_eq!(record.enrollment_date(), None);
        assert_eq!(record.randomization_code(), None);
        assert_eq!(record.visit_date(), Some("2024-03-01"));
        assert!(!record.has_field("conclusion_code"));
    }

    #[test]
    fn deserializes_flat_export_row() {
        let json = r#"{
            "participant_id": "101",
            "event": "baseline",
            "fields": {"enrollment_date": "2024-01-02", "sex": "1"}
        }"#;
        let record: RawRecord = serde_json::from_str(json).expect("deserialize record");
        assert_eq!(record.participant_id, "101");
        assert_eq!(record.event, StudyEvent::Baseline);
        assert_eq!(record.field("sex"), Some("1"));
    }
}
