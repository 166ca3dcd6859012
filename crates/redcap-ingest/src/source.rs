//! Record-source abstraction over the REDCap transport.
//!
//! The derivation engine only needs "give me the flat record list or fail
//! with an explicit error"; authentication, retries, and the wire format
//! belong to the implementation behind this trait. The shipped
//! implementation reads a flat REDCap JSON export file; a network client
//! plugs in behind the same trait.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use redcap_model::{RawRecord, StudyEvent};

use crate::error::{IngestError, Result};

/// Optional field and event allow-lists applied to a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchFilter {
    /// Field names to retain; `None` keeps everything.
    pub fields: Option<Vec<String>>,
    /// REDCap unique event names to retain; `None` keeps everything.
    pub events: Option<Vec<String>>,
}

impl FetchFilter {
    fn keeps_event(&self, event: StudyEvent) -> bool {
        match &self.events {
            Some(events) => events
                .iter()
                .any(|name| name.eq_ignore_ascii_case(event.as_redcap_name())),
            None => true,
        }
    }

    fn keeps_field(&self, name: &str) -> bool {
        match &self.fields {
            Some(fields) => fields.iter().any(|field| field.eq_ignore_ascii_case(name)),
            None => true,
        }
    }
}

/// The interface the dashboard core consumes. Implementations must be
/// idempotent and side-effect-free on shared state.
pub trait RecordSource {
    fn fetch_records(&self, filter: &FetchFilter) -> Result<Vec<RawRecord>>;
}

/// Reads a flat REDCap JSON export: an array of objects, one per
/// (participant, event), with `participant_id` and `redcap_event_name`
/// keys plus sparse clinical fields.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonFileSource {
    fn fetch_records(&self, filter: &FetchFilter) -> Result<Vec<RawRecord>> {
        let text = fs::read_to_string(&self.path)?;
        let rows: Vec<Value> = match serde_json::from_str(&text)? {
            Value::Array(rows) => rows,
            _ => return Err(IngestError::NotAnArray),
        };
        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in rows {
            match parse_export_row(&row, filter) {
                Some(Some(record)) => records.push(record),
                // Filtered out by the event allow-list.
                Some(None) => {}
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(
                path = %self.path.display(),
                skipped,
                "skipped malformed or unknown-event export rows"
            );
        }
        debug!(path = %self.path.display(), count = records.len(), "loaded records");
        Ok(records)
    }
}

/// `None` for malformed rows, `Some(None)` for rows removed by the filter.
fn parse_export_row(row: &Value, filter: &FetchFilter) -> Option<Option<RawRecord>> {
    let object = row.as_object()?;
    let participant_id = object
        .get("participant_id")
        .or_else(|| object.get("record_id"))
        .and_then(field_value)
        .unwrap_or_default();
    let event_name = object.get("redcap_event_name").and_then(field_value)?;
    let event = match StudyEvent::from_str(&event_name) {
        Ok(event) => event,
        Err(reason) => {
            debug!(%reason, "skipping export row");
            return None;
        }
    };
    if !filter.keeps_event(event) {
        return Some(None);
    }
    let mut fields = BTreeMap::new();
    for (name, value) in object {
        if name == "participant_id" || name == "record_id" || name == "redcap_event_name" {
            continue;
        }
        if !filter.keeps_field(name) {
            continue;
        }
        if let Some(text) = field_value(value) {
            fields.insert(name.clone(), text);
        }
    }
    let mut record = RawRecord::new(participant_id, event);
    record.fields = fields;
    Some(Some(record))
}

/// REDCap exports are stringly typed, but hand-built fixtures may carry
/// numbers; accept both.
fn field_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(if *flag { "1" } else { "0" }.to_string()),
        _ => None,
    }
}
