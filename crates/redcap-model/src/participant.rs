use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::StudyEvent;
use crate::record::RawRecord;

/// Per-participant longitudinal state reconstructed from the flat export.
///
/// Events absent from `visits` have not yet occurred; that is the normal
/// state for participants early in the schedule, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    /// One record per non-conclusion event (last writer wins on duplicates;
    /// duplicates are reported as data-quality issues by the normalizer).
    pub visits: BTreeMap<StudyEvent, RawRecord>,
    /// The terminal conclusion record, when one exists.
    pub conclusion: Option<RawRecord>,
}

impl Participant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            visits: BTreeMap::new(),
            conclusion: None,
        }
    }

    pub fn visit(&self, event: StudyEvent) -> Option<&RawRecord> {
        self.visits.get(&event)
    }

    /// The enrollment date recorded on the baseline event.
    pub fn enrollment_date(&self) -> Option<&str> {
        self.visit(StudyEvent::Baseline)
            .and_then(RawRecord::enrollment_date)
    }

    /// The randomization code, taken from the randomization event with the
    /// baseline event as a fallback source (some instruments record it there).
    pub fn randomization_code(&self) -> Option<&str> {
        self.visit(StudyEvent::Randomization)
            .and_then(RawRecord::randomization_code)
            .or_else(|| {
                self.visit(StudyEvent::Baseline)
                    .and_then(RawRecord::randomization_code)
            })
    }

    pub fn is_randomized(&self) -> bool {
        self.randomization_code().is_some()
    }

    /// The raw conclusion code string, when a conclusion record with a
    /// non-empty code exists.
    pub fn conclusion_code(&self) -> Option<&str> {
        self.conclusion.as_ref().and_then(RawRecord::conclusion_code)
    }
}

/// Participant ids beginning with `test` (any case) are instrument-testing
/// artifacts and are excluded by callers before aggregation. The normalizer
/// itself never filters.
pub fn is_test_participant(id: &str) -> bool {
    id.trim().to_ascii_lowercase().starts_with("test")
}
