use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::StudyEvent;

/// Data-quality conditions detected while deriving state. These are surfaced
/// in reports, never silently corrected and never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataQualityIssue {
    /// Two export rows carried the same (participant, event) pair; the later
    /// row won the merge.
    DuplicateEventRecord {
        participant_id: String,
        event: StudyEvent,
    },
    /// Two distinct visit types for one participant carry the identical
    /// recorded date. Both visits are excluded from window scoring.
    SharedVisitDate {
        participant_id: String,
        events: Vec<StudyEvent>,
        date: NaiveDate,
    },
}

impl DataQualityIssue {
    pub fn participant_id(&self) -> &str {
        match self {
            DataQualityIssue::DuplicateEventRecord { participant_id, .. }
            | DataQualityIssue::SharedVisitDate { participant_id, .. } => participant_id,
        }
    }
}

impl fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityIssue::DuplicateEventRecord {
                participant_id,
                event,
            } => write!(
                f,
                "duplicate {event} record for participant {participant_id}; kept the last row"
            ),
            DataQualityIssue::SharedVisitDate {
                participant_id,
                events,
                date,
            } => {
                let labels: Vec<&str> = events.iter().map(StudyEvent::label).collect();
                write!(
                    f,
                    "participant {participant_id}: {} share the visit date {date}",
                    labels.join(" and ")
                )
            }
        }
    }
}
