use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Study events in protocol order, replacing the raw REDCap unique event
/// name strings (`baseline_arm_1`, `visit_3_arm_1`, ...) with a closed set.
///
/// `Conclusion` is a pseudo-event holding the terminal disposition record;
/// it never appears in the visit schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyEvent {
    Baseline,
    Randomization,
    Visit3,
    Visit4,
    Visit5,
    Visit6,
    Visit7,
    Visit8,
    Visit9,
    /// Visit 10, the study-exit visit. Its timing is anchored to the
    /// randomization date rather than the preceding visit.
    FinalVisit,
    Conclusion,
}

impl StudyEvent {
    /// Schedulable events in protocol order. The conclusion pseudo-event is
    /// deliberately absent.
    pub const SCHEDULE: [StudyEvent; 10] = [
        StudyEvent::Baseline,
        StudyEvent::Randomization,
        StudyEvent::Visit3,
        StudyEvent::Visit4,
        StudyEvent::Visit5,
        StudyEvent::Visit6,
        StudyEvent::Visit7,
        StudyEvent::Visit8,
        StudyEvent::Visit9,
        StudyEvent::FinalVisit,
    ];

    /// Position in the visit schedule, or `None` for the conclusion event.
    pub fn schedule_index(&self) -> Option<usize> {
        Self::SCHEDULE.iter().position(|event| event == self)
    }

    /// The event immediately after this one in the schedule, if any.
    pub fn next_in_schedule(&self) -> Option<StudyEvent> {
        let index = self.schedule_index()?;
        Self::SCHEDULE.get(index + 1).copied()
    }

    /// The REDCap unique event name as exported by the API.
    pub fn as_redcap_name(&self) -> &'static str {
        match self {
            StudyEvent::Baseline => "baseline_arm_1",
            StudyEvent::Randomization => "randomization_arm_1",
            StudyEvent::Visit3 => "visit_3_arm_1",
            StudyEvent::Visit4 => "visit_4_arm_1",
            StudyEvent::Visit5 => "visit_5_arm_1",
            StudyEvent::Visit6 => "visit_6_arm_1",
            StudyEvent::Visit7 => "visit_7_arm_1",
            StudyEvent::Visit8 => "visit_8_arm_1",
            StudyEvent::Visit9 => "visit_9_arm_1",
            StudyEvent::FinalVisit => "visit_10_arm_1",
            StudyEvent::Conclusion => "conclusion_arm_1",
        }
    }

    /// Short label used in report tables.
    pub fn label(&self) -> &'static str {
        match self {
            StudyEvent::Baseline => "Baseline",
            StudyEvent::Randomization => "Randomization",
            StudyEvent::Visit3 => "Visit 3",
            StudyEvent::Visit4 => "Visit 4",
            StudyEvent::Visit5 => "Visit 5",
            StudyEvent::Visit6 => "Visit 6",
            StudyEvent::Visit7 => "Visit 7",
            StudyEvent::Visit8 => "Visit 8",
            StudyEvent::Visit9 => "Visit 9",
            StudyEvent::FinalVisit => "Visit 10",
            StudyEvent::Conclusion => "Conclusion",
        }
    }
}

impl fmt::Display for StudyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for StudyEvent {
    type Err = String;

    /// Parse a REDCap unique event name. Matching is case-insensitive and
    /// tolerates a missing `_arm_1` suffix, which shows up in hand-edited
    /// exports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let base = normalized.strip_suffix("_arm_1").unwrap_or(&normalized);
        match base {
            "baseline" | "enrollment" => Ok(StudyEvent::Baseline),
            "randomization" => Ok(StudyEvent::Randomization),
            "visit_3" => Ok(StudyEvent::Visit3),
            "visit_4" => Ok(StudyEvent::Visit4),
            "visit_5" => Ok(StudyEvent::Visit5),
            "visit_6" => Ok(StudyEvent::Visit6),
            "visit_7" => Ok(StudyEvent::Visit7),
            "visit_8" => Ok(StudyEvent::Visit8),
            "visit_9" => Ok(StudyEvent::Visit9),
            "visit_10" => Ok(StudyEvent::FinalVisit),
            "conclusion" => Ok(StudyEvent::Conclusion),
            _ => Err(format!("Unknown study event: {}", s)),
        }
    }
}
