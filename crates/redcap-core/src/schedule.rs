//! Visit schedule engine: classify each participant's position in the fixed
//! visit schedule.
//!
//! This is a pure function re-evaluated on every read; transitions are never
//! stored. A conclusion record with a non-empty code dominates every other
//! rule. Date parse failures degrade the date-dependent branch to a generic
//! "due for <next visit>" status, never an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use redcap_model::{
    ConclusionCode, DUE_TOLERANCE_DAYS, FINAL_VISIT_ANCHOR_OFFSET_DAYS, OVERDUE_GRACE_DAYS,
    Participant, RANDOMIZATION_FLAG_DAYS, RawRecord, StudyEvent, expected_interval_days,
};

use crate::dates::{days_between, parse_calendar_date};

/// Where a participant currently stands in the visit schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisitState {
    NotEnrolled,
    AwaitingBaseline,
    PendingRandomization,
    /// Next visit expected but not yet due.
    Active,
    /// Within the due tolerance of the expected interval.
    Due,
    /// Past the due tolerance.
    Late,
    /// Past the due tolerance plus the overdue grace period.
    Overdue,
    /// The final schedule entry is complete.
    StudyComplete,
    /// A conclusion record with a non-empty code exists.
    Concluded,
}

/// Classification result: the state, the visit it refers to, and a display
/// string ready for the status column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitStatus {
    pub state: VisitState,
    pub next_visit: Option<StudyEvent>,
    pub display: String,
}

impl VisitStatus {
    fn terminal(state: VisitState, display: impl Into<String>) -> Self {
        Self {
            state,
            next_visit: None,
            display: display.into(),
        }
    }

    fn expecting(state: VisitState, next_visit: StudyEvent, display: impl Into<String>) -> Self {
        Self {
            state,
            next_visit: Some(next_visit),
            display: display.into(),
        }
    }
}

/// The last event in schedule order with a non-empty visit date. Scans the
/// whole schedule and keeps the last qualifying entry, so an unexpected
/// later completion overrides an earlier gap. An enrollment date alone does
/// not complete the baseline visit.
pub fn last_completed_visit(participant: &Participant) -> Option<(StudyEvent, &str)> {
    let mut last = None;
    for event in StudyEvent::SCHEDULE {
        if let Some(record) = participant.visit(event)
            && let Some(date) = record.visit_date()
        {
            last = Some((event, date));
        }
    }
    last
}

/// Classify a participant's schedule position as of `today`.
pub fn classify(participant: &Participant, today: NaiveDate) -> VisitStatus {
    // Rule 1: a recorded conclusion dominates everything else.
    if let Some(code) = ConclusionCode::from_code(participant.conclusion_code()) {
        return VisitStatus::terminal(VisitState::Concluded, format!("Concluded: {code}"));
    }

    // Rule 2: no enrollment date means screening never finished.
    let Some(enrollment_date) = participant.enrollment_date() else {
        return VisitStatus::terminal(VisitState::NotEnrolled, "Not enrolled");
    };

    // Rules 3-4: locate the last completed visit.
    let Some((last_visit, last_date)) = last_completed_visit(participant) else {
        return VisitStatus::expecting(
            VisitState::AwaitingBaseline,
            StudyEvent::Baseline,
            "Awaiting baseline visit",
        );
    };

    // Rule 5: baseline done but not yet randomized.
    if last_visit == StudyEvent::Baseline && !participant.is_randomized() {
        let display = match parse_calendar_date(enrollment_date) {
            Some(baseline) => {
                let elapsed = days_between(baseline, today);
                if elapsed > RANDOMIZATION_FLAG_DAYS {
                    format!("Pending randomization ({elapsed} days since baseline)")
                } else {
                    "Pending randomization".to_string()
                }
            }
            None => "Pending randomization".to_string(),
        };
        return VisitStatus::expecting(
            VisitState::PendingRandomization,
            StudyEvent::Randomization,
            display,
        );
    }

    // Rule 6: past the final schedule entry.
    let Some(next_visit) = last_visit.next_in_schedule() else {
        let display = match parse_calendar_date(last_date) {
            Some(date) => format!(
                "Study complete ({} days since {})",
                days_between(date, today),
                last_visit
            ),
            None => "Study complete".to_string(),
        };
        return VisitStatus::terminal(VisitState::StudyComplete, display);
    };

    // Rule 7: pick the reference date and expected interval. The final visit
    // is anchored to the randomization date, overriding the interval table.
    let (reference, expected, tolerance) = if next_visit == StudyEvent::FinalVisit {
        let anchor = participant
            .visit(StudyEvent::Randomization)
            .and_then(RawRecord::visit_date);
        (
            anchor,
            FINAL_VISIT_ANCHOR_OFFSET_DAYS,
            redcap_model::FINAL_VISIT_TOLERANCE_DAYS,
        )
    } else {
        let Some(expected) = expected_interval_days(next_visit) else {
            debug!(%next_visit, "no interval entry for next visit");
            return fallback_active(next_visit);
        };
        (Some(last_date), expected, DUE_TOLERANCE_DAYS)
    };

    let Some(reference_date) = reference.and_then(parse_calendar_date) else {
        debug!(
            participant_id = %participant.id,
            %next_visit,
            "reference date missing or unparseable, using generic active status"
        );
        return fallback_active(next_visit);
    };

    // Rule 8: band the elapsed days against the expected interval.
    let elapsed = days_between(reference_date, today);
    if elapsed < expected {
        let remaining = expected - elapsed;
        return VisitStatus::expecting(
            VisitState::Active,
            next_visit,
            format!("Active: {next_visit} due in {remaining} days"),
        );
    }
    let over = elapsed - expected;
    if over <= tolerance {
        VisitStatus::expecting(VisitState::Due, next_visit, format!("Due for {next_visit}"))
    } else if over <= tolerance + OVERDUE_GRACE_DAYS {
        VisitStatus::expecting(
            VisitState::Late,
            next_visit,
            format!("Late for {next_visit} ({over} days past expected)"),
        )
    } else {
        VisitStatus::expecting(
            VisitState::Overdue,
            next_visit,
            format!("Overdue for {next_visit} ({over} days past expected)"),
        )
    }
}

fn fallback_active(next_visit: StudyEvent) -> VisitStatus {
    VisitStatus::expecting(
        VisitState::Active,
        next_visit,
        format!("Active: due for {next_visit}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use redcap_model::VISIT_DATE_FILLED;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn baseline(enrollment: &str) -> RawRecord {
        RawRecord::new("101", StudyEvent::Baseline)
            .with_field("enrollment_date", enrollment)
            .with_field("visit_date", enrollment)
    }

    fn visit(event: StudyEvent, visit_date: &str) -> RawRecord {
        RawRecord::new("101", event)
            .with_field("visit_date", visit_date)
            .with_field("visit_date_status", VISIT_DATE_FILLED)
    }

    fn participant_with(records: Vec<RawRecord>) -> Participant {
        let mut participant = Participant::new("101");
        for record in records {
            if record.event == StudyEvent::Conclusion {
                participant.conclusion = Some(record);
            } else {
                participant.visits.insert(record.event, record);
            }
        }
        participant
    }

    #[test]
    fn conclusion_dominates_everything() {
        let participant = participant_with(vec![
            baseline("2024-01-02"),
            visit(StudyEvent::Randomization, "2024-01-16"),
            RawRecord::new("101", StudyEvent::Conclusion).with_field("conclusion_code", "3"),
        ]);
        let status = classify(&participant, date(2024, 2, 1));
        assert_eq!(status.state, VisitState::Concluded);
        assert_eq!(status.display, "Concluded: Withdrew");
    }

    #[test]
    fn empty_conclusion_code_is_not_terminal() {
        let mut participant = participant_with(vec![baseline("2024-01-02")]);
        participant.conclusion =
            Some(RawRecord::new("101", StudyEvent::Conclusion).with_field("conclusion_code", ""));
        let status = classify(&participant, date(2024, 1, 5));
        assert_ne!(status.state, VisitState::Concluded);
    }

    #[test]
    fn no_enrollment_date_is_not_enrolled() {
        let participant = participant_with(vec![RawRecord::new("101", StudyEvent::Baseline)]);
        assert_eq!(
            classify(&participant, date(2024, 1, 1)).state,
            VisitState::NotEnrolled
        );
    }

    #[test]
    fn enrolled_with_no_visits_awaits_baseline() {
        // Enrollment date present but no visit date anywhere.
        let participant = participant_with(vec![
            RawRecord::new("101", StudyEvent::Baseline).with_field("enrollment_date", "2024-01-02"),
        ]);
        let status = classify(&participant, date(2024, 1, 3));
        assert_eq!(status.state, VisitState::AwaitingBaseline);
        assert_eq!(status.next_visit, Some(StudyEvent::Baseline));
    }

    #[test]
    fn pending_randomization_annotates_slow_participants() {
        let participant = participant_with(vec![baseline("2024-01-02")]);
        let on_time = classify(&participant, date(2024, 1, 10));
        assert_eq!(on_time.state, VisitState::PendingRandomization);
        assert_eq!(on_time.display, "Pending randomization");

        let slow = classify(&participant, date(2024, 1, 30));
        assert_eq!(slow.state, VisitState::PendingRandomization);
        assert_eq!(
            slow.display,
            "Pending randomization (28 days since baseline)"
        );
    }

    #[test]
    fn later_completion_overrides_earlier_gap() {
        // Visit4 skipped, Visit5 completed: last completed is Visit5.
        let participant = participant_with(vec![
            baseline("2024-01-02"),
            visit(StudyEvent::Randomization, "2024-01-16").with_field("randomization_code", "A1"),
            visit(StudyEvent::Visit3, "2024-01-30"),
            visit(StudyEvent::Visit5, "2024-03-12"),
        ]);
        let (last, _) = last_completed_visit(&participant).expect("last visit");
        assert_eq!(last, StudyEvent::Visit5);
        let status = classify(&participant, date(2024, 3, 13));
        assert_eq!(status.next_visit, Some(StudyEvent::Visit6));
    }

    #[test]
    fn timing_bands_for_ordinary_visit() {
        // Randomization on 2024-01-16; Visit3 expected 14 days later (01-30).
        let participant = participant_with(vec![
            baseline("2024-01-02"),
            visit(StudyEvent::Randomization, "2024-01-16").with_field("randomization_code", "A1"),
        ]);
        let active = classify(&participant, date(2024, 1, 20));
        assert_eq!(active.state, VisitState::Active);
        assert_eq!(active.display, "Active: Visit 3 due in 10 days");

        let due = classify(&participant, date(2024, 2, 2));
        assert_eq!(due.state, VisitState::Due);

        // 7-day tolerance ends 02-06; late until tolerance + 21 grace (02-27).
        let late = classify(&participant, date(2024, 2, 10));
        assert_eq!(late.state, VisitState::Late);

        let overdue = classify(&participant, date(2024, 3, 1));
        assert_eq!(overdue.state, VisitState::Overdue);
    }

    #[test]
    fn final_visit_is_anchored_to_randomization() {
        // Visit9 completed recently, but the final visit is timed from the
        // randomization date: 2024-01-16 + 365 = 2025-01-15.
        let participant = participant_with(vec![
            baseline("2024-01-02"),
            visit(StudyEvent::Randomization, "2024-01-16").with_field("randomization_code", "A1"),
            visit(StudyEvent::Visit3, "2024-01-30"),
            visit(StudyEvent::Visit4, "2024-02-13"),
            visit(StudyEvent::Visit5, "2024-03-12"),
            visit(StudyEvent::Visit6, "2024-04-09"),
            visit(StudyEvent::Visit7, "2024-06-04"),
            visit(StudyEvent::Visit8, "2024-07-30"),
            visit(StudyEvent::Visit9, "2024-10-22"),
        ]);
        let early = classify(&participant, date(2024, 11, 1));
        assert_eq!(early.state, VisitState::Active);
        assert_eq!(early.next_visit, Some(StudyEvent::FinalVisit));

        // 365 days elapsed on 2025-01-15 (leap year): within the 21-day band.
        let due = classify(&participant, date(2025, 1, 20));
        assert_eq!(due.state, VisitState::Due);

        let late = classify(&participant, date(2025, 2, 14));
        assert_eq!(late.state, VisitState::Late);
    }

    #[test]
    fn study_complete_after_final_visit() {
        let mut records = vec![
            baseline("2024-01-02"),
            visit(StudyEvent::Randomization, "2024-01-16").with_field("randomization_code", "A1"),
        ];
        for event in [
            StudyEvent::Visit3,
            StudyEvent::Visit4,
            StudyEvent::Visit5,
            StudyEvent::Visit6,
            StudyEvent::Visit7,
            StudyEvent::Visit8,
            StudyEvent::Visit9,
        ] {
            records.push(visit(event, "2024-06-01"));
        }
        records.push(visit(StudyEvent::FinalVisit, "2025-01-14"));
        let participant = participant_with(records);
        let status = classify(&participant, date(2025, 1, 24));
        assert_eq!(status.state, VisitState::StudyComplete);
        assert_eq!(status.display, "Study complete (10 days since Visit 10)");
    }

    #[test]
    fn unparseable_reference_date_degrades_to_active() {
        let participant = participant_with(vec![
            baseline("2024-01-02"),
            visit(StudyEvent::Randomization, "sometime in January")
                .with_field("randomization_code", "A1"),
        ]);
        let status = classify(&participant, date(2024, 6, 1));
        assert_eq!(status.state, VisitState::Active);
        assert_eq!(status.display, "Active: due for Visit 3");
    }
}
