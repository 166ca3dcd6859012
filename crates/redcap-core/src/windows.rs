//! Protocol window validation: classify recorded visit dates against the
//! tolerance windows anchored to the randomization date.
//!
//! Only participants with a completed, filled-in randomization visit are
//! evaluated; windows are meaningless without an anchor, so everyone else is
//! skipped rather than reported.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use redcap_model::{
    DataQualityIssue, Participant, RawRecord, StudyEvent, VISIT_DATE_FILLED, protocol_window,
    windowed_events,
};

use crate::dates::{days_between, parse_calendar_date};

/// Direction of an out-of-window visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationKind {
    Early,
    Late,
}

/// A recorded visit date outside its protocol tolerance window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDeviation {
    pub participant_id: String,
    pub visit: StudyEvent,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub actual: NaiveDate,
    pub kind: DeviationKind,
    /// Whole days outside the window, always positive.
    pub magnitude_days: i64,
}

/// Classification of a visit that has not occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissedKind {
    /// The window has not closed yet.
    Pending,
    /// The window closed, or a later visit already occurred.
    Missed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissedVisit {
    pub participant_id: String,
    pub visit: StudyEvent,
    pub deadline: NaiveDate,
    pub kind: MissedKind,
}

/// Window evaluation across a participant set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub deviations: Vec<WindowDeviation>,
    pub missed: Vec<MissedVisit>,
    pub issues: Vec<DataQualityIssue>,
    /// Participants skipped for lack of a filled-in randomization anchor.
    pub skipped_no_anchor: usize,
}

/// The randomization anchor date, present only when the randomization visit
/// date is both filled in and parseable.
pub fn anchor_date(participant: &Participant) -> Option<NaiveDate> {
    let record = participant.visit(StudyEvent::Randomization)?;
    filled_visit_date(record)
}

/// A visit date counts as actually occurred only when the completeness flag
/// carries the filled-in sentinel, not merely when a date is present.
fn filled_visit_date(record: &RawRecord) -> Option<NaiveDate> {
    if record.visit_date_status() != Some(VISIT_DATE_FILLED) {
        return None;
    }
    parse_calendar_date(record.visit_date()?)
}

/// Occurred visits for the windowed schedule, split by the shared-date guard.
/// Visits caught sharing one recorded date still count as occurred, but their
/// dates are untrustworthy, so they are flagged as data-quality issues and
/// kept out of deviation scoring.
#[derive(Debug, Default)]
struct OccurredVisits {
    /// Visits with a trustworthy, unique recorded date.
    dated: BTreeMap<StudyEvent, NaiveDate>,
    /// Visits excluded by the shared-date guard.
    shared: BTreeSet<StudyEvent>,
}

impl OccurredVisits {
    fn contains(&self, event: StudyEvent) -> bool {
        self.dated.contains_key(&event) || self.shared.contains(&event)
    }

    fn last_index(&self) -> Option<usize> {
        self.dated
            .keys()
            .chain(self.shared.iter())
            .filter_map(StudyEvent::schedule_index)
            .max()
    }
}

fn occurred_visits(
    participant: &Participant,
    issues: &mut Vec<DataQualityIssue>,
) -> OccurredVisits {
    let mut occurred = OccurredVisits::default();
    for event in windowed_events() {
        if let Some(record) = participant.visit(event)
            && let Some(date) = filled_visit_date(record)
        {
            occurred.dated.insert(event, date);
        }
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<StudyEvent>> = BTreeMap::new();
    for (event, date) in &occurred.dated {
        by_date.entry(*date).or_default().push(*event);
    }
    for (date, events) in by_date {
        if events.len() > 1 {
            debug!(participant_id = %participant.id, %date, "visits share one recorded date");
            for event in &events {
                occurred.dated.remove(event);
                occurred.shared.insert(*event);
            }
            issues.push(DataQualityIssue::SharedVisitDate {
                participant_id: participant.id.clone(),
                events,
                date,
            });
        }
    }
    occurred
}

/// Early/late deviations for one participant. Empty when the participant has
/// no randomization anchor.
pub fn find_window_deviations(
    participant: &Participant,
    issues: &mut Vec<DataQualityIssue>,
) -> Vec<WindowDeviation> {
    let Some(anchor) = anchor_date(participant) else {
        return Vec::new();
    };
    let occurred = occurred_visits(participant, issues);
    let mut deviations = Vec::new();
    for (event, actual) in occurred.dated {
        let Some((start_days, end_days)) = protocol_window(event) else {
            continue;
        };
        let Some((window_start, window_end)) = offset_window(anchor, start_days, end_days) else {
            continue;
        };
        if actual < window_start {
            deviations.push(WindowDeviation {
                participant_id: participant.id.clone(),
                visit: event,
                window_start,
                window_end,
                actual,
                kind: DeviationKind::Early,
                magnitude_days: days_between(actual, window_start),
            });
        } else if actual > window_end {
            deviations.push(WindowDeviation {
                participant_id: participant.id.clone(),
                visit: event,
                window_start,
                window_end,
                actual,
                kind: DeviationKind::Late,
                magnitude_days: days_between(window_end, actual),
            });
        }
        // In-window visits are on protocol and not reported.
    }
    deviations
}

/// Pending/missed classification for visits that have not occurred. A
/// completed later visit in the schedule proves a skipped one will never be
/// filled in, so it is missed regardless of the window math.
pub fn find_missed_visits(participant: &Participant, today: NaiveDate) -> Vec<MissedVisit> {
    let Some(anchor) = anchor_date(participant) else {
        return Vec::new();
    };
    // Skip participants who already concluded; their remaining visits are
    // expected to be absent.
    if participant.conclusion_code().is_some() {
        return Vec::new();
    }
    let mut issues = Vec::new();
    let occurred = occurred_visits(participant, &mut issues);
    let last_occurred_index = occurred.last_index();
    let mut missed = Vec::new();
    for event in windowed_events() {
        if occurred.contains(event) {
            continue;
        }
        let Some((start_days, end_days)) = protocol_window(event) else {
            continue;
        };
        let Some((_, deadline)) = offset_window(anchor, start_days, end_days) else {
            continue;
        };
        let later_visit_occurred = matches!(
            (event.schedule_index(), last_occurred_index),
            (Some(index), Some(last)) if last > index
        );
        let kind = if later_visit_occurred || today > deadline {
            MissedKind::Missed
        } else {
            MissedKind::Pending
        };
        missed.push(MissedVisit {
            participant_id: participant.id.clone(),
            visit: event,
            deadline,
            kind,
        });
    }
    missed
}

/// Evaluate windows across every participant with an anchor.
pub fn evaluate_windows<'a>(
    participants: impl IntoIterator<Item = &'a Participant>,
    today: NaiveDate,
) -> WindowReport {
    let mut report = WindowReport::default();
    for participant in participants {
        if anchor_date(participant).is_none() {
            report.skipped_no_anchor += 1;
            continue;
        }
        report
            .deviations
            .extend(find_window_deviations(participant, &mut report.issues));
        report.missed.extend(find_missed_visits(participant, today));
    }
    report
}

fn offset_window(anchor: NaiveDate, start_days: i64, end_days: i64) -> Option<(NaiveDate, NaiveDate)> {
    let start = anchor.checked_add_days(Days::new(u64::try_from(start_days).ok()?))?;
    let end = anchor.checked_add_days(Days::new(u64::try_from(end_days).ok()?))?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn filled_visit(event: StudyEvent, visit_date: &str) -> RawRecord {
        RawRecord::new("101", event)
            .with_field("visit_date", visit_date)
            .with_field("visit_date_status", VISIT_DATE_FILLED)
    }

    fn randomized_participant(extra: Vec<RawRecord>) -> Participant {
        let mut participant = Participant::new("101");
        participant.visits.insert(
            StudyEvent::Randomization,
            filled_visit(StudyEvent::Randomization, "2024-01-01")
                .with_field("randomization_code", "A1"),
        );
        for record in extra {
            participant.visits.insert(record.event, record);
        }
        participant
    }

    #[test]
    fn visit3_window_boundaries() {
        // Anchor 2024-01-01, Visit3 window [13,19] days: Jan 14 - Jan 20.
        let cases = [
            ("2024-01-13", Some((DeviationKind::Early, 1))),
            ("2024-01-14", None),
            ("2024-01-16", None),
            ("2024-01-20", None),
            ("2024-01-21", Some((DeviationKind::Late, 1))),
        ];
        for (visit_date, expected) in cases {
            let participant =
                randomized_participant(vec![filled_visit(StudyEvent::Visit3, visit_date)]);
            let mut issues = Vec::new();
            let deviations = find_window_deviations(&participant, &mut issues);
            match expected {
                None => assert!(deviations.is_empty(), "{visit_date} should be on protocol"),
                Some((kind, magnitude)) => {
                    assert_eq!(deviations.len(), 1, "{visit_date}");
                    assert_eq!(deviations[0].kind, kind);
                    assert_eq!(deviations[0].magnitude_days, magnitude);
                    assert_eq!(deviations[0].window_start, date(2024, 1, 14));
                    assert_eq!(deviations[0].window_end, date(2024, 1, 20));
                }
            }
            assert!(issues.is_empty());
        }
    }

    #[test]
    fn unfilled_status_means_not_occurred() {
        let record = RawRecord::new("101", StudyEvent::Visit3)
            .with_field("visit_date", "2024-01-05")
            .with_field("visit_date_status", "0");
        let participant = randomized_participant(vec![record]);
        let mut issues = Vec::new();
        assert!(find_window_deviations(&participant, &mut issues).is_empty());
    }

    #[test]
    fn no_anchor_skips_participant() {
        let mut participant = Participant::new("102");
        participant.visits.insert(
            StudyEvent::Visit3,
            filled_visit(StudyEvent::Visit3, "2024-01-05"),
        );
        let mut issues = Vec::new();
        assert!(find_window_deviations(&participant, &mut issues).is_empty());
        assert!(find_missed_visits(&participant, date(2024, 6, 1)).is_empty());
        let report = evaluate_windows([&participant], date(2024, 6, 1));
        assert_eq!(report.skipped_no_anchor, 1);
    }

    #[test]
    fn shared_date_flags_and_excludes_both() {
        let participant = randomized_participant(vec![
            filled_visit(StudyEvent::Visit3, "2024-01-05"),
            filled_visit(StudyEvent::Visit4, "2024-01-05"),
        ]);
        let mut issues = Vec::new();
        let deviations = find_window_deviations(&participant, &mut issues);
        assert!(deviations.is_empty());
        assert_eq!(
            issues,
            vec![DataQualityIssue::SharedVisitDate {
                participant_id: "101".to_string(),
                events: vec![StudyEvent::Visit3, StudyEvent::Visit4],
                date: date(2024, 1, 5),
            }]
        );
    }

    #[test]
    fn shared_date_visits_still_count_as_occurred() {
        // Visit3 and Visit4 share 2024-01-20: both are excluded from
        // deviation scoring, but neither is absent, so neither may show up
        // as pending or missed. Earlier visits they prove complete (none
        // here) and later absent visits still classify normally.
        let participant = randomized_participant(vec![
            filled_visit(StudyEvent::Visit3, "2024-01-20"),
            filled_visit(StudyEvent::Visit4, "2024-01-20"),
        ]);
        let missed = find_missed_visits(&participant, date(2024, 6, 1));
        assert!(
            missed
                .iter()
                .all(|m| m.visit != StudyEvent::Visit3 && m.visit != StudyEvent::Visit4),
            "shared-date visits must not be re-reported: {missed:?}"
        );
        // Visit5's window closed by June, so it is genuinely missed.
        let visit5 = missed
            .iter()
            .find(|m| m.visit == StudyEvent::Visit5)
            .expect("visit5 entry");
        assert_eq!(visit5.kind, MissedKind::Missed);
    }

    #[test]
    fn missing_visit_pending_until_deadline_passes() {
        let participant = randomized_participant(Vec::new());
        // Visit3 deadline is 2024-01-20.
        let before = find_missed_visits(&participant, date(2024, 1, 18));
        let visit3 = before
            .iter()
            .find(|m| m.visit == StudyEvent::Visit3)
            .expect("visit3 entry");
        assert_eq!(visit3.kind, MissedKind::Pending);
        assert_eq!(visit3.deadline, date(2024, 1, 20));

        let after = find_missed_visits(&participant, date(2024, 1, 21));
        let visit3 = after
            .iter()
            .find(|m| m.visit == StudyEvent::Visit3)
            .expect("visit3 entry");
        assert_eq!(visit3.kind, MissedKind::Missed);
    }

    #[test]
    fn completed_later_visit_forces_missed() {
        // Visit4 occurred, Visit3 absent: Visit3 is missed even though its
        // window is still open.
        let participant =
            randomized_participant(vec![filled_visit(StudyEvent::Visit4, "2024-01-30")]);
        let missed = find_missed_visits(&participant, date(2024, 1, 15));
        let visit3 = missed
            .iter()
            .find(|m| m.visit == StudyEvent::Visit3)
            .expect("visit3 entry");
        assert_eq!(visit3.kind, MissedKind::Missed);
    }

    #[test]
    fn concluded_participants_have_no_missed_visits() {
        let mut participant = randomized_participant(Vec::new());
        participant.conclusion =
            Some(RawRecord::new("101", StudyEvent::Conclusion).with_field("conclusion_code", "3"));
        assert!(find_missed_visits(&participant, date(2025, 1, 1)).is_empty());
    }
}
