//! Static visit-schedule and protocol-window configuration.
//!
//! All timing constants live here so the schedule engine, the window
//! validator, and the reports read from a single source. Offsets are whole
//! days; windows are inclusive on both ends.

use crate::event::StudyEvent;

/// Expected days between a completed visit and the next scheduled one.
/// Keyed by the *next* visit; the reference is the immediately preceding
/// visit except for the final-visit anchor rule below.
const INTERVALS: [(StudyEvent, i64); 8] = [
    (StudyEvent::Randomization, 14),
    (StudyEvent::Visit3, 14),
    (StudyEvent::Visit4, 14),
    (StudyEvent::Visit5, 28),
    (StudyEvent::Visit6, 28),
    (StudyEvent::Visit7, 56),
    (StudyEvent::Visit8, 56),
    (StudyEvent::Visit9, 84),
];

/// Final-visit anchor rule: the study-exit visit is timed from the
/// randomization date, not from Visit 9.
pub const FINAL_VISIT_ANCHOR_OFFSET_DAYS: i64 = 365;
/// Symmetric tolerance band around the final-visit target.
pub const FINAL_VISIT_TOLERANCE_DAYS: i64 = 21;

/// Days past the expected interval a visit may run before moving from
/// "due" to "late".
pub const DUE_TOLERANCE_DAYS: i64 = 7;
/// Additional grace beyond the due tolerance before "late" becomes
/// "overdue".
pub const OVERDUE_GRACE_DAYS: i64 = 21;

/// Days since baseline after which a still-unrandomized participant is
/// annotated in the status display.
pub const RANDOMIZATION_FLAG_DAYS: i64 = 14;

/// Expected days from the preceding visit to `next`. `None` for events with
/// no interval entry (baseline, the anchored final visit, conclusion).
pub fn expected_interval_days(next: StudyEvent) -> Option<i64> {
    INTERVALS
        .iter()
        .find(|(event, _)| *event == next)
        .map(|(_, days)| *days)
}

/// Protocol tolerance window relative to the randomization anchor date,
/// as inclusive `(start, end)` day offsets.
pub fn protocol_window(event: StudyEvent) -> Option<(i64, i64)> {
    match event {
        StudyEvent::Visit3 => Some((13, 19)),
        StudyEvent::Visit4 => Some((27, 33)),
        StudyEvent::Visit5 => Some((49, 63)),
        StudyEvent::Visit6 => Some((77, 91)),
        StudyEvent::Visit7 => Some((133, 147)),
        StudyEvent::Visit8 => Some((189, 203)),
        StudyEvent::Visit9 => Some((266, 294)),
        StudyEvent::FinalVisit => Some((
            FINAL_VISIT_ANCHOR_OFFSET_DAYS - FINAL_VISIT_TOLERANCE_DAYS,
            FINAL_VISIT_ANCHOR_OFFSET_DAYS + FINAL_VISIT_TOLERANCE_DAYS,
        )),
        _ => None,
    }
}

/// Events evaluated by the protocol-window validator, in schedule order.
pub fn windowed_events() -> impl Iterator<Item = StudyEvent> {
    StudyEvent::SCHEDULE
        .into_iter()
        .filter(|event| protocol_window(*event).is_some())
}
