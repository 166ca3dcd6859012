//! Derivation engine for the study dashboard.
//!
//! Given the flat REDCap record stream, this crate reconstructs
//! per-participant longitudinal state, classifies each participant's
//! position in the visit schedule, evaluates protocol tolerance windows
//! against the randomization anchor, and aggregates enrollment and CONSORT
//! counts. Everything here is pure and re-evaluated on each refresh; parse
//! failures degrade to documented sentinels rather than errors.

pub mod consort;
pub mod dates;
pub mod demographics;
pub mod normalize;
pub mod schedule;
pub mod windows;

pub use consort::{
    Bucket, ChartSeries, ConsortSummary, Disposition, EnrollmentSummary, ExclusionReason,
    MILESTONES, MilestoneAttrition, MilestoneReach, NotRandomizedReason, ParticipantDetail,
    Pass1Class, classify_pass1, enrollment_series, reached_milestones, summarize_consort,
    summarize_enrollment,
};
pub use dates::{MonthKey, days_between, month_range, parse_calendar_date};
pub use demographics::{
    DemographicTable, classify_ethnicity, classify_race, classify_sex,
};
pub use normalize::{NormalizedStudy, normalize_records};
pub use schedule::{VisitState, VisitStatus, classify, last_completed_visit};
pub use windows::{
    DeviationKind, MissedKind, MissedVisit, WindowDeviation, WindowReport, anchor_date,
    evaluate_windows, find_missed_visits, find_window_deviations,
};
