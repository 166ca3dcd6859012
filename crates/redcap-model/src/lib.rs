pub mod codes;
pub mod error;
pub mod event;
pub mod participant;
pub mod quality;
pub mod record;
pub mod schedule;

pub use codes::{ConclusionCode, Ethnicity, Race, Sex};
pub use error::{DashboardError, Result};
pub use event::StudyEvent;
pub use participant::{Participant, is_test_participant};
pub use quality::DataQualityIssue;
pub use record::{RawRecord, VISIT_DATE_FILLED};
pub use schedule::{
    DUE_TOLERANCE_DAYS, FINAL_VISIT_ANCHOR_OFFSET_DAYS, FINAL_VISIT_TOLERANCE_DAYS,
    OVERDUE_GRACE_DAYS, RANDOMIZATION_FLAG_DAYS, expected_interval_days, protocol_window,
    windowed_events,
};
