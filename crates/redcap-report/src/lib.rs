//! Rendering of derived study summaries.
//!
//! - **Tables**: comfy-table renderings for the CLI
//! - **CSV**: deviation and drill-down exports
//! - **JSON**: machine-readable summary payloads (serde)

mod csv_export;
mod tables;

pub use csv_export::{export_deviations, write_bucket_csv, write_deviations_csv};
pub use tables::{
    render_consort, render_demographics, render_deviations, render_enrollment_summary,
    render_missed_visits, render_quality_issues, render_schedule, render_statuses,
};
