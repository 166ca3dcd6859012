//! CSV exports for offline analysis.

use std::io::Write;
use std::path::Path;

use redcap_core::{Bucket, DeviationKind, WindowDeviation};
use redcap_model::{DashboardError, Result};

/// Write the window-deviation report as CSV.
pub fn write_deviations_csv<W: Write>(writer: W, deviations: &[WindowDeviation]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record([
            "participant_id",
            "visit",
            "window_start",
            "window_end",
            "actual_date",
            "deviation",
            "days",
        ])
        .map_err(to_dashboard_error)?;
    for deviation in deviations {
        let kind = match deviation.kind {
            DeviationKind::Early => "early",
            DeviationKind::Late => "late",
        };
        csv_writer
            .write_record([
                deviation.participant_id.as_str(),
                deviation.visit.label(),
                &deviation.window_start.to_string(),
                &deviation.window_end.to_string(),
                &deviation.actual.to_string(),
                kind,
                &deviation.magnitude_days.to_string(),
            ])
            .map_err(to_dashboard_error)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write one bucket's drill-down participant list as CSV.
pub fn write_bucket_csv<W: Write>(writer: W, bucket: &Bucket) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record([
            "participant_id",
            "enrollment_date",
            "conclusion",
            "conclusion_date",
        ])
        .map_err(to_dashboard_error)?;
    for detail in &bucket.participants {
        csv_writer
            .write_record([
                detail.id.as_str(),
                detail.enrollment_date.as_deref().unwrap_or(""),
                detail.conclusion.as_deref().unwrap_or(""),
                detail.conclusion_date.as_deref().unwrap_or(""),
            ])
            .map_err(to_dashboard_error)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Convenience wrapper writing the deviation CSV to a file path.
pub fn export_deviations(path: &Path, deviations: &[WindowDeviation]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_deviations_csv(file, deviations)
}

fn to_dashboard_error(error: csv::Error) -> DashboardError {
    DashboardError::Message(format!("csv write failed: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use redcap_core::ParticipantDetail;
    use redcap_model::StudyEvent;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn deviations_csv_shape() {
        let deviations = vec![WindowDeviation {
            participant_id: "204".to_string(),
            visit: StudyEvent::Visit3,
            window_start: date(2024, 1, 14),
            window_end: date(2024, 1, 20),
            actual: date(2024, 1, 21),
            kind: DeviationKind::Late,
            magnitude_days: 1,
        }];
        let mut buffer = Vec::new();
        write_deviations_csv(&mut buffer, &deviations).expect("write csv");
        let text = String::from_utf8(buffer).expect("utf8 csv");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("participant_id,visit,window_start,window_end,actual_date,deviation,days")
        );
        assert_eq!(
            lines.next(),
            Some("204,Visit 3,2024-01-14,2024-01-20,2024-01-21,late,1")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_bucket_writes_header_only() {
        let mut buffer = Vec::new();
        write_bucket_csv(&mut buffer, &Bucket::default()).expect("write csv");
        let text = String::from_utf8(buffer).expect("utf8 csv");
        assert_eq!(
            text.trim(),
            "participant_id,enrollment_date,conclusion,conclusion_date"
        );
    }

    #[test]
    fn bucket_csv_includes_conclusion_date() {
        let bucket = Bucket {
            count: 1,
            participants: vec![ParticipantDetail {
                id: "r2".to_string(),
                enrollment_date: Some("2024-01-03".to_string()),
                conclusion: Some("Lost to follow-up".to_string()),
                conclusion_date: Some("2024-06-30".to_string()),
            }],
        };
        let mut buffer = Vec::new();
        write_bucket_csv(&mut buffer, &bucket).expect("write csv");
        let text = String::from_utf8(buffer).expect("utf8 csv");
        assert_eq!(
            text.lines().nth(1),
            Some("r2,2024-01-03,Lost to follow-up,2024-06-30")
        );
    }
}
