//! comfy-table renderings of the derived summaries.
//!
//! Every function returns the built `Table` so callers decide where it goes
//! and tests can snapshot the rendered text.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table,
};

use redcap_core::{
    Bucket, ConsortSummary, DemographicTable, EnrollmentSummary, MissedKind, MissedVisit,
    VisitStatus, WindowDeviation, DeviationKind,
};
use redcap_model::{
    DataQualityIssue, Ethnicity, Race, Sex, StudyEvent, expected_interval_days, protocol_window,
    FINAL_VISIT_ANCHOR_OFFSET_DAYS,
};

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

fn count_cell(count: u32) -> Cell {
    if count > 0 {
        Cell::new(count)
    } else {
        dim_cell(count)
    }
}

fn apply_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

/// Plain enrollment counters as a two-column table.
pub fn render_enrollment_summary(summary: &EnrollmentSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Category"), header_cell("Count")]);
    apply_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (label, count) in [
        ("Enrolled", summary.enrolled),
        ("Randomized", summary.randomized),
        ("Screen failures", summary.screen_failed),
        ("Completed", summary.completed),
        ("Withdrawn", summary.withdrawn),
        ("Lost to follow-up", summary.lost_to_followup),
        ("Other conclusions", summary.other_conclusion),
    ] {
        table.add_row(vec![Cell::new(label), count_cell(count)]);
    }
    table
}

fn bucket_row(table: &mut Table, phase: &str, label: &str, bucket: &Bucket) {
    let ids: Vec<&str> = bucket
        .participants
        .iter()
        .map(|detail| detail.id.as_str())
        .collect();
    table.add_row(vec![
        Cell::new(phase),
        Cell::new(label),
        count_cell(bucket.count),
        if ids.is_empty() {
            dim_cell("-")
        } else {
            Cell::new(ids.join(", "))
        },
    ]);
}

/// CONSORT participant-flow table: enrollment, allocation, follow-up, and
/// attrition phases with drill-down id lists.
pub fn render_consort(summary: &ConsortSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Phase"),
        header_cell("Bucket"),
        header_cell("Count"),
        header_cell("Participants"),
    ]);
    apply_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);

    table.add_row(vec![
        Cell::new("Enrollment").add_attribute(Attribute::Bold),
        Cell::new("Assessed"),
        count_cell(summary.assessed),
        dim_cell("-"),
    ]);
    bucket_row(&mut table, "Enrollment", "Excluded: ineligible", &summary.excluded.ineligible);
    bucket_row(&mut table, "Enrollment", "Excluded: declined", &summary.excluded.declined);
    bucket_row(&mut table, "Enrollment", "Excluded: other", &summary.excluded.other);
    bucket_row(
        &mut table,
        "Enrollment",
        "Not randomized: screen failure",
        &summary.not_randomized.screen_failure,
    );
    bucket_row(
        &mut table,
        "Enrollment",
        "Not randomized: withdrew",
        &summary.not_randomized.withdrew,
    );
    bucket_row(
        &mut table,
        "Enrollment",
        "Not randomized: lost to follow-up",
        &summary.not_randomized.lost_to_followup,
    );
    bucket_row(
        &mut table,
        "Enrollment",
        "Not randomized: investigator decision",
        &summary.not_randomized.investigator_decision,
    );
    bucket_row(
        &mut table,
        "Enrollment",
        "Not randomized: awaiting randomization",
        &summary.not_randomized.awaiting_randomization,
    );
    bucket_row(
        &mut table,
        "Enrollment",
        "Not randomized: other",
        &summary.not_randomized.other,
    );
    bucket_row(&mut table, "Allocation", "Randomized", &summary.randomized);
    for reach in &summary.milestones {
        bucket_row(
            &mut table,
            "Follow-up",
            &format!("Reached {}", reach.milestone),
            &reach.reached,
        );
    }
    for attrition in &summary.attrition {
        let phase = format!("{} -> {}", attrition.from, attrition.to);
        bucket_row(&mut table, &phase, "Lost to follow-up", &attrition.lost_to_followup);
        bucket_row(&mut table, &phase, "Withdrew", &attrition.withdrew);
        bucket_row(&mut table, &phase, "Pending", &attrition.pending);
        bucket_row(&mut table, &phase, "Other", &attrition.other);
    }
    bucket_row(&mut table, "Disposition", "Completed", &summary.dispositions.completed);
    bucket_row(
        &mut table,
        "Disposition",
        "Lost to follow-up",
        &summary.dispositions.lost_to_followup,
    );
    bucket_row(&mut table, "Disposition", "Withdrew", &summary.dispositions.withdrew);
    bucket_row(
        &mut table,
        "Disposition",
        "Investigator decision",
        &summary.dispositions.investigator_decision,
    );
    bucket_row(&mut table, "Disposition", "Other", &summary.dispositions.other);
    bucket_row(
        &mut table,
        "Disposition",
        "Still active",
        &summary.dispositions.still_active,
    );
    table
}

/// Out-of-window visit report.
pub fn render_deviations(deviations: &[WindowDeviation]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Participant"),
        header_cell("Visit"),
        header_cell("Window"),
        header_cell("Actual"),
        header_cell("Deviation"),
        header_cell("Days"),
    ]);
    apply_style(&mut table);
    align_column(&mut table, 5, CellAlignment::Right);
    for deviation in deviations {
        let kind = match deviation.kind {
            DeviationKind::Early => Cell::new("EARLY").fg(Color::Yellow),
            DeviationKind::Late => Cell::new("LATE").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&deviation.participant_id),
            Cell::new(deviation.visit),
            Cell::new(format!(
                "{} - {}",
                deviation.window_start, deviation.window_end
            )),
            Cell::new(deviation.actual),
            kind,
            Cell::new(deviation.magnitude_days),
        ]);
    }
    table
}

/// Pending/missed classification of not-yet-occurred visits.
pub fn render_missed_visits(missed: &[MissedVisit]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Participant"),
        header_cell("Visit"),
        header_cell("Deadline"),
        header_cell("Status"),
    ]);
    apply_style(&mut table);
    for visit in missed {
        let status = match visit.kind {
            MissedKind::Pending => Cell::new("PENDING").fg(Color::Yellow),
            MissedKind::Missed => Cell::new("MISSED").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&visit.participant_id),
            Cell::new(visit.visit),
            Cell::new(visit.deadline),
            status,
        ]);
    }
    table
}

/// Per-participant schedule status listing.
pub fn render_statuses(statuses: &[(String, VisitStatus)]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Participant"), header_cell("Status")]);
    apply_style(&mut table);
    for (id, status) in statuses {
        table.add_row(vec![Cell::new(id), Cell::new(&status.display)]);
    }
    table
}

/// The NIH race x ethnicity x sex cross-tabulation with totals.
pub fn render_demographics(demographics: &DemographicTable) -> Table {
    const SEXES: [Sex; 3] = [Sex::Female, Sex::Male, Sex::Unknown];
    const ETHNICITIES: [Ethnicity; 3] =
        [Ethnicity::NotHispanic, Ethnicity::Hispanic, Ethnicity::Unknown];
    let mut table = Table::new();
    let mut header = vec![header_cell("Race")];
    for ethnicity in ETHNICITIES {
        for sex in SEXES {
            header.push(header_cell(&format!("{}\n{}", ethnicity.label(), sex.label())));
        }
    }
    header.push(header_cell("Total"));
    table.set_header(header);
    apply_style(&mut table);
    // Race labels run up to 41 characters; without a constraint the dynamic
    // arrangement wraps them mid-word under the 120-column cap. The count
    // columns and headers absorb the squeeze instead.
    if let Some(column) = table.column_mut(0) {
        column.set_constraint(ColumnConstraint::ContentWidth);
    }
    for index in 1..=10 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for race in Race::ALL {
        let mut row = vec![Cell::new(race.label())];
        for ethnicity in ETHNICITIES {
            for sex in SEXES {
                row.push(count_cell(demographics.cell(race, ethnicity, sex)));
            }
        }
        row.push(Cell::new(demographics.race_total(race)).add_attribute(Attribute::Bold));
        table.add_row(row);
    }
    let mut totals = vec![Cell::new("TOTAL").add_attribute(Attribute::Bold)];
    for ethnicity in ETHNICITIES {
        for sex in SEXES {
            let column_total: u32 = Race::ALL
                .iter()
                .map(|race| demographics.cell(*race, ethnicity, sex))
                .sum();
            totals.push(Cell::new(column_total).add_attribute(Attribute::Bold));
        }
    }
    totals.push(
        Cell::new(demographics.grand_total())
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
    );
    table.add_row(totals);
    table
}

/// Static visit schedule and protocol windows.
pub fn render_schedule() -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Visit"),
        header_cell("Expected interval"),
        header_cell("Window (days from randomization)"),
    ]);
    apply_style(&mut table);
    for event in StudyEvent::SCHEDULE {
        let interval = if event == StudyEvent::FinalVisit {
            format!("day {FINAL_VISIT_ANCHOR_OFFSET_DAYS} from randomization")
        } else {
            match expected_interval_days(event) {
                Some(days) => format!("{days} days after previous visit"),
                None => "-".to_string(),
            }
        };
        let window = match protocol_window(event) {
            Some((start, end)) => format!("[{start}, {end}]"),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(event),
            Cell::new(interval),
            Cell::new(window),
        ]);
    }
    table
}

/// Data-quality conditions surfaced alongside the reports.
pub fn render_quality_issues(issues: &[DataQualityIssue]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Participant"), header_cell("Issue")]);
    apply_style(&mut table);
    for issue in issues {
        table.add_row(vec![
            Cell::new(issue.participant_id()),
            Cell::new(issue.to_string()),
        ]);
    }
    table
}
