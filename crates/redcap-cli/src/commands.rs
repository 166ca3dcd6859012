use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use redcap_cli::pipeline::{DerivedReports, derive_reports, fetch_records};
use redcap_ingest::{CachePolicy, CacheStore, FetchFilter, FileCacheStore, JsonFileSource};
use redcap_report::{
    export_deviations, render_consort, render_demographics, render_deviations,
    render_enrollment_summary, render_missed_visits, render_quality_issues, render_schedule,
    render_statuses, write_bucket_csv,
};

use crate::cli::{ReportArgs, ViewArg};

const CACHE_FILE: &str = "dashboard-cache.json";

pub fn run_report(args: &ReportArgs) -> Result<()> {
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let source = JsonFileSource::new(&args.records);
    let policy = CachePolicy::new(env!("CARGO_PKG_VERSION"));
    let store = cache_store(args);
    let outcome = fetch_records(
        &source,
        &FetchFilter::default(),
        store.as_ref().map(|store| store as &dyn CacheStore),
        &policy,
        args.force_refresh,
    )?;
    if outcome.from_cache {
        info!("rendering from cached records");
    }
    let reports = derive_reports(outcome.records, as_of, args.include_test_ids);

    if let Some(dir) = &args.csv_dir {
        write_csv_exports(dir, &reports)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let all = args.view == ViewArg::All;
    if all || args.view == ViewArg::Enrollment {
        println!("Enrollment (as of {as_of})");
        println!("{}", render_enrollment_summary(&reports.enrollment));
    }
    if all || args.view == ViewArg::Consort {
        println!("CONSORT participant flow");
        println!("{}", render_consort(&reports.consort));
    }
    if all || args.view == ViewArg::Windows {
        println!("Protocol window deviations");
        println!("{}", render_deviations(&reports.windows.deviations));
        println!("Pending and missed visits");
        println!("{}", render_missed_visits(&reports.windows.missed));
        if reports.windows.skipped_no_anchor > 0 {
            println!(
                "({} participants skipped: no randomization anchor)",
                reports.windows.skipped_no_anchor
            );
        }
    }
    if all || args.view == ViewArg::Statuses {
        println!("Schedule statuses (as of {as_of})");
        println!("{}", render_statuses(&reports.statuses));
    }
    if all || args.view == ViewArg::Demographics {
        println!("Demographics");
        println!("{}", render_demographics(&reports.demographics));
    }
    if all || args.view == ViewArg::Quality {
        println!("Data-quality issues");
        println!("{}", render_quality_issues(&reports.issues));
    }
    Ok(())
}

pub fn run_schedule() {
    println!("{}", render_schedule());
}

/// Cache location: `--cache-dir` when given, otherwise next to the export.
/// `--no-cache` disables reads and writes entirely.
fn cache_store(args: &ReportArgs) -> Option<FileCacheStore> {
    if args.no_cache {
        return None;
    }
    let dir = args
        .cache_dir
        .clone()
        .or_else(|| args.records.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    Some(FileCacheStore::new(dir.join(CACHE_FILE)))
}

fn write_csv_exports(dir: &Path, reports: &DerivedReports) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create csv dir {}", dir.display()))?;
    export_deviations(&dir.join("deviations.csv"), &reports.windows.deviations)
        .context("write deviations csv")?;
    let randomized = fs::File::create(dir.join("randomized.csv")).context("create csv file")?;
    write_bucket_csv(randomized, &reports.consort.randomized).context("write randomized csv")?;
    let completed = fs::File::create(dir.join("completed.csv")).context("create csv file")?;
    write_bucket_csv(completed, &reports.consort.dispositions.completed)
        .context("write completed csv")?;
    info!(dir = %dir.display(), "wrote csv exports");
    Ok(())
}
