//! Dashboard refresh pipeline with explicit stages.
//!
//! The pipeline follows these stages in order:
//! 1. **Fetch**: Load the flat record stream from the source, consulting the
//!    cache first and falling back to stale cache entries when the source
//!    itself fails
//! 2. **Normalize**: Fold export rows into per-participant longitudinal state
//! 3. **Derive**: Re-run every derivation (schedule statuses, protocol
//!    windows, enrollment and CONSORT counts, demographics, chart series)
//!
//! Each stage takes the output of the previous stage and returns typed
//! results. Derivations are pure, so a refresh is always safe to repeat.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use redcap_core::{
    ChartSeries, ConsortSummary, DemographicTable, EnrollmentSummary, VisitStatus, WindowReport,
    classify, enrollment_series, evaluate_windows, normalize_records, summarize_consort,
    summarize_enrollment,
};
use redcap_ingest::{CachePolicy, CacheStore, FetchFilter, RecordSource, cached_value, store_value};
use redcap_model::{DataQualityIssue, Participant, RawRecord, is_test_participant};

use crate::logging::redact_value;

/// Cache key holding the raw record stream.
pub const RECORDS_CACHE_KEY: &str = "records";

// ============================================================================
// Stage 1: Fetch
// ============================================================================

/// Result of the fetch stage.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    /// True when the records were served from the cache rather than the
    /// source, fresh or stale.
    pub from_cache: bool,
}

/// Load records, preferring a fresh cache entry over a source round trip.
///
/// `force_refresh` skips the fresh-cache read but still writes the fetched
/// records back. When the source fails and the cache holds any entry at all,
/// the stale entry is served with a warning instead of an error.
pub fn fetch_records(
    source: &dyn RecordSource,
    filter: &FetchFilter,
    cache: Option<&dyn CacheStore>,
    policy: &CachePolicy,
    force_refresh: bool,
) -> Result<FetchOutcome> {
    let span = info_span!("fetch", force_refresh);
    let _guard = span.enter();

    if !force_refresh
        && let Some(store) = cache
        && let Some(value) = cached_value(store, RECORDS_CACHE_KEY, policy, false)
    {
        match serde_json::from_value::<Vec<RawRecord>>(value) {
            Ok(records) => {
                debug!(count = records.len(), "serving records from cache");
                return Ok(FetchOutcome {
                    records,
                    from_cache: true,
                });
            }
            // An undecodable entry acts like a miss; the re-fetch overwrites it.
            Err(error) => warn!(%error, "discarding undecodable cache entry"),
        }
    }

    match source.fetch_records(filter) {
        Ok(records) => {
            if let Some(store) = cache {
                match serde_json::to_value(&records) {
                    Ok(value) => {
                        if let Err(error) = store_value(store, RECORDS_CACHE_KEY, policy, value) {
                            // A failed cache write only costs the next refresh.
                            warn!(%error, "failed to write record cache");
                        }
                    }
                    Err(error) => warn!(%error, "failed to serialize records for cache"),
                }
            }
            info!(count = records.len(), "fetched records from source");
            Ok(FetchOutcome {
                records,
                from_cache: false,
            })
        }
        Err(error) => {
            if let Some(store) = cache
                && let Some(value) = cached_value(store, RECORDS_CACHE_KEY, policy, true)
                && let Ok(records) = serde_json::from_value::<Vec<RawRecord>>(value)
            {
                warn!(%error, count = records.len(), "fetch failed, serving stale cached records");
                return Ok(FetchOutcome {
                    records,
                    from_cache: true,
                });
            }
            Err(error).context("fetch records")
        }
    }
}

// ============================================================================
// Stages 2-3: Normalize and derive
// ============================================================================

/// Everything the report views render, derived in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedReports {
    pub enrollment: EnrollmentSummary,
    pub consort: ConsortSummary,
    pub windows: WindowReport,
    pub demographics: DemographicTable,
    pub series: ChartSeries,
    /// Per-participant schedule status, ordered by participant id.
    pub statuses: Vec<(String, VisitStatus)>,
    pub issues: Vec<DataQualityIssue>,
    pub participant_count: usize,
    /// Participants dropped by the test-id filter.
    pub excluded_test_ids: usize,
}

/// Normalize the record stream and run every derivation as of `as_of`.
///
/// Test participants (ids starting with "test") are dropped unless
/// `include_test_ids` is set; the drop happens after normalization so the
/// count of excluded ids is exact even with duplicate rows.
pub fn derive_reports(
    records: Vec<RawRecord>,
    as_of: NaiveDate,
    include_test_ids: bool,
) -> DerivedReports {
    let span = info_span!("derive", %as_of);
    let _guard = span.enter();

    let study = normalize_records(records);
    let mut issues = study.issues;
    let total = study.participants.len();
    let participants: Vec<&Participant> = study
        .participants
        .values()
        .filter(|participant| include_test_ids || !is_test_participant(&participant.id))
        .collect();
    let excluded_test_ids = total - participants.len();
    if excluded_test_ids > 0 {
        debug!(excluded_test_ids, "dropped test participants");
    }

    let statuses: Vec<(String, VisitStatus)> = participants
        .iter()
        .map(|participant| {
            let status = classify(participant, as_of);
            debug!(
                participant = redact_value(&participant.id),
                state = ?status.state,
                "classified schedule status"
            );
            (participant.id.clone(), status)
        })
        .collect();

    let windows = evaluate_windows(participants.iter().copied(), as_of);
    issues.extend(windows.issues.iter().cloned());

    let reports = DerivedReports {
        enrollment: summarize_enrollment(participants.iter().copied()),
        consort: summarize_consort(participants.iter().copied()),
        windows,
        demographics: DemographicTable::build(participants.iter().copied()),
        series: enrollment_series(participants.iter().copied()),
        statuses,
        issues,
        participant_count: participants.len(),
        excluded_test_ids,
    };
    info!(
        participants = reports.participant_count,
        enrolled = reports.enrollment.enrolled,
        randomized = reports.enrollment.randomized,
        deviations = reports.windows.deviations.len(),
        issues = reports.issues.len(),
        "derived dashboard reports"
    );
    reports
}
