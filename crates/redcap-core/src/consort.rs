//! Enrollment and CONSORT aggregation.
//!
//! Two passes over the participant set. Pass 1 classifies every participant
//! into exactly one of {excluded, enrolled-not-randomized, randomized} using
//! a fixed precedence, then evaluates sequential reach milestones and the
//! final disposition for the randomized population. Pass 2 buckets the
//! reason each randomized participant stopped at a milestone boundary.
//!
//! The plain enrollment summary applies a deliberately different rule for
//! two categories: lost-to-follow-up and withdrawn/investigator-decision
//! count only for randomized participants. This asymmetry follows the
//! clinical reporting convention and is covered by parity tests; do not
//! harmonize it with the CONSORT sub-reason buckets.

use serde::{Deserialize, Serialize};

use redcap_model::{ConclusionCode, Participant, RawRecord, StudyEvent};

use crate::dates::{MonthKey, month_range, parse_calendar_date};

/// Reach milestones in sequence. Reaching one requires having reached the
/// previous; a later visit date without the intermediate one does not count.
pub const MILESTONES: [StudyEvent; 5] = [
    StudyEvent::Randomization,
    StudyEvent::Visit5,
    StudyEvent::Visit7,
    StudyEvent::Visit9,
    StudyEvent::FinalVisit,
];

/// A handful of display fields per participant for UI drill-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDetail {
    pub id: String,
    pub enrollment_date: Option<String>,
    pub conclusion: Option<String>,
    pub conclusion_date: Option<String>,
}

impl ParticipantDetail {
    fn of(participant: &Participant) -> Self {
        Self {
            id: participant.id.clone(),
            enrollment_date: participant.enrollment_date().map(str::to_string),
            conclusion: ConclusionCode::from_code(participant.conclusion_code())
                .map(|code| code.label().to_string()),
            conclusion_date: participant
                .conclusion
                .as_ref()
                .and_then(RawRecord::conclusion_date)
                .map(str::to_string),
        }
    }
}

/// A count plus the ordered participant list behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub count: u32,
    pub participants: Vec<ParticipantDetail>,
}

impl Bucket {
    fn add(&mut self, participant: &Participant) {
        self.count += 1;
        self.participants.push(ParticipantDetail::of(participant));
    }
}

/// Sub-reason for exclusion before enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    Ineligible,
    Declined,
    Other,
}

/// Sub-reason for stopping between enrollment and randomization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotRandomizedReason {
    ScreenFailure,
    Withdrew,
    LostToFollowUp,
    InvestigatorDecision,
    /// No conclusion recorded; randomization may still happen.
    AwaitingRandomization,
    Other,
}

/// Final disposition of a randomized participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Completed,
    LostToFollowUp,
    Withdrew,
    InvestigatorDecision,
    Other,
    /// No conclusion recorded yet.
    StillActive,
}

/// Pass 1 result: exactly one of these holds per participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pass1Class {
    Excluded(ExclusionReason),
    EnrolledNotRandomized(NotRandomizedReason),
    Randomized,
}

/// Classify one participant with the fixed CONSORT precedence.
pub fn classify_pass1(participant: &Participant) -> Pass1Class {
    let conclusion = ConclusionCode::from_code(participant.conclusion_code());
    if participant.enrollment_date().is_none() {
        let reason = match conclusion {
            Some(ConclusionCode::Ineligible) | Some(ConclusionCode::ScreenFailure) => {
                ExclusionReason::Ineligible
            }
            Some(ConclusionCode::Declined) => ExclusionReason::Declined,
            _ => ExclusionReason::Other,
        };
        return Pass1Class::Excluded(reason);
    }
    if !participant.is_randomized() {
        let reason = match conclusion {
            Some(ConclusionCode::ScreenFailure) | Some(ConclusionCode::Ineligible) => {
                NotRandomizedReason::ScreenFailure
            }
            Some(ConclusionCode::Withdrew) | Some(ConclusionCode::Declined) => {
                NotRandomizedReason::Withdrew
            }
            Some(ConclusionCode::LostToFollowUp) => NotRandomizedReason::LostToFollowUp,
            Some(ConclusionCode::InvestigatorDecision) => NotRandomizedReason::InvestigatorDecision,
            None => NotRandomizedReason::AwaitingRandomization,
            Some(_) => NotRandomizedReason::Other,
        };
        return Pass1Class::EnrolledNotRandomized(reason);
    }
    Pass1Class::Randomized
}

/// Sequential reach: milestone `k` counts only when milestone `k-1` was
/// reached. Returns, for each entry of [`MILESTONES`], whether it was
/// reached.
pub fn reached_milestones(participant: &Participant) -> [bool; MILESTONES.len()] {
    let mut reached = [false; MILESTONES.len()];
    for (index, milestone) in MILESTONES.iter().enumerate() {
        let completed = match milestone {
            StudyEvent::Randomization => participant.is_randomized(),
            event => participant
                .visit(*event)
                .is_some_and(|record| record.visit_date().is_some()),
        };
        let previous_reached = index == 0 || reached[index - 1];
        reached[index] = completed && previous_reached;
    }
    reached
}

fn disposition_of(participant: &Participant) -> Disposition {
    match ConclusionCode::from_code(participant.conclusion_code()) {
        Some(ConclusionCode::Completed) => Disposition::Completed,
        Some(ConclusionCode::LostToFollowUp) => Disposition::LostToFollowUp,
        Some(ConclusionCode::Withdrew) => Disposition::Withdrew,
        Some(ConclusionCode::InvestigatorDecision) => Disposition::InvestigatorDecision,
        Some(_) => Disposition::Other,
        None => Disposition::StillActive,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExclusionBuckets {
    pub total: u32,
    pub ineligible: Bucket,
    pub declined: Bucket,
    pub other: Bucket,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotRandomizedBuckets {
    pub total: u32,
    pub screen_failure: Bucket,
    pub withdrew: Bucket,
    pub lost_to_followup: Bucket,
    pub investigator_decision: Bucket,
    pub awaiting_randomization: Bucket,
    pub other: Bucket,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispositionBuckets {
    pub completed: Bucket,
    pub lost_to_followup: Bucket,
    pub withdrew: Bucket,
    pub investigator_decision: Bucket,
    pub other: Bucket,
    pub still_active: Bucket,
}

impl DispositionBuckets {
    pub fn total(&self) -> u32 {
        self.completed.count
            + self.lost_to_followup.count
            + self.withdrew.count
            + self.investigator_decision.count
            + self.other.count
            + self.still_active.count
    }
}

/// Reach count for one milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneReach {
    pub milestone: StudyEvent,
    pub reached: Bucket,
}

/// Pass 2 result for one milestone boundary: participants who reached
/// `from` but not `to`, bucketed by reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneAttrition {
    pub from: StudyEvent,
    pub to: StudyEvent,
    pub lost_to_followup: Bucket,
    pub withdrew: Bucket,
    /// No conclusion recorded; the visit may still happen.
    pub pending: Bucket,
    pub other: Bucket,
}

impl MilestoneAttrition {
    pub fn total(&self) -> u32 {
        self.lost_to_followup.count + self.withdrew.count + self.pending.count + self.other.count
    }
}

/// Full CONSORT aggregation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsortSummary {
    /// Everyone present in the record stream.
    pub assessed: u32,
    pub excluded: ExclusionBuckets,
    pub not_randomized: NotRandomizedBuckets,
    pub randomized: Bucket,
    pub milestones: Vec<MilestoneReach>,
    pub dispositions: DispositionBuckets,
    pub attrition: Vec<MilestoneAttrition>,
}

impl ConsortSummary {
    /// Cross-table consistency: the mutually exclusive pass 1 buckets must
    /// sum back to the assessed total, and disposition buckets to the
    /// randomized total.
    pub fn is_consistent(&self) -> bool {
        self.excluded.total + self.not_randomized.total + self.randomized.count == self.assessed
            && self.dispositions.total() == self.randomized.count
    }
}

/// Run both CONSORT passes over the participant set.
pub fn summarize_consort<'a>(
    participants: impl IntoIterator<Item = &'a Participant> + Clone,
) -> ConsortSummary {
    let mut summary = ConsortSummary {
        milestones: MILESTONES
            .iter()
            .map(|milestone| MilestoneReach {
                milestone: *milestone,
                reached: Bucket::default(),
            })
            .collect(),
        attrition: MILESTONES
            .windows(2)
            .map(|pair| MilestoneAttrition {
                from: pair[0],
                to: pair[1],
                lost_to_followup: Bucket::default(),
                withdrew: Bucket::default(),
                pending: Bucket::default(),
                other: Bucket::default(),
            })
            .collect(),
        ..ConsortSummary::default()
    };

    // Pass 1: mutually exclusive classification, milestones, dispositions.
    for participant in participants.clone() {
        summary.assessed += 1;
        match classify_pass1(participant) {
            Pass1Class::Excluded(reason) => {
                summary.excluded.total += 1;
                match reason {
                    ExclusionReason::Ineligible => summary.excluded.ineligible.add(participant),
                    ExclusionReason::Declined => summary.excluded.declined.add(participant),
                    ExclusionReason::Other => summary.excluded.other.add(participant),
                }
            }
            Pass1Class::EnrolledNotRandomized(reason) => {
                summary.not_randomized.total += 1;
                let bucket = match reason {
                    NotRandomizedReason::ScreenFailure => &mut summary.not_randomized.screen_failure,
                    NotRandomizedReason::Withdrew => &mut summary.not_randomized.withdrew,
                    NotRandomizedReason::LostToFollowUp => {
                        &mut summary.not_randomized.lost_to_followup
                    }
                    NotRandomizedReason::InvestigatorDecision => {
                        &mut summary.not_randomized.investigator_decision
                    }
                    NotRandomizedReason::AwaitingRandomization => {
                        &mut summary.not_randomized.awaiting_randomization
                    }
                    NotRandomizedReason::Other => &mut summary.not_randomized.other,
                };
                bucket.add(participant);
            }
            Pass1Class::Randomized => {
                summary.randomized.add(participant);
                let reached = reached_milestones(participant);
                for (index, reach) in summary.milestones.iter_mut().enumerate() {
                    if reached[index] {
                        reach.reached.add(participant);
                    }
                }
                let bucket = match disposition_of(participant) {
                    Disposition::Completed => &mut summary.dispositions.completed,
                    Disposition::LostToFollowUp => &mut summary.dispositions.lost_to_followup,
                    Disposition::Withdrew => &mut summary.dispositions.withdrew,
                    Disposition::InvestigatorDecision => {
                        &mut summary.dispositions.investigator_decision
                    }
                    Disposition::Other => &mut summary.dispositions.other,
                    Disposition::StillActive => &mut summary.dispositions.still_active,
                };
                bucket.add(participant);
            }
        }
    }

    // Pass 2: attrition reasons at each milestone boundary, randomized
    // population only.
    for participant in participants {
        if classify_pass1(participant) != Pass1Class::Randomized {
            continue;
        }
        let reached = reached_milestones(participant);
        for (boundary, attrition) in summary.attrition.iter_mut().enumerate() {
            if !(reached[boundary] && !reached[boundary + 1]) {
                continue;
            }
            let bucket = match ConclusionCode::from_code(participant.conclusion_code()) {
                Some(ConclusionCode::LostToFollowUp) => &mut attrition.lost_to_followup,
                Some(ConclusionCode::Withdrew) => &mut attrition.withdrew,
                None => &mut attrition.pending,
                Some(_) => &mut attrition.other,
            };
            bucket.add(participant);
        }
    }

    debug_assert!(summary.is_consistent(), "CONSORT bucket totals diverged");
    summary
}

/// Plain enrollment-view counters. Note the intentional asymmetry:
/// `lost_to_followup` and `withdrawn` require randomization, unlike the
/// CONSORT sub-reason buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSummary {
    pub enrolled: u32,
    pub randomized: u32,
    pub screen_failed: u32,
    pub completed: u32,
    /// Withdrew or investigator decision, randomized participants only.
    pub withdrawn: u32,
    /// Lost to follow-up, randomized participants only.
    pub lost_to_followup: u32,
    pub other_conclusion: u32,
}

pub fn summarize_enrollment<'a>(
    participants: impl IntoIterator<Item = &'a Participant>,
) -> EnrollmentSummary {
    let mut summary = EnrollmentSummary::default();
    for participant in participants {
        if participant.enrollment_date().is_some() {
            summary.enrolled += 1;
        }
        let randomized = participant.is_randomized();
        if randomized {
            summary.randomized += 1;
        }
        match ConclusionCode::from_code(participant.conclusion_code()) {
            Some(ConclusionCode::ScreenFailure) => summary.screen_failed += 1,
            Some(ConclusionCode::Completed) => summary.completed += 1,
            Some(ConclusionCode::Withdrew) | Some(ConclusionCode::InvestigatorDecision)
                if randomized =>
            {
                summary.withdrawn += 1;
            }
            Some(ConclusionCode::LostToFollowUp) if randomized => summary.lost_to_followup += 1,
            Some(ConclusionCode::Ineligible)
            | Some(ConclusionCode::Declined)
            | Some(ConclusionCode::Other(_)) => summary.other_conclusion += 1,
            // Unrandomized lost/withdrawn participants are deliberately not
            // counted here; CONSORT carries them as sub-reasons instead.
            Some(_) | None => {}
        }
    }
    summary
}

/// Month-keyed enrollment series for charting: one parallel array of
/// monthly counts and one of the running cumulative total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub months: Vec<String>,
    pub monthly: Vec<u32>,
    pub cumulative: Vec<u32>,
}

pub fn enrollment_series<'a>(
    participants: impl IntoIterator<Item = &'a Participant>,
) -> ChartSeries {
    let enrollment_months: Vec<MonthKey> = participants
        .into_iter()
        .filter_map(|participant| participant.enrollment_date())
        .filter_map(parse_calendar_date)
        .map(MonthKey::of)
        .collect();
    let (Some(&start), Some(&end)) = (
        enrollment_months.iter().min(),
        enrollment_months.iter().max(),
    ) else {
        return ChartSeries::default();
    };
    let mut series = ChartSeries::default();
    let mut running = 0u32;
    for month in month_range(start, end) {
        let count = enrollment_months
            .iter()
            .filter(|enrolled| **enrolled == month)
            .count() as u32;
        running += count;
        series.months.push(month.to_string());
        series.monthly.push(count);
        series.cumulative.push(running);
    }
    series
}
