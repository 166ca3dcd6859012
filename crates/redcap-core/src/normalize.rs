//! Flat-export normalization: one row per (participant, event) into a
//! per-participant structure keyed by event.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use redcap_model::{DataQualityIssue, Participant, RawRecord, StudyEvent};

/// Result of normalizing a flat record stream.
#[derive(Debug, Clone, Default)]
pub struct NormalizedStudy {
    pub participants: BTreeMap<String, Participant>,
    pub issues: Vec<DataQualityIssue>,
}

impl NormalizedStudy {
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}

/// Group flat rows by participant, splitting the conclusion pseudo-event out
/// from ongoing visit records.
///
/// Merge policy is keep-last for duplicate (participant, event) pairs, with
/// every overwrite recorded as a [`DataQualityIssue::DuplicateEventRecord`].
/// No row is dropped for its participant id here; test-id filtering is the
/// caller's concern. Pure and infallible: malformed fields degrade to
/// "absent" downstream, they are not validated here.
pub fn normalize_records(records: Vec<RawRecord>) -> NormalizedStudy {
    let mut study = NormalizedStudy::default();
    for record in records {
        let id = record.participant_id.trim().to_string();
        if id.is_empty() {
            warn!(event = %record.event, "record without participant id");
        }
        let participant = study
            .participants
            .entry(id.clone())
            .or_insert_with(|| Participant::new(id.as_str()));
        if record.event == StudyEvent::Conclusion {
            if participant.conclusion.is_some() {
                debug!(participant_id = %id, "duplicate conclusion record, keeping last");
                study.issues.push(DataQualityIssue::DuplicateEventRecord {
                    participant_id: id,
                    event: StudyEvent::Conclusion,
                });
            }
            participant.conclusion = Some(record);
        } else {
            let event = record.event;
            if participant.visits.insert(event, record).is_some() {
                debug!(participant_id = %id, %event, "duplicate visit record, keeping last");
                study.issues.push(DataQualityIssue::DuplicateEventRecord {
                    participant_id: id,
                    event,
                });
            }
        }
    }
    study
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_conclusion_from_visits() {
        let records = vec![
            RawRecord::new("101", StudyEvent::Baseline).with_field("enrollment_date", "2024-01-02"),
            RawRecord::new("101", StudyEvent::Visit3).with_field("visit_date", "2024-02-01"),
            RawRecord::new("101", StudyEvent::Conclusion).with_field("conclusion_code", "1"),
            RawRecord::new("102", StudyEvent::Baseline),
        ];
        let study = normalize_records(records);
        assert_eq!(study.participant_count(), 2);
        let p101 = &study.participants["101"];
        assert_eq!(p101.visits.len(), 2);
        assert_eq!(p101.conclusion_code(), Some("1"));
        assert!(study.participants["102"].conclusion.is_none());
        assert!(study.issues.is_empty());
    }

    #[test]
    fn duplicate_event_keeps_last_and_flags() {
        let records = vec![
            RawRecord::new("101", StudyEvent::Visit3).with_field("visit_date", "2024-02-01"),
            RawRecord::new("101", StudyEvent::Visit3).with_field("visit_date", "2024-02-08"),
        ];
        let study = normalize_records(records);
        let p101 = &study.participants["101"];
        assert_eq!(
            p101.visit(StudyEvent::Visit3).and_then(|r| r.visit_date()),
            Some("2024-02-08")
        );
        assert_eq!(
            study.issues,
            vec![DataQualityIssue::DuplicateEventRecord {
                participant_id: "101".to_string(),
                event: StudyEvent::Visit3,
            }]
        );
    }

    #[test]
    fn duplicate_conclusion_keeps_last() {
        let records = vec![
            RawRecord::new("101", StudyEvent::Conclusion).with_field("conclusion_code", "3"),
            RawRecord::new("101", StudyEvent::Conclusion).with_field("conclusion_code", "4"),
        ];
        let study = normalize_records(records);
        assert_eq!(study.participants["101"].conclusion_code(), Some("4"));
        assert_eq!(study.issues.len(), 1);
    }

    #[test]
    fn padded_ids_merge_and_duplicates_still_flag() {
        let records = vec![
            RawRecord::new(" 101 ", StudyEvent::Visit3).with_field("visit_date", "2024-02-01"),
            RawRecord::new("101", StudyEvent::Visit3).with_field("visit_date", "2024-02-08"),
        ];
        let study = normalize_records(records);
        assert_eq!(study.participant_count(), 1);
        assert_eq!(
            study.participants["101"]
                .visit(StudyEvent::Visit3)
                .and_then(|r| r.visit_date()),
            Some("2024-02-08")
        );
        assert_eq!(
            study.issues,
            vec![DataQualityIssue::DuplicateEventRecord {
                participant_id: "101".to_string(),
                event: StudyEvent::Visit3,
            }]
        );
    }

    #[test]
    fn missing_participant_id_is_kept() {
        let study = normalize_records(vec![RawRecord::new("", StudyEvent::Baseline)]);
        assert!(study.participants.contains_key(""));
    }
}
