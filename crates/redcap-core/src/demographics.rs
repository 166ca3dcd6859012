//! Demographic classification into the NIH inclusion-enrollment
//! cross-tabulation: 7 race rows by (3 ethnicity x 3 sex) columns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use redcap_model::{Ethnicity, Participant, Race, RawRecord, Sex, StudyEvent};

/// Race selections from a record, accepting the equivalent REDCap
/// encodings: a combined `race` field holding a delimited string or a JSON
/// array, with the suffixed checkbox fields (`race___1`..`race___6`) as a
/// fallback used only when the combined field yields zero selections.
fn race_selections(record: &RawRecord) -> Vec<u8> {
    let mut selections: Vec<u8> = Vec::new();
    if let Some(combined) = record.field("race") {
        let trimmed = combined.trim();
        if trimmed.starts_with('[') {
            if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
                for value in values {
                    let number = match value {
                        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
                        serde_json::Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    };
                    if let Some(number) = number {
                        selections.push(number);
                    }
                }
            }
        } else {
            for part in trimmed.split([',', ';', '|']) {
                if let Ok(number) = part.trim().parse() {
                    selections.push(number);
                }
            }
        }
    }
    if selections.is_empty() {
        for number in 1..=6u8 {
            let checkbox = format!("race___{number}");
            if record.field(&checkbox) == Some("1") {
                selections.push(number);
            }
        }
    }
    selections.sort_unstable();
    selections.dedup();
    selections
}

/// Map race selections to the NIH race row: exactly one informative
/// selection names its category, more than one is "More than one race", and
/// zero (including only the unknown checkbox) is "Unknown or not reported".
pub fn classify_race(record: &RawRecord) -> Race {
    let informative: Vec<Race> = race_selections(record)
        .into_iter()
        .filter_map(Race::from_checkbox)
        .collect();
    match informative.as_slice() {
        [] => Race::UnknownOrNotReported,
        [single] => *single,
        _ => Race::MoreThanOneRace,
    }
}

pub fn classify_sex(record: &RawRecord) -> Sex {
    Sex::from_code(record.field("sex"))
}

pub fn classify_ethnicity(record: &RawRecord) -> Ethnicity {
    Ethnicity::from_code(record.field("ethnicity"))
}

/// The NIH cross-tabulation with row and grand totals. Demographics are read
/// from the baseline record; participants without one count as unknown on
/// every axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicTable {
    // Serialized as an array of rows; tuple map keys are not valid JSON keys.
    #[serde(with = "cell_rows")]
    cells: BTreeMap<(Race, Ethnicity, Sex), u32>,
    total: u32,
}

mod cell_rows {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use redcap_model::{Ethnicity, Race, Sex};

    type Cells = BTreeMap<(Race, Ethnicity, Sex), u32>;

    pub fn serialize<S: Serializer>(cells: &Cells, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<(Race, Ethnicity, Sex, u32)> = cells
            .iter()
            .map(|(&(race, ethnicity, sex), &count)| (race, ethnicity, sex, count))
            .collect();
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cells, D::Error> {
        let rows = Vec::<(Race, Ethnicity, Sex, u32)>::deserialize(deserializer)?;
        Ok(rows
            .into_iter()
            .map(|(race, ethnicity, sex, count)| ((race, ethnicity, sex), count))
            .collect())
    }
}

impl DemographicTable {
    pub fn build<'a>(participants: impl IntoIterator<Item = &'a Participant>) -> Self {
        let mut table = Self::default();
        for participant in participants {
            let (race, ethnicity, sex) = match participant.visit(StudyEvent::Baseline) {
                Some(record) => (
                    classify_race(record),
                    classify_ethnicity(record),
                    classify_sex(record),
                ),
                None => (Race::UnknownOrNotReported, Ethnicity::Unknown, Sex::Unknown),
            };
            *table.cells.entry((race, ethnicity, sex)).or_insert(0) += 1;
            table.total += 1;
        }
        table
    }

    pub fn cell(&self, race: Race, ethnicity: Ethnicity, sex: Sex) -> u32 {
        self.cells.get(&(race, ethnicity, sex)).copied().unwrap_or(0)
    }

    pub fn race_total(&self, race: Race) -> u32 {
        self.cells
            .iter()
            .filter(|((r, _, _), _)| *r == race)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn grand_total(&self) -> u32 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline_with(fields: &[(&str, &str)]) -> RawRecord {
        let mut record = RawRecord::new("101", StudyEvent::Baseline);
        for (name, value) in fields {
            record = record.with_field(*name, *value);
        }
        record
    }

    #[test]
    fn single_checkbox_names_the_category() {
        let record = baseline_with(&[("race___2", "1")]);
        assert_eq!(classify_race(&record), Race::Asian);
    }

    #[test]
    fn two_checkboxes_are_more_than_one_race() {
        let record = baseline_with(&[("race___1", "1"), ("race___5", "1")]);
        assert_eq!(classify_race(&record), Race::MoreThanOneRace);
    }

    #[test]
    fn nothing_set_is_unknown() {
        let record = baseline_with(&[]);
        assert_eq!(classify_race(&record), Race::UnknownOrNotReported);
    }

    #[test]
    fn unknown_checkbox_is_not_informative() {
        let record = baseline_with(&[("race___6", "1")]);
        assert_eq!(classify_race(&record), Race::UnknownOrNotReported);
        let mixed = baseline_with(&[("race___6", "1"), ("race___4", "1")]);
        assert_eq!(mixed.field("race___4"), Some("1"));
        assert_eq!(classify_race(&mixed), Race::BlackAfricanAmerican);
    }

    #[test]
    fn combined_field_takes_precedence() {
        let delimited = baseline_with(&[("race", "2,5"), ("race___1", "1")]);
        assert_eq!(classify_race(&delimited), Race::MoreThanOneRace);
        let array = baseline_with(&[("race", "[\"3\"]")]);
        assert_eq!(classify_race(&array), Race::NativeHawaiianPacificIslander);
        let numbers = baseline_with(&[("race", "[4]")]);
        assert_eq!(classify_race(&numbers), Race::BlackAfricanAmerican);
    }

    #[test]
    fn empty_combined_field_falls_back_to_checkboxes() {
        let record = baseline_with(&[("race", " , "), ("race___5", "1")]);
        assert_eq!(classify_race(&record), Race::White);
    }

    #[test]
    fn cross_tab_totals() {
        let mut participants = Vec::new();
        for (id, sex, ethnicity, race_box) in [
            ("1", "1", "2", "2"),
            ("2", "2", "2", "2"),
            ("3", "1", "1", "5"),
        ] {
            let mut participant = Participant::new(id);
            participant.visits.insert(
                StudyEvent::Baseline,
                baseline_with(&[
                    ("sex", sex),
                    ("ethnicity", ethnicity),
                    (&format!("race___{race_box}"), "1"),
                ]),
            );
            participants.push(participant);
        }
        let table = DemographicTable::build(participants.iter());
        assert_eq!(table.cell(Race::Asian, Ethnicity::NotHispanic, Sex::Female), 1);
        assert_eq!(table.cell(Race::Asian, Ethnicity::NotHispanic, Sex::Male), 1);
        assert_eq!(table.cell(Race::White, Ethnicity::Hispanic, Sex::Female), 1);
        assert_eq!(table.race_total(Race::Asian), 2);
        assert_eq!(table.race_total(Race::AmericanIndianAlaskaNative), 0);
        assert_eq!(table.grand_total(), 3);
    }

    #[test]
    fn missing_baseline_counts_as_unknown() {
        let participant = Participant::new("9");
        let table = DemographicTable::build([&participant]);
        assert_eq!(
            table.cell(Race::UnknownOrNotReported, Ethnicity::Unknown, Sex::Unknown),
            1
        );
    }
}
