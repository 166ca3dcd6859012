use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal disposition codes recorded once per participant on the
/// conclusion event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConclusionCode {
    Completed,
    ScreenFailure,
    Withdrew,
    LostToFollowUp,
    InvestigatorDecision,
    Ineligible,
    Declined,
    /// Any other non-empty code value, preserved verbatim for reporting.
    Other(String),
}

impl ConclusionCode {
    /// Map the raw coded value. Empty or absent input has no conclusion and
    /// returns `None`; unknown non-empty codes degrade to `Other`.
    pub fn from_code(code: Option<&str>) -> Option<Self> {
        let code = code?.trim();
        if code.is_empty() {
            return None;
        }
        Some(match code {
            "1" => ConclusionCode::Completed,
            "2" => ConclusionCode::ScreenFailure,
            "3" => ConclusionCode::Withdrew,
            "4" => ConclusionCode::LostToFollowUp,
            "5" => ConclusionCode::InvestigatorDecision,
            "6" => ConclusionCode::Ineligible,
            "7" => ConclusionCode::Declined,
            other => ConclusionCode::Other(other.to_string()),
        })
    }

    pub fn label(&self) -> &str {
        match self {
            ConclusionCode::Completed => "Completed",
            ConclusionCode::ScreenFailure => "Screen failure",
            ConclusionCode::Withdrew => "Withdrew",
            ConclusionCode::LostToFollowUp => "Lost to follow-up",
            ConclusionCode::InvestigatorDecision => "Investigator decision",
            ConclusionCode::Ineligible => "Ineligible",
            ConclusionCode::Declined => "Declined",
            ConclusionCode::Other(code) => code,
        }
    }
}

impl fmt::Display for ConclusionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Sex per the NIH enrollment-report convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
    Unknown,
}

impl Sex {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("1") => Sex::Female,
            Some("2") => Sex::Male,
            _ => Sex::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sex::Female => "Female",
            Sex::Male => "Male",
            Sex::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ethnicity {
    Hispanic,
    NotHispanic,
    Unknown,
}

impl Ethnicity {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("1") => Ethnicity::Hispanic,
            Some("2") => Ethnicity::NotHispanic,
            _ => Ethnicity::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Ethnicity::Hispanic => "Hispanic or Latino",
            Ethnicity::NotHispanic => "Not Hispanic or Latino",
            Ethnicity::Unknown => "Unknown",
        }
    }
}

/// The seven race rows of the NIH inclusion-enrollment cross-tabulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Race {
    AmericanIndianAlaskaNative,
    Asian,
    NativeHawaiianPacificIslander,
    BlackAfricanAmerican,
    White,
    MoreThanOneRace,
    UnknownOrNotReported,
}

impl Race {
    /// All rows in NIH table order.
    pub const ALL: [Race; 7] = [
        Race::AmericanIndianAlaskaNative,
        Race::Asian,
        Race::NativeHawaiianPacificIslander,
        Race::BlackAfricanAmerican,
        Race::White,
        Race::MoreThanOneRace,
        Race::UnknownOrNotReported,
    ];

    /// The single-race category for checkbox number 1-5. Checkbox 6 is the
    /// explicit "unknown or not reported" option and never counts as an
    /// informative selection.
    pub fn from_checkbox(number: u8) -> Option<Race> {
        match number {
            1 => Some(Race::AmericanIndianAlaskaNative),
            2 => Some(Race::Asian),
            3 => Some(Race::NativeHawaiianPacificIslander),
            4 => Some(Race::BlackAfricanAmerican),
            5 => Some(Race::White),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Race::AmericanIndianAlaskaNative => "American Indian or Alaska Native",
            Race::Asian => "Asian",
            Race::NativeHawaiianPacificIslander => "Native Hawaiian or Other Pacific Islander",
            Race::BlackAfricanAmerican => "Black or African American",
            Race::White => "White",
            Race::MoreThanOneRace => "More than one race",
            Race::UnknownOrNotReported => "Unknown or not reported",
        }
    }
}
