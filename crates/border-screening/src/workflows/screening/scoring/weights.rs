use serde::{Deserialize, Serialize};

use super::super::domain::ClosedChoice;
use super::{FlagSet, ScoreComponent};

/// A scored yes/no criterion with a fixed point value.
pub trait Criterion: ClosedChoice {
    fn weight(self) -> u32;
}

/// Applicant questionnaire answers that carry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantFlag {
    CriminalRecord,
    DetainedAbroad,
    Deported,
    VisitedCountries,
    RelativesWanted,
    Religious,
}

impl ClosedChoice for ApplicantFlag {
    const ALL: &'static [Self] = &[
        Self::CriminalRecord,
        Self::DetainedAbroad,
        Self::Deported,
        Self::VisitedCountries,
        Self::RelativesWanted,
        Self::Religious,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::CriminalRecord => "criminal_record",
            Self::DetainedAbroad => "detained_abroad",
            Self::Deported => "deported",
            Self::VisitedCountries => "visited_countries",
            Self::RelativesWanted => "relatives_wanted",
            Self::Religious => "religious",
        }
    }
}

impl Criterion for ApplicantFlag {
    fn weight(self) -> u32 {
        match self {
            Self::CriminalRecord => 10,
            Self::DetainedAbroad => 20,
            Self::Deported => 20,
            Self::VisitedCountries => 20,
            Self::RelativesWanted => 10,
            Self::Religious => 15,
        }
    }
}

/// Criteria of the officer assessment, in weight-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficerCriterion {
    RadicalInternet,
    RadicalReligiousIdeology,
    DocumentIssues,
    ReligiousDeviations,
    SuspiciousMobileContent,
    SuspiciousBehavior,
    PsychologicalIssues,
    RelativesMto,
    CriminalElement,
    ViolenceTraces,
}

impl ClosedChoice for OfficerCriterion {
    const ALL: &'static [Self] = &[
        Self::RadicalInternet,
        Self::RadicalReligiousIdeology,
        Self::DocumentIssues,
        Self::ReligiousDeviations,
        Self::SuspiciousMobileContent,
        Self::SuspiciousBehavior,
        Self::PsychologicalIssues,
        Self::RelativesMto,
        Self::CriminalElement,
        Self::ViolenceTraces,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::RadicalInternet => "radical_internet",
            Self::RadicalReligiousIdeology => "radical_religious_ideology",
            Self::DocumentIssues => "document_issues",
            Self::ReligiousDeviations => "religious_deviations",
            Self::SuspiciousMobileContent => "suspicious_mobile_content",
            Self::SuspiciousBehavior => "suspicious_behavior",
            Self::PsychologicalIssues => "psychological_issues",
            Self::RelativesMto => "relatives_mto",
            Self::CriminalElement => "criminal_element",
            Self::ViolenceTraces => "violence_traces",
        }
    }
}

impl Criterion for OfficerCriterion {
    fn weight(self) -> u32 {
        match self {
            Self::RadicalInternet => 65,
            Self::RadicalReligiousIdeology => 45,
            Self::DocumentIssues => 20,
            Self::ReligiousDeviations
            | Self::SuspiciousMobileContent
            | Self::SuspiciousBehavior
            | Self::PsychologicalIssues => 15,
            Self::RelativesMto | Self::CriminalElement | Self::ViolenceTraces => 10,
        }
    }
}

pub(crate) fn tally<C: Criterion>(flags: &FlagSet<C>) -> (Vec<ScoreComponent>, u32) {
    let mut components = Vec::new();
    let mut total_score: u32 = 0;

    for criterion in flags.iter() {
        let points = criterion.weight();
        components.push(ScoreComponent {
            criterion: criterion.key(),
            points,
        });
        total_score = total_score.saturating_add(points);
    }

    (components, total_score)
}
