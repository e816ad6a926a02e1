use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scoring::{ApplicantFlag, FlagSet, OfficerCriterion};

/// Identifier wrapper for persisted questionnaire responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Uuid);

impl ResponseId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the submitting or assessing user, supplied by the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

/// Opaque key of the browser session owning a wizard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed enumeration whose members are addressed by a stable string key.
pub trait ClosedChoice: Copy + Ord + 'static {
    const ALL: &'static [Self];

    fn key(self) -> &'static str;

    fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL.iter().copied().find(|choice| choice.key() == key)
    }
}

/// Kinds of radical material found online or on a traveller's devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadicalContentKind {
    ExtremistChannels,
    ExtremistVideos,
    ProhibitedSymbols,
    RecruitmentMessaging,
    ViolentImagery,
}

impl ClosedChoice for RadicalContentKind {
    const ALL: &'static [Self] = &[
        Self::ExtremistChannels,
        Self::ExtremistVideos,
        Self::ProhibitedSymbols,
        Self::RecruitmentMessaging,
        Self::ViolentImagery,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::ExtremistChannels => "extremist_channels",
            Self::ExtremistVideos => "extremist_videos",
            Self::ProhibitedSymbols => "prohibited_symbols",
            Self::RecruitmentMessaging => "recruitment_messaging",
            Self::ViolentImagery => "violent_imagery",
        }
    }
}

/// Marks found in travel documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentIssueKind {
    Deportation,
    EntryBan,
    ForgedDocument,
    InconsistentStamps,
}

impl ClosedChoice for DocumentIssueKind {
    const ALL: &'static [Self] = &[
        Self::Deportation,
        Self::EntryBan,
        Self::ForgedDocument,
        Self::InconsistentStamps,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::Deportation => "deportation",
            Self::EntryBan => "entry_ban",
            Self::ForgedDocument => "forged_document",
            Self::InconsistentStamps => "inconsistent_stamps",
        }
    }
}

/// Behaviour observed during the interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorIndicator {
    ReligiousTerminology,
    Aggression,
    Evasiveness,
    Nervousness,
}

impl ClosedChoice for BehaviorIndicator {
    const ALL: &'static [Self] = &[
        Self::ReligiousTerminology,
        Self::Aggression,
        Self::Evasiveness,
        Self::Nervousness,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::ReligiousTerminology => "religious_terminology",
            Self::Aggression => "aggression",
            Self::Evasiveness => "evasiveness",
            Self::Nervousness => "nervousness",
        }
    }
}

/// Applicant questionnaire, one field per numbered question.
///
/// Detail fields accompanying a yes/no question only carry meaning while the flag is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireAnswers {
    pub full_name_and_birth: String,
    pub name_changed: bool,
    pub name_change_reason: String,
    pub phones_emails: String,
    pub military_service: bool,
    pub military_details: String,
    pub criminal_record: bool,
    pub criminal_period_where: String,
    pub criminal_offenses: String,
    pub detained_abroad: bool,
    pub detained_when_why: String,
    pub detained_where: String,
    pub relatives_in_countries: bool,
    pub relatives_details: String,
    pub relatives_wanted: bool,
    pub relatives_wanted_reason: String,
    pub religious: bool,
    pub denomination: String,
    pub visited_countries: bool,
    pub visited_countries_details: String,
    pub deported: bool,
    pub deportation_details: String,
    pub not_allowed_reason: String,
    pub last_time_in_homeland: String,
}

impl QuestionnaireAnswers {
    pub fn flags(&self) -> FlagSet<ApplicantFlag> {
        let mut flags = FlagSet::new();
        flags.set(ApplicantFlag::CriminalRecord, self.criminal_record);
        flags.set(ApplicantFlag::DetainedAbroad, self.detained_abroad);
        flags.set(ApplicantFlag::Deported, self.deported);
        flags.set(ApplicantFlag::VisitedCountries, self.visited_countries);
        flags.set(ApplicantFlag::RelativesWanted, self.relatives_wanted);
        flags.set(ApplicantFlag::Religious, self.religious);
        flags
    }

    /// Name portion of the first answer, used when listing responses.
    pub fn display_name(&self) -> &str {
        let name = self
            .full_name_and_birth
            .split(',')
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() {
            "Unknown"
        } else {
            name
        }
    }
}

/// Border officer's structured assessment of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerAssessment {
    pub radical_internet: bool,
    pub radical_internet_details: String,
    pub radical_internet_categories: BTreeSet<RadicalContentKind>,
    pub radical_religious_ideology: bool,
    pub radical_religious_details: String,
    pub document_issues: bool,
    pub document_issues_details: String,
    pub document_issue_kinds: BTreeSet<DocumentIssueKind>,
    pub religious_deviations: bool,
    pub religious_deviations_details: String,
    pub suspicious_mobile_content: bool,
    pub suspicious_mobile_details: String,
    pub mobile_content_kinds: BTreeSet<RadicalContentKind>,
    pub suspicious_behavior: bool,
    pub suspicious_behavior_details: String,
    pub behavior_indicators: BTreeSet<BehaviorIndicator>,
    pub psychological_issues: bool,
    pub psychological_details: String,
    pub relatives_mto: bool,
    pub relatives_mto_details: String,
    pub criminal_element: bool,
    pub criminal_element_details: String,
    pub violence_traces: bool,
    pub violence_traces_details: String,
    pub notes: String,
}

impl OfficerAssessment {
    pub fn flags(&self) -> FlagSet<OfficerCriterion> {
        let mut flags = FlagSet::new();
        flags.set(OfficerCriterion::RadicalInternet, self.radical_internet);
        flags.set(
            OfficerCriterion::RadicalReligiousIdeology,
            self.radical_religious_ideology,
        );
        flags.set(OfficerCriterion::DocumentIssues, self.document_issues);
        flags.set(OfficerCriterion::ReligiousDeviations, self.religious_deviations);
        flags.set(
            OfficerCriterion::SuspiciousMobileContent,
            self.suspicious_mobile_content,
        );
        flags.set(OfficerCriterion::SuspiciousBehavior, self.suspicious_behavior);
        flags.set(OfficerCriterion::PsychologicalIssues, self.psychological_issues);
        flags.set(OfficerCriterion::RelativesMto, self.relatives_mto);
        flags.set(OfficerCriterion::CriminalElement, self.criminal_element);
        flags.set(OfficerCriterion::ViolenceTraces, self.violence_traces);
        flags
    }
}
