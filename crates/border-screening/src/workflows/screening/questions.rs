//! Declared fields of the screening questionnaire and their placement on wizard steps.

use std::fmt;

use mime::Mime;

use super::domain::{BehaviorIndicator, ClosedChoice, DocumentIssueKind, RadicalContentKind};

pub const TOTAL_STEPS: u8 = 22;

const SHORT_TEXT_MAX: usize = 255;
const LONG_TEXT_MAX: usize = 10_000;

/// Which part of the record a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Applicant,
    Officer,
}

#[derive(Clone, Copy)]
pub enum FieldKind {
    /// Free text; every text answer is optional.
    Text { max_len: usize },
    /// Checkbox-style yes/no answer; `dependents` are detail fields cleared when it is unset.
    Flag {
        dependents: &'static [&'static str],
    },
    /// Set of values drawn from a closed enumeration.
    Choices {
        accepts: fn(&str) -> bool,
    },
    File,
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text { max_len } => {
                f.debug_struct("Text").field("max_len", max_len).finish()
            }
            FieldKind::Flag { dependents } => {
                f.debug_struct("Flag").field("dependents", dependents).finish()
            }
            FieldKind::Choices { .. } => f.write_str("Choices"),
            FieldKind::File => f.write_str("File"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub step: u8,
    pub section: Section,
    pub kind: FieldKind,
}

/// Ordered field declarations backing the wizard and its validation.
#[derive(Debug, Clone)]
pub struct QuestionSet {
    fields: Vec<FieldSpec>,
    total_steps: u8,
}

impl QuestionSet {
    /// The 22-step border questionnaire: twelve applicant steps, then one step per officer
    /// criterion.
    pub fn standard() -> Self {
        use Section::{Applicant, Officer};

        let fields = vec![
            text("full_name_and_birth", 1, Applicant),
            file("id_document_scan", 1, Applicant),
            flag("name_changed", 2, Applicant, &["name_change_reason"]),
            text("name_change_reason", 2, Applicant),
            text("phones_emails", 3, Applicant),
            flag("military_service", 4, Applicant, &["military_details"]),
            text("military_details", 4, Applicant),
            flag(
                "criminal_record",
                5,
                Applicant,
                &["criminal_period_where", "criminal_offenses"],
            ),
            text("criminal_period_where", 5, Applicant),
            text("criminal_offenses", 5, Applicant),
            flag(
                "detained_abroad",
                6,
                Applicant,
                &["detained_when_why", "detained_where"],
            ),
            text("detained_when_why", 6, Applicant),
            text("detained_where", 6, Applicant),
            flag("relatives_in_countries", 7, Applicant, &["relatives_details"]),
            text("relatives_details", 7, Applicant),
            flag("relatives_wanted", 8, Applicant, &["relatives_wanted_reason"]),
            text("relatives_wanted_reason", 8, Applicant),
            flag("religious", 9, Applicant, &["denomination"]),
            short_text("denomination", 9),
            flag("visited_countries", 10, Applicant, &["visited_countries_details"]),
            text("visited_countries_details", 10, Applicant),
            flag("deported", 11, Applicant, &["deportation_details"]),
            text("deportation_details", 11, Applicant),
            text("not_allowed_reason", 12, Applicant),
            short_text("last_time_in_homeland", 12),
            flag("radical_internet", 13, Officer, &["radical_internet_details"]),
            text("radical_internet_details", 13, Officer),
            choices::<RadicalContentKind>("radical_internet_categories", 13),
            flag(
                "radical_religious_ideology",
                14,
                Officer,
                &["radical_religious_details"],
            ),
            text("radical_religious_details", 14, Officer),
            flag("document_issues", 15, Officer, &["document_issues_details"]),
            text("document_issues_details", 15, Officer),
            choices::<DocumentIssueKind>("document_issue_kinds", 15),
            flag(
                "religious_deviations",
                16,
                Officer,
                &["religious_deviations_details"],
            ),
            text("religious_deviations_details", 16, Officer),
            flag(
                "suspicious_mobile_content",
                17,
                Officer,
                &["suspicious_mobile_details"],
            ),
            text("suspicious_mobile_details", 17, Officer),
            choices::<RadicalContentKind>("mobile_content_kinds", 17),
            flag(
                "suspicious_behavior",
                18,
                Officer,
                &["suspicious_behavior_details"],
            ),
            text("suspicious_behavior_details", 18, Officer),
            choices::<BehaviorIndicator>("behavior_indicators", 18),
            flag("psychological_issues", 19, Officer, &["psychological_details"]),
            text("psychological_details", 19, Officer),
            flag("relatives_mto", 20, Officer, &["relatives_mto_details"]),
            text("relatives_mto_details", 20, Officer),
            flag("criminal_element", 21, Officer, &["criminal_element_details"]),
            text("criminal_element_details", 21, Officer),
            flag("violence_traces", 22, Officer, &["violence_traces_details"]),
            text("violence_traces_details", 22, Officer),
            file("violence_evidence_photo", 22, Officer),
            text("notes", 22, Officer),
        ];

        Self {
            fields,
            total_steps: TOTAL_STEPS,
        }
    }

    pub fn total_steps(&self) -> u8 {
        self.total_steps
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn fields_on_step(&self, step: u8) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields.iter().filter(move |spec| spec.step == step)
    }

    pub fn is_officer_field(&self, name: &str) -> bool {
        self.field(name)
            .map(|spec| spec.section == Section::Officer)
            .unwrap_or(false)
    }
}

impl Default for QuestionSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Attachments are limited to images and PDF scans.
pub fn accepts_attachment(content_type: &Mime) -> bool {
    content_type.type_() == mime::IMAGE || content_type.essence_str() == "application/pdf"
}

fn text(name: &'static str, step: u8, section: Section) -> FieldSpec {
    FieldSpec {
        name,
        step,
        section,
        kind: FieldKind::Text {
            max_len: LONG_TEXT_MAX,
        },
    }
}

fn short_text(name: &'static str, step: u8) -> FieldSpec {
    FieldSpec {
        name,
        step,
        section: Section::Applicant,
        kind: FieldKind::Text {
            max_len: SHORT_TEXT_MAX,
        },
    }
}

fn flag(
    name: &'static str,
    step: u8,
    section: Section,
    dependents: &'static [&'static str],
) -> FieldSpec {
    FieldSpec {
        name,
        step,
        section,
        kind: FieldKind::Flag { dependents },
    }
}

fn choices<T: ClosedChoice>(name: &'static str, step: u8) -> FieldSpec {
    FieldSpec {
        name,
        step,
        section: Section::Officer,
        kind: FieldKind::Choices {
            accepts: accepts_key::<T>,
        },
    }
}

fn file(name: &'static str, step: u8, section: Section) -> FieldSpec {
    FieldSpec {
        name,
        step,
        section,
        kind: FieldKind::File,
    }
}

fn accepts_key<T: ClosedChoice>(key: &str) -> bool {
    T::from_key(key).is_some()
}
