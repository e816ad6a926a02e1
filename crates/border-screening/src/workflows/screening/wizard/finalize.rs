use std::collections::{BTreeMap, BTreeSet};

use mime::Mime;
use serde::Serialize;
use tracing::debug;

use super::super::domain::{ClosedChoice, OfficerAssessment, QuestionnaireAnswers};
use super::super::questions::{accepts_attachment, FieldKind, QuestionSet};
use super::super::scoring::{score, ScoreResult};
use super::{parse_marker, FieldValue, UploadStaging, WizardState};

/// Reason a single field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldIssue {
    #[error("at most {max} characters allowed, found {found}")]
    TooLong { max: usize, found: usize },
    #[error("'{value}' is not a yes/no answer")]
    InvalidFlag { value: String },
    #[error("'{value}' is not an allowed choice")]
    InvalidChoice { value: String },
    #[error("expected a {expected} value")]
    WrongKind { expected: &'static str },
    #[error("content type '{content_type}' is not accepted")]
    UnsupportedContentType { content_type: String },
    #[error("uploaded file is no longer available")]
    UploadMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {issue}")]
pub struct FieldError {
    pub field: String,
    pub issue: FieldIssue,
}

/// Every field that failed validation during a finalize or assessment save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|error| error.field.as_str())
    }
}

/// A set flag whose detail fields were left empty. Accepted, only reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentDataWarning {
    pub flag: &'static str,
}

/// Upload decoded out of the staging area, ready for the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedAttachment {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredAssessment {
    pub assessment: OfficerAssessment,
    pub score: ScoreResult,
}

/// Validated wizard output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedSubmission {
    pub answers: QuestionnaireAnswers,
    pub applicant_score: ScoreResult,
    pub assessment: Option<ScoredAssessment>,
    pub attachments: Vec<MaterializedAttachment>,
    pub warnings: Vec<DependentDataWarning>,
}

impl FinalizedSubmission {
    /// The officer score once an assessment exists, the applicant score otherwise.
    pub fn score(&self) -> ScoreResult {
        self.assessment
            .as_ref()
            .map(|scored| scored.score)
            .unwrap_or(self.applicant_score)
    }
}

/// Validate accumulated wizard input and score it. The state is left untouched.
pub fn finalize<S>(
    state: &WizardState,
    questions: &QuestionSet,
    staging: &S,
) -> Result<FinalizedSubmission, ValidationErrors>
where
    S: UploadStaging + ?Sized,
{
    let mut reader = FieldReader::new(questions, &state.fields);
    let answers = read_answers(&mut reader);
    let assessment = if state.has_officer_input(questions) {
        Some(read_officer(&mut reader))
    } else {
        None
    };

    let mut errors = reader.into_errors();
    let attachments = materialize(state, questions, staging, &mut errors);
    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }

    let warnings = dependent_data_warnings(questions, &state.fields);
    for warning in &warnings {
        debug!(flag = warning.flag, "flag set without supporting details");
    }

    let applicant_score = score(&answers.flags());
    let assessment = assessment.map(|assessment| ScoredAssessment {
        score: score(&assessment.flags()),
        assessment,
    });

    Ok(FinalizedSubmission {
        answers,
        applicant_score,
        assessment,
        attachments,
        warnings,
    })
}

/// Read and validate the officer section of `fields`.
pub fn read_assessment(
    questions: &QuestionSet,
    fields: &BTreeMap<String, FieldValue>,
) -> Result<OfficerAssessment, ValidationErrors> {
    let mut reader = FieldReader::new(questions, fields);
    let assessment = read_officer(&mut reader);
    let errors = reader.into_errors();
    if errors.is_empty() {
        Ok(assessment)
    } else {
        Err(ValidationErrors(errors))
    }
}

fn read_answers(reader: &mut FieldReader<'_>) -> QuestionnaireAnswers {
    QuestionnaireAnswers {
        full_name_and_birth: reader.text("full_name_and_birth"),
        name_changed: reader.flag("name_changed"),
        name_change_reason: reader.text("name_change_reason"),
        phones_emails: reader.text("phones_emails"),
        military_service: reader.flag("military_service"),
        military_details: reader.text("military_details"),
        criminal_record: reader.flag("criminal_record"),
        criminal_period_where: reader.text("criminal_period_where"),
        criminal_offenses: reader.text("criminal_offenses"),
        detained_abroad: reader.flag("detained_abroad"),
        detained_when_why: reader.text("detained_when_why"),
        detained_where: reader.text("detained_where"),
        relatives_in_countries: reader.flag("relatives_in_countries"),
        relatives_details: reader.text("relatives_details"),
        relatives_wanted: reader.flag("relatives_wanted"),
        relatives_wanted_reason: reader.text("relatives_wanted_reason"),
        religious: reader.flag("religious"),
        denomination: reader.text("denomination"),
        visited_countries: reader.flag("visited_countries"),
        visited_countries_details: reader.text("visited_countries_details"),
        deported: reader.flag("deported"),
        deportation_details: reader.text("deportation_details"),
        not_allowed_reason: reader.text("not_allowed_reason"),
        last_time_in_homeland: reader.text("last_time_in_homeland"),
    }
}

fn read_officer(reader: &mut FieldReader<'_>) -> OfficerAssessment {
    OfficerAssessment {
        radical_internet: reader.flag("radical_internet"),
        radical_internet_details: reader.text("radical_internet_details"),
        radical_internet_categories: reader.choices("radical_internet_categories"),
        radical_religious_ideology: reader.flag("radical_religious_ideology"),
        radical_religious_details: reader.text("radical_religious_details"),
        document_issues: reader.flag("document_issues"),
        document_issues_details: reader.text("document_issues_details"),
        document_issue_kinds: reader.choices("document_issue_kinds"),
        religious_deviations: reader.flag("religious_deviations"),
        religious_deviations_details: reader.text("religious_deviations_details"),
        suspicious_mobile_content: reader.flag("suspicious_mobile_content"),
        suspicious_mobile_details: reader.text("suspicious_mobile_details"),
        mobile_content_kinds: reader.choices("mobile_content_kinds"),
        suspicious_behavior: reader.flag("suspicious_behavior"),
        suspicious_behavior_details: reader.text("suspicious_behavior_details"),
        behavior_indicators: reader.choices("behavior_indicators"),
        psychological_issues: reader.flag("psychological_issues"),
        psychological_details: reader.text("psychological_details"),
        relatives_mto: reader.flag("relatives_mto"),
        relatives_mto_details: reader.text("relatives_mto_details"),
        criminal_element: reader.flag("criminal_element"),
        criminal_element_details: reader.text("criminal_element_details"),
        violence_traces: reader.flag("violence_traces"),
        violence_traces_details: reader.text("violence_traces_details"),
        notes: reader.text("notes"),
    }
}

fn materialize<S>(
    state: &WizardState,
    questions: &QuestionSet,
    staging: &S,
    errors: &mut Vec<FieldError>,
) -> Vec<MaterializedAttachment>
where
    S: UploadStaging + ?Sized,
{
    let mut attachments = Vec::new();

    for (field, staged) in &state.uploads {
        if !matches!(questions.field(field).map(|spec| spec.kind), Some(FieldKind::File)) {
            continue;
        }

        let accepted = staged
            .content_type
            .parse::<Mime>()
            .map(|content_type| accepts_attachment(&content_type))
            .unwrap_or(false);
        if !accepted {
            errors.push(FieldError {
                field: field.clone(),
                issue: FieldIssue::UnsupportedContentType {
                    content_type: staged.content_type.clone(),
                },
            });
            continue;
        }

        match staging.fetch(staged) {
            Ok(bytes) => attachments.push(MaterializedAttachment {
                field: field.clone(),
                filename: staged.filename.clone(),
                content_type: staged.content_type.clone(),
                bytes,
            }),
            Err(err) => {
                debug!(field = %field, error = %err, "staged upload unavailable at finalize");
                errors.push(FieldError {
                    field: field.clone(),
                    issue: FieldIssue::UploadMissing,
                });
            }
        }
    }

    attachments
}

fn dependent_data_warnings(
    questions: &QuestionSet,
    fields: &BTreeMap<String, FieldValue>,
) -> Vec<DependentDataWarning> {
    questions
        .fields()
        .iter()
        .filter_map(|spec| match spec.kind {
            FieldKind::Flag { dependents } if !dependents.is_empty() => Some((spec, dependents)),
            _ => None,
        })
        .filter(|(spec, _)| matches!(fields.get(spec.name), Some(FieldValue::Flag(true))))
        .filter(|(_, dependents)| {
            dependents.iter().all(|dependent| match fields.get(*dependent) {
                Some(FieldValue::Text(value)) => value.trim().is_empty(),
                _ => true,
            })
        })
        .map(|(spec, _)| DependentDataWarning { flag: spec.name })
        .collect()
}

/// Typed access to accumulated values, collecting validation failures along the way.
struct FieldReader<'a> {
    questions: &'a QuestionSet,
    fields: &'a BTreeMap<String, FieldValue>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(questions: &'a QuestionSet, fields: &'a BTreeMap<String, FieldValue>) -> Self {
        Self {
            questions,
            fields,
            errors: Vec::new(),
        }
    }

    fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    fn reject(&mut self, field: &str, issue: FieldIssue) {
        self.errors.push(FieldError {
            field: field.to_string(),
            issue,
        });
    }

    fn text(&mut self, name: &str) -> String {
        let value = match self.fields.get(name) {
            None => String::new(),
            Some(FieldValue::Text(value)) => value.clone(),
            Some(_) => {
                self.reject(name, FieldIssue::WrongKind { expected: "text" });
                return String::new();
            }
        };

        if let Some(FieldKind::Text { max_len }) =
            self.questions.field(name).map(|spec| spec.kind)
        {
            let found = value.chars().count();
            if found > max_len {
                self.reject(name, FieldIssue::TooLong { max: max_len, found });
            }
        }

        value
    }

    fn flag(&mut self, name: &str) -> bool {
        match self.fields.get(name) {
            None => false,
            Some(FieldValue::Flag(value)) => *value,
            Some(FieldValue::Text(raw)) => match parse_marker(raw) {
                Some(value) => value,
                None => {
                    self.reject(name, FieldIssue::InvalidFlag { value: raw.clone() });
                    false
                }
            },
            Some(FieldValue::Choices(_)) => {
                self.reject(name, FieldIssue::WrongKind { expected: "yes/no" });
                false
            }
        }
    }

    fn choices<T: ClosedChoice>(&mut self, name: &str) -> BTreeSet<T> {
        let values = match self.fields.get(name) {
            None => return BTreeSet::new(),
            Some(FieldValue::Choices(values)) => values,
            Some(_) => {
                self.reject(name, FieldIssue::WrongKind { expected: "multi-select" });
                return BTreeSet::new();
            }
        };

        let mut selected = BTreeSet::new();
        for value in values {
            match T::from_key(value) {
                Some(choice) => {
                    selected.insert(choice);
                }
                None => self.reject(name, FieldIssue::InvalidChoice { value: value.clone() }),
            }
        }
        selected
    }
}
