//! Session-scoped accumulation of multi-step questionnaire input.
//!
//! A [`WizardState`] lives in a [`WizardSessionStore`] between requests. Each step submission
//! is merged with [`WizardState::apply_step`]; uploads are staged server-side and only their
//! [`StagedUpload`] references are kept in the state. [`finalize`] turns the accumulated state
//! into a validated, scored submission without mutating it.

mod finalize;
mod staging;

pub use finalize::{
    finalize, read_assessment, DependentDataWarning, FieldError, FieldIssue,
    FinalizedSubmission, MaterializedAttachment, ScoredAssessment, ValidationErrors,
};
pub use staging::{
    SessionStoreError, StagingError, UploadPayload, UploadStaging, WizardSessionStore,
};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::questions::{FieldKind, FieldSpec, QuestionSet};

/// One-based wizard step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WizardStep(u8);

impl WizardStep {
    pub const FIRST: WizardStep = WizardStep(1);

    /// Clamp a client-supplied step number into `1..=total_steps`.
    pub fn clamped(raw: u32, total_steps: u8) -> Self {
        let last = u32::from(total_steps.max(1));
        let step = raw.clamp(1, last);
        Self(u8::try_from(step).unwrap_or(total_steps.max(1)))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn previous(self) -> Self {
        Self(self.0.saturating_sub(1).max(1))
    }

    pub fn next(self, total_steps: u8) -> Self {
        Self(self.0.saturating_add(1).min(total_steps.max(1)))
    }
}

impl Default for WizardStep {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Navigation token sent with every step submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardAction {
    Previous,
    #[default]
    Next,
    Submit,
}

/// Accumulated value of a declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Choices(BTreeSet<String>),
}

impl FieldValue {
    /// False for the defaults a merge writes for untouched checkboxes and selections.
    pub fn is_answered(&self) -> bool {
        match self {
            FieldValue::Text(value) => !value.trim().is_empty(),
            FieldValue::Flag(value) => *value,
            FieldValue::Choices(values) => !values.is_empty(),
        }
    }
}

/// Raw value as posted by a client: a checkbox/boolean, a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedValue {
    Flag(bool),
    Single(String),
    Multiple(Vec<String>),
}

impl SubmittedValue {
    /// Last submitted string, mirroring how form posts resolve repeated keys.
    fn into_text(self) -> String {
        match self {
            SubmittedValue::Flag(value) => value.to_string(),
            SubmittedValue::Single(value) => value,
            SubmittedValue::Multiple(values) => values.into_iter().last().unwrap_or_default(),
        }
    }

    fn into_choices(self) -> BTreeSet<String> {
        match self {
            SubmittedValue::Flag(value) => BTreeSet::from([value.to_string()]),
            SubmittedValue::Single(value) if value.trim().is_empty() => BTreeSet::new(),
            SubmittedValue::Single(value) => BTreeSet::from([value]),
            SubmittedValue::Multiple(values) => values
                .into_iter()
                .filter(|value| !value.trim().is_empty())
                .collect(),
        }
    }

    /// Interpret a checkbox marker; unrecognised markers are handed back verbatim.
    fn as_marker(&self) -> Result<bool, String> {
        match self {
            SubmittedValue::Flag(value) => Ok(*value),
            SubmittedValue::Single(raw) => parse_marker(raw).ok_or_else(|| raw.clone()),
            SubmittedValue::Multiple(values) => match values.last() {
                Some(raw) => parse_marker(raw).ok_or_else(|| raw.clone()),
                None => Ok(false),
            },
        }
    }
}

pub(crate) fn parse_marker(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" | "y" => Some(true),
        "" | "off" | "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Reference to a blob held in the upload staging area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedUpload {
    pub field: String,
    pub staging_key: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

/// Side effects of a merge the caller must act on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepChanges {
    /// Uploads replaced or cleared by this step; their blobs can be discarded.
    pub displaced: Vec<StagedUpload>,
    /// Submitted keys that are not part of the question set.
    pub ignored: Vec<String>,
}

/// Not-yet-committed questionnaire input for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub step: WizardStep,
    pub fields: BTreeMap<String, FieldValue>,
    pub uploads: BTreeMap<String, StagedUpload>,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.fields.get(name) {
            Some(FieldValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn choices(&self, name: &str) -> Option<&BTreeSet<String>> {
        match self.fields.get(name) {
            Some(FieldValue::Choices(values)) => Some(values),
            _ => None,
        }
    }

    /// Whether an officer-section field carries an actual answer: a set flag, non-empty text,
    /// a non-empty selection or an upload. Paging through officer steps records only defaults.
    pub fn has_officer_input(&self, questions: &QuestionSet) -> bool {
        self.fields
            .iter()
            .any(|(name, value)| questions.is_officer_field(name) && value.is_answered())
            || self.uploads.keys().any(|name| questions.is_officer_field(name))
    }

    /// Merge one step submission into the accumulated state.
    ///
    /// Flags and multi-selects placed on `step` are rewritten even when absent from
    /// `fields` (an unchecked box posts nothing). Uploads in `staged` replace earlier uploads
    /// for the same field; `cleared` removes uploads explicitly.
    pub fn apply_step(
        &mut self,
        questions: &QuestionSet,
        step: WizardStep,
        fields: BTreeMap<String, SubmittedValue>,
        staged: Vec<StagedUpload>,
        cleared: &[String],
    ) -> StepChanges {
        let mut changes =
            merge_fields(questions, &mut self.fields, fields, |spec| spec.step == step.get());

        for name in cleared {
            if let Some(previous) = self.uploads.remove(name) {
                changes.displaced.push(previous);
            }
        }

        for upload in staged {
            match questions.field(&upload.field).map(|spec| spec.kind) {
                Some(FieldKind::File) => {
                    if let Some(previous) = self.uploads.insert(upload.field.clone(), upload) {
                        changes.displaced.push(previous);
                    }
                }
                _ => {
                    debug!(field = %upload.field, "ignoring upload for non-file field");
                    changes.ignored.push(upload.field.clone());
                    changes.displaced.push(upload);
                }
            }
        }

        changes
    }
}

/// Merge submitted values into `target` following the declared field kinds.
///
/// `explicit` selects the flags and multi-selects whose absence means "unset". A flag moving
/// from `true` to `false` clears its dependent detail fields.
pub(crate) fn merge_fields<F>(
    questions: &QuestionSet,
    target: &mut BTreeMap<String, FieldValue>,
    submitted: BTreeMap<String, SubmittedValue>,
    explicit: F,
) -> StepChanges
where
    F: Fn(&FieldSpec) -> bool,
{
    let mut changes = StepChanges::default();
    let mut flags = BTreeMap::new();
    let mut submitted_choices = BTreeSet::new();

    for (name, value) in submitted {
        let Some(spec) = questions.field(&name) else {
            debug!(field = %name, "ignoring unknown field");
            changes.ignored.push(name);
            continue;
        };

        match spec.kind {
            FieldKind::Text { .. } => {
                target.insert(name, FieldValue::Text(value.into_text()));
            }
            FieldKind::Choices { .. } => {
                submitted_choices.insert(spec.name);
                target.insert(name, FieldValue::Choices(value.into_choices()));
            }
            FieldKind::Flag { .. } => {
                flags.insert(spec.name, value);
            }
            FieldKind::File => {
                debug!(field = %name, "ignoring scalar value for file field");
                changes.ignored.push(name);
            }
        }
    }

    for spec in questions.fields() {
        match spec.kind {
            FieldKind::Flag { dependents } => {
                let next = match flags.get(spec.name) {
                    Some(value) => value.as_marker(),
                    None if explicit(spec) => Ok(false),
                    None => continue,
                };

                let previous = match target.get(spec.name) {
                    Some(FieldValue::Flag(value)) => Some(*value),
                    _ => None,
                };

                match next {
                    Ok(value) => {
                        target.insert(spec.name.to_string(), FieldValue::Flag(value));
                        if !value && previous == Some(true) {
                            for dependent in dependents {
                                target
                                    .insert(dependent.to_string(), FieldValue::Text(String::new()));
                            }
                        }
                    }
                    Err(raw) => {
                        target.insert(spec.name.to_string(), FieldValue::Text(raw));
                    }
                }
            }
            FieldKind::Choices { .. }
                if explicit(spec) && !submitted_choices.contains(spec.name) =>
            {
                target.insert(spec.name.to_string(), FieldValue::Choices(BTreeSet::new()));
            }
            _ => {}
        }
    }

    changes
}
