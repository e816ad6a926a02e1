use crate::infra::{InMemoryResponseRepository, InMemoryUploadStaging, InMemoryWizardSessions};
use border_screening::config::ScreeningConfig;
use border_screening::error::AppError;
use border_screening::workflows::screening::{
    score_flags, AccessContext, ResponseRecord, Role, ScreeningService, SessionId, StepOutcome,
    StepSubmission, SubmittedValue, UploadPayload, UserId, WizardAction,
};
use clap::Args;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// Applicant flags answered "yes" (e.g. criminal_record,deported)
    #[arg(long, value_delimiter = ',')]
    pub(crate) applicant: Vec<String>,
    /// Officer criteria observed (e.g. radical_internet)
    #[arg(long, value_delimiter = ',')]
    pub(crate) officer: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Session identifier used for the sample wizard.
    #[arg(long, default_value = "demo-session")]
    pub(crate) session: String,
    /// Skip the officer assessment and recalculation portion of the demo.
    #[arg(long)]
    pub(crate) skip_assessment: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let report = score_flags(&args.applicant, &args.officer);
    println!(
        "Authoritative score: {} ({})",
        report.authoritative.total_score,
        report.authoritative.tier.label()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

type DemoService =
    ScreeningService<InMemoryResponseRepository, InMemoryWizardSessions, InMemoryUploadStaging>;

fn demo_steps() -> Vec<(u32, Vec<(&'static str, SubmittedValue)>)> {
    let text = |value: &str| SubmittedValue::Single(value.to_string());
    vec![
        (
            1,
            vec![(
                "full_name_and_birth",
                text("Amir Karimov, 1986-11-03, Namangan"),
            )],
        ),
        (
            3,
            vec![("phones_emails", text("+998 90 000 00 00, amir@example.org"))],
        ),
        (
            6,
            vec![
                ("detained_abroad", text("on")),
                ("detained_when_why", text("2017, visa overstay")),
                ("detained_where", text("Antalya")),
            ],
        ),
        (
            10,
            vec![
                ("visited_countries", text("on")),
                ("visited_countries_details", text("Turkey 2015-2017")),
            ],
        ),
        (12, vec![("last_time_in_homeland", text("January 2024"))]),
    ]
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        session,
        skip_assessment,
    } = args;

    let staging = Arc::new(InMemoryUploadStaging::default());
    let service: DemoService = ScreeningService::new(
        Arc::new(InMemoryResponseRepository::default()),
        Arc::new(InMemoryWizardSessions::default()),
        staging.clone(),
        ScreeningConfig::default(),
    );
    let session = SessionId(session);
    let submitter = AccessContext::new(Role::Submitter, Some(UserId(Uuid::new_v4())));

    println!("Border screening demo (session {session})");
    let steps = demo_steps();
    let last_step = steps.last().map(|(step, _)| *step).unwrap_or(1);
    for (step, entries) in steps {
        let uploads = if step == 1 {
            vec![UploadPayload {
                field: "id_document_scan".to_string(),
                filename: "passport.pdf".to_string(),
                content_type: None,
                bytes: b"%PDF-1.4 sample".to_vec(),
            }]
        } else {
            Vec::new()
        };
        let action = if step == last_step {
            WizardAction::Submit
        } else {
            WizardAction::Next
        };

        let submission = StepSubmission {
            current_step: step,
            action,
            fields: entries
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect::<BTreeMap<_, _>>(),
            uploads,
            clear_uploads: Vec::new(),
        };

        match service.apply_step(&submitter, &session, submission)? {
            StepOutcome::InProgress { step: next } => {
                println!("- step {step} accepted, continue at step {}", next.get());
            }
            StepOutcome::Rejected { step: back, errors } => {
                println!("- submission rejected, back to step {}: {errors}", back.get());
                return Ok(());
            }
            StepOutcome::Submitted(record) => {
                println!("- submitted: {}", record.display_label());
                println!("  staged uploads left: {}", staging.staged_count());
                if !skip_assessment {
                    assess_and_recalculate(&service, &record)?;
                }
            }
        }
    }

    Ok(())
}

fn assess_and_recalculate(service: &DemoService, record: &ResponseRecord) -> Result<(), AppError> {
    let officer = AccessContext::new(Role::Manager, Some(UserId(Uuid::new_v4())));
    let admin = AccessContext::new(Role::Admin, None);

    let mut fields = BTreeMap::new();
    fields.insert(
        "document_issues".to_string(),
        SubmittedValue::Flag(true),
    );
    fields.insert(
        "document_issue_kinds".to_string(),
        SubmittedValue::Multiple(vec!["inconsistent_stamps".to_string()]),
    );
    fields.insert(
        "suspicious_behavior".to_string(),
        SubmittedValue::Flag(true),
    );
    fields.insert(
        "behavior_indicators".to_string(),
        SubmittedValue::Multiple(vec!["evasiveness".to_string(), "nervousness".to_string()]),
    );
    fields.insert(
        "notes".to_string(),
        SubmittedValue::Single("Secondary inspection recommended".to_string()),
    );

    let assessed = service.assess(&officer, &record.id, fields)?;
    println!("\nOfficer assessment recorded: {}", assessed.display_label());

    let summary = service.recalculate(&admin)?;
    println!(
        "Recalculated {} response(s): {} tier change(s), {} assessment tier change(s)",
        summary.total, summary.responses_updated, summary.assessments_updated
    );

    let page = service.list(&officer, 1)?;
    println!("Response list payload:");
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
