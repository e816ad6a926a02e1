use std::sync::Arc;

use super::common::*;
use crate::workflows::screening::access::{AccessContext, AccessDenied};
use crate::workflows::screening::repository::{RepositoryError, ResponseRecord};
use crate::workflows::screening::scoring::ThreatTier;
use crate::workflows::screening::service::{
    ScreeningService, ScreeningServiceError, StepOutcome, StepSubmission,
};
use crate::workflows::screening::wizard::{
    StagingError, SubmittedValue, UploadStaging, WizardAction, WizardStep,
};

fn step(
    current_step: u32,
    action: WizardAction,
    entries: &[(&str, SubmittedValue)],
) -> StepSubmission {
    StepSubmission {
        current_step,
        action,
        fields: fields(entries),
        ..StepSubmission::default()
    }
}

fn submit_applicant(
    service: &TestService,
    name: &str,
    entries: &[(&str, SubmittedValue)],
) -> ResponseRecord {
    let session = session(name);
    let context = submitter();
    service
        .apply_step(
            &context,
            &session,
            step(
                1,
                WizardAction::Next,
                &[("full_name_and_birth", text(&format!("{name}, 1985")))],
            ),
        )
        .expect("first step");

    match service
        .apply_step(&context, &session, step(2, WizardAction::Submit, entries))
        .expect("submit")
    {
        StepOutcome::Submitted(record) => *record,
        other => panic!("expected submission, got {other:?}"),
    }
}

#[test]
fn next_and_previous_move_through_steps() {
    let (service, _, sessions, _) = build_service();
    let session = session("navigation");
    let context = submitter();

    let outcome = service
        .apply_step(&context, &session, step(1, WizardAction::Next, &[]))
        .expect("next");
    assert_eq!(
        outcome,
        StepOutcome::InProgress {
            step: WizardStep::clamped(2, 22)
        }
    );

    let outcome = service
        .apply_step(&context, &session, step(1, WizardAction::Previous, &[]))
        .expect("previous");
    assert_eq!(outcome, StepOutcome::InProgress { step: WizardStep::FIRST });

    let outcome = service
        .apply_step(&context, &session, step(22, WizardAction::Next, &[]))
        .expect("next at end");
    assert_eq!(
        outcome,
        StepOutcome::InProgress {
            step: WizardStep::clamped(22, 22)
        }
    );
    assert_eq!(
        sessions.state(&session).expect("state saved").step.get(),
        22
    );
}

#[test]
fn rejected_submission_returns_to_first_step_and_keeps_state() {
    let (service, repository, sessions, _) = build_service();
    let session = session("rejected");
    let context = submitter();

    service
        .apply_step(
            &context,
            &session,
            step(
                9,
                WizardAction::Next,
                &[("religious", checked()), ("denomination", text(&"d".repeat(256)))],
            ),
        )
        .expect("step 9");
    service
        .apply_step(
            &context,
            &session,
            step(
                11,
                WizardAction::Next,
                &[("deported", checked()), ("deportation_details", text("2019"))],
            ),
        )
        .expect("step 11");

    let outcome = service
        .apply_step(&context, &session, step(12, WizardAction::Submit, &[]))
        .expect("submit");

    match outcome {
        StepOutcome::Rejected { step, errors } => {
            assert_eq!(step, WizardStep::FIRST);
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["denomination"]);
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let state = sessions.state(&session).expect("state kept");
    assert_eq!(state.step, WizardStep::FIRST);
    assert_eq!(state.flag("deported"), Some(true));
    assert!(repository.records().is_empty());
}

#[test]
fn walking_past_empty_officer_steps_keeps_the_applicant_score() {
    let (service, repository, _, _) = build_service();
    let session = session("full-walk");
    let context = submitter();

    for current in 1..22 {
        let entries: Vec<(&str, SubmittedValue)> = match current {
            1 => vec![("full_name_and_birth", text("Rustam Aliev, 1979"))],
            5 => vec![("criminal_record", checked())],
            6 => vec![("detained_abroad", checked())],
            _ => Vec::new(),
        };
        service
            .apply_step(&context, &session, step(current, WizardAction::Next, &entries))
            .expect("step accepted");
    }

    let outcome = service
        .apply_step(&context, &session, step(22, WizardAction::Submit, &[]))
        .expect("submit");
    let record = match outcome {
        StepOutcome::Submitted(record) => record,
        other => panic!("expected submission, got {other:?}"),
    };

    assert!(record.assessment.is_none());
    assert_eq!(record.applicant_score.total_score, 30);
    assert_eq!(record.total_score, 30);
    assert_eq!(record.tier, ThreatTier::Medium);
    assert_eq!(repository.records().len(), 1);
}

#[test]
fn successful_submission_persists_and_clears_session() {
    let (service, repository, sessions, staging) = build_service();
    let session = session("complete");
    let context = submitter();

    service
        .apply_step(
            &context,
            &session,
            StepSubmission {
                current_step: 1,
                action: WizardAction::Next,
                fields: fields(&[("full_name_and_birth", text("Malika Yusupova, 1990"))]),
                uploads: vec![png_upload("id_document_scan")],
                clear_uploads: Vec::new(),
            },
        )
        .expect("step 1");
    assert_eq!(staging.blob_count(), 1);

    let outcome = service
        .apply_step(
            &context,
            &session,
            step(
                5,
                WizardAction::Submit,
                &[("criminal_record", checked()), ("criminal_offenses", text("Smuggling"))],
            ),
        )
        .expect("submit");

    let record = match outcome {
        StepOutcome::Submitted(record) => record,
        other => panic!("expected submission, got {other:?}"),
    };
    assert_eq!(record.total_score, 10);
    assert_eq!(record.tier, ThreatTier::Low);
    assert_eq!(record.created_by, context.user_id);
    assert_eq!(record.attachments.len(), 1);
    assert!(sessions.state(&session).is_none());
    assert_eq!(staging.blob_count(), 0);
    assert_eq!(repository.records().len(), 1);

    let attachment = service
        .attachment(&manager(), &record.id, "id_document_scan")
        .expect("attachment stored");
    assert_eq!(attachment.descriptor.filename, "scan.png");
}

#[test]
fn replaced_uploads_are_discarded_from_staging() {
    let (service, _, _, staging) = build_service();
    let session = session("replace-upload");
    let context = submitter();

    for _ in 0..2 {
        service
            .apply_step(
                &context,
                &session,
                StepSubmission {
                    current_step: 1,
                    uploads: vec![png_upload("id_document_scan")],
                    ..StepSubmission::default()
                },
            )
            .expect("upload step");
    }

    assert_eq!(staging.blob_count(), 1);
}

#[test]
fn failed_session_save_discards_only_the_new_upload() {
    let (service, _, sessions, staging) = build_service();
    let session = session("save-outage");
    let context = submitter();
    let upload_step = || StepSubmission {
        current_step: 1,
        uploads: vec![png_upload("id_document_scan")],
        ..StepSubmission::default()
    };

    service
        .apply_step(&context, &session, upload_step())
        .expect("first upload");
    let state = sessions.state(&session).expect("state saved");
    let kept = state.uploads["id_document_scan"].clone();

    sessions.reject_saves();
    let err = service
        .apply_step(&context, &session, upload_step())
        .expect_err("save fails");

    assert!(matches!(err, ScreeningServiceError::Session(_)));
    assert_eq!(staging.blob_count(), 1);
    assert!(staging.fetch(&kept).is_ok());
}

#[test]
fn oversized_uploads_are_refused() {
    let (service, _, sessions, staging) = build_service();
    let session = session("oversized");
    let mut upload = png_upload("id_document_scan");
    upload.bytes = vec![0; 65];

    let err = service
        .apply_step(
            &submitter(),
            &session,
            StepSubmission {
                current_step: 1,
                uploads: vec![upload],
                ..StepSubmission::default()
            },
        )
        .expect_err("too large");

    assert!(matches!(
        err,
        ScreeningServiceError::Staging(StagingError::TooLarge { size: 65, limit: 64, .. })
    ));
    assert_eq!(staging.blob_count(), 0);
    assert!(sessions.state(&session).is_none());
}

#[test]
fn guests_cannot_use_the_wizard() {
    let (service, _, _, _) = build_service();

    let err = service
        .wizard(&AccessContext::guest(), &session("guest"))
        .expect_err("guest forbidden");

    assert!(matches!(
        err,
        ScreeningServiceError::Access(AccessDenied::Forbidden { .. })
    ));
}

#[test]
fn submitters_cannot_read_or_assess_responses() {
    let (service, _, _, _) = build_service();
    let record = submit_applicant(&service, "Olim Rakhimov", &[]);

    assert!(service.get(&submitter(), &record.id).is_err());
    assert!(service.list(&submitter(), 1).is_err());
    assert!(service
        .assess(&submitter(), &record.id, fields(&[]))
        .is_err());
    assert!(service.recalculate(&manager()).is_err());
}

#[test]
fn list_is_paginated_newest_first() {
    let (service, _, _, _) = build_service();
    submit_applicant(&service, "First", &[]);
    submit_applicant(&service, "Second", &[]);
    let newest = submit_applicant(&service, "Third", &[("deported", checked())]);

    let page = service.list(&manager(), 1).expect("first page");
    assert_eq!(page.total, 3);
    assert_eq!(page.page_size, 2);
    assert_eq!(page.responses.len(), 2);
    assert_eq!(page.responses[0].id, newest.id);
    assert!(page.responses[0].label.starts_with("Third ("));

    let second = service.list(&manager(), 2).expect("second page");
    assert_eq!(second.responses.len(), 1);
    assert!(second.responses[0].label.starts_with("First ("));

    let clamped = service.list(&manager(), 0).expect("page zero");
    assert_eq!(clamped.page, 1);
}

#[test]
fn assessment_overrides_the_response_score() {
    let (service, repository, _, _) = build_service();
    let record = submit_applicant(&service, "Jasur Aliev", &[("deported", checked())]);
    assert_eq!(record.total_score, 20);

    let officer = manager();
    let assessed = service
        .assess(
            &officer,
            &record.id,
            fields(&[
                ("radical_internet", checked()),
                ("radical_internet_categories", tags(&["extremist_channels"])),
                ("deported", SubmittedValue::Flag(false)),
            ]),
        )
        .expect("assessment saved");

    assert_eq!(assessed.total_score, 65);
    assert_eq!(assessed.tier, ThreatTier::High);
    assert_eq!(assessed.applicant_score.total_score, 20);
    assert!(assessed.answers.deported);
    let assessment = assessed.assessment.as_ref().expect("assessment attached");
    assert_eq!(assessment.assessed_by, officer.user_id);

    let replaced = service
        .assess(&admin(), &record.id, fields(&[("relatives_mto", checked())]))
        .expect("assessment replaced");
    assert_eq!(replaced.total_score, 10);
    assert_eq!(replaced.tier, ThreatTier::Low);
    let replaced_assessment = replaced.assessment.as_ref().expect("assessment kept");
    assert!(!replaced_assessment.assessment.radical_internet);
    assert_eq!(replaced_assessment.assessed_at, assessment.assessed_at);

    assert_eq!(repository.records()[0].total_score, 10);
}

#[test]
fn invalid_assessment_values_are_rejected() {
    let (service, _, _, _) = build_service();
    let record = submit_applicant(&service, "Bekzod Tursunov", &[]);

    let err = service
        .assess(
            &manager(),
            &record.id,
            fields(&[("document_issue_kinds", tags(&["counterfeit"]))]),
        )
        .expect_err("unknown choice");

    assert!(matches!(err, ScreeningServiceError::Validation(_)));
}

#[test]
fn recalculation_restores_stale_scores() {
    let (service, repository, _, _) = build_service();
    let mut stale = submit_applicant(
        &service,
        "Azamat Kenzhebaev",
        &[("visited_countries", checked())],
    );
    submit_applicant(&service, "Nodira Ismoilova", &[]);

    stale.total_score = 90;
    stale.tier = ThreatTier::High;
    repository.overwrite(stale.clone());

    let summary = service.recalculate(&admin()).expect("recalculated");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.responses_updated, 1);
    assert_eq!(summary.assessments_updated, 0);

    let refreshed = service.get(&manager(), &stale.id).expect("record present");
    assert_eq!(refreshed.total_score, 20);
    assert_eq!(refreshed.tier, ThreatTier::Low);
}

#[test]
fn delete_removes_the_response() {
    let (service, _, _, _) = build_service();
    let record = submit_applicant(&service, "Kamila Abdullaeva", &[]);

    service.delete(&manager(), &record.id).expect("deleted");

    assert!(matches!(
        service.get(&manager(), &record.id),
        Err(ScreeningServiceError::Repository(RepositoryError::NotFound))
    ));
}

#[test]
fn repository_outage_surfaces_as_server_error() {
    let service = ScreeningService::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemorySessions::default()),
        Arc::new(MemoryStaging::default()),
        config(),
    );

    let err = service.list(&manager(), 1).expect_err("outage");
    assert_eq!(
        err.status_code(),
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    );
}
