use super::common::*;
use crate::workflows::listing::domain::{
    ApplicationStatus, NotificationKind, SectionStatus,
};
use crate::workflows::listing::repository::WorkflowStore;
use crate::workflows::listing::service::{ValidationFailure, WorkflowError};

#[test]
fn submission_blocks_on_incomplete_sections() {
    let harness = harness();
    let application_id = seed_application(
        &harness,
        "A1",
        &[
            (1, SectionStatus::Completed, 100),
            (2, SectionStatus::Completed, 100),
            (3, SectionStatus::InProgress, 50),
        ],
    );

    match harness.service.submit_application(&ceo(), &application_id) {
        Err(WorkflowError::Validation(ValidationFailure::IncompleteSections {
            section_numbers,
        })) => assert_eq!(section_numbers, vec![3]),
        other => panic!("expected incomplete-section validation, got {other:?}"),
    }

    let stored = harness
        .store
        .fetch_application(&application_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, ApplicationStatus::Draft);
    assert!(stored.application_number.is_none());
}

#[test]
fn submission_requires_the_ceo() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A1");

    match harness.service.submit_application(&cfo(), &application_id) {
        Err(WorkflowError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn submission_stamps_number_and_notifies_regulators() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A2");

    let outcome = harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("submission succeeds");

    let application = outcome.application;
    assert_eq!(application.status, ApplicationStatus::Submitted);
    assert!(application.submission_date.is_some());
    assert_eq!(application.completion_percentage, 100);

    let number = application.application_number.expect("number assigned");
    let mut parts = number.split('-');
    assert_eq!(parts.next(), Some("IPO"));
    let year: i32 = parts.next().expect("year").parse().expect("numeric year");
    assert!(year >= 2024);
    let sequence = parts.next().expect("sequence");
    assert_eq!(sequence.len(), 4);
    assert!(sequence.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(parts.next(), None);

    let submitted: Vec<_> = harness
        .notifications
        .events()
        .into_iter()
        .filter(|event| event.kind == NotificationKind::ApplicationSubmitted)
        .collect();
    // One per regulator profile (reg-1 and adm-1 are seeded).
    assert_eq!(submitted.len(), 2);
    assert!(submitted.iter().all(|event| !event.is_read));
}

#[test]
fn application_number_is_assigned_only_once() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A2");

    let first = harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("submission succeeds");
    let number = first.application.application_number.clone();

    // Simulate a round trip back to draft outside the engine and resubmit.
    let mut stored = harness
        .store
        .fetch_application(&application_id)
        .expect("fetch")
        .expect("present");
    let expected = stored.version;
    stored.status = ApplicationStatus::Draft;
    harness
        .store
        .update_application(stored, expected)
        .expect("rewind");

    let second = harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("resubmission succeeds");
    assert_eq!(second.application.application_number, number);
}

#[test]
fn approval_is_terminal_and_creates_one_listing() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A2");
    harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("submission succeeds");

    let outcome = harness
        .service
        .approve_application(&regulator(), &application_id, Some("clean file".to_string()))
        .expect("approval succeeds");
    assert_eq!(outcome.application.status, ApplicationStatus::CmaApproved);
    assert!(outcome.application.approved_at.is_some());
    assert!(outcome.application.rejected_at.is_none());
    assert!(outcome.warnings.is_empty());
    assert_eq!(harness.listings.attempts(), 1);

    match harness
        .service
        .approve_application(&regulator(), &application_id, None)
    {
        Err(WorkflowError::Conflict(_)) => {}
        other => panic!("expected conflict on double approve, got {other:?}"),
    }
    assert_eq!(harness.listings.attempts(), 1);
}

#[test]
fn listing_failure_does_not_roll_back_approval() {
    let harness = harness_with_listings(MemoryListings::failing());
    let application_id = seed_complete_application(&harness, "A2");
    harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("submission succeeds");

    let outcome = harness
        .service
        .approve_application(&regulator(), &application_id, None)
        .expect("approval still succeeds");

    assert_eq!(outcome.application.status, ApplicationStatus::CmaApproved);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].detail.contains("registry offline"));

    let stored = harness
        .store
        .fetch_application(&application_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, ApplicationStatus::CmaApproved);
}

#[test]
fn rejection_requires_a_reason() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A2");
    harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("submission succeeds");

    match harness
        .service
        .reject_application(&regulator(), &application_id, "   ", None)
    {
        Err(WorkflowError::Validation(ValidationFailure::MissingRejectionReason)) => {}
        other => panic!("expected missing-reason validation, got {other:?}"),
    }

    let outcome = harness
        .service
        .reject_application(&regulator(), &application_id, "prospectus incomplete", None)
        .expect("rejection succeeds");
    assert_eq!(outcome.application.status, ApplicationStatus::CmaRejected);
    assert_eq!(
        outcome.application.rejection_reason.as_deref(),
        Some("prospectus incomplete")
    );
    assert!(outcome.application.rejected_at.is_some());
    assert!(outcome.application.approved_at.is_none());
    assert_eq!(harness.listings.attempts(), 0);
}

#[test]
fn decisions_are_rejected_on_drafts() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A1");

    match harness
        .service
        .approve_application(&regulator(), &application_id, None)
    {
        Err(WorkflowError::Conflict(_)) => {}
        other => panic!("expected conflict approving a draft, got {other:?}"),
    }
}

#[test]
fn advisor_assignment_moves_draft_to_ib_review() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A1");

    let outcome = harness
        .service
        .assign_advisor(&ceo(), &application_id, &advisor().id)
        .expect("assignment succeeds");
    assert_eq!(outcome.application.status, ApplicationStatus::IbReview);
    assert_eq!(
        outcome.application.assigned_ib_advisor,
        Some(advisor().id)
    );

    let notified: Vec<_> = harness
        .notifications
        .events()
        .into_iter()
        .filter(|event| event.kind == NotificationKind::AdvisorAssigned)
        .collect();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].recipient_id, advisor().id);

    match harness
        .service
        .assign_advisor(&ceo(), &application_id, &other_advisor().id)
    {
        Err(WorkflowError::Conflict(_)) => {}
        other => panic!("expected conflict on second assignment, got {other:?}"),
    }
}

#[test]
fn advisor_assignment_rejects_non_advisor_profiles() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A1");

    match harness
        .service
        .assign_advisor(&ceo(), &application_id, &regulator().id)
    {
        Err(WorkflowError::Validation(ValidationFailure::NotAnAdvisor)) => {}
        other => panic!("expected not-an-advisor validation, got {other:?}"),
    }

    match harness.service.assign_advisor(
        &ceo(),
        &application_id,
        &crate::workflows::listing::domain::ActorId("ghost".to_string()),
    ) {
        Err(WorkflowError::NotFound(_)) => {}
        other => panic!("expected not-found for unknown advisor, got {other:?}"),
    }
}

#[test]
fn concurrent_decisions_let_exactly_one_win() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A2");
    harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("submission succeeds");

    let first = harness
        .service
        .approve_application(&regulator(), &application_id, None);
    let second = harness
        .service
        .approve_application(&admin(), &application_id, None);

    assert!(first.is_ok());
    match second {
        Err(WorkflowError::Conflict(_)) => {}
        other => panic!("expected the loser to observe a conflict, got {other:?}"),
    }
    assert_eq!(harness.listings.attempts(), 1);
}

#[test]
fn section_edits_recompute_the_aggregate() {
    let harness = harness();
    let application_id = seed_application(
        &harness,
        "A1",
        &[
            (1, SectionStatus::Completed, 100),
            (2, SectionStatus::InProgress, 20),
        ],
    );

    let outcome = harness
        .service
        .update_section(
            &cfo(),
            &application_id,
            2,
            crate::workflows::listing::service::SectionPatch {
                status: Some(SectionStatus::Completed),
                completion_percentage: Some(100),
                data: Some(serde_json::json!({ "revenue": "12.5m" })),
            },
        )
        .expect("section update succeeds");

    assert_eq!(outcome.application_completion, 100);
    assert_eq!(outcome.section.status, SectionStatus::Completed);

    let stored = harness
        .store
        .fetch_application(&application_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.completion_percentage, 100);
}

#[test]
fn notification_failures_surface_as_warnings_not_errors() {
    let store = std::sync::Arc::new(MemoryStore::default());
    let audit = std::sync::Arc::new(MemoryAudit::default());
    let listings = std::sync::Arc::new(MemoryListings::default());
    let notifications = std::sync::Arc::new(FailingNotifications);
    for actor in [ceo(), regulator()] {
        store.seed_actor(actor);
    }
    let service = crate::workflows::listing::service::ApplicationWorkflowService::new(
        store.clone(),
        notifications,
        audit.clone(),
        listings,
    );

    let application =
        crate::workflows::listing::domain::Application::draft("A2", COMPANY);
    let application_id = application.id.clone();
    store.insert_application(application).expect("seed");
    store.seed_section(section(
        &application_id,
        1,
        SectionStatus::Completed,
        100,
    ));

    let outcome = service
        .submit_application(&ceo(), &application_id)
        .expect("submission commits despite notification outage");
    assert_eq!(outcome.application.status, ApplicationStatus::Submitted);
    assert!(!outcome.warnings.is_empty());

    // The outage itself lands in the audit log.
    assert!(audit.entries().iter().any(|entry| matches!(
        entry.action,
        crate::workflows::listing::domain::AuditAction::SideEffectFailed
    )));
}

#[test]
fn every_successful_mutation_is_audited() {
    let harness = harness();
    let application_id = seed_complete_application(&harness, "A2");

    harness
        .service
        .assign_advisor(&ceo(), &application_id, &advisor().id)
        .expect("assignment");
    harness
        .service
        .submit_application(&ceo(), &application_id)
        .expect("submission");
    harness
        .service
        .approve_application(&admin(), &application_id, None)
        .expect("approval");

    let actions: Vec<_> = harness
        .audit
        .entries()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    use crate::workflows::listing::domain::AuditAction::*;
    assert_eq!(
        actions,
        vec![AdvisorAssigned, ApplicationSubmitted, ApplicationApproved]
    );
}
