use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::access::{AccessPolicy, WorkflowAction};
use super::completion::{incomplete_section_numbers, overall_completion};
use super::domain::{
    Actor, ActorId, ActorRole, Application, ApplicationId, ApplicationStatus, AuditAction,
    AuditEntry, Feedback, FeedbackDraft, FeedbackId, FeedbackStatus, Notification,
    NotificationKind, Priority, Section, SectionStatus,
};
use super::repository::{AuditSink, ListingRegistry, NotificationSink, StoreError, WorkflowStore};

/// Service composing the access policy, completion aggregator, and the
/// side-effect sinks around the application state machine.
pub struct ApplicationWorkflowService<S, N, A, L> {
    store: Arc<S>,
    notifications: Arc<N>,
    audit: Arc<A>,
    listings: Arc<L>,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static FEEDBACK_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_number(year: i32) -> String {
    let sequence = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("IPO-{year}-{sequence:04}")
}

fn next_feedback_id() -> FeedbackId {
    let id = FEEDBACK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    FeedbackId(format!("fbk-{id:06}"))
}

impl<S, N, A, L> ApplicationWorkflowService<S, N, A, L>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, audit: Arc<A>, listings: Arc<L>) -> Self {
        Self {
            store,
            notifications,
            audit,
            listings,
        }
    }

    /// CEO hands the draft to an investment-bank advisor, moving it into
    /// advisory review.
    pub fn assign_advisor(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        advisor_id: &ActorId,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::AssignAdvisor)?;

        if application.status != ApplicationStatus::Draft {
            return Err(WorkflowError::Conflict(format!(
                "cannot assign an advisor while the application is {}",
                application.status.label()
            )));
        }
        if application.assigned_ib_advisor.is_some() {
            return Err(WorkflowError::Conflict(
                "an advisor is already assigned".to_string(),
            ));
        }

        let advisor = self
            .store
            .fetch_actor(advisor_id)?
            .ok_or(WorkflowError::NotFound("advisor"))?;
        if advisor.role != ActorRole::IbAdvisor {
            return Err(WorkflowError::Validation(ValidationFailure::NotAnAdvisor));
        }

        let expected = application.version;
        let mut updated = application;
        updated.assigned_ib_advisor = Some(advisor_id.clone());
        updated.status = ApplicationStatus::IbReview;
        let application = self.commit(updated, expected)?;

        let mut warnings = Vec::new();
        self.fan_out(
            actor,
            std::slice::from_ref(advisor_id),
            NotificationKind::AdvisorAssigned,
            &application,
            format!(
                "You have been assigned to listing application {}",
                application.id.0
            ),
            Priority::Medium,
            &mut warnings,
        );
        self.record(
            audit_entry(
                &application,
                actor,
                AuditAction::AdvisorAssigned,
                json!({ "advisor_id": advisor_id.0 }),
            ),
            &mut warnings,
        );

        Ok(TransitionOutcome {
            application,
            warnings,
        })
    }

    /// Submit the application to the regulator. Every section must report
    /// `Completed`; otherwise the offending section numbers are returned.
    pub fn submit_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::SubmitApplication)?;

        match application.status {
            ApplicationStatus::Draft | ApplicationStatus::IbReview => {}
            status if status.is_terminal() => {
                return Err(WorkflowError::Conflict(
                    "application is already decided".to_string(),
                ))
            }
            status => {
                return Err(WorkflowError::Conflict(format!(
                    "cannot submit from {}",
                    status.label()
                )))
            }
        }

        let sections = self.store.sections(application_id)?;
        let incomplete = incomplete_section_numbers(&sections);
        if !incomplete.is_empty() {
            return Err(WorkflowError::Validation(
                ValidationFailure::IncompleteSections {
                    section_numbers: incomplete,
                },
            ));
        }

        // Resolve recipients up front so a store outage aborts before any
        // state is written.
        let regulators = self.store.regulator_recipients()?;

        let now = Utc::now();
        let expected = application.version;
        let mut updated = application;
        if updated.application_number.is_none() {
            updated.application_number = Some(next_application_number(now.year()));
        }
        updated.submission_date = Some(now);
        updated.completion_percentage = overall_completion(&sections);
        updated.status = ApplicationStatus::Submitted;
        let application = self.commit(updated, expected)?;

        let mut warnings = Vec::new();
        self.fan_out(
            actor,
            &regulators,
            NotificationKind::ApplicationSubmitted,
            &application,
            format!(
                "Application {} was submitted for regulatory review",
                application
                    .application_number
                    .as_deref()
                    .unwrap_or(&application.id.0)
            ),
            Priority::High,
            &mut warnings,
        );
        if let Some(advisor) = application.assigned_ib_advisor.clone() {
            self.fan_out(
                actor,
                &[advisor],
                NotificationKind::ApplicationSubmitted,
                &application,
                format!("Application {} was submitted", application.id.0),
                Priority::Medium,
                &mut warnings,
            );
        }
        self.record(
            audit_entry(
                &application,
                actor,
                AuditAction::ApplicationSubmitted,
                json!({
                    "application_number": application.application_number,
                    "completion_percentage": application.completion_percentage,
                }),
            ),
            &mut warnings,
        );

        Ok(TransitionOutcome {
            application,
            warnings,
        })
    }

    /// Regulator approval. The transition is the source of truth; creating
    /// the downstream listing is fire-and-forget and only ever produces a
    /// warning.
    pub fn approve_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::ApproveApplication)?;
        self.ensure_decidable(&application)?;

        let members = self.store.company_members(&application.company_id)?;

        let expected = application.version;
        let mut updated = application;
        updated.status = ApplicationStatus::CmaApproved;
        updated.approved_at = Some(Utc::now());
        updated.review_comments = comments.clone();
        let application = self.commit(updated, expected)?;

        let mut warnings = Vec::new();
        if let Err(err) = self.listings.create_listing(&application) {
            warn!(application = %application.id.0, "listing creation failed: {err}");
            warnings.push(SideEffectFailure {
                effect: SideEffect::Listing,
                detail: err.to_string(),
            });
            self.record(
                audit_entry(
                    &application,
                    actor,
                    AuditAction::SideEffectFailed,
                    json!({ "effect": "listing", "error": err.to_string() }),
                ),
                &mut warnings,
            );
        }

        self.fan_out(
            actor,
            &members,
            NotificationKind::ApplicationApproved,
            &application,
            format!("Application {} has been approved", application.id.0),
            Priority::High,
            &mut warnings,
        );
        self.record(
            audit_entry(
                &application,
                actor,
                AuditAction::ApplicationApproved,
                json!({ "comments": comments }),
            ),
            &mut warnings,
        );

        Ok(TransitionOutcome {
            application,
            warnings,
        })
    }

    /// Regulator rejection; a non-empty reason is mandatory.
    pub fn reject_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        reason: &str,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::RejectApplication)?;
        self.ensure_decidable(&application)?;

        if reason.trim().is_empty() {
            return Err(WorkflowError::Validation(
                ValidationFailure::MissingRejectionReason,
            ));
        }

        let members = self.store.company_members(&application.company_id)?;

        let expected = application.version;
        let mut updated = application;
        updated.status = ApplicationStatus::CmaRejected;
        updated.rejected_at = Some(Utc::now());
        updated.rejection_reason = Some(reason.trim().to_string());
        updated.review_comments = comments.clone();
        let application = self.commit(updated, expected)?;

        let mut warnings = Vec::new();
        self.fan_out(
            actor,
            &members,
            NotificationKind::ApplicationRejected,
            &application,
            format!(
                "Application {} was rejected: {}",
                application.id.0,
                reason.trim()
            ),
            Priority::High,
            &mut warnings,
        );
        self.record(
            audit_entry(
                &application,
                actor,
                AuditAction::ApplicationRejected,
                json!({ "reason": reason.trim(), "comments": comments }),
            ),
            &mut warnings,
        );

        Ok(TransitionOutcome {
            application,
            warnings,
        })
    }

    /// Raise a feedback item. Advisors query their assigned application; a
    /// regulator doing the same while the application is under review flips
    /// it to `QueryIssued`.
    pub fn create_feedback(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        draft: FeedbackDraft,
    ) -> Result<FeedbackOutcome, WorkflowError> {
        let mut application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::CreateFeedback)?;

        if draft.issue.trim().is_empty() {
            return Err(WorkflowError::Validation(ValidationFailure::EmptyIssue));
        }
        if let Some(section_id) = &draft.section_id {
            let section = self
                .store
                .fetch_section(section_id)?
                .ok_or(WorkflowError::NotFound("section"))?;
            if section.application_id != application.id {
                return Err(WorkflowError::NotFound("section"));
            }
        }

        let members = self.store.company_members(&application.company_id)?;

        if actor.role.is_regulator()
            && matches!(
                application.status,
                ApplicationStatus::Submitted | ApplicationStatus::UnderReview
            )
        {
            let expected = application.version;
            let mut updated = application.clone();
            updated.status = ApplicationStatus::QueryIssued;
            application = self.commit(updated, expected)?;
        }

        let feedback = Feedback {
            id: next_feedback_id(),
            application_id: application.id.clone(),
            section_id: draft.section_id.clone(),
            category: draft.category.clone(),
            issue: draft.issue.trim().to_string(),
            priority: draft.priority,
            status: FeedbackStatus::Pending,
            created_by: actor.id.clone(),
            resolved_by: None,
            created_at: Utc::now(),
        };
        let feedback = self.store.insert_feedback(feedback)?;

        let mut warnings = Vec::new();
        self.fan_out(
            actor,
            &members,
            NotificationKind::QueryIssued,
            &application,
            format!(
                "A {} query was raised on application {}: {}",
                feedback.category, application.id.0, feedback.issue
            ),
            feedback.priority,
            &mut warnings,
        );
        self.record(
            audit_entry(
                &application,
                actor,
                AuditAction::FeedbackCreated,
                json!({
                    "feedback_id": feedback.id.0,
                    "category": feedback.category,
                    "priority": feedback.priority,
                    "section_id": draft.section_id.as_ref().map(|id| id.0.clone()),
                }),
            ),
            &mut warnings,
        );

        Ok(FeedbackOutcome { feedback, warnings })
    }

    /// Issuer-side progress on a feedback item; strictly forward.
    pub fn update_feedback_status(
        &self,
        actor: &Actor,
        feedback_id: &FeedbackId,
        new_status: FeedbackStatus,
    ) -> Result<FeedbackOutcome, WorkflowError> {
        let feedback = self
            .store
            .fetch_feedback(feedback_id)?
            .ok_or(WorkflowError::NotFound("feedback"))?;
        let application = self.load_application(&feedback.application_id)?;
        self.authorize(actor, &application, WorkflowAction::UpdateFeedbackStatus)?;

        if !feedback.status.can_advance_to(new_status) {
            return Err(WorkflowError::Conflict(format!(
                "feedback cannot move from {} to {}",
                feedback.status.label(),
                new_status.label()
            )));
        }

        let previous = feedback.status;
        let mut updated = feedback;
        updated.status = new_status;
        if new_status == FeedbackStatus::Resolved {
            updated.resolved_by = Some(actor.id.clone());
        }
        self.store.update_feedback(updated.clone())?;

        let mut warnings = Vec::new();
        self.record(
            audit_entry(
                &application,
                actor,
                AuditAction::FeedbackStatusChanged,
                json!({
                    "feedback_id": updated.id.0,
                    "from": previous.label(),
                    "to": new_status.label(),
                }),
            ),
            &mut warnings,
        );

        Ok(FeedbackOutcome {
            feedback: updated,
            warnings,
        })
    }

    /// Issuer team member edits a section; the aggregate completion is
    /// recomputed from the latest committed snapshot afterwards.
    pub fn update_section(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        section_number: u32,
        patch: SectionPatch,
    ) -> Result<SectionOutcome, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::EditSection)?;
        if application.status.is_terminal() {
            return Err(WorkflowError::Conflict(
                "application is already decided".to_string(),
            ));
        }

        let sections = self.store.sections(application_id)?;
        let section = sections
            .into_iter()
            .find(|section| section.section_number == section_number)
            .ok_or(WorkflowError::NotFound("section"))?;

        let mut updated = section;
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if let Some(percentage) = patch.completion_percentage {
            updated.completion_percentage = percentage.min(100);
        }
        if let Some(data) = patch.data {
            updated.data = data;
        }
        self.store.update_section(updated.clone())?;

        let application_completion = self.refresh_completion(application_id)?;

        let mut warnings = Vec::new();
        self.record(
            audit_entry(
                &application,
                actor,
                AuditAction::SectionUpdated,
                json!({
                    "section_number": updated.section_number,
                    "status": updated.status.label(),
                    "completion_percentage": updated.completion_percentage,
                }),
            ),
            &mut warnings,
        );

        Ok(SectionOutcome {
            section: updated,
            application_completion,
            warnings,
        })
    }

    /// Standalone, idempotent recomputation of the aggregate percentage.
    pub fn recompute_completion(
        &self,
        application_id: &ApplicationId,
    ) -> Result<u8, WorkflowError> {
        self.refresh_completion(application_id)
    }

    pub fn get_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::ViewApplication)?;
        Ok(application)
    }

    pub fn list_sections(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Vec<Section>, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::ViewApplication)?;
        Ok(self.store.sections(application_id)?)
    }

    /// Feedback for an application, newest first.
    pub fn list_feedback(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Vec<Feedback>, WorkflowError> {
        let application = self.load_application(application_id)?;
        self.authorize(actor, &application, WorkflowAction::ViewApplication)?;
        Ok(self.store.list_feedback(application_id)?)
    }

    fn load_application(&self, id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.store
            .fetch_application(id)?
            .ok_or(WorkflowError::NotFound("application"))
    }

    fn authorize(
        &self,
        actor: &Actor,
        application: &Application,
        action: WorkflowAction,
    ) -> Result<(), WorkflowError> {
        if AccessPolicy::authorize(actor, application, action) {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(action))
        }
    }

    fn ensure_decidable(&self, application: &Application) -> Result<(), WorkflowError> {
        match application.status {
            ApplicationStatus::Submitted
            | ApplicationStatus::UnderReview
            | ApplicationStatus::QueryIssued => Ok(()),
            status if status.is_terminal() => Err(WorkflowError::Conflict(
                "application is already decided".to_string(),
            )),
            status => Err(WorkflowError::Conflict(format!(
                "cannot decide an application that is {}",
                status.label()
            ))),
        }
    }

    fn commit(
        &self,
        application: Application,
        expected_version: u64,
    ) -> Result<Application, WorkflowError> {
        match self.store.update_application(application, expected_version) {
            Ok(updated) => Ok(updated),
            Err(StoreError::VersionConflict) => Err(WorkflowError::Conflict(
                "application changed concurrently".to_string(),
            )),
            Err(other) => Err(WorkflowError::Store(other)),
        }
    }

    /// Last write wins on the derived percentage: losing a version race means
    /// another writer saw a newer snapshot, so re-read and try again.
    fn refresh_completion(&self, application_id: &ApplicationId) -> Result<u8, WorkflowError> {
        const MAX_ATTEMPTS: usize = 3;
        for _ in 0..MAX_ATTEMPTS {
            let application = self.load_application(application_id)?;
            let sections = self.store.sections(application_id)?;
            let completion = overall_completion(&sections);
            if completion == application.completion_percentage {
                return Ok(completion);
            }

            let expected = application.version;
            let mut updated = application;
            updated.completion_percentage = completion;
            match self.store.update_application(updated, expected) {
                Ok(_) => return Ok(completion),
                Err(StoreError::VersionConflict) => continue,
                Err(other) => return Err(WorkflowError::Store(other)),
            }
        }
        Err(WorkflowError::Conflict(
            "completion recompute kept losing version races".to_string(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn fan_out(
        &self,
        actor: &Actor,
        recipients: &[ActorId],
        kind: NotificationKind,
        application: &Application,
        message: String,
        priority: Priority,
        warnings: &mut Vec<SideEffectFailure>,
    ) {
        for recipient in recipients {
            let notification = Notification {
                recipient_id: recipient.clone(),
                title: kind.default_title().to_string(),
                message: message.clone(),
                kind,
                application_id: application.id.clone(),
                priority,
                is_read: false,
            };
            if let Err(err) = self.notifications.deliver(notification) {
                warn!(recipient = %recipient.0, "notification delivery failed: {err}");
                warnings.push(SideEffectFailure {
                    effect: SideEffect::Notification,
                    detail: err.to_string(),
                });
                self.record(
                    audit_entry(
                        application,
                        actor,
                        AuditAction::SideEffectFailed,
                        json!({
                            "effect": "notification",
                            "recipient": recipient.0,
                            "error": err.to_string(),
                        }),
                    ),
                    warnings,
                );
            }
        }
    }

    fn record(&self, entry: AuditEntry, warnings: &mut Vec<SideEffectFailure>) {
        if let Err(err) = self.audit.append(entry) {
            warn!("audit append failed: {err}");
            warnings.push(SideEffectFailure {
                effect: SideEffect::Audit,
                detail: err.to_string(),
            });
        }
    }
}

fn audit_entry(
    application: &Application,
    actor: &Actor,
    action: AuditAction,
    details: serde_json::Value,
) -> AuditEntry {
    AuditEntry {
        application_id: application.id.clone(),
        actor_id: actor.id.clone(),
        action,
        details,
        timestamp: Utc::now(),
    }
}

/// Partial update applied to a section by the issuer-side form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionPatch {
    #[serde(default)]
    pub status: Option<SectionStatus>,
    #[serde(default)]
    pub completion_percentage: Option<u8>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Result of a successful status transition, carrying any best-effort
/// side-effect failures as warnings.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub application: Application,
    pub warnings: Vec<SideEffectFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackOutcome {
    pub feedback: Feedback,
    pub warnings: Vec<SideEffectFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionOutcome {
    pub section: Section,
    pub application_completion: u8,
    pub warnings: Vec<SideEffectFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    Listing,
    Notification,
    Audit,
}

/// A best-effort side effect that failed without invalidating the committed
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideEffectFailure {
    pub effect: SideEffect,
    pub detail: String,
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("actor lacks permission for {0:?}")]
    Forbidden(WorkflowAction),
    #[error("validation failed: {0}")]
    Validation(ValidationFailure),
    #[error("conflicting state transition: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Structured validation detail so callers can enumerate exactly what blocks
/// an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
pub enum ValidationFailure {
    #[error("sections {section_numbers:?} are not completed")]
    IncompleteSections { section_numbers: Vec<u32> },
    #[error("a rejection reason is required")]
    MissingRejectionReason,
    #[error("feedback issue must not be empty")]
    EmptyIssue,
    #[error("assigned actor must hold the IB Advisor role")]
    NotAnAdvisor,
}
