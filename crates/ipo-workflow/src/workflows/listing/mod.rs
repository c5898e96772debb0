//! Listing application workflow: lifecycle state machine, role policy,
//! completion aggregation, and the advisor/regulator feedback loop.

pub mod access;
pub mod completion;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use access::{AccessPolicy, WorkflowAction};
pub use completion::{incomplete_section_numbers, overall_completion};
pub use domain::{
    Actor, ActorId, ActorRole, Application, ApplicationId, ApplicationPhase, ApplicationStatus,
    ApplicationStatusView, AuditAction, AuditEntry, CompanyId, Feedback, FeedbackDraft,
    FeedbackId, FeedbackStatus, Notification, NotificationKind, Priority, Section, SectionId,
    SectionStatus,
};
pub use repository::{
    AuditError, AuditSink, ListingError, ListingRegistry, NotificationSink, NotifyError,
    StoreError, WorkflowStore,
};
pub use router::listing_router;
pub use service::{
    ApplicationWorkflowService, FeedbackOutcome, SectionOutcome, SectionPatch, SideEffect,
    SideEffectFailure, TransitionOutcome, ValidationFailure, WorkflowError,
};
