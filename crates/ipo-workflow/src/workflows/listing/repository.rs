use super::domain::{
    Actor, ActorId, Application, ApplicationId, AuditEntry, CompanyId, Feedback, FeedbackId,
    Notification, Section, SectionId,
};

/// Storage abstraction over applications, sections, and feedback so the
/// service module can be exercised in isolation. The backing store is
/// expected to apply each write atomically.
pub trait WorkflowStore: Send + Sync {
    fn insert_application(&self, application: Application) -> Result<Application, StoreError>;
    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError>;

    /// Persist an updated application only if the stored version still equals
    /// `expected_version`; the winner gets the bumped record back, the loser
    /// observes `StoreError::VersionConflict`.
    fn update_application(
        &self,
        application: Application,
        expected_version: u64,
    ) -> Result<Application, StoreError>;

    /// Sections owned by the application, ordered by section number.
    fn sections(&self, application_id: &ApplicationId) -> Result<Vec<Section>, StoreError>;
    fn fetch_section(&self, id: &SectionId) -> Result<Option<Section>, StoreError>;
    fn update_section(&self, section: Section) -> Result<(), StoreError>;

    fn insert_feedback(&self, feedback: Feedback) -> Result<Feedback, StoreError>;
    fn fetch_feedback(&self, id: &FeedbackId) -> Result<Option<Feedback>, StoreError>;
    fn update_feedback(&self, feedback: Feedback) -> Result<(), StoreError>;
    /// Feedback for an application, newest first.
    fn list_feedback(&self, application_id: &ApplicationId) -> Result<Vec<Feedback>, StoreError>;

    fn fetch_actor(&self, id: &ActorId) -> Result<Option<Actor>, StoreError>;
    /// Every CMA regulator and admin profile, for submission fan-out.
    fn regulator_recipients(&self) -> Result<Vec<ActorId>, StoreError>;
    /// Issuer-team members of a company, for query fan-out.
    fn company_members(&self, company_id: &CompanyId) -> Result<Vec<ActorId>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed concurrently")]
    VersionConflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification port. Delivery is advisory; a failed recipient never
/// aborts the triggering transition.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Append-only audit port invoked synchronously by every successful mutation.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Sink(String),
}

/// Downstream listing registry, consumed fire-and-forget at approval time.
pub trait ListingRegistry: Send + Sync {
    fn create_listing(&self, application: &Application) -> Result<(), ListingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("listing registry unavailable: {0}")]
    Unavailable(String),
}
