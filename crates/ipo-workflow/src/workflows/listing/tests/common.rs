use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::workflows::listing::domain::{
    Actor, ActorId, ActorRole, Application, ApplicationId, AuditEntry, CompanyId, Feedback,
    FeedbackId, Notification, Section, SectionId, SectionStatus,
};
use crate::workflows::listing::repository::{
    AuditError, AuditSink, ListingError, ListingRegistry, NotificationSink, NotifyError,
    StoreError, WorkflowStore,
};
use crate::workflows::listing::service::ApplicationWorkflowService;

pub(super) const COMPANY: &str = "C1";

pub(super) fn ceo() -> Actor {
    Actor::for_company("ceo-1", ActorRole::IssuerCeo, COMPANY)
}

pub(super) fn cfo() -> Actor {
    Actor::for_company("cfo-1", ActorRole::IssuerCfo, COMPANY)
}

pub(super) fn advisor() -> Actor {
    Actor::new("adv-1", ActorRole::IbAdvisor)
}

pub(super) fn other_advisor() -> Actor {
    Actor::new("adv-2", ActorRole::IbAdvisor)
}

pub(super) fn regulator() -> Actor {
    Actor::new("reg-1", ActorRole::CmaRegulator)
}

pub(super) fn admin() -> Actor {
    Actor::new("adm-1", ActorRole::CmaAdmin)
}

/// In-memory store mirroring the transactional contract of the real backend:
/// application updates are compare-and-swap on the version column.
#[derive(Default)]
pub(super) struct MemoryStore {
    applications: Mutex<HashMap<ApplicationId, Application>>,
    sections: Mutex<Vec<Section>>,
    feedback: Mutex<Vec<Feedback>>,
    actors: Mutex<HashMap<ActorId, Actor>>,
}

impl MemoryStore {
    pub(super) fn seed_actor(&self, actor: Actor) {
        self.actors
            .lock()
            .expect("actor mutex poisoned")
            .insert(actor.id.clone(), actor);
    }

    pub(super) fn seed_section(&self, section: Section) {
        self.sections
            .lock()
            .expect("section mutex poisoned")
            .push(section);
    }
}

impl WorkflowStore for MemoryStore {
    fn insert_application(&self, application: Application) -> Result<Application, StoreError> {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_application(
        &self,
        application: Application,
        expected_version: u64,
    ) -> Result<Application, StoreError> {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        let current = guard
            .get(&application.id)
            .ok_or(StoreError::NotFound)?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        let mut stored = application;
        stored.version = expected_version + 1;
        guard.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn sections(&self, application_id: &ApplicationId) -> Result<Vec<Section>, StoreError> {
        let guard = self.sections.lock().expect("section mutex poisoned");
        let mut owned: Vec<Section> = guard
            .iter()
            .filter(|section| &section.application_id == application_id)
            .cloned()
            .collect();
        owned.sort_by_key(|section| section.section_number);
        Ok(owned)
    }

    fn fetch_section(&self, id: &SectionId) -> Result<Option<Section>, StoreError> {
        let guard = self.sections.lock().expect("section mutex poisoned");
        Ok(guard.iter().find(|section| &section.id == id).cloned())
    }

    fn update_section(&self, section: Section) -> Result<(), StoreError> {
        let mut guard = self.sections.lock().expect("section mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|candidate| candidate.id == section.id)
            .ok_or(StoreError::NotFound)?;
        *slot = section;
        Ok(())
    }

    fn insert_feedback(&self, feedback: Feedback) -> Result<Feedback, StoreError> {
        let mut guard = self.feedback.lock().expect("feedback mutex poisoned");
        if guard.iter().any(|existing| existing.id == feedback.id) {
            return Err(StoreError::Conflict);
        }
        guard.push(feedback.clone());
        Ok(feedback)
    }

    fn fetch_feedback(&self, id: &FeedbackId) -> Result<Option<Feedback>, StoreError> {
        let guard = self.feedback.lock().expect("feedback mutex poisoned");
        Ok(guard.iter().find(|feedback| &feedback.id == id).cloned())
    }

    fn update_feedback(&self, feedback: Feedback) -> Result<(), StoreError> {
        let mut guard = self.feedback.lock().expect("feedback mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|candidate| candidate.id == feedback.id)
            .ok_or(StoreError::NotFound)?;
        *slot = feedback;
        Ok(())
    }

    fn list_feedback(&self, application_id: &ApplicationId) -> Result<Vec<Feedback>, StoreError> {
        let guard = self.feedback.lock().expect("feedback mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|feedback| &feedback.application_id == application_id)
            .cloned()
            .collect())
    }

    fn fetch_actor(&self, id: &ActorId) -> Result<Option<Actor>, StoreError> {
        let guard = self.actors.lock().expect("actor mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn regulator_recipients(&self) -> Result<Vec<ActorId>, StoreError> {
        let guard = self.actors.lock().expect("actor mutex poisoned");
        let mut recipients: Vec<ActorId> = guard
            .values()
            .filter(|actor| actor.role.is_regulator())
            .map(|actor| actor.id.clone())
            .collect();
        recipients.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(recipients)
    }

    fn company_members(&self, company_id: &CompanyId) -> Result<Vec<ActorId>, StoreError> {
        let guard = self.actors.lock().expect("actor mutex poisoned");
        let mut members: Vec<ActorId> = guard
            .values()
            .filter(|actor| {
                actor.role.is_issuer() && actor.company_id.as_ref() == Some(company_id)
            })
            .map(|actor| actor.id.clone())
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(members)
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifications {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationSink for MemoryNotifications {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifications;

impl NotificationSink for FailingNotifications {
    fn deliver(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAudit {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryListings {
    attempts: AtomicUsize,
    fail: bool,
}

impl MemoryListings {
    pub(super) fn failing() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub(super) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl ListingRegistry for MemoryListings {
    fn create_listing(&self, _application: &Application) -> Result<(), ListingError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            Err(ListingError::Unavailable("registry offline".to_string()))
        } else {
            Ok(())
        }
    }
}

pub(super) type TestService =
    ApplicationWorkflowService<MemoryStore, MemoryNotifications, MemoryAudit, MemoryListings>;

pub(super) struct Harness {
    pub(super) service: TestService,
    pub(super) store: Arc<MemoryStore>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) audit: Arc<MemoryAudit>,
    pub(super) listings: Arc<MemoryListings>,
}

pub(super) fn harness() -> Harness {
    harness_with_listings(MemoryListings::default())
}

pub(super) fn harness_with_listings(listings: MemoryListings) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let audit = Arc::new(MemoryAudit::default());
    let listings = Arc::new(listings);

    for actor in [ceo(), cfo(), advisor(), other_advisor(), regulator(), admin()] {
        store.seed_actor(actor);
    }

    let service = ApplicationWorkflowService::new(
        store.clone(),
        notifications.clone(),
        audit.clone(),
        listings.clone(),
    );

    Harness {
        service,
        store,
        notifications,
        audit,
        listings,
    }
}

pub(super) fn section(
    application_id: &ApplicationId,
    number: u32,
    status: SectionStatus,
    completion: u8,
) -> Section {
    Section {
        id: SectionId(format!("{}-s{}", application_id.0, number)),
        application_id: application_id.clone(),
        section_number: number,
        title: format!("Section {number}"),
        status,
        completion_percentage: completion,
        data: serde_json::json!({}),
    }
}

/// Seed an application with sections described as (number, status, percent).
pub(super) fn seed_application(
    harness: &Harness,
    id: &str,
    sections: &[(u32, SectionStatus, u8)],
) -> ApplicationId {
    let application = Application::draft(id, COMPANY);
    let application_id = application.id.clone();
    harness
        .store
        .insert_application(application)
        .expect("seed application");
    for (number, status, completion) in sections {
        harness
            .store
            .seed_section(section(&application_id, *number, *status, *completion));
    }
    application_id
}

pub(super) fn seed_complete_application(harness: &Harness, id: &str) -> ApplicationId {
    seed_application(
        harness,
        id,
        &[
            (1, SectionStatus::Completed, 100),
            (2, SectionStatus::Completed, 100),
            (3, SectionStatus::Completed, 100),
        ],
    )
}
