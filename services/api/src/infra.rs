use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use ipo_workflow::workflows::listing::{
    Actor, ActorId, ActorRole, Application, ApplicationId, AuditEntry, AuditError, AuditSink,
    CompanyId, Feedback, FeedbackId, ListingError, ListingRegistry, Notification,
    NotificationSink, NotifyError, Section, SectionId, StoreError, WorkflowStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local store backing the service until the database tier lands.
/// Application updates are compare-and-swap on the version column, matching
/// the contract the engine relies on.
#[derive(Default)]
pub(crate) struct InMemoryWorkflowStore {
    applications: Mutex<HashMap<ApplicationId, Application>>,
    sections: Mutex<Vec<Section>>,
    feedback: Mutex<Vec<Feedback>>,
    actors: Mutex<HashMap<ActorId, Actor>>,
}

impl InMemoryWorkflowStore {
    pub(crate) fn register_actor(&self, actor: Actor) {
        self.actors
            .lock()
            .expect("actor mutex poisoned")
            .insert(actor.id.clone(), actor);
    }

    pub(crate) fn register_section(&self, section: Section) {
        self.sections
            .lock()
            .expect("section mutex poisoned")
            .push(section);
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
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
        let current = guard.get(&application.id).ok_or(StoreError::NotFound)?;
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

/// Collects notifications in memory; an SMTP or push gateway slots in behind
/// the same trait later.
#[derive(Default)]
pub(crate) struct InMemoryNotificationCenter {
    events: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationCenter {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}

impl NotificationSink for InMemoryNotificationCenter {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub(crate) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryListingRegistry {
    created: Mutex<Vec<ApplicationId>>,
}

impl InMemoryListingRegistry {
    pub(crate) fn created(&self) -> Vec<ApplicationId> {
        self.created.lock().expect("listing mutex poisoned").clone()
    }
}

impl ListingRegistry for InMemoryListingRegistry {
    fn create_listing(&self, application: &Application) -> Result<(), ListingError> {
        self.created
            .lock()
            .expect("listing mutex poisoned")
            .push(application.id.clone());
        Ok(())
    }
}

/// Register the baseline set of accounts the service needs before any
/// workflow call: one issuer team, one advisor, and the regulator desk.
pub(crate) fn register_baseline_actors(store: &InMemoryWorkflowStore, company: &str) {
    for actor in [
        Actor::for_company("ceo-1", ActorRole::IssuerCeo, company),
        Actor::for_company("cfo-1", ActorRole::IssuerCfo, company),
        Actor::for_company("sec-1", ActorRole::IssuerSecretary, company),
        Actor::new("adv-1", ActorRole::IbAdvisor),
        Actor::new("reg-1", ActorRole::CmaRegulator),
        Actor::new("adm-1", ActorRole::CmaAdmin),
    ] {
        store.register_actor(actor);
    }
}
