use crate::infra::{
    register_baseline_actors, InMemoryAuditLog, InMemoryListingRegistry,
    InMemoryNotificationCenter, InMemoryWorkflowStore,
};
use clap::Args;
use ipo_workflow::error::AppError;
use ipo_workflow::workflows::listing::{
    Actor, ActorRole, Application, ApplicationId, ApplicationWorkflowService, FeedbackDraft,
    FeedbackStatus, Priority, Section, SectionId, SectionStatus, WorkflowStore,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Issuer company identifier used for the walkthrough.
    #[arg(long, default_value = "demo-issuer")]
    pub(crate) company: String,
    /// End the walkthrough with a rejection instead of an approval.
    #[arg(long)]
    pub(crate) reject: bool,
    /// Skip the regulator query round trip.
    #[arg(long)]
    pub(crate) skip_query: bool,
}

const SECTION_TITLES: [&str; 4] = [
    "Company Profile",
    "Financial Statements",
    "Governance",
    "Prospectus",
];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        company,
        reject,
        skip_query,
    } = args;

    let store = Arc::new(InMemoryWorkflowStore::default());
    register_baseline_actors(&store, &company);
    let notifications = Arc::new(InMemoryNotificationCenter::default());
    let audit = Arc::new(InMemoryAuditLog::default());
    let listings = Arc::new(InMemoryListingRegistry::default());
    let service = Arc::new(ApplicationWorkflowService::new(
        store.clone(),
        notifications.clone(),
        audit.clone(),
        listings.clone(),
    ));

    let ceo = Actor::for_company("ceo-1", ActorRole::IssuerCeo, company.as_str());
    let cfo = Actor::for_company("cfo-1", ActorRole::IssuerCfo, company.as_str());
    let advisor = Actor::new("adv-1", ActorRole::IbAdvisor);
    let officer = Actor::new("reg-1", ActorRole::CmaRegulator);

    println!("IPO listing workflow demo for issuer '{company}'");

    let application_id = seed_draft(&store, &company);
    println!("- drafted application {}", application_id.0);

    let outcome = service
        .assign_advisor(&ceo, &application_id, &advisor.id)?;
    println!(
        "- advisor {} mandated; status {}",
        advisor.id.0,
        outcome.application.status.label()
    );

    if !skip_query {
        let query = service
            .create_feedback(
                &advisor,
                &application_id,
                FeedbackDraft {
                    category: "financials".to_string(),
                    issue: "Attach the audited comparatives for the prior two years".to_string(),
                    priority: Priority::High,
                    section_id: None,
                },
            )?;
        println!("- advisor raised feedback {}", query.feedback.id.0);

        service
            .update_feedback_status(&cfo, &query.feedback.id, FeedbackStatus::InProgress)?;
        let resolved = service
            .update_feedback_status(&cfo, &query.feedback.id, FeedbackStatus::Resolved)?;
        println!(
            "- feedback {} resolved by {}",
            resolved.feedback.id.0,
            cfo.id.0
        );
    }

    let submitted = service
        .submit_application(&ceo, &application_id)?;
    println!(
        "- submitted as {} at {}% completion",
        submitted
            .application
            .application_number
            .as_deref()
            .unwrap_or("<unnumbered>"),
        submitted.application.completion_percentage
    );

    let decided = if reject {
        service
            .reject_application(
                &officer,
                &application_id,
                "prospectus disclosures are incomplete",
                None,
            )?
    } else {
        service
            .approve_application(&officer, &application_id, Some("cleared".to_string()))?
    };
    println!(
        "- regulator decision: {} (phase {})",
        decided.application.status.label(),
        decided.application.status.phase().label()
    );
    for warning in &decided.warnings {
        println!("  ! side effect failed: {}", warning.detail);
    }
    if !listings.created().is_empty() {
        println!("- exchange listing created for {}", application_id.0);
    }

    println!("\nNotifications delivered: {}", notifications.events().len());
    for event in notifications.events() {
        println!("  -> {}: {}", event.recipient_id.0, event.message);
    }

    println!("\nAudit trail:");
    for entry in audit.entries() {
        println!(
            "  {} {} {:?} {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.actor_id.0,
            entry.action,
            entry.details
        );
    }

    Ok(())
}

fn seed_draft(store: &InMemoryWorkflowStore, company: &str) -> ApplicationId {
    let application = Application::draft("demo-app-1", company);
    let application_id = application.id.clone();
    store
        .insert_application(application)
        .expect("demo application is unique");
    for (index, title) in SECTION_TITLES.iter().enumerate() {
        let number = index as u32 + 1;
        store.register_section(Section {
            id: SectionId(format!("demo-app-1-s{number}")),
            application_id: application_id.clone(),
            section_number: number,
            title: title.to_string(),
            status: SectionStatus::Completed,
            completion_percentage: 100,
            data: serde_json::json!({}),
        });
    }
    application_id
}
