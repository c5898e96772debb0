use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Actor, ActorId, ActorRole, ApplicationId, FeedbackDraft, FeedbackId, FeedbackStatus};
use super::repository::{AuditSink, ListingRegistry, NotificationSink, StoreError, WorkflowStore};
use super::service::{
    ApplicationWorkflowService, SectionPatch, ValidationFailure, WorkflowError,
};

/// Router builder exposing the workflow operations over JSON. The acting
/// principal always travels explicitly in the request.
pub fn listing_router<S, N, A, L>(service: Arc<ApplicationWorkflowService<S, N, A, L>>) -> Router
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications/:application_id",
            get(get_application_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/approve",
            post(approve_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            post(reject_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/advisor",
            post(assign_advisor_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/feedback",
            post(create_feedback_handler::<S, N, A, L>)
                .get(list_feedback_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/sections",
            get(list_sections_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/sections/:section_number",
            post(update_section_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/applications/:application_id/completion",
            post(recompute_completion_handler::<S, N, A, L>),
        )
        .route(
            "/api/v1/feedback/:feedback_id/status",
            post(update_feedback_status_handler::<S, N, A, L>),
        )
        .with_state(service)
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            WorkflowError::Validation(ValidationFailure::IncompleteSections {
                section_numbers,
            }) => json!({
                "error": self.to_string(),
                "incomplete_sections": section_numbers,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ActorEnvelope {
    actor: Actor,
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    actor: Actor,
    #[serde(default)]
    comments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    actor: Actor,
    reason: String,
    #[serde(default)]
    comments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignAdvisorRequest {
    actor: Actor,
    advisor_id: ActorId,
}

#[derive(Debug, Deserialize)]
struct CreateFeedbackRequest {
    actor: Actor,
    #[serde(flatten)]
    draft: FeedbackDraft,
}

#[derive(Debug, Deserialize)]
struct FeedbackStatusRequest {
    actor: Actor,
    status: FeedbackStatus,
}

#[derive(Debug, Deserialize)]
struct UpdateSectionRequest {
    actor: Actor,
    #[serde(flatten)]
    patch: SectionPatch,
}

/// Actor identity for read endpoints, carried in the query string.
#[derive(Debug, Deserialize)]
struct ActorQuery {
    actor_id: String,
    role: ActorRole,
    #[serde(default)]
    company_id: Option<String>,
}

impl ActorQuery {
    fn into_actor(self) -> Actor {
        match self.company_id {
            Some(company) => Actor::for_company(self.actor_id, self.role, company),
            None => Actor::new(self.actor_id, self.role),
        }
    }
}

async fn get_application_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Query(actor): Query<ActorQuery>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let application =
        service.get_application(&actor.into_actor(), &ApplicationId(application_id))?;
    Ok((StatusCode::OK, Json(application)).into_response())
}

async fn submit_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Json(request): Json<ActorEnvelope>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let outcome =
        service.submit_application(&request.actor, &ApplicationId(application_id))?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

async fn approve_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let outcome = service.approve_application(
        &request.actor,
        &ApplicationId(application_id),
        request.comments,
    )?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

async fn reject_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let outcome = service.reject_application(
        &request.actor,
        &ApplicationId(application_id),
        &request.reason,
        request.comments,
    )?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

async fn assign_advisor_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Json(request): Json<AssignAdvisorRequest>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let outcome = service.assign_advisor(
        &request.actor,
        &ApplicationId(application_id),
        &request.advisor_id,
    )?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

async fn create_feedback_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Json(request): Json<CreateFeedbackRequest>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let outcome = service.create_feedback(
        &request.actor,
        &ApplicationId(application_id),
        request.draft,
    )?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

async fn list_feedback_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Query(actor): Query<ActorQuery>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let feedback =
        service.list_feedback(&actor.into_actor(), &ApplicationId(application_id))?;
    Ok((StatusCode::OK, Json(feedback)).into_response())
}

async fn list_sections_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
    Query(actor): Query<ActorQuery>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let sections =
        service.list_sections(&actor.into_actor(), &ApplicationId(application_id))?;
    Ok((StatusCode::OK, Json(sections)).into_response())
}

async fn update_section_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path((application_id, section_number)): Path<(String, u32)>,
    Json(request): Json<UpdateSectionRequest>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let outcome = service.update_section(
        &request.actor,
        &ApplicationId(application_id),
        section_number,
        request.patch,
    )?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

async fn recompute_completion_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(application_id): Path<String>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let completion = service.recompute_completion(&ApplicationId(application_id))?;
    Ok((
        StatusCode::OK,
        Json(json!({ "completion_percentage": completion })),
    )
        .into_response())
}

async fn update_feedback_status_handler<S, N, A, L>(
    State(service): State<Arc<ApplicationWorkflowService<S, N, A, L>>>,
    Path(feedback_id): Path<String>,
    Json(request): Json<FeedbackStatusRequest>,
) -> Result<Response, WorkflowError>
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    L: ListingRegistry + 'static,
{
    let outcome = service.update_feedback_status(
        &request.actor,
        &FeedbackId(feedback_id),
        request.status,
    )?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}
