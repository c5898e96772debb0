use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for listing applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

/// Closed role set consumed from the identity provider; never owned here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    IssuerCeo,
    IssuerCfo,
    IssuerSecretary,
    IssuerLegal,
    IbAdvisor,
    CmaRegulator,
    CmaAdmin,
}

impl ActorRole {
    pub const fn is_issuer(self) -> bool {
        matches!(
            self,
            Self::IssuerCeo | Self::IssuerCfo | Self::IssuerSecretary | Self::IssuerLegal
        )
    }

    pub const fn is_regulator(self) -> bool {
        matches!(self, Self::CmaRegulator | Self::CmaAdmin)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::IssuerCeo => "Issuer CEO",
            Self::IssuerCfo => "Issuer CFO",
            Self::IssuerSecretary => "Issuer Secretary",
            Self::IssuerLegal => "Issuer Legal Counsel",
            Self::IbAdvisor => "IB Advisor",
            Self::CmaRegulator => "CMA Regulator",
            Self::CmaAdmin => "CMA Admin",
        }
    }
}

/// Acting principal resolved by the session layer and passed explicitly into
/// every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: ActorId(id.into()),
            role,
            company_id: None,
        }
    }

    pub fn for_company(id: impl Into<String>, role: ActorRole, company: impl Into<String>) -> Self {
        Self {
            id: ActorId(id.into()),
            role,
            company_id: Some(CompanyId(company.into())),
        }
    }
}

/// Fine-grained lifecycle status of a listing application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    IbReview,
    Submitted,
    UnderReview,
    QueryIssued,
    CmaApproved,
    CmaRejected,
}

impl ApplicationStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::CmaApproved | Self::CmaRejected)
    }

    /// Statuses in which any regulator may see the application without being
    /// the assigned officer.
    pub const fn regulator_visible(self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview | Self::QueryIssued)
    }

    /// Coarse phase used for UI grouping; always derived, never stored.
    pub const fn phase(self) -> ApplicationPhase {
        match self {
            Self::Draft | Self::IbReview => ApplicationPhase::Preparation,
            Self::Submitted | Self::UnderReview | Self::QueryIssued => {
                ApplicationPhase::RegulatoryReview
            }
            Self::CmaApproved | Self::CmaRejected => ApplicationPhase::Decision,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::IbReview => "ib_review",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::QueryIssued => "query_issued",
            Self::CmaApproved => "cma_approved",
            Self::CmaRejected => "cma_rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationPhase {
    Preparation,
    RegulatoryReview,
    Decision,
}

impl ApplicationPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preparation => "Preparation",
            Self::RegulatoryReview => "Regulatory Review",
            Self::Decision => "Decision",
        }
    }
}

/// A listing application owned by exactly one issuer company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub company_id: CompanyId,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_number: Option<String>,
    /// Derived from section percentages; never written by actors.
    pub completion_percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_ib_advisor: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_cma_officer: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_comments: Option<String>,
    /// Optimistic-concurrency token bumped by the store on every update.
    #[serde(default)]
    pub version: u64,
}

impl Application {
    pub fn draft(id: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            id: ApplicationId(id.into()),
            company_id: CompanyId(company.into()),
            status: ApplicationStatus::Draft,
            application_number: None,
            completion_percentage: 0,
            assigned_ib_advisor: None,
            assigned_cma_officer: None,
            submission_date: None,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            review_comments: None,
            version: 0,
        }
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            status: self.status.label(),
            phase: self.status.phase().label(),
            application_number: self.application_number.clone(),
            completion_percentage: self.completion_percentage,
        }
    }
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_number: Option<String>,
    pub completion_percentage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl SectionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

/// One fixed chapter of the application form. The stored percentage is set by
/// issuer-side form logic and is trusted as-is, even when it disagrees with
/// the status field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub application_id: ApplicationId,
    pub section_number: u32,
    pub title: String,
    pub status: SectionStatus,
    pub completion_percentage: u8,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Priority scale shared by feedback items and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Pending,
    InProgress,
    Resolved,
}

impl FeedbackStatus {
    /// Feedback moves strictly forward; no reopening once resolved.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress) | (Self::InProgress, Self::Resolved)
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

/// An issue raised against the application or one of its sections, tracked to
/// resolution by the issuer team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: FeedbackId,
    pub application_id: ApplicationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<SectionId>,
    pub category: String,
    pub issue: String,
    pub priority: Priority,
    pub status: FeedbackStatus,
    pub created_by: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<ActorId>,
    pub created_at: DateTime<Utc>,
}

/// Inbound payload for raising a feedback item.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackDraft {
    pub category: String,
    pub issue: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub section_id: Option<SectionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ApplicationSubmitted,
    AdvisorAssigned,
    QueryIssued,
    ApplicationApproved,
    ApplicationRejected,
}

impl NotificationKind {
    pub const fn default_title(self) -> &'static str {
        match self {
            Self::ApplicationSubmitted => "Application submitted",
            Self::AdvisorAssigned => "Advisor assigned",
            Self::QueryIssued => "Query issued",
            Self::ApplicationApproved => "Application approved",
            Self::ApplicationRejected => "Application rejected",
        }
    }
}

/// Created as a side effect of a workflow transition; the engine never
/// touches it again afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: ActorId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub application_id: ApplicationId,
    pub priority: Priority,
    pub is_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AdvisorAssigned,
    ApplicationSubmitted,
    ApplicationApproved,
    ApplicationRejected,
    FeedbackCreated,
    FeedbackStatusChanged,
    SectionUpdated,
    SideEffectFailed,
}

/// Append-only record of a state-changing action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub application_id: ApplicationId,
    pub actor_id: ActorId,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
