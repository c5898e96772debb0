use super::domain::{Actor, ActorRole, Application};

/// Closed capability set; each operation declares the capability it needs and
/// delegates to the one evaluator below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
    ViewApplication,
    EditSection,
    SubmitApplication,
    AssignAdvisor,
    ApproveApplication,
    RejectApplication,
    CreateFeedback,
    UpdateFeedbackStatus,
}

/// Stateless role/relationship policy. Deny results carry no detail on
/// purpose; the service layer decides between not-found and forbidden.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn authorize(actor: &Actor, application: &Application, action: WorkflowAction) -> bool {
        match actor.role {
            ActorRole::CmaAdmin => Self::admin_clause(application, action),
            ActorRole::CmaRegulator => Self::regulator_clause(actor, application, action),
            ActorRole::IbAdvisor => Self::advisor_clause(actor, application, action),
            role if role.is_issuer() => Self::issuer_clause(actor, application, action),
            _ => false,
        }
    }

    fn admin_clause(application: &Application, action: WorkflowAction) -> bool {
        // Full access, except that nobody raises queries on a decided case.
        match action {
            WorkflowAction::CreateFeedback => !application.status.is_terminal(),
            _ => true,
        }
    }

    fn regulator_clause(actor: &Actor, application: &Application, action: WorkflowAction) -> bool {
        let assigned = application.assigned_cma_officer.as_ref() == Some(&actor.id);
        match action {
            WorkflowAction::ApproveApplication | WorkflowAction::RejectApplication => true,
            WorkflowAction::ViewApplication => {
                assigned || application.status.regulator_visible()
            }
            WorkflowAction::CreateFeedback => {
                (assigned && !application.status.is_terminal())
                    || application.status.regulator_visible()
            }
            _ => false,
        }
    }

    fn advisor_clause(actor: &Actor, application: &Application, action: WorkflowAction) -> bool {
        if application.assigned_ib_advisor.as_ref() != Some(&actor.id) {
            return false;
        }
        match action {
            WorkflowAction::ViewApplication => true,
            WorkflowAction::CreateFeedback => !application.status.is_terminal(),
            _ => false,
        }
    }

    fn issuer_clause(actor: &Actor, application: &Application, action: WorkflowAction) -> bool {
        if actor.company_id.as_ref() != Some(&application.company_id) {
            return false;
        }
        match action {
            WorkflowAction::SubmitApplication | WorkflowAction::AssignAdvisor => {
                actor.role == ActorRole::IssuerCeo
            }
            WorkflowAction::ViewApplication
            | WorkflowAction::EditSection
            | WorkflowAction::UpdateFeedbackStatus => true,
            _ => false,
        }
    }
}
