// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "KYC CRM",
        description = "Cadastro de clientes com formulário KYC dinâmico, fluxo de status, lembretes e análise por IA."
    ),
    paths(
        // --- Customers ---
        handlers::customers::list_customers,
        handlers::customers::create_customer,
        handlers::customers::get_customer,
        handlers::customers::update_customer,
        handlers::customers::update_status,
        handlers::customers::update_birthday,
        handlers::customers::get_history,

        // --- Analysis ---
        handlers::analysis::analyze_customer,
        handlers::analysis::list_analyses,

        // --- Forms ---
        handlers::forms::get_active_form,
        handlers::forms::render_active_form,
        handlers::forms::validate_form,
        handlers::forms::list_forms,
        handlers::forms::create_form,
        handlers::forms::get_form,
        handlers::forms::update_form,
        handlers::forms::activate_form,

        // --- Invites ---
        handlers::invites::create_invite,
        handlers::invites::list_customer_invites,
        handlers::invites::revoke_invite,
        handlers::invites::check_invite,
        handlers::invites::submit_invite,

        // --- Dashboard ---
        handlers::dashboard::get_reminders,
        handlers::dashboard::get_stats,
    ),
    components(
        schemas(
            // --- CRM ---
            models::crm::CustomerStatus,
            models::crm::TransitionSource,
            models::crm::RelatedContact,
            models::crm::Customer,
            models::crm::CustomerPage,
            models::crm::CustomerStats,
            models::crm::StatusHistoryEntry,
            models::crm::CreateCustomerPayload,
            models::crm::UpdateCustomerPayload,
            models::crm::UpdateStatusPayload,
            models::crm::UpdateBirthdayPayload,

            // --- Forms ---
            models::form::FieldKind,
            models::form::FieldDefinition,
            models::form::FieldGroup,
            models::form::FormSchema,
            models::form::FormTemplate,
            models::form::Widget,
            models::form::RenderedField,
            models::form::RenderedSection,
            models::form::RenderedForm,
            models::form::FieldErrorCode,
            models::form::FieldError,
            models::form::ValidationResult,
            handlers::forms::CreateFormPayload,
            handlers::forms::UpdateFormPayload,
            handlers::forms::ValidateFormPayload,

            // --- Invites ---
            models::invite::InviteStatus,
            models::invite::FormInvite,
            models::invite::InviteLink,
            models::invite::CreateInvitePayload,
            models::invite::InviteCheck,
            models::invite::InviteSubmission,
            models::invite::InviteReceipt,

            // --- Reminders ---
            models::reminder::Severity,
            models::reminder::ReminderKind,
            models::reminder::Reminder,

            // --- Analysis ---
            models::analysis::Priority,
            models::analysis::Opportunity,
            models::analysis::AnalysisResult,
        )
    ),
    tags(
        (name = "Customers", description = "Cadastro de clientes e status"),
        (name = "Analysis", description = "Análise de IA do perfil KYC"),
        (name = "Forms", description = "Templates de formulário KYC"),
        (name = "Invites", description = "Links para o cliente preencher o próprio KYC"),
        (name = "Dashboard", description = "Lembretes e indicadores")
    )
)]
pub struct ApiDoc;
