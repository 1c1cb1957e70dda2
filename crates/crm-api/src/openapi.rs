//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`. The per-resource attachment and audit-trail routes
//! are generic over the resource type and are not listed.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CRM API",
        version = "0.1.0",
        description = "Contacts, leads, tasks and chargeables with field-level audit trails, attachments, task reminders and notifications."
    ),
    paths(
        // Auth
        crate::routes::auth::signup,
        crate::routes::auth::login,
        crate::routes::auth::forgot_password,
        crate::routes::auth::reset_password,
        crate::routes::auth::me,
        // Contacts
        crate::routes::contacts::list_contacts,
        crate::routes::contacts::create_contact,
        crate::routes::contacts::list_companies,
        crate::routes::contacts::get_contact,
        crate::routes::contacts::update_contact,
        crate::routes::contacts::delete_contact,
        crate::routes::contacts::upload_logo,
        crate::routes::contacts::delete_logo,
        // Leads
        crate::routes::leads::list_leads,
        crate::routes::leads::create_lead,
        crate::routes::leads::get_pipeline_summary,
        crate::routes::leads::get_contact_details,
        crate::routes::leads::get_lead,
        crate::routes::leads::update_lead,
        crate::routes::leads::delete_lead,
        // Tasks
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::create_task,
        crate::routes::tasks::list_assignable_users,
        crate::routes::tasks::list_companies,
        crate::routes::tasks::get_task,
        crate::routes::tasks::update_task,
        crate::routes::tasks::delete_task,
        // Reminders & notifications
        crate::routes::reminders::list_reminders,
        crate::routes::reminders::list_due_reminders,
        crate::routes::reminders::mark_reminder_sent,
        crate::routes::reminders::list_notifications,
        crate::routes::reminders::mark_notification_processed,
        // Chargeables
        crate::routes::chargeables::list_chargeables,
        crate::routes::chargeables::create_chargeable,
        crate::routes::chargeables::search_chargeables,
        crate::routes::chargeables::list_by_customer,
        crate::routes::chargeables::list_customer_options,
        crate::routes::chargeables::get_chargeable,
        crate::routes::chargeables::update_chargeable,
        crate::routes::chargeables::delete_chargeable,
        // Audit
        crate::routes::audit::list_chargeable_audit,
        crate::routes::audit::search_chargeable_audit,
        crate::routes::audit::list_chargeable_audit_by_actor,
    ),
    components(schemas(
        // Entities
        crm_core::Contact,
        crm_core::ContactInput,
        crm_core::ContactView,
        crm_core::contact::Address,
        crm_core::contact::ContactPerson,
        crm_core::contact::ContactPersonInput,
        crm_core::contact::ContactType,
        crm_core::Lead,
        crm_core::LeadInput,
        crm_core::LeadView,
        crm_core::LeadContactInfo,
        crm_core::LeadStage,
        crm_core::lead::Country,
        crm_core::lead::PipelineLead,
        crm_core::StageSummary,
        crm_core::Task,
        crm_core::TaskInput,
        crm_core::TaskStatus,
        crm_core::Priority,
        crm_core::Chargeable,
        crm_core::ChargeableInput,
        crm_core::CustomerOption,
        crm_core::YesNoPending,
        crm_core::CurrencyCode,
        crm_core::AmountInput,
        crm_core::Attachment,
        crm_core::EntityKind,
        crm_core::ActorId,
        // Audit
        crm_core::AuditEntry,
        crm_core::AuditAction,
        crm_core::AuditPage,
        crm_core::audit::PageInfo,
        crm_core::ChangeRecord,
        // Reminders
        crm_core::Reminder,
        crm_core::ReminderStatus,
        crm_core::Notification,
        // Accounts
        crate::directory::UserView,
        crate::routes::auth::SignupRequest,
        crate::routes::auth::LoginRequest,
        crate::routes::auth::TokenResponse,
        crate::routes::auth::ForgotPasswordRequest,
        crate::routes::auth::ResetPasswordRequest,
        // Shared
        crate::routes::MessageResponse,
        crate::routes::attachments::UploadResponse,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crm_core::FieldError,
    )),
    tags(
        (name = "auth", description = "Registration, login and password reset"),
        (name = "contacts", description = "Companies and their contact persons"),
        (name = "leads", description = "Sales pipeline"),
        (name = "tasks", description = "Assignable work items"),
        (name = "reminders", description = "Task reminders and actor notifications"),
        (name = "chargeables", description = "Quotes and payment progress"),
        (name = "audit", description = "Field-level change history"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: The generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
