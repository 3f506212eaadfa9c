// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::first_password,
        handlers::auth::check_password_strength,

        // --- Session ---
        handlers::session::get_session,
        handlers::session::record_activity,
        handlers::session::get_view,
        handlers::session::dismiss_notification,

        // --- Clients ---
        handlers::clients::list_clients,
        handlers::clients::create_client,
        handlers::clients::update_client,
        handlers::clients::delete_client,

        // --- Orders ---
        handlers::orders::list_orders,
        handlers::orders::next_number,
        handlers::orders::create_order,
        handlers::orders::complete_order,
        handlers::orders::reopen_order,
        handlers::orders::delete_order,
        handlers::orders::print_order,
        handlers::orders::order_pdf,

        // --- Dashboard ---
        handlers::dashboard::get_dashboard,

        // --- Admin ---
        handlers::admin::list_invites,
        handlers::admin::create_invite,
        handlers::admin::delete_invite,
        handlers::admin::list_users,
        handlers::admin::update_role,
        handlers::admin::audit_trail,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::UserProfile,
            models::auth::Identity,
            models::auth::UserSession,
            models::auth::LoginPayload,
            models::auth::FirstPasswordPayload,
            models::auth::UpdateRolePayload,
            models::auth::AuthResponse,
            handlers::auth::PasswordStrengthPayload,

            // --- Pré-cadastro ---
            models::pre_registration::PreRegistration,
            models::pre_registration::InviteRequest,
            models::pre_registration::PasswordRule,
            models::pre_registration::PasswordStrength,

            // --- Session / View ---
            services::idle::UserActivity,
            services::session::LogoutReason,
            handlers::session::ActivityPayload,
            models::view::ViewState,
            models::view::Screen,
            models::view::UserBadge,
            models::view::Notification,
            models::view::NotificationLevel,
            models::view::OrderDraft,

            // --- Clients ---
            models::client::Client,
            models::client::ClientInput,
            handlers::clients::CreatedResponse,

            // --- Orders ---
            models::order::Order,
            models::order::OrderStatus,
            models::order::OrderEvent,
            models::order::OrderAction,
            models::order::ClientSnapshot,
            models::order::OrderForm,
            models::order::CreateOrderPayload,
            models::order::OrderRow,
            services::order_workflow::CreatedOrder,
            handlers::orders::NextNumberResponse,
            handlers::orders::TransitionResponse,

            // --- Print ---
            models::print::PrintDocument,
            models::print::StudioInfo,
            models::print::ServiceGroup,
            models::print::LabeledValue,
            models::print::SignatureBlock,

            // --- Dashboard ---
            models::dashboard::DashboardSummary,
            models::dashboard::DashboardView,
            models::dashboard::ActivityEntry,
            models::dashboard::ActivityKind,

            // --- Audit ---
            models::audit::AuditEvent,
            models::audit::AuditEntry,
        )
    ),
    tags(
        (name = "Auth", description = "Login, logout e primeira senha"),
        (name = "Session", description = "Sessão ativa, inatividade e estado da interface"),
        (name = "Clients", description = "Cadastro de Clientes"),
        (name = "Orders", description = "Ordens de Serviço: numeração, status e impressão"),
        (name = "Dashboard", description = "Indicadores e Atividade Recente"),
        (name = "Admin", description = "Pré-cadastros, Papéis e Auditoria")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
