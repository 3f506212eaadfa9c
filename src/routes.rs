// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::session_guard};

pub fn router(app_state: AppState) -> Router {
    // Rotas públicas: login, primeira senha e o estado da interface
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/first-password", post(handlers::auth::first_password))
        .route("/password-strength", post(handlers::auth::check_password_strength));

    let view_routes = Router::new()
        .route("/", get(handlers::session::get_view))
        .route("/notifications/{id}", delete(handlers::session::dismiss_notification));

    // Rotas protegidas pela sessão ativa
    let session_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/session", get(handlers::session::get_session))
        .route("/session/activity", post(handlers::session::record_activity))
        .route(
            "/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/clients/{id}",
            put(handlers::clients::update_client).delete(handlers::clients::delete_client),
        )
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/orders/next-number", get(handlers::orders::next_number))
        .route("/orders/{id}", delete(handlers::orders::delete_order))
        .route("/orders/{id}/complete", post(handlers::orders::complete_order))
        .route("/orders/{id}/reopen", post(handlers::orders::reopen_order))
        .route("/orders/{id}/print", get(handlers::orders::print_order))
        .route("/orders/{id}/pdf", get(handlers::orders::order_pdf))
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
        .route(
            "/admin/invites",
            get(handlers::admin::list_invites).post(handlers::admin::create_invite),
        )
        .route("/admin/invites/{email}", delete(handlers::admin::delete_invite))
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/users/{uid}/role", put(handlers::admin::update_role))
        .route("/admin/audit", get(handlers::admin::audit_trail))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            session_guard,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/view", view_routes)
        .nest("/api", session_routes)
        .with_state(app_state)
}
