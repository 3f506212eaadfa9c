// src/handlers/session.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::{auth::UserSession, view::ViewState},
    services::idle::UserActivity,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivityPayload {
    pub kind: UserActivity,
}

// GET /api/session
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "Session",
    responses(
        (status = 200, description = "Sessão ativa", body = UserSession),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_session(AuthenticatedUser(session): AuthenticatedUser) -> Json<UserSession> {
    Json(session)
}

// POST /api/session/activity
#[utoipa::path(
    post,
    path = "/api/session/activity",
    tag = "Session",
    request_body = ActivityPayload,
    responses(
        (status = 204, description = "Janela de inatividade reiniciada"),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_activity(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<ActivityPayload>,
) -> impl IntoResponse {
    app_state.session.record_activity(payload.kind);
    StatusCode::NO_CONTENT
}

// GET /api/view
#[utoipa::path(
    get,
    path = "/api/view",
    tag = "Session",
    responses(
        (status = 200, description = "Estado da interface com notificações traduzidas", body = ViewState)
    )
)]
pub async fn get_view(State(app_state): State<AppState>, locale: Locale) -> Json<ViewState> {
    let mut view = app_state.view.snapshot();
    for notification in &mut view.notifications {
        notification.message = Some(app_state.i18n_store.translate(&locale.0, &notification.key));
    }
    Json(view)
}

// DELETE /api/view/notifications/{id}
#[utoipa::path(
    delete,
    path = "/api/view/notifications/{id}",
    tag = "Session",
    params(("id" = u64, Path, description = "ID da notificação")),
    responses(
        (status = 204, description = "Notificação dispensada"),
        (status = 404, description = "Notificação inexistente")
    )
)]
pub async fn dismiss_notification(State(app_state): State<AppState>, Path(id): Path<u64>) -> StatusCode {
    if app_state.view.dismiss(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
