// src/handlers/admin.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{i18n::Locale, rbac::RequireAdmin},
    models::{
        audit::AuditEntry,
        auth::{UpdateRolePayload, UserProfile},
        pre_registration::{InviteRequest, PreRegistration},
    },
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditParams {
    pub limit: Option<usize>,
}

// =============================================================================
//  PRÉ-CADASTROS
// =============================================================================

// GET /api/admin/invites
#[utoipa::path(
    get,
    path = "/api/admin/invites",
    tag = "Admin",
    responses(
        (status = 200, description = "Pré-cadastros", body = Vec<PreRegistration>),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_invites(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let invites = app_state
        .gate
        .list_invites()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(invites)))
}

// POST /api/admin/invites
#[utoipa::path(
    post,
    path = "/api/admin/invites",
    tag = "Admin",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Pré-cadastro criado", body = PreRegistration),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "E-mail já pré-cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_invite(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireAdmin,
    Json(payload): Json<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invite = app_state
        .gate
        .request_invite(payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(invite)))
}

// DELETE /api/admin/invites/{email}
#[utoipa::path(
    delete,
    path = "/api/admin/invites/{email}",
    tag = "Admin",
    params(("email" = String, Path, description = "E-mail pré-cadastrado")),
    responses(
        (status = 204, description = "Pré-cadastro removido"),
        (status = 409, description = "Senha já definida")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_invite(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireAdmin,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .gate
        .delete_invite(&email)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  USUÁRIOS E AUDITORIA
// =============================================================================

// GET /api/admin/users
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    responses(
        (status = 200, description = "Perfis cadastrados", body = Vec<UserProfile>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let users = app_state
        .admin
        .list_users()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(users)))
}

// PUT /api/admin/users/{uid}/role
#[utoipa::path(
    put,
    path = "/api/admin/users/{uid}/role",
    tag = "Admin",
    request_body = UpdateRolePayload,
    params(("uid" = String, Path, description = "UID do usuário")),
    responses(
        (status = 204, description = "Papel atualizado"),
        (status = 404, description = "Usuário inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_role(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireAdmin,
    Path(uid): Path<String>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .admin
        .change_role(&uid, payload.role)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/admin/audit
#[utoipa::path(
    get,
    path = "/api/admin/audit",
    tag = "Admin",
    params(AuditParams),
    responses(
        (status = 200, description = "Eventos de segurança, mais recentes primeiro", body = Vec<AuditEntry>)
    ),
    security(("api_jwt" = []))
)]
pub async fn audit_trail(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireAdmin,
    Query(params): Query<AuditParams>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = app_state
        .admin
        .audit_trail(params.limit.unwrap_or(100))
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(entries)))
}
