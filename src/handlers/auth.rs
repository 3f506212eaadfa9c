// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::{
        auth::{AuthResponse, FirstPasswordPayload, Identity, LoginPayload},
        pre_registration::PasswordStrength,
    },
    services::{pre_registration::password_strength, session::LogoutReason},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordStrengthPayload {
    pub password: String,
}

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Sessão iniciada", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas"),
        (status = 429, description = "Muitas tentativas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let response = app_state
        .session
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(response)))
}

// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Sessão encerrada"),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    app_state.session.logout(LogoutReason::UserRequested).await;
    StatusCode::NO_CONTENT
}

// POST /api/auth/first-password
#[utoipa::path(
    post,
    path = "/api/auth/first-password",
    tag = "Auth",
    request_body = FirstPasswordPayload,
    responses(
        (status = 201, description = "Senha definida; o login já pode ser feito", body = Identity),
        (status = 400, description = "Senha fora da política"),
        (status = 403, description = "E-mail não pré-cadastrado"),
        (status = 409, description = "Senha já definida")
    )
)]
pub async fn first_password(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<FirstPasswordPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let identity = app_state
        .gate
        .complete_first_password(&payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(identity)))
}

// POST /api/auth/password-strength
#[utoipa::path(
    post,
    path = "/api/auth/password-strength",
    tag = "Auth",
    request_body = PasswordStrengthPayload,
    responses(
        (status = 200, description = "Pontuação do medidor de força", body = PasswordStrength)
    )
)]
pub async fn check_password_strength(Json(payload): Json<PasswordStrengthPayload>) -> Json<PasswordStrength> {
    Json(password_strength(&payload.password))
}
