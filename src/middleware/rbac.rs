// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::UserSession,
};

/// Guardião das rotas administrativas: exige sessão com papel `admin`.
pub struct RequireAdmin(pub UserSession);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Ok(locale) = Locale::from_request_parts(parts, state).await;

        // A. Extrai a sessão colocada pelo session_guard
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::NotAuthenticated.to_api_error(&locale, &app_state.i18n_store))?;

        // B. O papel vem da sessão ativa, que acompanha trocas feitas por admins
        let role = app_state
            .session
            .current()
            .filter(|s| s.uid == user.0.uid)
            .map(|s| s.role)
            .unwrap_or(user.0.role);

        if !role.is_admin() {
            return Err(AppError::Forbidden.to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequireAdmin(user.0))
    }
}
