// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::auth::UserSession,
    services::idle::UserActivity,
};

// O guardião das rotas autenticadas: o token precisa pertencer à sessão ativa
pub async fn session_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let identity = app_state.identity.verify_token(bearer.token()).map_err(to_api)?;

    let session = app_state
        .session
        .current()
        .filter(|s| s.uid == identity.uid)
        .ok_or(AppError::NotAuthenticated)
        .map_err(to_api)?;

    // Toda requisição autenticada conta como atividade
    app_state.session.record_activity(UserActivity::Click);

    request.extensions_mut().insert(AuthenticatedUser(session));
    Ok(next.run(request).await)
}

// Extrator para obter a sessão autenticada diretamente nos handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserSession);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::NotAuthenticated.to_api_error(&Locale::default(), &Default::default()))
    }
}
