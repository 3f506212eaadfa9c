// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    db::store::StoreError,
    middleware::i18n::Locale,
    models::pre_registration::PasswordRule,
};

// =========================================================================
//  ERROS DO PROVEDOR DE IDENTIDADE
// =========================================================================

/// Códigos do provedor de identidade, no mesmo formato `auth/...` que o front-end já conhece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum AuthError {
    #[error("Usuário não encontrado")]
    UserNotFound,
    #[error("Senha incorreta")]
    WrongPassword,
    #[error("E-mail já cadastrado")]
    EmailAlreadyInUse,
    #[error("Senha muito fraca")]
    WeakPassword,
    #[error("E-mail inválido")]
    InvalidEmail,
    #[error("Muitas requisições")]
    TooManyRequests,
    // Bloqueio local por excesso de falhas de login
    #[error("Muitas tentativas de login")]
    TooManyAttempts,
    #[error("Token inválido")]
    InvalidToken,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "auth/user-not-found",
            AuthError::WrongPassword => "auth/wrong-password",
            AuthError::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthError::WeakPassword => "auth/weak-password",
            AuthError::InvalidEmail => "auth/invalid-email",
            AuthError::TooManyRequests => "auth/too-many-requests",
            AuthError::TooManyAttempts => "auth/too-many-attempts",
            AuthError::InvalidToken => "auth/invalid-token",
        }
    }

    fn message_key(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "auth_user_not_found",
            AuthError::WrongPassword => "auth_wrong_password",
            AuthError::EmailAlreadyInUse => "auth_email_already_in_use",
            AuthError::WeakPassword => "auth_weak_password",
            AuthError::InvalidEmail => "auth_invalid_email",
            AuthError::TooManyRequests => "auth_too_many_requests",
            AuthError::TooManyAttempts => "auth_too_many_attempts",
            AuthError::InvalidToken => "auth_invalid_token",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
            AuthError::WeakPassword | AuthError::InvalidEmail => StatusCode::BAD_REQUEST,
            AuthError::TooManyRequests | AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

// =========================================================================
//  ERRO DA APLICAÇÃO
// =========================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Erro de autenticação: {0}")]
    Auth(#[from] AuthError),

    #[error("E-mail não pré-cadastrado")]
    NotInvited,

    #[error("Senha já definida para este e-mail")]
    AlreadySet,

    #[error("Pré-cadastro já existe para este e-mail")]
    DuplicateInvite,

    #[error("Pré-cadastro já utilizado")]
    InviteAlreadyUsed,

    #[error("Senha não atende à política: {0:?}")]
    WeakPassword(Vec<PasswordRule>),

    #[error("Nenhuma sessão ativa")]
    NotAuthenticated,

    #[error("Acesso restrito a administradores")]
    Forbidden,

    #[error("Nenhum cliente selecionado")]
    NoClientSelected,

    #[error("Número da OS não informado")]
    MissingOrderNumber,

    #[error("Número da OS inválido: {0}")]
    InvalidOrderNumber(String),

    #[error("Transição de status não permitida")]
    InvalidTransition,

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Falha na escrita remota: {0}")]
    RemoteWrite(StoreError),

    #[error("Falha na leitura remota: {0}")]
    RemoteRead(StoreError),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

// Leituras usam `?` direto; escritas mapeiam explicitamente para `RemoteWrite`.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::RemoteRead(err)
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    pub fn message_key(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::Auth(code) => code.message_key(),
            AppError::NotInvited => "not_invited",
            AppError::AlreadySet => "already_set",
            AppError::DuplicateInvite => "duplicate_invite",
            AppError::InviteAlreadyUsed => "invite_already_used",
            AppError::WeakPassword(_) => "weak_password",
            AppError::NotAuthenticated => "not_authenticated",
            AppError::Forbidden => "forbidden",
            AppError::NoClientSelected => "no_client_selected",
            AppError::MissingOrderNumber => "missing_order_number",
            AppError::InvalidOrderNumber(_) => "invalid_order_number",
            AppError::InvalidTransition => "invalid_transition",
            AppError::NotFound(_) => "not_found",
            AppError::RemoteWrite(_) => "remote_write",
            AppError::RemoteRead(_) => "remote_read",
            AppError::FontNotFound(_) => "font_not_found",
            AppError::BcryptError(_) | AppError::JwtError(_) | AppError::InternalServerError(_) => {
                "internal_error"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::WeakPassword(_)
            | AppError::NoClientSelected
            | AppError::MissingOrderNumber
            | AppError::InvalidOrderNumber(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(code) => code.status(),
            AppError::NotInvited | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::AlreadySet
            | AppError::DuplicateInvite
            | AppError::InviteAlreadyUsed
            | AppError::InvalidTransition => StatusCode::CONFLICT,
            AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RemoteWrite(e) | AppError::RemoteRead(e) => store_status(e),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte o erro interno em resposta HTTP traduzida para o idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("🔥 Erro Interno do Servidor: {}", self);
        }

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let key = e.message.as_deref().unwrap_or(&e.code);
                            Value::String(i18n.translate(&locale.0, key))
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(details))
            }
            AppError::WeakPassword(rules) => Some(json!({ "rules": rules })),
            AppError::Auth(code) => Some(json!({ "code": code.code() })),
            _ => None,
        };

        ApiError {
            status,
            error: i18n.translate(&locale.0, self.message_key()),
            details,
        }
    }
}

// =========================================================================
//  RESPOSTA DE ERRO DA API
// =========================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_keep_the_provider_format() {
        assert_eq!(AuthError::WrongPassword.code(), "auth/wrong-password");
        assert_eq!(AuthError::EmailAlreadyInUse.code(), "auth/email-already-in-use");
    }

    #[test]
    fn api_error_is_localized() {
        let i18n = I18nStore::new();
        let pt = AppError::Auth(AuthError::UserNotFound)
            .to_api_error(&Locale("pt".into()), &i18n);
        assert_eq!(pt.status, StatusCode::UNAUTHORIZED);
        assert_eq!(pt.error, "Usuário não encontrado");

        let en = AppError::NotInvited.to_api_error(&Locale("en".into()), &i18n);
        assert_eq!(en.status, StatusCode::FORBIDDEN);
        assert!(en.error.contains("not pre-registered"));
    }

    #[test]
    fn store_failures_map_to_http_statuses() {
        let err = AppError::RemoteWrite(StoreError::Unavailable("x".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err: AppError = StoreError::NotFound("users/u1".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
