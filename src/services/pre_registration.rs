// src/services/pre_registration.rs

use std::sync::Arc;

use serde_json::json;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    common::error::{AppError, AuthError},
    db::PreRegistrationRepository,
    models::{
        audit::AuditEvent,
        auth::{Identity, Role, UserSession},
        pre_registration::{InviteRequest, PasswordRule, PasswordStrength, PreRegistration},
    },
    services::{audit::SecurityAudit, auth::IdentityProvider, session_cell::SessionCell},
};

pub const MIN_PASSWORD_LENGTH: usize = 12;
pub const SPECIAL_CHARACTERS: &str = r#"!@#$%^&*()_+-=[]{};':"\|,.<>/?"#;
pub const BLOCKLISTED_FRAGMENTS: [&str; 5] = ["123456", "password", "123456789", "qwerty", "abc123"];
const BOOTSTRAP_ADMIN_NAME: &str = "Administrador";

/// Porta de entrada de novos usuários: só e-mails pré-cadastrados por um
/// administrador podem definir a primeira senha, e apenas uma vez.
#[derive(Clone)]
pub struct PreRegistrationGate {
    repo: PreRegistrationRepository,
    identity: Arc<dyn IdentityProvider>,
    cell: SessionCell,
    audit: SecurityAudit,
    bootstrap_admin: String,
}

impl PreRegistrationGate {
    pub fn new(
        repo: PreRegistrationRepository,
        identity: Arc<dyn IdentityProvider>,
        cell: SessionCell,
        audit: SecurityAudit,
        bootstrap_admin: &str,
    ) -> Self {
        Self {
            repo,
            identity,
            cell,
            audit,
            bootstrap_admin: bootstrap_admin.trim().to_lowercase(),
        }
    }

    fn require_admin(&self) -> Result<UserSession, AppError> {
        let session = self.cell.require()?;
        if !session.role.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(session)
    }

    fn is_bootstrap_admin(&self, email: &str) -> bool {
        !self.bootstrap_admin.is_empty() && email == self.bootstrap_admin
    }

    // =========================================================================
    //  CONVITES (somente administradores)
    // =========================================================================

    pub async fn request_invite(&self, request: InviteRequest) -> Result<PreRegistration, AppError> {
        let admin = self.require_admin()?;
        request.validate()?;

        let Some(role) = request.role else {
            let mut errors = ValidationErrors::new();
            errors.add("role", ValidationError::new("role_required"));
            return Err(errors.into());
        };
        let email = request.email.trim().to_lowercase();

        if self.repo.find(&email).await?.is_some() {
            return Err(AppError::DuplicateInvite);
        }

        self.repo
            .create(&email, &request.name, &request.phone, role, Some(&admin.email))
            .await?;
        self.audit.record(
            AuditEvent::UserPreRegistered,
            json!({ "email": email, "role": role, "createdBy": admin.email }),
        );
        tracing::info!("📨 Pré-cadastro criado para {} ({})", email, role.as_str());

        self.repo
            .find(&email)
            .await?
            .ok_or_else(|| AppError::NotFound(email))
    }

    /// Só é permitido enquanto a senha ainda não foi definida.
    pub async fn delete_invite(&self, email: &str) -> Result<(), AppError> {
        let admin = self.require_admin()?;
        let email = email.trim().to_lowercase();

        let invite = self
            .repo
            .find(&email)
            .await?
            .ok_or_else(|| AppError::NotFound(email.clone()))?;
        if invite.password_set {
            return Err(AppError::InviteAlreadyUsed);
        }

        self.repo.delete(&email).await?;
        self.audit.record(
            AuditEvent::PreRegistrationDeleted,
            json!({ "email": email, "deletedBy": admin.email }),
        );
        Ok(())
    }

    pub async fn list_invites(&self) -> Result<Vec<PreRegistration>, AppError> {
        self.require_admin()?;
        self.repo.list().await
    }

    /// Com a coleção vazia, pré-cadastra o administrador inicial.
    pub async fn seed_default_admin(&self) -> Result<bool, AppError> {
        if self.bootstrap_admin.is_empty() || !self.repo.is_empty().await? {
            return Ok(false);
        }
        self.repo
            .create(&self.bootstrap_admin, BOOTSTRAP_ADMIN_NAME, "", Role::Admin, None)
            .await?;
        tracing::info!("🌱 Administrador inicial pré-cadastrado: {}", self.bootstrap_admin);
        Ok(true)
    }

    // =========================================================================
    //  PRIMEIRA SENHA
    // =========================================================================

    pub async fn complete_first_password(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let email = email.trim().to_lowercase();
        let invite = self.repo.find(&email).await?;

        let display_name = match &invite {
            None if self.is_bootstrap_admin(&email) => BOOTSTRAP_ADMIN_NAME.to_string(),
            None => {
                self.audit.record(
                    AuditEvent::FirstPasswordFailed,
                    json!({ "email": email, "reason": "not_invited" }),
                );
                return Err(AppError::NotInvited);
            }
            Some(invite) if invite.password_set => {
                self.audit.record(
                    AuditEvent::FirstPasswordFailed,
                    json!({ "email": email, "reason": "already_set" }),
                );
                return Err(AppError::AlreadySet);
            }
            Some(invite) => invite.name.clone(),
        };

        let violations = validate_password_policy(password);
        if !violations.is_empty() {
            return Err(AppError::WeakPassword(violations));
        }

        let identity = match self.identity.create_account(&email, password).await {
            Ok(identity) => identity,
            Err(AppError::Auth(AuthError::EmailAlreadyInUse)) => {
                // Conta criada numa tentativa anterior que não chegou a marcar o convite
                if invite.is_some() {
                    self.repo.mark_password_set(&email).await?;
                }
                return Err(AppError::AlreadySet);
            }
            Err(e) => return Err(e),
        };

        self.identity.update_display_name(&email, &display_name).await?;
        if invite.is_some() {
            self.repo.mark_password_set(&email).await?;
        }

        self.audit
            .record(AuditEvent::FirstPasswordSuccess, json!({ "email": email, "uid": identity.uid }));
        tracing::info!("🔑 Primeira senha definida para {}", email);

        Ok(Identity {
            display_name: Some(display_name),
            ..identity
        })
    }
}

// =========================================================================
//  POLÍTICA DE SENHA
// =========================================================================

/// Regras violadas; vazio quando a senha é aceita.
pub fn validate_password_policy(password: &str) -> Vec<PasswordRule> {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(PasswordRule::MinLength);
    }
    if !password.chars().any(char::is_uppercase) {
        violations.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(char::is_lowercase) {
        violations.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordRule::Digit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push(PasswordRule::Special);
    }
    let lowered = password.to_lowercase();
    if BLOCKLISTED_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
        violations.push(PasswordRule::Blocklisted);
    }

    violations
}

/// Pontuação 0..=5 do medidor de força.
pub fn password_strength(password: &str) -> PasswordStrength {
    let checks = [
        password.chars().count() >= MIN_PASSWORD_LENGTH,
        password.chars().any(char::is_uppercase),
        password.chars().any(char::is_lowercase),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
    ];
    let score = checks.iter().filter(|ok| **ok).count() as u8;

    let label = match score {
        0..=2 => "Fraca",
        3 => "Média",
        4 => "Forte",
        _ => "Muito forte",
    };
    PasswordStrength { score, label }
}
