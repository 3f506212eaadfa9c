// src/services/user_admin.rs

use serde_json::json;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::{
        audit::{AuditEntry, AuditEvent},
        auth::{Role, UserProfile, UserSession},
    },
    services::{audit::SecurityAudit, session::SessionController, session_cell::SessionCell},
};

/// Administração de perfis (users/{uid}) e leitura da trilha de auditoria.
#[derive(Clone)]
pub struct UserAdminService {
    users: UserRepository,
    cell: SessionCell,
    session: SessionController,
    audit: SecurityAudit,
}

impl UserAdminService {
    pub fn new(users: UserRepository, cell: SessionCell, session: SessionController, audit: SecurityAudit) -> Self {
        Self { users, cell, session, audit }
    }

    fn require_admin(&self) -> Result<UserSession, AppError> {
        let session = self.cell.require()?;
        if !session.role.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(session)
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, AppError> {
        self.require_admin()?;
        let mut users = self.users.list().await?;
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    pub async fn change_role(&self, uid: &str, role: Role) -> Result<(), AppError> {
        let admin = self.require_admin()?;
        if self.users.find(uid).await?.is_none() {
            return Err(AppError::NotFound(uid.to_string()));
        }

        self.users.set_role(uid, role).await?;
        self.session.apply_role_change(uid, role);
        self.audit.record(
            AuditEvent::RoleChanged,
            json!({ "uid": uid, "role": role, "changedBy": admin.email }),
        );
        Ok(())
    }

    pub fn audit_trail(&self, limit: usize) -> Result<Vec<AuditEntry>, AppError> {
        self.require_admin()?;
        Ok(self.audit.recent(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn admin_changes_roles_and_reads_the_trail() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        let ana = app.session.current().unwrap().uid;
        assert!(matches!(app.admin.list_users().await.unwrap_err(), AppError::Forbidden));

        app.session
            .logout(crate::services::session::LogoutReason::UserRequested)
            .await;
        test_support::sign_in_admin(&app).await;

        app.admin.change_role(&ana, Role::Admin).await.unwrap();
        let users = app.admin.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.role == Role::Admin));

        let trail = app.admin.audit_trail(50).unwrap();
        assert!(trail.iter().any(|e| e.event == AuditEvent::RoleChanged));

        let err = app.admin.change_role("inexistente", Role::User).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
