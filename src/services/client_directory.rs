// src/services/client_directory.rs

use std::sync::Arc;

use serde_json::json;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{
        store::{SnapshotResult, SnapshotSink, Subscription},
        ClientRepository,
    },
    models::{
        audit::AuditEvent,
        auth::UserSession,
        client::{Client, ClientInput},
        order::Order,
        view::NotificationLevel,
    },
    services::{
        audit::SecurityAudit, cache::Cache, dashboard_service::DashboardService,
        session_cell::SessionCell, view_store::ViewStore,
    },
};

/// Cadastro de clientes do usuário, espelhado num cache local em tempo real.
#[derive(Clone)]
pub struct ClientDirectory {
    repo: ClientRepository,
    cell: SessionCell,
    cache: Cache<Client>,
    orders: Cache<Order>,
    dashboard: DashboardService,
    view: ViewStore,
    audit: SecurityAudit,
}

impl ClientDirectory {
    pub fn new(
        repo: ClientRepository,
        cell: SessionCell,
        cache: Cache<Client>,
        orders: Cache<Order>,
        dashboard: DashboardService,
        view: ViewStore,
        audit: SecurityAudit,
    ) -> Self {
        Self { repo, cell, cache, orders, dashboard, view, audit }
    }

    // =========================================================================
    //  SINCRONIZAÇÃO
    // =========================================================================

    pub async fn subscribe(&self, session: &UserSession) -> Result<Subscription, AppError> {
        let generation = session.generation;
        let directory = self.clone();
        let sink: SnapshotSink = Arc::new(move |snapshot| directory.apply_snapshot(generation, snapshot));
        self.repo.subscribe(&session.uid, sink).await
    }

    /// Substitui o cache inteiro pelo snapshot e redesenha as visões dependentes.
    pub fn apply_snapshot(&self, generation: u64, snapshot: SnapshotResult) {
        if !self.cell.is_current(generation) {
            tracing::debug!("Snapshot de clientes descartado (sessão encerrada)");
            return;
        }

        match snapshot {
            Ok(docs) => {
                let mut clients: Vec<Client> = docs
                    .iter()
                    .filter_map(|doc| match doc.decode::<Client>() {
                        Ok(client) => Some(client),
                        Err(e) => {
                            tracing::warn!("⚠️ Cliente {} ignorado: {}", doc.id, e);
                            None
                        }
                    })
                    .collect();
                clients.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

                if !self.cache.replace_if(clients, || self.cell.is_current(generation)) {
                    tracing::debug!("Snapshot de clientes descartado durante o logout");
                    return;
                }
                self.dashboard.refresh();
            }
            Err(e) => {
                tracing::error!("🔥 Falha na sincronização de clientes: {}", e);
                self.view
                    .notify(NotificationLevel::Error, "sync_failed", Some(e.to_string()), true);
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    pub fn clients(&self) -> Vec<Client> {
        self.cache.snapshot()
    }

    /// Busca sem diferenciar maiúsculas em nome, e-mail e telefone.
    pub fn search(&self, query: &str) -> Vec<Client> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.clients();
        }
        self.cache.with(|clients| {
            clients
                .iter()
                .filter(|c| c.matches(&needle))
                .cloned()
                .collect()
        })
    }

    pub fn find(&self, id: &str) -> Option<Client> {
        self.cache.find(|c| c.id == id)
    }

    /// Cache primeiro; se o snapshot ainda não chegou, lê do store.
    pub async fn resolve(&self, id: &str) -> Result<Option<Client>, AppError> {
        if let Some(client) = self.find(id) {
            return Ok(Some(client));
        }
        let session = self.cell.require()?;
        self.repo.find(&session.uid, id).await
    }

    pub fn orders_for(&self, client_id: &str) -> usize {
        self.orders
            .with(|orders| orders.iter().filter(|o| o.client.id == client_id).count())
    }

    // =========================================================================
    //  ESCRITAS
    // =========================================================================

    pub async fn create(&self, input: ClientInput) -> Result<String, AppError> {
        input.validate()?;
        let input = input.normalized();
        let session = self.cell.require()?;

        let id = self.repo.create(&session.uid, &input).await?;
        self.audit
            .record(AuditEvent::ClientCreated, json!({ "uid": session.uid, "clientId": id }));
        self.view.toast(NotificationLevel::Success, "client_saved");
        Ok(id)
    }

    /// Edita o cadastro. OS já emitidas guardam o snapshot antigo e não mudam.
    pub async fn update(&self, id: &str, input: ClientInput) -> Result<(), AppError> {
        input.validate()?;
        let input = input.normalized();
        let session = self.cell.require()?;

        self.repo.update(&session.uid, id, &input).await?;
        self.audit
            .record(AuditEvent::ClientUpdated, json!({ "uid": session.uid, "clientId": id }));
        self.view.toast(NotificationLevel::Success, "client_saved");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let session = self.cell.require()?;

        self.repo.delete(&session.uid, id).await?;
        self.audit
            .record(AuditEvent::ClientDeleted, json!({ "uid": session.uid, "clientId": id }));
        self.view.toast(NotificationLevel::Info, "client_deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::{RemoteStore, StoreError};
    use crate::test_support::{self, wait_until};

    #[tokio::test]
    async fn create_normalizes_phone_and_cpf() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;

        let client = test_support::create_client(&app, "  Marina Souza ", "marina@email.com").await;
        assert_eq!(client.name, "Marina Souza");
        assert_eq!(client.phone, "11988887777");
        assert_eq!(client.cpf.as_deref(), Some("12345678900"));
        assert_eq!(client.total_orders, 0);
        assert_eq!(app.view.notifications_with_key("client_saved"), 1);
    }

    #[tokio::test]
    async fn search_ignores_case_across_name_email_and_phone() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        test_support::create_client(&app, "Marina Souza", "marina@email.com").await;
        test_support::create_client(&app, "Pedro Alves", "PEDRO@Empresa.com").await;

        assert_eq!(app.directory.search("MARINA").len(), 1);
        assert_eq!(app.directory.search("empresa").len(), 1);
        assert_eq!(app.directory.search("98888").len(), 2);
        assert_eq!(app.directory.search("   ").len(), 2);
        assert!(app.directory.search("joana").is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_reach_the_cache() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        let client = test_support::create_client(&app, "Marina Souza", "marina@email.com").await;

        let mut input = test_support::client_input("Marina S. Lima", "marina@email.com");
        input.phone = "+55 (21) 3333-4444".into();
        app.directory.update(&client.id, input).await.unwrap();

        let id = client.id.clone();
        wait_until(|| app.directory.find(&id).is_some_and(|c| c.name == "Marina S. Lima")).await;
        let updated = app.directory.find(&id).unwrap();
        assert_eq!(updated.phone, "552133334444");
        assert!(updated.updated_at.is_some());

        app.directory.delete(&client.id).await.unwrap();
        wait_until(|| app.directory.find(&id).is_none()).await;
        assert!(app.directory.clients().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_writing() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;

        let err = app
            .directory
            .create(test_support::client_input("", "marina@email.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(app.directory.clients().is_empty());
    }

    async fn stored_clients(app: &test_support::TestApp) -> Vec<crate::db::store::Document> {
        let uid = app.cell.require().unwrap().uid;
        let query = crate::db::store::Query::collection(ClientRepository::collection(&uid));
        app.store.query(&query).await.unwrap()
    }

    #[tokio::test]
    async fn snapshot_after_logout_is_ignored() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        test_support::create_client(&app, "Marina Souza", "marina@email.com").await;
        let docs = stored_clients(&app).await;
        let generation = app.cell.generation();

        app.session
            .logout(crate::services::session::LogoutReason::UserRequested)
            .await;
        let dashboard = app.view.snapshot().dashboard;

        app.directory.apply_snapshot(generation, Ok(docs));
        assert!(app.directory.clients().is_empty());
        assert_eq!(app.view.snapshot().client_count, 0);
        assert_eq!(app.view.snapshot().dashboard, dashboard);
    }

    #[tokio::test]
    async fn read_error_keeps_the_cache_and_raises_a_persistent_notice() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        test_support::create_client(&app, "Marina Souza", "marina@email.com").await;

        app.directory.apply_snapshot(
            app.cell.generation(),
            Err(StoreError::PermissionDenied("regras".into())),
        );

        assert_eq!(app.directory.clients().len(), 1);
        assert_eq!(app.view.notifications_with_key("sync_failed"), 1);
        let notice = app
            .view
            .snapshot()
            .notifications
            .into_iter()
            .find(|n| n.key == "sync_failed")
            .unwrap();
        assert!(notice.persistent);
    }

    #[tokio::test]
    async fn writes_require_an_active_session() {
        let app = test_support::app().await;
        let err = app
            .directory
            .create(test_support::client_input("Marina Souza", "marina@email.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated));
    }
}
