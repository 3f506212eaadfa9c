// src/services/order_workflow.rs

use std::sync::Arc;

use chrono::{Datelike, Local, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::{
        store::{SnapshotResult, SnapshotSink, StoreError, Subscription},
        ClientRepository, OrderRepository,
    },
    models::{
        audit::AuditEvent,
        auth::UserSession,
        client::Client,
        order::{Order, OrderAction, OrderForm, OrderNumber, OrderRow, OrderStatus},
        print::PrintDocument,
        view::NotificationLevel,
    },
    services::{
        audit::SecurityAudit, cache::Cache, dashboard_service::DashboardService,
        document_service::DocumentService, session_cell::SessionCell, view_store::ViewStore,
    },
};

/// Resultado de `create_order`: a OS persistida e o documento pronto para impressão.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedOrder {
    pub order: Order,
    pub print: PrintDocument,
}

#[derive(Clone)]
pub struct OrderWorkflow {
    repo: OrderRepository,
    clients: ClientRepository,
    cell: SessionCell,
    cache: Cache<Order>,
    dashboard: DashboardService,
    documents: DocumentService,
    view: ViewStore,
    audit: SecurityAudit,
    default_responsible: String,
}

impl OrderWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: OrderRepository,
        clients: ClientRepository,
        cell: SessionCell,
        cache: Cache<Order>,
        dashboard: DashboardService,
        documents: DocumentService,
        view: ViewStore,
        audit: SecurityAudit,
        default_responsible: String,
    ) -> Self {
        Self {
            repo,
            clients,
            cell,
            cache,
            dashboard,
            documents,
            view,
            audit,
            default_responsible,
        }
    }

    // =========================================================================
    //  NUMERAÇÃO
    // =========================================================================

    /// Próximo número sequencial do ano: maior `orderNumber` + 1, ou 1.
    /// Sem transação: duas instâncias podem obter o mesmo número.
    pub async fn next_order_number(&self, year: i32) -> Result<u32, AppError> {
        let session = self.cell.require()?;

        match self.repo.latest_number_in_year(&session.uid, year).await {
            Ok(latest) => Ok(latest.unwrap_or(0) + 1),
            Err(StoreError::FailedPrecondition(reason)) => {
                tracing::warn!(
                    "⚠️ Consulta composta recusada ({}); calculando pela lista do ano",
                    reason
                );
                let numbers = self.repo.numbers_in_year(&session.uid, year).await?;
                Ok(numbers.into_iter().max().unwrap_or(0) + 1)
            }
            Err(e) => Err(AppError::RemoteRead(e)),
        }
    }

    /// Recalcula o número exibido no formulário; em falha, exibe "001/AAAA".
    pub async fn refresh_draft_number(&self) -> String {
        let year = Local::now().year();
        let number = match self.next_order_number(year).await {
            Ok(next) => OrderNumber::new(next, year),
            Err(e) => {
                tracing::warn!("⚠️ Falha ao gerar número da OS: {}", e);
                self.view.toast(NotificationLevel::Warning, "number_fallback");
                OrderNumber::new(1, year)
            }
        };
        let display = number.to_string();
        self.view.set_draft_number(display.clone());
        display
    }

    // =========================================================================
    //  CRIAÇÃO
    // =========================================================================

    pub async fn create_order(&self, client: Option<&Client>, form: OrderForm) -> Result<CreatedOrder, AppError> {
        let session = self.cell.require()?;
        let client = client.ok_or(AppError::NoClientSelected)?;
        if form.number.trim().is_empty() {
            return Err(AppError::MissingOrderNumber);
        }
        let number: OrderNumber = form.number.parse()?;

        let today = Local::now().date_naive();
        let mut order = Order::open(number, client, &form, today, &self.default_responsible);
        order.id = self.repo.create(&session.uid, &order).await?;
        order.created_at = Some(Utc::now());

        // A OS já existe; falha no contador não desfaz a criação
        if let Err(e) = self.clients.record_order(&session.uid, &client.id).await {
            tracing::warn!("⚠️ Contador de OS do cliente {} não atualizado: {}", client.id, e);
        }

        self.audit.record(
            AuditEvent::OrderCreated,
            json!({ "uid": session.uid, "orderId": order.id, "number": order.number }),
        );
        tracing::info!("🧾 OS {} criada para {}", order.number, client.name);
        self.view.toast(NotificationLevel::Success, "order_created");

        let print = self.documents.compose(&order);

        // Limpa o rascunho mantendo cliente e data; o número é recalculado
        self.view.select_client(Some(client.id.clone()));
        self.view.set_draft_date(order.date.unwrap_or(today));
        self.refresh_draft_number().await;

        Ok(CreatedOrder { order, print })
    }

    // =========================================================================
    //  TRANSIÇÕES
    // =========================================================================

    pub async fn complete_order(&self, id: &str) -> Result<(), AppError> {
        let session = self.cell.require()?;
        self.repo.complete(&session.uid, id).await?;
        self.audit
            .record(AuditEvent::OrderCompleted, json!({ "uid": session.uid, "orderId": id }));
        self.view.toast(NotificationLevel::Success, "order_completed");
        Ok(())
    }

    pub async fn reopen_order(&self, id: &str) -> Result<(), AppError> {
        let session = self.cell.require()?;
        self.repo.reopen(&session.uid, id).await?;
        self.audit
            .record(AuditEvent::OrderReopened, json!({ "uid": session.uid, "orderId": id }));
        self.view.toast(NotificationLevel::Success, "order_reopened");
        Ok(())
    }

    async fn current_status(&self, id: &str) -> Result<OrderStatus, AppError> {
        if let Some(row) = self.view.row(id) {
            return Ok(row.status);
        }
        if let Some(order) = self.find(id) {
            return Ok(order.status);
        }
        let session = self.cell.require()?;
        self.repo
            .find(&session.uid, id)
            .await?
            .map(|o| o.status)
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Aplica a transição na linha visível antes da escrita remota;
    /// se a escrita falhar, devolve a linha ao status anterior e avisa.
    pub async fn request_transition(&self, id: &str, action: OrderAction) -> Result<OrderStatus, AppError> {
        let target = action.target_status().ok_or(AppError::InvalidTransition)?;
        let current = self.current_status(id).await?;
        if !current.actions().contains(&action) {
            return Err(AppError::InvalidTransition);
        }

        let previous = self.view.show_row_status(id, target).unwrap_or(current);

        let result = match action {
            OrderAction::Complete => self.complete_order(id).await,
            _ => self.reopen_order(id).await,
        };

        match result {
            Ok(()) => Ok(target),
            Err(e) => {
                tracing::error!("🔥 Falha na transição da OS {}: {}", id, e);
                self.view.show_row_status(id, previous);
                let key = match action {
                    OrderAction::Complete => "complete_failed",
                    _ => "reopen_failed",
                };
                self.view
                    .notify(NotificationLevel::Error, key, Some(e.to_string()), false);
                Err(e)
            }
        }
    }

    pub async fn delete_order(&self, id: &str) -> Result<(), AppError> {
        let session = self.cell.require()?;
        self.repo.delete(&session.uid, id).await?;
        self.audit
            .record(AuditEvent::OrderDeleted, json!({ "uid": session.uid, "orderId": id }));
        self.view.toast(NotificationLevel::Info, "order_deleted");
        Ok(())
    }

    // =========================================================================
    //  CACHE E CONSULTAS
    // =========================================================================

    pub async fn subscribe(&self, session: &UserSession) -> Result<Subscription, AppError> {
        let generation = session.generation;
        let workflow = self.clone();
        let sink: SnapshotSink = Arc::new(move |snapshot| workflow.apply_snapshot(generation, snapshot));
        self.repo.subscribe(&session.uid, sink).await
    }

    pub fn apply_snapshot(&self, generation: u64, snapshot: SnapshotResult) {
        if !self.cell.is_current(generation) {
            tracing::debug!("Snapshot de OS descartado (sessão encerrada)");
            return;
        }

        match snapshot {
            Ok(docs) => {
                let orders: Vec<Order> = docs
                    .iter()
                    .filter_map(|doc| match doc.decode::<Order>() {
                        Ok(order) => Some(order),
                        Err(e) => {
                            tracing::warn!("⚠️ OS {} ignorada: {}", doc.id, e);
                            None
                        }
                    })
                    .collect();

                let rows = orders.iter().map(OrderRow::from_order).collect();
                let applied = self.cache.replace_if(orders, || {
                    // Linhas publicadas sob o mesmo lock: o logout limpa depois
                    if !self.cell.is_current(generation) {
                        return false;
                    }
                    self.view.set_order_rows(rows);
                    true
                });
                if !applied {
                    tracing::debug!("Snapshot de OS descartado durante o logout");
                    return;
                }
                self.dashboard.refresh();
            }
            Err(e) => {
                tracing::error!("🔥 Falha na sincronização de OS: {}", e);
                self.view
                    .notify(NotificationLevel::Error, "sync_failed", Some(e.to_string()), true);
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn orders(&self) -> Vec<Order> {
        self.cache.snapshot()
    }

    pub fn find(&self, id: &str) -> Option<Order> {
        self.cache.find(|o| o.id == id)
    }

    /// Cache primeiro; cai para o store quando o snapshot ainda não chegou.
    pub async fn resolve(&self, id: &str) -> Result<Order, AppError> {
        if let Some(order) = self.find(id) {
            return Ok(order);
        }
        let session = self.cell.require()?;
        self.repo
            .find(&session.uid, id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Filtro da listagem: status exato e texto em cliente, descrição ou número.
    pub fn filter(&self, status: Option<OrderStatus>, query: Option<&str>) -> Vec<Order> {
        let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
        self.cache.with(|orders| {
            orders
                .iter()
                .filter(|o| status.is_none_or(|s| o.status == s))
                .filter(|o| {
                    needle.is_empty()
                        || o.client.name.to_lowercase().contains(&needle)
                        || o.description.to_lowercase().contains(&needle)
                        || o.number.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect()
        })
    }

    pub fn print_document(&self, order: &Order) -> PrintDocument {
        self.documents.compose(order)
    }

    pub fn render_pdf(&self, order: &Order) -> Result<Vec<u8>, AppError> {
        self.documents.render_pdf(&self.documents.compose(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::RemoteStore;
    use crate::test_support::{self, wait_until, TestApp};

    fn form(number: &str) -> OrderForm {
        OrderForm {
            number: number.into(),
            services: vec!["Pré-produção: Roteiro".into(), "Produção: Gravação".into()],
            description: "Vídeo institucional".into(),
            total_value: rust_decimal::Decimal::new(150000, 2),
            ..OrderForm::default()
        }
    }

    async fn signed_in_with_client() -> (TestApp, Client) {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        let client = test_support::create_client(&app, "Carlos Lima", "carlos@email.com").await;
        (app, client)
    }

    async fn create(app: &TestApp, client: &Client) -> Order {
        let draft = app.view.snapshot().draft.display_number;
        let created = app.workflow.create_order(Some(client), form(&draft)).await.unwrap();
        let id = created.order.id.clone();
        wait_until(|| app.view.row(&id).is_some()).await;
        created.order
    }

    #[tokio::test]
    async fn next_number_is_stable_until_an_order_is_created() {
        let (app, client) = signed_in_with_client().await;
        let year = Local::now().year();

        assert_eq!(app.workflow.next_order_number(year).await.unwrap(), 1);
        assert_eq!(app.workflow.next_order_number(year).await.unwrap(), 1);

        let order = create(&app, &client).await;
        assert_eq!(order.number, test_support::first_number());
        assert_eq!(app.workflow.next_order_number(year).await.unwrap(), 2);
        assert_eq!(app.workflow.next_order_number(year - 1).await.unwrap(), 1);
        assert_eq!(app.view.snapshot().draft.display_number, format!("002/{}", year));
    }

    #[tokio::test]
    async fn numbering_falls_back_when_the_compound_query_is_rejected() {
        let (app, client) = signed_in_with_client().await;
        create(&app, &client).await;
        create(&app, &client).await;

        app.memory.reject_compound_queries(true);
        let year = Local::now().year();
        assert_eq!(app.workflow.next_order_number(year).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn draft_number_falls_back_to_001_when_the_store_is_down() {
        let (app, _client) = signed_in_with_client().await;
        app.memory.set_unavailable(true);
        let shown = app.workflow.refresh_draft_number().await;
        app.memory.set_unavailable(false);

        assert_eq!(shown, test_support::first_number());
        assert_eq!(app.view.notifications_with_key("number_fallback"), 1);
    }

    #[tokio::test]
    async fn create_requires_client_and_number() {
        let (app, client) = signed_in_with_client().await;

        let err = app.workflow.create_order(None, form("001/2025")).await.unwrap_err();
        assert!(matches!(err, AppError::NoClientSelected));

        let err = app.workflow.create_order(Some(&client), form("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::MissingOrderNumber));

        let err = app.workflow.create_order(Some(&client), form("1/25")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrderNumber(_)));
    }

    #[tokio::test]
    async fn create_persists_snapshot_counter_and_print_document() {
        let (app, client) = signed_in_with_client().await;
        let created = app
            .workflow
            .create_order(Some(&client), form(&test_support::first_number()))
            .await
            .unwrap();

        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.order.client.name, "Carlos Lima");
        assert_eq!(created.order.technical_responsible, "Responsável Padrão");
        assert_eq!(created.print.status_label, "Pendente");

        let id = client.id.clone();
        wait_until(|| app.directory.find(&id).is_some_and(|c| c.total_orders == 1)).await;
        assert!(app.directory.find(&id).unwrap().last_contact.is_some());
        assert_eq!(app.view.snapshot().draft.selected_client_id, Some(client.id.clone()));
    }

    #[tokio::test]
    async fn complete_and_reopen_stamp_their_timestamps() {
        let (app, client) = signed_in_with_client().await;
        let order = create(&app, &client).await;

        app.workflow.complete_order(&order.id).await.unwrap();
        app.workflow.complete_order(&order.id).await.unwrap();
        let id = order.id.clone();
        wait_until(|| app.workflow.find(&id).is_some_and(|o| o.completed_at.is_some())).await;
        let completed = app.workflow.find(&order.id).unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(completed.last_event, crate::models::order::OrderEvent::Completed);

        app.workflow.reopen_order(&order.id).await.unwrap();
        wait_until(|| app.workflow.find(&id).is_some_and(|o| o.reopened_at.is_some())).await;
        let reopened = app.workflow.find(&order.id).unwrap();
        assert_eq!(reopened.status, OrderStatus::Pending);
        assert!(reopened.completed_at.is_some());
    }

    #[tokio::test]
    async fn failed_optimistic_complete_rolls_the_row_back() {
        let (app, client) = signed_in_with_client().await;
        let order = create(&app, &client).await;

        app.memory.fail_next_writes(1);
        let err = app
            .workflow
            .request_transition(&order.id, OrderAction::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RemoteWrite(_)));

        let row = app.view.row(&order.id).unwrap();
        assert_eq!(row.status, OrderStatus::Pending);
        assert_eq!(row.status_label, "Pendente");
        assert_eq!(app.view.notifications_with_key("complete_failed"), 1);
    }

    #[tokio::test]
    async fn optimistic_transition_respects_the_row_actions() {
        let (app, client) = signed_in_with_client().await;
        let order = create(&app, &client).await;

        let err = app
            .workflow
            .request_transition(&order.id, OrderAction::Reopen)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition));

        let status = app
            .workflow
            .request_transition(&order.id, OrderAction::Complete)
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Completed);
        assert_eq!(app.view.row(&order.id).unwrap().status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn snapshot_after_logout_is_ignored() {
        let (app, client) = signed_in_with_client().await;
        create(&app, &client).await;
        let uid = app.cell.require().unwrap().uid;
        let query = crate::db::store::Query::collection(OrderRepository::collection(&uid));
        let docs = app.store.query(&query).await.unwrap();
        let generation = app.cell.generation();

        app.session
            .logout(crate::services::session::LogoutReason::UserRequested)
            .await;
        let dashboard = app.view.snapshot().dashboard;

        app.workflow.apply_snapshot(generation, Ok(docs));
        assert!(app.workflow.orders().is_empty());
        assert!(app.view.snapshot().order_rows.is_empty());
        assert_eq!(app.view.snapshot().dashboard, dashboard);
    }

    #[tokio::test]
    async fn read_error_keeps_rows_and_raises_a_persistent_notice() {
        let (app, client) = signed_in_with_client().await;
        let order = create(&app, &client).await;
        let id = order.id.clone();
        wait_until(|| app.workflow.find(&id).is_some()).await;

        app.workflow.apply_snapshot(
            app.cell.generation(),
            Err(StoreError::Unavailable("rede".into())),
        );

        assert_eq!(app.workflow.orders().len(), 1);
        assert!(app.view.row(&order.id).is_some());
        assert_eq!(app.view.notifications_with_key("sync_failed"), 1);
        assert!(app
            .view
            .snapshot()
            .notifications
            .iter()
            .any(|n| n.key == "sync_failed" && n.persistent));
    }

    #[tokio::test]
    async fn editing_a_client_keeps_order_snapshots() {
        let (app, client) = signed_in_with_client().await;
        let order = create(&app, &client).await;

        let mut input = test_support::client_input("Carlos Lima Neto", "novo@email.com");
        input.phone = "(21) 97777-6666".into();
        app.directory.update(&client.id, input).await.unwrap();

        let id = client.id.clone();
        wait_until(|| app.directory.find(&id).is_some_and(|c| c.name == "Carlos Lima Neto")).await;
        let stored = app.workflow.resolve(&order.id).await.unwrap();
        assert_eq!(stored.client.name, "Carlos Lima");
        assert_eq!(stored.client.email, "carlos@email.com");
    }

    #[tokio::test]
    async fn filter_matches_status_and_text() {
        let (app, client) = signed_in_with_client().await;
        let first = create(&app, &client).await;
        create(&app, &client).await;
        app.workflow.complete_order(&first.id).await.unwrap();
        let id = first.id.clone();
        wait_until(|| app.workflow.find(&id).is_some_and(|o| o.status == OrderStatus::Completed)).await;

        assert_eq!(app.workflow.filter(Some(OrderStatus::Completed), None).len(), 1);
        assert_eq!(app.workflow.filter(None, Some("carlos")).len(), 2);
        assert_eq!(app.workflow.filter(None, Some("institucional")).len(), 2);
        assert!(app.workflow.filter(None, Some("inexistente")).is_empty());
    }
}
