// src/services/dashboard_service.rs

use chrono::{Datelike, Local, NaiveDate};

use crate::{
    models::{
        client::Client,
        dashboard::{ActivityEntry, ActivityFilter, ActivityKind, DashboardSummary, DashboardView},
        order::{Order, OrderStatus},
    },
    services::{cache::Cache, view_store::ViewStore},
};

pub const RECENT_ACTIVITY_LIMIT: usize = 30;

#[derive(Clone)]
pub struct DashboardService {
    clients: Cache<Client>,
    orders: Cache<Order>,
    view: ViewStore,
}

impl DashboardService {
    pub fn new(clients: Cache<Client>, orders: Cache<Order>, view: ViewStore) -> Self {
        Self { clients, orders, view }
    }

    /// Recalcula o painel a partir dos caches e publica no view-model.
    pub fn refresh(&self) {
        let dashboard = self.compute(&ActivityFilter::default());
        self.view.set_dashboard(dashboard, self.clients.len());
    }

    pub fn compute(&self, filter: &ActivityFilter) -> DashboardView {
        let today = Local::now().date_naive();
        let total_clients = self.clients.len();
        self.orders.with(|orders| DashboardView {
            summary: summarize(orders, total_clients, today),
            recent_activity: recent_activity(orders, filter),
        })
    }
}

// =========================================================================
//  CÁLCULOS (funções puras)
// =========================================================================

pub fn summarize(orders: &[Order], total_clients: usize, today: NaiveDate) -> DashboardSummary {
    let this_month = orders
        .iter()
        .filter_map(Order::reference_date)
        .filter(|d| d.year() == today.year() && d.month() == today.month())
        .count();
    let active_orders = orders
        .iter()
        .filter(|o| o.status != OrderStatus::Completed)
        .count();

    DashboardSummary {
        total_orders: orders.len(),
        this_month,
        active_orders,
        total_clients,
    }
}

/// Eventos de abertura, conclusão e reabertura, do mais recente para o mais antigo.
pub fn recent_activity(orders: &[Order], filter: &ActivityFilter) -> Vec<ActivityEntry> {
    let needle = filter
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let mut entries: Vec<ActivityEntry> = orders
        .iter()
        .filter(|o| match &needle {
            Some(q) => o.number.to_lowercase().contains(q) || o.client.name.to_lowercase().contains(q),
            None => true,
        })
        .flat_map(|o| {
            [
                (ActivityKind::Opened, o.created_at),
                (ActivityKind::Completed, o.completed_at),
                (ActivityKind::Reopened, o.reopened_at),
            ]
            .into_iter()
            .filter_map(move |(kind, at)| {
                at.map(|at| ActivityEntry {
                    order_id: o.id.clone(),
                    number: o.number.clone(),
                    client_name: o.client.name.clone(),
                    kind,
                    label: kind.label().to_string(),
                    at,
                })
            })
        })
        .filter(|e| filter.kind.is_none_or(|k| k == e.kind))
        .collect();

    entries.sort_by(|a, b| b.at.cmp(&a.at));
    entries.truncate(RECENT_ACTIVITY_LIMIT);
    entries
}
