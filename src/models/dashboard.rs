// src/models/dashboard.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// 1. Os cards do topo
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_orders: usize,
    pub this_month: usize, // OS criadas no mês corrente
    pub active_orders: usize, // Tudo que não está concluído
    pub total_clients: usize,
}

// 2. Feed de atividades recentes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Opened,
    Completed,
    Reopened,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Opened => "Aberta",
            ActivityKind::Completed => "Concluída",
            ActivityKind::Reopened => "Reaberta",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub order_id: String,
    pub number: String,
    pub client_name: String,
    pub kind: ActivityKind,
    pub label: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ActivityFilter {
    pub kind: Option<ActivityKind>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub summary: DashboardSummary,
    pub recent_activity: Vec<ActivityEntry>,
}
