// src/models/view.rs

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::{auth::Role, dashboard::DashboardView, order::OrderRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    #[default]
    Login,
    App,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    /// Chave do catálogo de mensagens.
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Persistentes ficam até serem dispensadas; as demais são "toasts".
    pub persistent: bool,
    /// Preenchida pela ponte HTTP no idioma da requisição.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Estado transitório do formulário de nova OS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub selected_client_id: Option<String>,
    pub display_number: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub screen: Screen,
    pub user: Option<UserBadge>,
    pub notifications: Vec<Notification>,
    pub order_rows: BTreeMap<String, OrderRow>,
    pub draft: OrderDraft,
    pub dashboard: DashboardView,
    pub client_count: usize,
}
