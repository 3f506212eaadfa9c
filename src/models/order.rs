// src/models/order.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    common::{
        error::AppError,
        formatting::{money, optional_date},
    },
    models::client::Client,
};

// --- ENUMS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    // Documentos antigos gravaram "pendente"
    #[default]
    #[serde(alias = "pendente")]
    Pending,
    // Reservado: exibido, nunca atribuído pelo fluxo atual
    Progress,
    Completed,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pendente",
            OrderStatus::Progress => "Em Andamento",
            OrderStatus::Completed => "Concluída",
        }
    }

    /// Botões disponíveis na linha da tabela para este status.
    pub fn actions(&self) -> Vec<OrderAction> {
        match self {
            OrderStatus::Completed => vec![OrderAction::View, OrderAction::Print, OrderAction::Reopen],
            _ => vec![OrderAction::View, OrderAction::Print, OrderAction::Complete],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderEvent {
    #[default]
    Opened,
    Completed,
    Reopened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    View,
    Print,
    Complete,
    Reopen,
}

impl OrderAction {
    /// Status resultante de uma ação de transição.
    pub fn target_status(&self) -> Option<OrderStatus> {
        match self {
            OrderAction::Complete => Some(OrderStatus::Completed),
            OrderAction::Reopen => Some(OrderStatus::Pending),
            OrderAction::View | OrderAction::Print => None,
        }
    }
}

// --- NÚMERO DA OS ---

/// Número "NNN/AAAA": sequência com três dígitos no mínimo, barra, ano.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderNumber {
    pub sequence: u32,
    pub year: i32,
}

impl OrderNumber {
    pub fn new(sequence: u32, year: i32) -> Self {
        Self { sequence, year }
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}/{}", self.sequence, self.year)
    }
}

impl FromStr for OrderNumber {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::InvalidOrderNumber(raw.to_string());
        let (seq, year) = raw.trim().split_once('/').ok_or_else(invalid)?;

        if seq.is_empty() || !seq.chars().all(|c| c.is_ascii_digit()) || year.len() != 4 {
            return Err(invalid());
        }
        let sequence: u32 = seq.parse().map_err(|_| invalid())?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }
        Ok(Self { sequence, year })
    }
}

// --- SNAPSHOT DO CLIENTE ---

/// Cópia do cliente no momento da criação da OS; edições posteriores não a alteram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
}

impl From<&Client> for ClientSnapshot {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            name: client.name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            address: client.address.clone(),
            cpf: client.cpf.clone(),
        }
    }
}

// --- ORDEM DE SERVIÇO (users/{uid}/orders/{id}) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: String,
    pub number: String,
    pub order_number: u32,
    pub year: i32,
    #[serde(default, deserialize_with = "optional_date")]
    pub date: Option<NaiveDate>,
    pub client: ClientSnapshot,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "optional_date")]
    pub execution_date: Option<NaiveDate>,
    #[serde(default)]
    pub execution_time: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub technical_responsible: String,
    #[serde(default, deserialize_with = "money")]
    #[schema(value_type = f64)]
    pub total_value: Decimal,
    #[serde(default)]
    pub payment_methods: Vec<String>,
    #[serde(default, deserialize_with = "optional_date")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub last_event: OrderEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reopened_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Monta a OS pendente a partir do formulário; o `number` é sempre derivado do `OrderNumber`.
    pub fn open(number: OrderNumber, client: &Client, form: &OrderForm, today: NaiveDate, default_responsible: &str) -> Self {
        let technical_responsible = form
            .technical_responsible
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_responsible)
            .to_string();

        Self {
            id: String::new(),
            number: number.to_string(),
            order_number: number.sequence,
            year: number.year,
            date: Some(form.date.unwrap_or(today)),
            client: ClientSnapshot::from(client),
            services: form.services.clone(),
            description: form.description.clone(),
            execution_date: form.execution_date,
            execution_time: form.execution_time.clone(),
            estimated_time: form.estimated_time.clone(),
            technical_responsible,
            total_value: form.total_value,
            payment_methods: form.payment_methods.clone(),
            payment_date: form.payment_date,
            status: OrderStatus::Pending,
            last_event: OrderEvent::Opened,
            created_at: None,
            completed_at: None,
            reopened_at: None,
        }
    }

    /// Data de referência para o painel: criação e, na falta dela, a data da OS.
    /// Data local da criação (mesmo relógio da numeração), ou a data da OS.
    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.created_at
            .map(|at| at.with_timezone(&Local).date_naive())
            .or(self.date)
    }
}

// --- FORMULÁRIO DE NOVA OS ---

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderForm {
    /// Conteúdo do campo (bloqueado) do número exibido.
    #[serde(default)]
    #[schema(example = "001/2025")]
    pub number: String,
    #[serde(default, deserialize_with = "optional_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "optional_date")]
    pub execution_date: Option<NaiveDate>,
    #[serde(default)]
    pub execution_time: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub technical_responsible: Option<String>,
    #[serde(default, deserialize_with = "money")]
    #[schema(value_type = f64)]
    pub total_value: Decimal,
    #[serde(default)]
    pub payment_methods: Vec<String>,
    #[serde(default, deserialize_with = "optional_date")]
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    pub client_id: Option<String>,
    #[serde(flatten)]
    pub form: OrderForm,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListParams {
    pub status: Option<OrderStatus>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NextNumberParams {
    pub year: Option<i32>,
}

// --- LINHA DA TABELA DE OS ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: String,
    pub number: String,
    pub client_name: String,
    pub date: Option<NaiveDate>,
    #[schema(value_type = f64)]
    pub total_value: Decimal,
    pub status: OrderStatus,
    pub status_label: String,
    pub actions: Vec<OrderAction>,
}

impl OrderRow {
    pub fn from_order(order: &Order) -> Self {
        let mut row = Self {
            id: order.id.clone(),
            number: order.number.clone(),
            client_name: order.client.name.clone(),
            date: order.date,
            total_value: order.total_value,
            status: order.status,
            status_label: String::new(),
            actions: Vec::new(),
        };
        row.show_status(order.status);
        row
    }

    /// Atualiza rótulo e botões da linha para o status informado.
    pub fn show_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.status_label = status.label().to_string();
        self.actions = status.actions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_number_pads_to_three_digits() {
        assert_eq!(OrderNumber::new(1, 2025).to_string(), "001/2025");
        assert_eq!(OrderNumber::new(42, 2025).to_string(), "042/2025");
        assert_eq!(OrderNumber::new(1234, 2025).to_string(), "1234/2025");
    }

    #[test]
    fn order_number_parsing() {
        assert_eq!("007/2025".parse::<OrderNumber>().unwrap(), OrderNumber::new(7, 2025));
        assert!("".parse::<OrderNumber>().is_err());
        assert!("7-2025".parse::<OrderNumber>().is_err());
        assert!("000/2025".parse::<OrderNumber>().is_err());
        assert!("abc/2025".parse::<OrderNumber>().is_err());
    }

    #[test]
    fn legacy_pendente_status_is_read_as_pending() {
        let status: OrderStatus = serde_json::from_value(json!("pendente")).unwrap();
        assert_eq!(status, OrderStatus::Pending);
        assert_eq!(serde_json::to_value(status).unwrap(), json!("pending"));
    }

    #[test]
    fn legacy_order_document_decodes() {
        let order: Order = serde_json::from_value(json!({
            "id": "o1",
            "number": "003/2024",
            "orderNumber": 3,
            "year": 2024,
            "date": "15/08/2024",
            "client": { "name": "Ana", "email": "ana@x.com", "phone": "11999990000" },
            "services": ["Produção: Gravação"],
            "executionDate": "",
            "totalValue": "R$ 1.500,00",
            "paymentDate": "",
            "status": "pendente"
        }))
        .unwrap();

        assert_eq!(order.total_value, Decimal::new(150000, 2));
        assert_eq!(order.date, NaiveDate::from_ymd_opt(2024, 8, 15));
        assert_eq!(order.execution_date, None);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.last_event, OrderEvent::Opened);
    }

    #[test]
    fn completed_rows_offer_reopen_instead_of_complete() {
        assert!(OrderStatus::Completed.actions().contains(&OrderAction::Reopen));
        assert!(!OrderStatus::Completed.actions().contains(&OrderAction::Complete));
        assert!(OrderStatus::Progress.actions().contains(&OrderAction::Complete));
        assert_eq!(OrderStatus::Progress.label(), "Em Andamento");
    }
}
