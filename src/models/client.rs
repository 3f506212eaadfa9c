// src/models/client.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::common::formatting::{digits_only, optional_date};

// --- CLIENTE (users/{uid}/clients/{id}) ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rg: Option<String>,
    #[serde(default, deserialize_with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_orders: i64,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Client {
    /// Texto pesquisável: nome, e-mail e telefone, em minúsculas.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.email.to_lowercase().contains(needle_lower)
            || self.phone.to_lowercase().contains(needle_lower)
    }
}

// Formulário rápido ou completo de cliente
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Ana Paula")]
    pub name: String,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "ana@email.com")]
    pub email: String,

    #[serde(default)]
    #[schema(example = "(11) 99999-0000")]
    pub phone: String,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub cpf: Option<String>,

    #[serde(default)]
    pub rg: Option<String>,

    #[serde(default, deserialize_with = "optional_date")]
    pub birth_date: Option<NaiveDate>,
}

impl ClientInput {
    /// Telefone e CPF são gravados só com dígitos; textos são aparados.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.address = self.address.trim().to_string();
        self.phone = digits_only(&self.phone);
        self.cpf = self.cpf.map(|c| digits_only(&c)).filter(|c| !c.is_empty());
        self.rg = self.rg.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ClientSearchParams {
    pub q: Option<String>,
}
