// src/models/print.rs

use serde::Serialize;
use utoipa::ToSchema;

use super::order::OrderStatus;

// Dados do estúdio impressos no cabeçalho da OS
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudioInfo {
    pub name: String,
    pub cnpj: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub site: Option<String>,
    pub address: Option<String>,
    pub pix_key: Option<String>,
}

impl StudioInfo {
    /// Linha de contato do cabeçalho: "site - E-mail x".
    pub fn contact_line(&self) -> Option<String> {
        match (self.site.as_deref(), self.email.as_deref()) {
            (Some(site), Some(email)) => Some(format!("{} - E-mail {}", site, email)),
            (Some(site), None) => Some(site.to_string()),
            (None, Some(email)) => Some(format!("E-mail {}", email)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceGroup {
    pub title: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabeledValue {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatureBlock {
    pub label: String,
    pub name: String,
}

/// Documento imprimível de uma OS; independente do formato final (PDF, HTML).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrintDocument {
    pub title: String,
    pub studio: StudioInfo,
    pub generated_at: String,
    pub status: OrderStatus,
    pub status_label: String,
    pub identification: Vec<LabeledValue>,
    pub financial: Vec<LabeledValue>,
    pub services: Vec<ServiceGroup>,
    pub description: String,
    pub signatures: Vec<SignatureBlock>,
    pub footer: Vec<String>,
}

impl PrintDocument {
    pub fn field(&self, label: &str) -> Option<&str> {
        self.identification
            .iter()
            .chain(self.financial.iter())
            .find(|kv| kv.label == label)
            .map(|kv| kv.value.as_str())
    }
}
