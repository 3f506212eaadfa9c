// src/db/store.rs

use std::{cmp::Ordering, fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;

// =========================================================================
//  ERROS DO STORE
// =========================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Documento não encontrado: {0}")]
    NotFound(String),

    // Equivalente ao "failed-precondition" do backend hospedado: falta índice composto
    #[error("A consulta exige um índice composto: {0}")]
    FailedPrecondition(String),

    #[error("Permissão negada: {0}")]
    PermissionDenied(String),

    #[error("Serviço indisponível: {0}")]
    Unavailable(String),

    #[error("Documento com formato inválido: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Erro de banco de dados: {0}")]
    Database(#[from] sqlx::Error),
}

// =========================================================================
//  CAMINHOS
// =========================================================================

/// Caminho de uma coleção: `clients`, `users/{uid}/orders`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Coleção dentro do namespace do usuário autenticado.
    pub fn user_scoped(uid: &str, name: &str) -> Self {
        Self(format!("users/{}/{}", uid, name))
    }

    pub fn doc(&self, id: &str) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

// =========================================================================
//  DOCUMENTOS
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Decodifica o documento para o modelo tipado, injetando o `id` no objeto.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(self.id.clone()));
        }
        Ok(serde_json::from_value(data)?)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Formato canônico dos timestamps gravados pelo store.
/// Strings RFC3339 com precisão fixa ordenam lexicograficamente na ordem cronológica.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

// =========================================================================
//  ESCRITAS (PATCH)
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    Increment(i64),
    ServerTimestamp,
    Delete,
}

/// Conjunto ordenado de operações de campo aplicadas atomicamente a um documento.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    ops: Vec<(String, FieldOp)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converte um registro serializável em operações `Set`, ignorando o `id`
    /// (o id vive no caminho do documento, não no corpo).
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, StoreError> {
        let value = serde_json::to_value(record)?;
        let mut patch = Self::new();
        if let Value::Object(map) = value {
            for (field, value) in map {
                if field == "id" {
                    continue;
                }
                patch.ops.push((field, FieldOp::Set(value)));
            }
        }
        Ok(patch)
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push((field.to_string(), FieldOp::Set(value.into())));
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.ops.push((field.to_string(), FieldOp::ServerTimestamp));
        self
    }

    pub fn increment(mut self, field: &str, by: i64) -> Self {
        self.ops.push((field.to_string(), FieldOp::Increment(by)));
        self
    }

    pub fn delete(mut self, field: &str) -> Self {
        self.ops.push((field.to_string(), FieldOp::Delete));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[(String, FieldOp)] {
        &self.ops
    }

    /// Aplica as operações sobre o objeto alvo, na ordem em que foram declaradas.
    pub fn apply(&self, target: &mut Map<String, Value>, now: DateTime<Utc>) {
        for (field, op) in &self.ops {
            match op {
                FieldOp::Set(value) => {
                    target.insert(field.clone(), value.clone());
                }
                FieldOp::Increment(by) => {
                    let current = target.get(field).and_then(Value::as_i64).unwrap_or(0);
                    target.insert(field.clone(), Value::from(current + by));
                }
                FieldOp::ServerTimestamp => {
                    target.insert(field.clone(), timestamp_value(now));
                }
                FieldOp::Delete => {
                    target.remove(field);
                }
            }
        }
    }
}

// =========================================================================
//  CONSULTAS
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Igualdade num campo + ordenação por outro campo exige índice composto.
    pub fn requires_composite_index(&self) -> bool {
        match &self.order_by {
            Some((order_field, _)) => self.filters.iter().any(|f| &f.field != order_field),
            None => false,
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters
            .iter()
            .all(|f| data.get(&f.field).is_some_and(|v| v == &f.value))
    }

    /// Filtra, ordena e limita uma lista de documentos em memória.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut result: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();

        if let Some((field, direction)) = &self.order_by {
            result.sort_by(|a, b| {
                let ordering = compare_values(
                    a.data.get(field).unwrap_or(&Value::Null),
                    b.data.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            result.truncate(limit);
        }
        result
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Ordem total entre valores JSON: null < bool < número < texto < lista < objeto.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// =========================================================================
//  TEMPO REAL
// =========================================================================

pub type SnapshotResult = Result<Vec<Document>, StoreError>;

/// Callback de snapshot. Cada entrega traz o resultado completo da consulta.
pub type SnapshotSink = Arc<dyn Fn(SnapshotResult) + Send + Sync>;

/// Handle descartável de uma assinatura em tempo real.
/// Descartar (ou dropar) o handle encerra a entrega de snapshots.
pub struct Subscription {
    label: String,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(label: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            label: label.into(),
            task: Some(task),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn dispose(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("🔌 Assinatura encerrada: {}", self.label);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Arena de handles: registra cada assinatura e descarta todas de uma vez no logout.
#[derive(Debug, Default)]
pub struct SubscriptionArena {
    handles: Vec<Subscription>,
}

impl SubscriptionArena {
    pub fn register(&mut self, subscription: Subscription) {
        self.handles.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn dispose_all(&mut self) -> usize {
        let count = self.handles.len();
        for subscription in self.handles.drain(..) {
            subscription.dispose();
        }
        count
    }
}

// =========================================================================
//  O TRAIT DO STORE REMOTO
// =========================================================================

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Cria ou sobrescreve o documento inteiro.
    async fn set(&self, path: &DocPath, patch: Patch) -> Result<(), StoreError>;

    /// Cria o documento apenas se o caminho estiver livre, numa única operação.
    /// Devolve `false` quando já existia um documento (que fica intacto).
    async fn create_if_absent(&self, path: &DocPath, patch: Patch) -> Result<bool, StoreError>;

    /// Atualiza campos de um documento existente. Falha com `NotFound` se ele não existir.
    async fn update(&self, path: &DocPath, patch: Patch) -> Result<(), StoreError>;

    /// Cria um documento com id gerado e devolve o id.
    async fn add(&self, collection: &CollectionPath, patch: Patch) -> Result<String, StoreError>;

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Entrega o snapshot inicial e um snapshot completo a cada mudança na coleção.
    async fn subscribe(&self, query: Query, sink: SnapshotSink) -> Result<Subscription, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document { id: id.to_string(), data }
    }

    #[test]
    fn patch_applies_operations_in_order() {
        let mut target = json!({ "totalOrders": 2, "name": "Ana" }).as_object().cloned().unwrap();
        let now = Utc::now();

        Patch::new()
            .increment("totalOrders", 1)
            .server_timestamp("lastContact")
            .set("name", "Ana Paula")
            .delete("missing")
            .apply(&mut target, now);

        assert_eq!(target["totalOrders"], json!(3));
        assert_eq!(target["name"], json!("Ana Paula"));
        assert_eq!(target["lastContact"], timestamp_value(now));
    }

    #[test]
    fn increment_starts_from_zero_when_field_is_missing() {
        let mut target = Map::new();
        Patch::new().increment("totalOrders", 1).apply(&mut target, Utc::now());
        assert_eq!(target["totalOrders"], json!(1));
    }

    #[test]
    fn query_filters_sorts_and_limits() {
        let docs = vec![
            doc("a", json!({ "year": 2025, "orderNumber": 2 })),
            doc("b", json!({ "year": 2024, "orderNumber": 9 })),
            doc("c", json!({ "year": 2025, "orderNumber": 7 })),
            doc("d", json!({ "year": 2025, "orderNumber": 3 })),
        ];

        let query = Query::collection(CollectionPath::root("orders"))
            .where_eq("year", 2025)
            .order_by("orderNumber", Direction::Desc)
            .limit(2);

        let ids: Vec<String> = query.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c", "d"]);
        assert!(query.requires_composite_index());
    }

    #[test]
    fn ordering_by_the_filtered_field_needs_no_composite_index() {
        let query = Query::collection(CollectionPath::root("orders"))
            .where_eq("year", 2025)
            .order_by("year", Direction::Asc);
        assert!(!query.requires_composite_index());
    }

    #[test]
    fn timestamps_sort_chronologically_as_text() {
        let earlier = timestamp_value(Utc::now());
        let later = timestamp_value(Utc::now() + chrono::Duration::seconds(5));
        assert_eq!(compare_values(&earlier, &later), Ordering::Less);
    }

    #[test]
    fn decode_injects_document_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let named: Named = doc("x1", json!({ "name": "Studio" })).decode().unwrap();
        assert_eq!(named.id, "x1");
        assert_eq!(named.name, "Studio");
    }

    #[test]
    fn patch_from_record_skips_the_id() {
        let patch = Patch::from_record(&json!({ "id": "abc", "name": "Ana" })).unwrap();
        assert_eq!(patch.ops().len(), 1);
        assert_eq!(patch.ops()[0].0, "name");
    }
}
