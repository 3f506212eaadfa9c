// src/db/client_repo.rs

use serde_json::Value;

use crate::{
    common::error::AppError,
    db::{
        store::{CollectionPath, DocPath, Patch, Query, SnapshotSink, Subscription},
        SharedStore,
    },
    models::client::{Client, ClientInput},
};

const CLIENTS: &str = "clients";

#[derive(Clone)]
pub struct ClientRepository {
    store: SharedStore,
}

impl ClientRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn collection(uid: &str) -> CollectionPath {
        CollectionPath::user_scoped(uid, CLIENTS)
    }

    fn path(uid: &str, id: &str) -> DocPath {
        Self::collection(uid).doc(id)
    }

    fn input_patch(input: &ClientInput) -> Patch {
        let optional = |v: &Option<String>| v.clone().map_or(Value::Null, Value::String);
        Patch::new()
            .set("name", input.name.as_str())
            .set("email", input.email.as_str())
            .set("phone", input.phone.as_str())
            .set("address", input.address.as_str())
            .set("cpf", optional(&input.cpf))
            .set("rg", optional(&input.rg))
            .set(
                "birthDate",
                input
                    .birth_date
                    .map_or(Value::Null, |d| Value::String(d.format("%Y-%m-%d").to_string())),
            )
    }

    // =========================================================================
    //  CRUD
    // =========================================================================

    pub async fn create(&self, uid: &str, input: &ClientInput) -> Result<String, AppError> {
        let patch = Self::input_patch(input)
            .set("totalOrders", 0)
            .server_timestamp("createdAt");

        self.store
            .add(&Self::collection(uid), patch)
            .await
            .map_err(AppError::RemoteWrite)
    }

    pub async fn update(&self, uid: &str, id: &str, input: &ClientInput) -> Result<(), AppError> {
        let patch = Self::input_patch(input).server_timestamp("updatedAt");

        self.store
            .update(&Self::path(uid, id), patch)
            .await
            .map_err(AppError::RemoteWrite)
    }

    pub async fn delete(&self, uid: &str, id: &str) -> Result<(), AppError> {
        self.store
            .delete(&Self::path(uid, id))
            .await
            .map_err(AppError::RemoteWrite)
    }

    pub async fn find(&self, uid: &str, id: &str) -> Result<Option<Client>, AppError> {
        match self.store.get(&Self::path(uid, id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Incremento atômico do contador + último contato, ao gerar uma OS para o cliente.
    pub async fn record_order(&self, uid: &str, id: &str) -> Result<(), AppError> {
        let patch = Patch::new()
            .increment("totalOrders", 1)
            .server_timestamp("lastContact");

        self.store
            .update(&Self::path(uid, id), patch)
            .await
            .map_err(AppError::RemoteWrite)
    }

    // =========================================================================
    //  TEMPO REAL
    // =========================================================================

    pub async fn subscribe(&self, uid: &str, sink: SnapshotSink) -> Result<Subscription, AppError> {
        Ok(self
            .store
            .subscribe(Query::collection(Self::collection(uid)), sink)
            .await?)
    }
}
