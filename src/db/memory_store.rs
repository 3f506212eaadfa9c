// src/db/memory_store.rs

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::store::{
    CollectionPath, DocPath, Document, Patch, Query, RemoteStore, SnapshotSink, StoreError,
    Subscription,
};

type Collection = BTreeMap<String, Map<String, Value>>;

/// Store de documentos em memória.
/// Usado nos testes e com `STORE_BACKEND=memory`; também permite injetar falhas.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    collections: Mutex<BTreeMap<CollectionPath, Collection>>,
    changes: broadcast::Sender<CollectionPath>,
    failing_writes: AtomicUsize,
    unavailable: AtomicBool,
    reject_compound_queries: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                collections: Mutex::new(BTreeMap::new()),
                changes,
                failing_writes: AtomicUsize::new(0),
                unavailable: AtomicBool::new(false),
                reject_compound_queries: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    //  INJEÇÃO DE FALHAS
    // =========================================================================

    /// As próximas `count` escritas falham com `Unavailable`.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Simula queda total do backend (leituras e escritas).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Simula a ausência de índice composto: filtro + ordenação por outro campo falha.
    pub fn reject_compound_queries(&self, reject: bool) {
        self.inner.reject_compound_queries.store(reject, Ordering::SeqCst);
    }

    pub fn len(&self, collection: &CollectionPath) -> usize {
        self.lock().get(collection).map_or(0, BTreeMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<CollectionPath, Collection>> {
        // Um panic em outra thread não invalida os mapas; seguimos com o conteúdo atual.
        self.inner
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store em memória desligado".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check_available()?;
        let injected = self
            .inner
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("falha de escrita simulada".into()));
        }
        Ok(())
    }

    fn notify(&self, collection: &CollectionPath) {
        // Sem assinantes o envio falha; não é erro.
        let _ = self.inner.changes.send(collection.clone());
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.check_available()?;
        if self.inner.reject_compound_queries.load(Ordering::SeqCst)
            && query.requires_composite_index()
        {
            return Err(StoreError::FailedPrecondition(format!(
                "índice ausente para {}",
                query.collection
            )));
        }

        let docs: Vec<Document> = self
            .lock()
            .get(&query.collection)
            .map(|collection| {
                collection
                    .iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: Value::Object(data.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(query.apply(docs))
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        let guard = self.lock();
        Ok(guard
            .get(&path.collection)
            .and_then(|c| c.get(&path.id))
            .map(|data| Document {
                id: path.id.clone(),
                data: Value::Object(data.clone()),
            }))
    }

    async fn set(&self, path: &DocPath, patch: Patch) -> Result<(), StoreError> {
        self.check_write()?;
        {
            let mut guard = self.lock();
            let mut data = Map::new();
            patch.apply(&mut data, Utc::now());
            guard
                .entry(path.collection.clone())
                .or_default()
                .insert(path.id.clone(), data);
        }
        self.notify(&path.collection);
        Ok(())
    }

    async fn create_if_absent(&self, path: &DocPath, patch: Patch) -> Result<bool, StoreError> {
        self.check_write()?;
        {
            // Verificação e inserção sob o mesmo lock
            let mut guard = self.lock();
            let collection = guard.entry(path.collection.clone()).or_default();
            if collection.contains_key(&path.id) {
                return Ok(false);
            }
            let mut data = Map::new();
            patch.apply(&mut data, Utc::now());
            collection.insert(path.id.clone(), data);
        }
        self.notify(&path.collection);
        Ok(true)
    }

    async fn update(&self, path: &DocPath, patch: Patch) -> Result<(), StoreError> {
        self.check_write()?;
        {
            let mut guard = self.lock();
            let data = guard
                .get_mut(&path.collection)
                .and_then(|c| c.get_mut(&path.id))
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            patch.apply(data, Utc::now());
        }
        self.notify(&path.collection);
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, patch: Patch) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(&collection.doc(&id), patch).await?;
        Ok(id)
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        self.check_write()?;
        let removed = {
            let mut guard = self.lock();
            guard
                .get_mut(&path.collection)
                .and_then(|c| c.remove(&path.id))
                .is_some()
        };
        if removed {
            self.notify(&path.collection);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.run_query(query)
    }

    async fn subscribe(&self, query: Query, sink: SnapshotSink) -> Result<Subscription, StoreError> {
        // Assina antes do snapshot inicial para não perder mudanças no intervalo
        let mut changes = self.inner.changes.subscribe();
        let initial = self.run_query(&query)?;
        let store = self.clone();
        let label = query.collection.to_string();

        let task = tokio::spawn(async move {
            sink(Ok(initial));
            loop {
                match changes.recv().await {
                    Ok(changed) if changed == query.collection => sink(store.run_query(&query)),
                    Ok(_) => {}
                    // Perdemos eventos: o snapshot completo recupera o estado
                    Err(broadcast::error::RecvError::Lagged(_)) => sink(store.run_query(&query)),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(label, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::Direction;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn clients() -> CollectionPath {
        CollectionPath::user_scoped("u1", "clients")
    }

    #[tokio::test]
    async fn update_on_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let result = store
            .update(&clients().doc("nope"), Patch::new().set("name", "X"))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_if_absent_never_overwrites() {
        let store = MemoryStore::new();
        let path = CollectionPath::root("accounts").doc("maria@studio.com");

        assert!(store.create_if_absent(&path, Patch::new().set("uid", "u1")).await.unwrap());
        assert!(!store.create_if_absent(&path, Patch::new().set("uid", "u2")).await.unwrap());

        let stored = store.get(&path).await.unwrap().unwrap();
        assert_eq!(stored.data["uid"], json!("u1"));
    }

    #[tokio::test]
    async fn injected_write_failures_are_consumed_one_by_one() {
        let store = MemoryStore::new();
        store.fail_next_writes(1);

        let first = store.add(&clients(), Patch::new().set("name", "Ana")).await;
        assert!(matches!(first, Err(StoreError::Unavailable(_))));

        let second = store.add(&clients(), Patch::new().set("name", "Ana")).await;
        assert!(second.is_ok());
        assert_eq!(store.len(&clients()), 1);
    }

    #[tokio::test]
    async fn compound_queries_can_be_rejected() {
        let store = MemoryStore::new();
        store.reject_compound_queries(true);

        let query = Query::collection(clients())
            .where_eq("year", 2025)
            .order_by("orderNumber", Direction::Desc);
        assert!(matches!(
            store.query(&query).await,
            Err(StoreError::FailedPrecondition(_))
        ));

        let plain = Query::collection(clients()).where_eq("year", 2025);
        assert!(store.query(&plain).await.is_ok());
    }

    #[tokio::test]
    async fn subscription_delivers_initial_and_change_snapshots() {
        let store = MemoryStore::new();
        store
            .set(&clients().doc("a"), Patch::new().set("name", "Ana"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: SnapshotSink = Arc::new(move |snapshot| {
            let _ = tx.send(snapshot.map(|docs| docs.len()));
        });
        let subscription = store.subscribe(Query::collection(clients()), sink).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), 1);

        store
            .set(&clients().doc("b"), Patch::new().set("name", "Bia"))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), 2);

        subscription.dispose();
        store
            .set(&clients().doc("c"), Patch::new().set("name", "Caio"))
            .await
            .unwrap();

        let after_dispose = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(after_dispose, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn changes_in_other_collections_do_not_wake_the_subscription() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: SnapshotSink = Arc::new(move |snapshot| {
            let _ = tx.send(snapshot.is_ok());
        });
        let _subscription = store.subscribe(Query::collection(clients()), sink).await.unwrap();
        assert!(rx.recv().await.unwrap());

        store
            .set(
                &CollectionPath::user_scoped("u2", "clients").doc("x"),
                Patch::new().set("name", json!("Outro")),
            )
            .await
            .unwrap();

        let nothing = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(nothing.is_err());
    }
}
