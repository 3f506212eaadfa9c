// src/db/pg_store.rs

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{postgres::PgListener, PgPool, Row};
use uuid::Uuid;

use super::store::{
    CollectionPath, DocPath, Document, Patch, Query, RemoteStore, SnapshotSink, StoreError,
    Subscription,
};

/// Canal do NOTIFY disparado pela trigger de `documents` (payload = nome da coleção).
pub const CHANGES_CHANNEL: &str = "document_changes";

/// Store de documentos sobre Postgres: uma tabela JSONB, uma linha por documento.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    fn containment_filter(query: &Query) -> Value {
        let mut filter = Map::new();
        for f in &query.filters {
            filter.insert(f.field.clone(), f.value.clone());
        }
        Value::Object(filter)
    }

    async fn run_query(pool: &PgPool, query: &Query) -> Result<Vec<Document>, StoreError> {
        // Igualdades viram `@>` (usa o índice GIN); ordenação e limite ficam em Rust
        let rows = sqlx::query(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND data @> $2
            "#,
        )
        .bind(query.collection.as_str())
        .bind(Self::containment_filter(query))
        .fetch_all(pool)
        .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push(Document {
                id: row.try_get("id")?,
                data: row.try_get("data")?,
            });
        }
        Ok(query.apply(docs))
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(path.collection.as_str())
            .bind(&path.id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Document {
                id: path.id.clone(),
                data: row.try_get("data")?,
            })),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &DocPath, patch: Patch) -> Result<(), StoreError> {
        let mut data = Map::new();
        patch.apply(&mut data, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(path.collection.as_str())
        .bind(&path.id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_if_absent(&self, path: &DocPath, patch: Patch) -> Result<bool, StoreError> {
        let mut data = Map::new();
        patch.apply(&mut data, Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(path.collection.as_str())
        .bind(&path.id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, path: &DocPath, patch: Patch) -> Result<(), StoreError> {
        // Ler-modificar-gravar sob FOR UPDATE: incrementos concorrentes não se perdem
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(path.collection.as_str())
        .bind(&path.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        let mut data = match row.try_get::<Value, _>("data")? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        patch.apply(&mut data, Utc::now());

        sqlx::query(
            "UPDATE documents SET data = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(path.collection.as_str())
        .bind(&path.id)
        .bind(Value::Object(data))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, patch: Patch) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(&collection.doc(&id), patch).await?;
        Ok(id)
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(path.collection.as_str())
            .bind(&path.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        Self::run_query(&self.pool, query).await
    }

    async fn subscribe(&self, query: Query, sink: SnapshotSink) -> Result<Subscription, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGES_CHANNEL).await?;

        let initial = Self::run_query(&self.pool, &query).await?;
        let pool = self.pool.clone();
        let label = query.collection.to_string();

        let task = tokio::spawn(async move {
            sink(Ok(initial));
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        if notification.payload() == query.collection.as_str() {
                            sink(Self::run_query(&pool, &query).await);
                        }
                    }
                    Err(e) => {
                        tracing::error!("🔥 Conexão de tempo real perdida ({}): {}", query.collection, e);
                        sink(Err(StoreError::Database(e)));
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(label, task))
    }
}
