// src/db/user_repo.rs

use crate::{
    common::error::AppError,
    db::{
        store::{CollectionPath, DocPath, Patch, Query},
        SharedStore,
    },
    models::auth::{Role, UserProfile},
};

const USERS: &str = "users";

// O repositório de perfis, responsável pelos documentos `users/{uid}`
#[derive(Clone)]
pub struct UserRepository {
    store: SharedStore,
}

impl UserRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn path(uid: &str) -> DocPath {
        CollectionPath::root(USERS).doc(uid)
    }

    pub async fn find(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        match self.store.get(&Self::path(uid)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, uid: &str, email: &str, name: &str, role: Role) -> Result<(), AppError> {
        let patch = Patch::new()
            .set("email", email)
            .set("name", name)
            .set("role", role.as_str())
            .server_timestamp("createdAt");

        self.store
            .set(&Self::path(uid), patch)
            .await
            .map_err(AppError::RemoteWrite)
    }

    pub async fn set_role(&self, uid: &str, role: Role) -> Result<(), AppError> {
        let patch = Patch::new()
            .set("role", role.as_str())
            .server_timestamp("updatedAt");

        self.store
            .update(&Self::path(uid), patch)
            .await
            .map_err(AppError::RemoteWrite)
    }

    pub async fn list(&self) -> Result<Vec<UserProfile>, AppError> {
        let docs = self.store.query(&Query::collection(CollectionPath::root(USERS))).await?;
        let mut profiles = Vec::with_capacity(docs.len());
        for doc in docs {
            profiles.push(doc.decode()?);
        }
        Ok(profiles)
    }
}
