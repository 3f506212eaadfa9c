// src/db/pre_registration_repo.rs

use crate::{
    common::error::AppError,
    db::{
        store::{CollectionPath, DocPath, Patch, Query},
        SharedStore,
    },
    models::{auth::Role, pre_registration::PreRegistration},
};

const PRE_REGISTERED: &str = "pre_registered_users";

/// Pré-cadastros, indexados pelo e-mail em minúsculas.
#[derive(Clone)]
pub struct PreRegistrationRepository {
    store: SharedStore,
}

impl PreRegistrationRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn path(email: &str) -> DocPath {
        CollectionPath::root(PRE_REGISTERED).doc(&email.trim().to_lowercase())
    }

    pub async fn find(&self, email: &str) -> Result<Option<PreRegistration>, AppError> {
        match self.store.get(&Self::path(email)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn create(
        &self,
        email: &str,
        name: &str,
        phone: &str,
        role: Role,
        created_by: Option<&str>,
    ) -> Result<(), AppError> {
        let mut patch = Patch::new()
            .set("email", email.trim().to_lowercase())
            .set("name", name.trim())
            .set("phone", phone)
            .set("role", role.as_str())
            .set("passwordSet", false)
            .server_timestamp("createdAt");
        if let Some(creator) = created_by {
            patch = patch.set("createdBy", creator);
        }

        self.store
            .set(&Self::path(email), patch)
            .await
            .map_err(AppError::RemoteWrite)
    }

    /// Consome o pré-cadastro: passwordSet false -> true, uma única vez.
    pub async fn mark_password_set(&self, email: &str) -> Result<(), AppError> {
        let patch = Patch::new()
            .set("passwordSet", true)
            .server_timestamp("passwordSetAt");

        self.store
            .update(&Self::path(email), patch)
            .await
            .map_err(AppError::RemoteWrite)
    }

    pub async fn delete(&self, email: &str) -> Result<(), AppError> {
        self.store
            .delete(&Self::path(email))
            .await
            .map_err(AppError::RemoteWrite)
    }

    pub async fn list(&self) -> Result<Vec<PreRegistration>, AppError> {
        let docs = self
            .store
            .query(&Query::collection(CollectionPath::root(PRE_REGISTERED)))
            .await?;
        let mut invites = Vec::with_capacity(docs.len());
        for doc in docs {
            invites.push(doc.decode()?);
        }
        Ok(invites)
    }

    pub async fn is_empty(&self) -> Result<bool, AppError> {
        let docs = self
            .store
            .query(&Query::collection(CollectionPath::root(PRE_REGISTERED)).limit(1))
            .await?;
        Ok(docs.is_empty())
    }
}
