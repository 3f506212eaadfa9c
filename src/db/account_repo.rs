// src/db/account_repo.rs

use crate::{
    common::error::{AppError, AuthError},
    db::{
        store::{CollectionPath, DocPath, Patch},
        SharedStore,
    },
    models::auth::Account,
};

const ACCOUNTS: &str = "accounts";

// Contas do provedor de identidade local (accounts/{email})
#[derive(Clone)]
pub struct AccountRepository {
    store: SharedStore,
}

impl AccountRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn path(email: &str) -> DocPath {
        CollectionPath::root(ACCOUNTS).doc(email)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        match self.store.get(&Self::path(email)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Grava a conta nova; se o e-mail já tiver conta, nada é sobrescrito.
    pub async fn create(&self, uid: &str, email: &str, password_hash: &str) -> Result<(), AppError> {
        let patch = Patch::new()
            .set("uid", uid)
            .set("email", email)
            .set("passwordHash", password_hash)
            .server_timestamp("createdAt");

        let created = self
            .store
            .create_if_absent(&Self::path(email), patch)
            .await
            .map_err(AppError::RemoteWrite)?;
        if !created {
            return Err(AuthError::EmailAlreadyInUse.into());
        }
        Ok(())
    }

    pub async fn set_display_name(&self, email: &str, display_name: &str) -> Result<(), AppError> {
        self.store
            .update(&Self::path(email), Patch::new().set("displayName", display_name))
            .await
            .map_err(AppError::RemoteWrite)
    }
}
