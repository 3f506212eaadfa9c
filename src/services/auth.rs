// src/services/auth.rs

use std::sync::Arc;

use async_trait::async_trait;
use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    common::error::{AppError, AuthError},
    db::AccountRepository,
    models::auth::{Claims, Identity, SignedIn},
};

// =========================================================================
//  O CONTRATO DO PROVEDOR DE IDENTIDADE
// =========================================================================

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Cria a conta de e-mail/senha. Não autentica a instância.
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AppError>;

    async fn update_display_name(&self, email: &str, display_name: &str) -> Result<(), AppError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    fn current(&self) -> Option<Identity>;

    /// Estado observável: `Some` = autenticado, `None` = desconectado.
    fn auth_state(&self) -> watch::Receiver<Option<Identity>>;

    fn verify_token(&self, token: &str) -> Result<Identity, AppError>;
}

// =========================================================================
//  PROVEDOR LOCAL (bcrypt + JWT sobre accounts/{email})
// =========================================================================

#[derive(Clone)]
pub struct LocalIdentityProvider {
    accounts: AccountRepository,
    jwt_secret: String,
    bcrypt_cost: u32,
    state: Arc<watch::Sender<Option<Identity>>>,
}

impl LocalIdentityProvider {
    pub fn new(accounts: AccountRepository, jwt_secret: String) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts,
            jwt_secret,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            state: Arc::new(state),
        }
    }

    /// Custo do bcrypt; os testes usam o mínimo.
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    fn normalize(email: &str) -> Result<String, AppError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(AuthError::InvalidEmail.into());
        }
        Ok(email)
    }

    fn create_token(&self, identity: &Identity) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(1);

        let claims = Claims {
            sub: identity.uid.clone(),
            email: identity.email.clone(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let email = Self::normalize(email)?;
        if password.len() < 6 {
            return Err(AuthError::WeakPassword.into());
        }
        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyInUse.into());
        }

        // Hashing fora do runtime assíncrono
        let password_clone = password.to_owned();
        let cost = self.bcrypt_cost;
        let hashed_password = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        let uid = Uuid::new_v4().simple().to_string();
        self.accounts.create(&uid, &email, &hashed_password).await?;
        tracing::info!("👤 Conta criada para {}", email);

        Ok(Identity {
            uid,
            email,
            display_name: None,
        })
    }

    async fn update_display_name(&self, email: &str, display_name: &str) -> Result<(), AppError> {
        let email = Self::normalize(email)?;
        self.accounts.set_display_name(&email, display_name).await?;

        // A identidade publicada acompanha o perfil
        self.state.send_if_modified(|current| match current {
            Some(identity) if identity.email == email => {
                identity.display_name = Some(display_name.to_string());
                true
            }
            _ => false,
        });
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AppError> {
        let email = Self::normalize(email)?;
        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let password_clone = password.to_owned();
        let password_hash_clone = account.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AuthError::WrongPassword.into());
        }

        let identity = Identity {
            uid: account.uid,
            email: account.email,
            display_name: account.display_name,
        };
        let id_token = self.create_token(&identity)?;

        self.state.send_replace(Some(identity.clone()));
        Ok(SignedIn { identity, id_token })
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.state.send_replace(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn auth_state(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }

    fn verify_token(&self, token: &str) -> Result<Identity, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(Identity {
            uid: token_data.claims.sub,
            email: token_data.claims.email,
            display_name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn provider() -> LocalIdentityProvider {
        let store = Arc::new(MemoryStore::new());
        LocalIdentityProvider::new(AccountRepository::new(store), "segredo-de-teste".into())
            .with_cost(4)
    }

    #[tokio::test]
    async fn sign_in_reports_provider_codes() {
        let idp = provider();
        idp.create_account("Ana@Studio.com", "segredo123").await.unwrap();

        let missing = idp.sign_in("bia@studio.com", "segredo123").await.unwrap_err();
        assert!(matches!(missing, AppError::Auth(AuthError::UserNotFound)));

        let wrong = idp.sign_in("ana@studio.com", "errada").await.unwrap_err();
        assert!(matches!(wrong, AppError::Auth(AuthError::WrongPassword)));

        let ok = idp.sign_in("ANA@studio.com", "segredo123").await.unwrap();
        assert_eq!(ok.identity.email, "ana@studio.com");
        assert_eq!(idp.verify_token(&ok.id_token).unwrap().uid, ok.identity.uid);
    }

    #[tokio::test]
    async fn duplicate_accounts_are_rejected() {
        let idp = provider();
        idp.create_account("ana@studio.com", "segredo123").await.unwrap();
        let err = idp.create_account("ana@studio.com", "outra-senha").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::EmailAlreadyInUse)));
    }

    #[tokio::test]
    async fn creating_an_account_does_not_sign_in() {
        let idp = provider();
        idp.create_account("ana@studio.com", "segredo123").await.unwrap();
        assert!(idp.current().is_none());
    }

    #[tokio::test]
    async fn auth_state_follows_sign_in_and_sign_out() {
        let idp = provider();
        let mut state = idp.auth_state();
        idp.create_account("ana@studio.com", "segredo123").await.unwrap();

        idp.sign_in("ana@studio.com", "segredo123").await.unwrap();
        state.changed().await.unwrap();
        assert!(state.borrow_and_update().is_some());

        idp.sign_out().await.unwrap();
        state.changed().await.unwrap();
        assert!(state.borrow_and_update().is_none());
    }

    #[test]
    fn garbage_tokens_are_invalid() {
        let err = provider().verify_token("nao-e-um-jwt").unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidToken)));
    }
}
