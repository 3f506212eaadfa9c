// src/services/session_cell.rs

use std::sync::{Arc, RwLock};

use chrono::Utc;

use crate::{
    common::error::AppError,
    models::auth::{Identity, Role, UserSession},
};

#[derive(Debug, Default)]
struct CellState {
    current: Option<UserSession>,
    generation: u64,
}

/// Sessão ativa da instância. Cada instalação ou limpeza avança a geração;
/// callbacks que carregam uma geração antiga viram no-op.
#[derive(Debug, Clone, Default)]
pub struct SessionCell {
    inner: Arc<RwLock<CellState>>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<UserSession> {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).current.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        let state = self.inner.read().unwrap_or_else(|p| p.into_inner());
        state.current.is_some() && state.generation == generation
    }

    pub fn require(&self) -> Result<UserSession, AppError> {
        self.current().ok_or(AppError::NotAuthenticated)
    }

    pub fn install(&self, identity: &Identity, display_name: String, role: Role) -> UserSession {
        let mut state = self.inner.write().unwrap_or_else(|p| p.into_inner());
        state.generation += 1;
        let session = UserSession {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name,
            role,
            started_at: Utc::now(),
            generation: state.generation,
        };
        state.current = Some(session.clone());
        session
    }

    /// Ajusta o papel da sessão ativa (troca feita por um administrador sobre si mesmo).
    pub fn set_role(&self, uid: &str, role: Role) {
        let mut state = self.inner.write().unwrap_or_else(|p| p.into_inner());
        if let Some(session) = state.current.as_mut().filter(|s| s.uid == uid) {
            session.role = role;
        }
    }

    pub fn clear(&self) -> Option<UserSession> {
        let mut state = self.inner.write().unwrap_or_else(|p| p.into_inner());
        state.generation += 1;
        state.current.take()
    }
}
