// src/services/audit.rs

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use serde_json::Value;

use crate::models::audit::{AuditEntry, AuditEvent};

pub const MAX_ENTRIES: usize = 1000;
pub const MAX_LOGIN_FAILURES: usize = 5;
pub const LOCKOUT_MINUTES: i64 = 15;

/// Trilha de auditoria em memória, limitada às últimas `MAX_ENTRIES` entradas.
#[derive(Clone, Default)]
pub struct SecurityAudit {
    entries: Arc<Mutex<VecDeque<AuditEntry>>>,
}

impl SecurityAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: AuditEvent, details: Value) {
        tracing::info!(target: "audit", event = ?event, %details, "🛡️ evento de segurança");

        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == MAX_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(AuditEntry {
            timestamp: Utc::now(),
            event,
            details,
        });
    }

    /// Bloqueado quando houve `MAX_LOGIN_FAILURES` falhas na janela de bloqueio.
    pub fn is_locked_out(&self) -> bool {
        let since = Utc::now() - Duration::minutes(LOCKOUT_MINUTES);
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let recent_failures = entries
            .iter()
            .filter(|e| e.event == AuditEvent::LoginFailed && e.timestamp > since)
            .count();
        recent_failures >= MAX_LOGIN_FAILURES
    }

    /// Entradas mais recentes primeiro.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
