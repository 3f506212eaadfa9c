// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    LoginAttempt,
    LoginSuccess,
    LoginFailed,
    LoginBlocked,
    Logout,
    SessionTimeout,
    FirstPasswordSuccess,
    FirstPasswordFailed,
    UserPreRegistered,
    PreRegistrationDeleted,
    RoleChanged,
    ClientCreated,
    ClientUpdated,
    ClientDeleted,
    OrderCreated,
    OrderCompleted,
    OrderReopened,
    OrderDeleted,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub details: Value,
}
