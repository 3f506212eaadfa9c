// src/services/session.rs

use std::{
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use chrono::Local;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::{
    common::error::{AppError, AuthError},
    db::{store::SubscriptionArena, PreRegistrationRepository, UserRepository},
    models::{
        audit::AuditEvent,
        auth::{AuthResponse, Identity, Role, UserSession},
        view::{NotificationLevel, UserBadge},
    },
    services::{
        audit::SecurityAudit,
        auth::IdentityProvider,
        client_directory::ClientDirectory,
        idle::{ActivityTracker, IdleTimer, UserActivity},
        order_workflow::OrderWorkflow,
        session_cell::SessionCell,
        view_store::ViewStore,
    },
};

pub const DEFAULT_IDLE_MINUTES: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum LogoutReason {
    UserRequested,
    IdleTimeout,
    /// O provedor de identidade informou "desconectado" por conta própria.
    SignedOutElsewhere,
}

/// Recursos presos à sessão ativa; todos são liberados juntos no logout.
struct Runtime {
    idle: IdleTimer,
    activity: ActivityTracker,
    subscriptions: SubscriptionArena,
    watcher: Option<JoinHandle<()>>,
}

/// Disparo do timer de inatividade: sessão e sequência que o armaram.
#[derive(Debug, Clone, Copy)]
struct IdleExpiry {
    generation: u64,
    sequence: u64,
}

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    users: UserRepository,
    pre_registrations: PreRegistrationRepository,
    cell: SessionCell,
    directory: ClientDirectory,
    workflow: OrderWorkflow,
    view: ViewStore,
    audit: SecurityAudit,
    bootstrap_admin: String,
    runtime: Mutex<Runtime>,
    // Serializa login, logout, mudanças de estado de auth e expiração
    transitions: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: UserRepository,
        pre_registrations: PreRegistrationRepository,
        cell: SessionCell,
        directory: ClientDirectory,
        workflow: OrderWorkflow,
        view: ViewStore,
        audit: SecurityAudit,
        bootstrap_admin: &str,
        idle_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                users,
                pre_registrations,
                cell,
                directory,
                workflow,
                view,
                audit,
                bootstrap_admin: bootstrap_admin.trim().to_lowercase(),
                runtime: Mutex::new(Runtime {
                    idle: IdleTimer::new(idle_window),
                    activity: ActivityTracker::default(),
                    subscriptions: SubscriptionArena::default(),
                    watcher: None,
                }),
                transitions: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.inner.runtime.lock().unwrap_or_else(|p| p.into_inner())
    }

    // =========================================================================
    //  ESTADO DE AUTENTICAÇÃO
    // =========================================================================

    /// Passa a observar o estado do provedor de identidade.
    pub fn start(&self) {
        let mut state = self.inner.identity.auth_state();
        let weak = Arc::downgrade(&self.inner);

        let watcher = tokio::spawn(async move {
            loop {
                let identity = state.borrow_and_update().clone();
                match Self::from_weak(&weak) {
                    Some(controller) => controller.handle_auth_change(identity).await,
                    None => break,
                }
                if state.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = self.runtime().watcher.replace(watcher) {
            previous.abort();
        }
        tracing::info!("✅ Controlador de sessão observando o provedor de identidade");
    }

    /// Reage a uma mudança de estado. Eventos antigos (que não batem com o
    /// estado atual do provedor) e repetições para o mesmo usuário são ignorados.
    pub async fn handle_auth_change(&self, identity: Option<Identity>) {
        let _transition = self.inner.transitions.lock().await;
        let provider_uid = self.inner.identity.current().map(|i| i.uid);

        match identity {
            Some(identity) => {
                if provider_uid.as_deref() != Some(identity.uid.as_str()) {
                    tracing::debug!("Evento de login obsoleto para {}", identity.email);
                    return;
                }
                if let Some(active) = self.inner.cell.current() {
                    if active.uid == identity.uid {
                        return;
                    }
                    self.teardown();
                }
                self.on_signed_in(identity).await;
            }
            None => {
                if provider_uid.is_some() {
                    return;
                }
                if let Some(session) = self.inner.cell.current() {
                    self.teardown();
                    self.inner.audit.record(
                        AuditEvent::Logout,
                        json!({ "uid": session.uid, "reason": LogoutReason::SignedOutElsewhere }),
                    );
                    self.inner.view.toast(NotificationLevel::Info, "signed_out");
                }
            }
        }
    }

    /// Login por e-mail e senha, sujeito ao bloqueio por tentativas.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let email = email.trim().to_lowercase();

        if self.inner.audit.is_locked_out() {
            self.inner
                .audit
                .record(AuditEvent::LoginBlocked, json!({ "email": email }));
            return Err(AuthError::TooManyAttempts.into());
        }
        self.inner
            .audit
            .record(AuditEvent::LoginAttempt, json!({ "email": email }));

        let signed_in = match self.inner.identity.sign_in(&email, password).await {
            Ok(signed_in) => signed_in,
            Err(e) => {
                let code = match &e {
                    AppError::Auth(auth) => auth.code(),
                    _ => "unknown",
                };
                self.inner
                    .audit
                    .record(AuditEvent::LoginFailed, json!({ "email": email, "code": code }));
                tracing::warn!("⚠️ Login recusado para {}: {}", email, code);
                return Err(e);
            }
        };

        self.inner.audit.record(
            AuditEvent::LoginSuccess,
            json!({ "email": email, "uid": signed_in.identity.uid }),
        );

        self.handle_auth_change(Some(signed_in.identity)).await;
        let session = self.inner.cell.require()?;
        Ok(AuthResponse {
            token: signed_in.id_token,
            session,
        })
    }

    async fn on_signed_in(&self, identity: Identity) {
        let (role, display_name) = self.resolve_profile(&identity).await;
        let session = self.inner.cell.install(&identity, display_name, role);

        {
            let mut runtime = self.runtime();
            runtime.activity.bind();
            self.arm_idle(&mut runtime, session.generation);
        }

        let subscriptions = [
            self.inner.directory.subscribe(&session).await,
            self.inner.workflow.subscribe(&session).await,
        ];
        for subscription in subscriptions {
            match subscription {
                Ok(handle) => self.runtime().subscriptions.register(handle),
                Err(e) => {
                    tracing::error!("🔥 Falha ao assinar atualizações: {}", e);
                    self.inner.view.notify(
                        NotificationLevel::Error,
                        "sync_failed",
                        Some(e.to_string()),
                        true,
                    );
                }
            }
        }

        self.inner.view.show_app(badge(&session));
        self.inner.view.set_draft_date(Local::now().date_naive());
        self.inner.workflow.refresh_draft_number().await;

        tracing::info!("✅ Sessão iniciada: {} ({})", session.email, session.role.as_str());
    }

    // =========================================================================
    //  PERFIL E PAPEL
    // =========================================================================

    /// Nunca falha: qualquer erro na resolução resulta no papel "user".
    async fn resolve_profile(&self, identity: &Identity) -> (Role, String) {
        match self.try_resolve_profile(identity).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Falha ao resolver o papel de {}: {}; seguindo como 'user'",
                    identity.email,
                    e
                );
                (Role::User, fallback_name(identity, None))
            }
        }
    }

    async fn try_resolve_profile(&self, identity: &Identity) -> Result<(Role, String), AppError> {
        let is_bootstrap = identity.email.eq_ignore_ascii_case(&self.inner.bootstrap_admin);

        if let Some(profile) = self.inner.users.find(&identity.uid).await? {
            let name = fallback_name(identity, Some(&profile.name));
            if is_bootstrap && !profile.role.is_admin() {
                self.inner.users.set_role(&identity.uid, Role::Admin).await?;
                self.inner
                    .view
                    .notify(NotificationLevel::Info, "admin_elevated", None, false);
                tracing::info!("🛡️ {} promovido a administrador", identity.email);
                return Ok((Role::Admin, name));
            }
            return Ok((profile.role, name));
        }

        let invite = self.inner.pre_registrations.find(&identity.email).await?;
        let role = if is_bootstrap {
            Role::Admin
        } else {
            invite.as_ref().map(|i| i.role).unwrap_or_default()
        };
        let name = fallback_name(identity, invite.as_ref().map(|i| i.name.as_str()));

        self.inner
            .users
            .create(&identity.uid, &identity.email, &name, role)
            .await?;
        Ok((role, name))
    }

    /// Troca de papel feita por um administrador; reflete na sessão se for a própria.
    pub fn apply_role_change(&self, uid: &str, role: Role) {
        self.inner.cell.set_role(uid, role);
        if let Some(session) = self.inner.cell.current().filter(|s| s.uid == uid) {
            self.inner.view.set_role_badge(badge(&session));
        }
    }

    // =========================================================================
    //  INATIVIDADE
    // =========================================================================

    fn arm_idle(&self, runtime: &mut Runtime, generation: u64) {
        let weak = Arc::downgrade(&self.inner);
        runtime.idle.arm(move |sequence| {
            if let Some(controller) = Self::from_weak(&weak) {
                tokio::spawn(async move {
                    controller.on_idle_expired(generation, sequence).await;
                });
            }
        });
    }

    async fn on_idle_expired(&self, generation: u64, sequence: u64) {
        if !self.runtime().idle.is_latest(sequence) {
            return;
        }
        let expiry = IdleExpiry { generation, sequence };
        if self.end_session(Some(expiry), LogoutReason::IdleTimeout).await {
            tracing::info!("⏰ Sessão expirada por inatividade");
        }
    }

    /// Registra uma atividade do usuário e reinicia a janela de inatividade.
    pub fn record_activity(&self, kind: UserActivity) -> bool {
        let Some(session) = self.inner.cell.current() else {
            return false;
        };
        let mut runtime = self.runtime();
        if !runtime.activity.is_attached(kind) {
            return false;
        }
        self.arm_idle(&mut runtime, session.generation);
        true
    }

    /// Liga os listeners de atividade. Se já estiverem ligados, só reinicia o timer.
    pub fn bind_activity_listeners(&self) -> bool {
        let Some(session) = self.inner.cell.current() else {
            return false;
        };
        let mut runtime = self.runtime();
        let attached = runtime.activity.bind();
        self.arm_idle(&mut runtime, session.generation);
        attached
    }

    pub fn idle_window(&self) -> Duration {
        self.runtime().idle.window()
    }

    // =========================================================================
    //  LOGOUT
    // =========================================================================

    pub async fn logout(&self, reason: LogoutReason) -> bool {
        self.end_session(None, reason).await
    }

    /// Encerra a sessão uma única vez. Na expiração, só se a sessão e o
    /// disparo do timer ainda forem os correntes depois de obter o lock.
    async fn end_session(&self, expiry: Option<IdleExpiry>, reason: LogoutReason) -> bool {
        let _transition = self.inner.transitions.lock().await;

        let Some(session) = self.inner.cell.current() else {
            return false;
        };
        if let Some(expiry) = expiry {
            if expiry.generation != session.generation
                || !self.runtime().idle.is_latest(expiry.sequence)
            {
                tracing::debug!("Expiração descartada: houve atividade ou a sessão mudou");
                return false;
            }
        }

        self.teardown();

        let event = match reason {
            LogoutReason::IdleTimeout => AuditEvent::SessionTimeout,
            _ => AuditEvent::Logout,
        };
        self.inner
            .audit
            .record(event, json!({ "uid": session.uid, "email": session.email, "reason": reason }));

        match reason {
            LogoutReason::IdleTimeout => {
                self.inner
                    .view
                    .notify(NotificationLevel::Warning, "session_expired", None, true);
            }
            _ => {
                self.inner.view.toast(NotificationLevel::Info, "signed_out");
            }
        }

        if let Err(e) = self.inner.identity.sign_out().await {
            tracing::warn!("⚠️ Falha ao desconectar do provedor de identidade: {}", e);
        }
        true
    }

    /// Libera timer, listeners, assinaturas e caches, e volta à tela de login.
    fn teardown(&self) {
        let session = self.inner.cell.clear();

        let (listeners, subscriptions) = {
            let mut runtime = self.runtime();
            runtime.idle.cancel();
            (runtime.activity.detach_all(), runtime.subscriptions.dispose_all())
        };

        self.inner.directory.clear_cache();
        self.inner.workflow.clear_cache();
        self.inner.view.show_login();

        if let Some(session) = session {
            tracing::info!(
                "🔒 Sessão de {} encerrada ({} listeners, {} assinaturas)",
                session.email,
                listeners,
                subscriptions
            );
        }
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    pub fn current(&self) -> Option<UserSession> {
        self.inner.cell.current()
    }

    pub fn is_active(&self) -> bool {
        self.inner.cell.current().is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.runtime().subscriptions.len()
    }

    pub fn listeners_attached(&self) -> usize {
        self.runtime().activity.len()
    }

    pub fn idle_timer_armed(&self) -> bool {
        self.runtime().idle.is_armed()
    }
}

fn badge(session: &UserSession) -> UserBadge {
    UserBadge {
        display_name: session.display_name.clone(),
        email: session.email.clone(),
        role: session.role,
    }
}

fn fallback_name(identity: &Identity, stored: Option<&str>) -> String {
    identity
        .display_name
        .as_deref()
        .or(stored)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&identity.email)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, STRONG_PASSWORD};

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn sign_in_resolves_default_role_and_binds_resources() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;

        let session = app.session.current().unwrap();
        assert_eq!(session.role, Role::User);
        assert_eq!(app.session.subscription_count(), 2);
        assert_eq!(app.session.listeners_attached(), UserActivity::ALL.len());
        assert!(app.session.idle_timer_armed());
        assert_eq!(app.view.snapshot().draft.display_number, test_support::first_number());
    }

    #[tokio::test]
    async fn bootstrap_admin_is_elevated_even_with_existing_profile() {
        let app = test_support::app().await;
        let identity = app
            .identity
            .create_account(test_support::ADMIN_EMAIL, STRONG_PASSWORD)
            .await
            .unwrap();
        app.users
            .create(&identity.uid, test_support::ADMIN_EMAIL, "Admin", Role::User)
            .await
            .unwrap();

        let response = app
            .session
            .sign_in(test_support::ADMIN_EMAIL, STRONG_PASSWORD)
            .await
            .unwrap();
        assert_eq!(response.session.role, Role::Admin);
        assert_eq!(app.users.find(&identity.uid).await.unwrap().unwrap().role, Role::Admin);
        assert_eq!(app.view.notifications_with_key("admin_elevated"), 1);
    }

    #[tokio::test]
    async fn role_resolution_failure_falls_back_to_user() {
        let app = test_support::app().await;
        app.identity
            .create_account(test_support::ADMIN_EMAIL, STRONG_PASSWORD)
            .await
            .unwrap();
        let signed = app
            .identity
            .sign_in(test_support::ADMIN_EMAIL, STRONG_PASSWORD)
            .await
            .unwrap();

        app.memory.set_unavailable(true);
        let (role, name) = app.session.resolve_profile(&signed.identity).await;
        app.memory.set_unavailable(false);

        assert_eq!(role, Role::User);
        assert_eq!(name, test_support::ADMIN_EMAIL);
    }

    #[tokio::test]
    async fn repeated_sign_in_events_are_idempotent() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        let generation = app.session.current().unwrap().generation;

        let identity = app.identity.current().unwrap();
        app.session.handle_auth_change(Some(identity)).await;
        settle().await;

        assert_eq!(app.session.current().unwrap().generation, generation);
        assert_eq!(app.session.subscription_count(), 2);
    }

    #[tokio::test]
    async fn logout_releases_every_resource() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;

        assert!(app.session.logout(LogoutReason::UserRequested).await);
        assert!(!app.session.is_active());
        assert_eq!(app.session.subscription_count(), 0);
        assert_eq!(app.session.listeners_attached(), 0);
        assert!(!app.session.idle_timer_armed());
        assert!(app.directory.clients().is_empty());
        assert!(app.identity.current().is_none());

        // Segunda chamada não faz nada
        assert!(!app.session.logout(LogoutReason::UserRequested).await);
    }

    #[tokio::test]
    async fn listener_binding_is_idempotent_and_needs_a_session() {
        let app = test_support::app().await;
        assert!(!app.session.bind_activity_listeners());
        assert!(!app.session.record_activity(UserActivity::Click));

        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        assert!(!app.session.bind_activity_listeners());
        assert_eq!(app.session.listeners_attached(), UserActivity::ALL.len());
        assert!(app.session.record_activity(UserActivity::Scroll));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_fires_once_and_activity_resets_it() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        let window = app.session.idle_window();
        let minute = Duration::from_secs(60);

        tokio::time::sleep(window - minute).await;
        assert!(app.session.is_active());

        assert!(app.session.record_activity(UserActivity::KeyPress));
        tokio::time::sleep(window - minute).await;
        assert!(app.session.is_active());

        tokio::time::sleep(2 * minute).await;
        settle().await;
        assert!(!app.session.is_active());
        assert_eq!(app.view.notifications_with_key("session_expired"), 1);

        tokio::time::sleep(3 * window).await;
        settle().await;
        assert_eq!(app.view.notifications_with_key("session_expired"), 1);
        let timeouts = app
            .audit
            .recent(100)
            .into_iter()
            .filter(|e| e.event == AuditEvent::SessionTimeout)
            .count();
        assert_eq!(timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_during_a_pending_expiry_keeps_the_session() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;
        let window = app.session.idle_window();
        let minute = Duration::from_secs(60);

        // A expiração dispara, mas espera o lock de transição
        let transition = app.session.inner.transitions.lock().await;
        tokio::time::sleep(window + minute).await;
        settle().await;
        assert!(app.session.record_activity(UserActivity::Click));
        drop(transition);
        settle().await;

        assert!(app.session.is_active());
        assert_eq!(app.view.notifications_with_key("session_expired"), 0);

        tokio::time::sleep(window + minute).await;
        settle().await;
        assert!(!app.session.is_active());
        assert_eq!(app.view.notifications_with_key("session_expired"), 1);
    }

    #[tokio::test]
    async fn lockout_refuses_attempts_after_five_failures() {
        let app = test_support::app().await;
        app.identity
            .create_account("ana@studio.com", STRONG_PASSWORD)
            .await
            .unwrap();

        for _ in 0..5 {
            let err = app.session.sign_in("ana@studio.com", "errada").await.unwrap_err();
            assert!(matches!(err, AppError::Auth(AuthError::WrongPassword)));
        }

        let err = app
            .session
            .sign_in("ana@studio.com", STRONG_PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TooManyAttempts)));
        assert!(!app.session.is_active());
    }

    #[tokio::test]
    async fn provider_sign_out_tears_the_session_down() {
        let app = test_support::app().await;
        test_support::sign_in_new_user(&app, "ana@studio.com").await;

        app.identity.sign_out().await.unwrap();
        app.session.handle_auth_change(None).await;

        assert!(!app.session.is_active());
        assert_eq!(app.session.subscription_count(), 0);
    }
}
