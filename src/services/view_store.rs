// src/services/view_store.rs

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::NaiveDate;
use tokio::sync::watch;

use crate::models::{
    dashboard::DashboardView,
    order::{OrderRow, OrderStatus},
    view::{Notification, NotificationLevel, Screen, UserBadge, ViewState},
};

const MAX_NOTIFICATIONS: usize = 20;

/// View-model observável: os serviços publicam aqui, a ponte HTTP e os testes leem.
#[derive(Clone)]
pub struct ViewStore {
    state: Arc<watch::Sender<ViewState>>,
    next_notification: Arc<AtomicU64>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            state: Arc::new(state),
            next_notification: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    // =========================================================================
    //  TELAS
    // =========================================================================

    pub fn show_app(&self, badge: UserBadge) {
        self.state.send_modify(|view| {
            view.screen = Screen::App;
            view.user = Some(badge);
        });
    }

    /// Volta ao login limpando tudo que pertence à sessão; notificações permanecem.
    pub fn show_login(&self) {
        self.state.send_modify(|view| {
            view.screen = Screen::Login;
            view.user = None;
            view.order_rows.clear();
            view.draft = Default::default();
            view.dashboard = DashboardView::default();
            view.client_count = 0;
        });
    }

    pub fn set_role_badge(&self, badge: UserBadge) {
        self.state.send_modify(|view| view.user = Some(badge));
    }

    // =========================================================================
    //  NOTIFICAÇÕES
    // =========================================================================

    pub fn notify(&self, level: NotificationLevel, key: &str, detail: Option<String>, persistent: bool) -> u64 {
        let id = self.next_notification.fetch_add(1, Ordering::Relaxed);
        self.state.send_modify(|view| {
            view.notifications.push(Notification {
                id,
                level,
                key: key.to_string(),
                detail,
                persistent,
                message: None,
            });
            // Descarta primeiro os toasts mais antigos
            while view.notifications.len() > MAX_NOTIFICATIONS {
                let oldest = view
                    .notifications
                    .iter()
                    .position(|n| !n.persistent)
                    .unwrap_or(0);
                view.notifications.remove(oldest);
            }
        });
        id
    }

    pub fn toast(&self, level: NotificationLevel, key: &str) -> u64 {
        self.notify(level, key, None, false)
    }

    pub fn dismiss(&self, id: u64) -> bool {
        self.state.send_if_modified(|view| {
            let before = view.notifications.len();
            view.notifications.retain(|n| n.id != id);
            before != view.notifications.len()
        })
    }

    pub fn notifications_with_key(&self, key: &str) -> usize {
        self.state
            .borrow()
            .notifications
            .iter()
            .filter(|n| n.key == key)
            .count()
    }

    // =========================================================================
    //  TABELA DE OS
    // =========================================================================

    pub fn set_order_rows(&self, rows: Vec<OrderRow>) {
        self.state.send_modify(|view| {
            view.order_rows = rows.into_iter().map(|r| (r.id.clone(), r)).collect();
        });
    }

    /// Troca o status exibido de uma linha; devolve o status anterior.
    pub fn show_row_status(&self, id: &str, status: OrderStatus) -> Option<OrderStatus> {
        let mut previous = None;
        self.state.send_if_modified(|view| match view.order_rows.get_mut(id) {
            Some(row) => {
                previous = Some(row.status);
                row.show_status(status);
                true
            }
            None => false,
        });
        previous
    }

    pub fn row(&self, id: &str) -> Option<OrderRow> {
        self.state.borrow().order_rows.get(id).cloned()
    }

    // =========================================================================
    //  RASCUNHO DA NOVA OS
    // =========================================================================

    pub fn select_client(&self, client_id: Option<String>) {
        self.state.send_modify(|view| view.draft.selected_client_id = client_id);
    }

    pub fn set_draft_number(&self, display_number: String) {
        self.state.send_modify(|view| view.draft.display_number = display_number);
    }

    pub fn set_draft_date(&self, date: NaiveDate) {
        self.state.send_modify(|view| view.draft.date = Some(date));
    }

    // =========================================================================
    //  PAINEL
    // =========================================================================

    pub fn set_dashboard(&self, dashboard: DashboardView, client_count: usize) {
        self.state.send_modify(|view| {
            view.dashboard = dashboard;
            view.client_count = client_count;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_screen_keeps_notifications() {
        let view = ViewStore::new();
        view.show_app(UserBadge {
            display_name: "Ana".into(),
            email: "ana@x.com".into(),
            role: crate::models::auth::Role::User,
        });
        view.notify(NotificationLevel::Warning, "session_expired", None, true);
        view.show_login();

        let state = view.snapshot();
        assert_eq!(state.screen, Screen::Login);
        assert!(state.user.is_none());
        assert_eq!(view.notifications_with_key("session_expired"), 1);
    }

    #[test]
    fn old_toasts_are_dropped_before_persistent_notices() {
        let view = ViewStore::new();
        view.notify(NotificationLevel::Error, "sync_failed", None, true);
        for _ in 0..MAX_NOTIFICATIONS {
            view.toast(NotificationLevel::Success, "client_saved");
        }
        assert_eq!(view.snapshot().notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(view.notifications_with_key("sync_failed"), 1);
    }

    #[test]
    fn dismissing_removes_a_single_notification() {
        let view = ViewStore::new();
        let id = view.toast(NotificationLevel::Info, "signed_out");
        assert!(view.dismiss(id));
        assert!(!view.dismiss(id));
    }
}
