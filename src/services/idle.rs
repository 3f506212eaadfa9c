// src/services/idle.rs

use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use utoipa::ToSchema;

/// Atividades do usuário que reiniciam a contagem de inatividade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum UserActivity {
    PointerMove,
    KeyPress,
    Click,
    Scroll,
    Touch,
    VisibilityRegained,
}

impl UserActivity {
    pub const ALL: [UserActivity; 6] = [
        UserActivity::PointerMove,
        UserActivity::KeyPress,
        UserActivity::Click,
        UserActivity::Scroll,
        UserActivity::Touch,
        UserActivity::VisibilityRegained,
    ];
}

/// Conjunto de "listeners" de atividade ligados à sessão.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    attached: HashSet<UserActivity>,
}

impl ActivityTracker {
    /// Liga todos os listeners; repetir a chamada não duplica nada.
    pub fn bind(&mut self) -> bool {
        if !self.attached.is_empty() {
            return false;
        }
        self.attached.extend(UserActivity::ALL);
        true
    }

    pub fn detach_all(&mut self) -> usize {
        let count = self.attached.len();
        self.attached.clear();
        count
    }

    pub fn is_attached(&self, kind: UserActivity) -> bool {
        self.attached.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}

/// Temporizador de inatividade: cada `arm` cancela o anterior e recomeça a janela.
#[derive(Debug)]
pub struct IdleTimer {
    window: Duration,
    handle: Option<JoinHandle<()>>,
    sequence: u64,
}

impl IdleTimer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            handle: None,
            sequence: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arma o timer e devolve o número desta armação.
    /// `on_expire` recebe esse número para que o chamador descarte disparos superados.
    pub fn arm<F>(&mut self, on_expire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.sequence += 1;
        let sequence = self.sequence;
        let window = self.window;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            on_expire(sequence);
        }));
        sequence
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_latest(&self, sequence: u64) -> bool {
        self.sequence == sequence
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn binding_twice_attaches_once() {
        let mut tracker = ActivityTracker::default();
        assert!(tracker.bind());
        assert!(!tracker.bind());
        assert_eq!(tracker.len(), UserActivity::ALL.len());
        assert_eq!(tracker.detach_all(), UserActivity::ALL.len());
        assert!(!tracker.is_attached(UserActivity::Click));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_the_window() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = IdleTimer::new(Duration::from_secs(60));

        let counter = fired.clone();
        timer.arm(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(50)).await;

        let counter = fired.clone();
        let latest = timer.arm(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(timer.is_latest(latest));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = IdleTimer::new(Duration::from_secs(1));
        let counter = fired.clone();
        timer.arm(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_armed());
    }
}
