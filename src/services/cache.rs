// src/services/cache.rs

use std::sync::{Arc, RwLock};

/// Cache local compartilhado, reconstruído por inteiro a cada snapshot.
#[derive(Debug)]
pub struct Cache<T> {
    items: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T: Clone> Cache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitui o conteúdo só se `still_valid` confirmar, sob o lock de escrita.
    /// Uma limpeza concorrente fica ordenada antes ou depois, nunca no meio.
    pub fn replace_if(&self, items: Vec<T>, still_valid: impl FnOnce() -> bool) -> bool {
        let mut guard = self.items.write().unwrap_or_else(|p| p.into_inner());
        if !still_valid() {
            return false;
        }
        *guard = items;
        true
    }

    pub fn clear(&self) {
        self.items.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.read().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.with(|items| items.iter().find(|item| predicate(item)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_is_skipped_when_no_longer_valid() {
        let cache = Cache::new();
        assert!(cache.replace_if(vec![1, 2], || true));
        assert!(!cache.replace_if(vec![3], || false));
        assert_eq!(cache.snapshot(), vec![1, 2]);
    }
}
