use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::window::ClientWindow;

pub type SharedWindow = Arc<Mutex<ClientWindow>>;

/// One window per client identity.
///
/// The map lock only guards structure (insert/remove). Timestamp mutation goes
/// through the per-window mutex, so different clients never contend with each
/// other and the map lock is never held while a caller mutates a window.
#[derive(Debug, Default)]
pub struct ClientWindowStore {
    clients: RwLock<HashMap<String, SharedWindow>>,
}

pub fn lock_window(window: &SharedWindow) -> MutexGuard<'_, ClientWindow> {
    window.lock().unwrap_or_else(|e| e.into_inner())
}

impl ClientWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the window for `identity`, creating it if needed. Concurrent
    /// first requests for the same identity all receive the same window.
    pub fn get_or_create(&self, identity: &str) -> SharedWindow {
        {
            let map = self.clients.read().unwrap_or_else(|e| e.into_inner());
            if let Some(window) = map.get(identity) {
                return Arc::clone(window);
            }
        }

        let mut map = self.clients.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(map.entry(identity.to_string()).or_default())
    }

    /// Visits every window while holding the map read lock; each window is
    /// locked only for the duration of its callback.
    pub fn for_each(&self, mut f: impl FnMut(&str, &ClientWindow)) {
        let map = self.clients.read().unwrap_or_else(|e| e.into_inner());
        for (identity, window) in map.iter() {
            let guard = lock_window(window);
            f(identity.as_str(), &*guard);
        }
    }

    /// Removes `identity` only if `predicate` still holds under the structural
    /// lock. The removed window is retired while its own lock is held, so a
    /// caller that fetched it earlier sees the flag before recording into it.
    pub fn remove_if(&self, identity: &str, predicate: impl Fn(&ClientWindow) -> bool) -> bool {
        let mut map = self.clients.write().unwrap_or_else(|e| e.into_inner());
        let Some(window) = map.get(identity) else {
            return false;
        };
        {
            let mut guard = lock_window(window);
            if !predicate(&*guard) {
                return false;
            }
            guard.retire();
        }
        map.remove(identity);
        true
    }

    #[cfg(test)]
    pub fn contains(&self, identity: &str) -> bool {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tokio::time::Instant;

    #[test]
    fn concurrent_first_access_yields_one_window() {
        let store = Arc::new(ClientWindowStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get_or_create("203.0.113.9"))
            })
            .collect();

        let windows: Vec<SharedWindow> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(store.len(), 1);
        assert!(windows.iter().all(|w| Arc::ptr_eq(w, &windows[0])));
    }

    #[test]
    fn remove_if_rechecks_predicate() {
        let store = ClientWindowStore::new();
        let window = store.get_or_create("a");
        lock_window(&window).record(Instant::now());

        assert!(!store.remove_if("a", |w| w.is_empty()));
        assert!(store.contains("a"));
        assert!(store.remove_if("a", |w| !w.is_empty()));
        assert!(!store.contains("a"));
        assert!(!store.remove_if("missing", |_| true));
    }

    #[test]
    fn removed_window_is_retired() {
        let store = ClientWindowStore::new();
        let stale = store.get_or_create("a");
        assert!(!lock_window(&stale).is_retired());

        assert!(store.remove_if("a", |w| w.is_empty()));
        assert!(lock_window(&stale).is_retired());

        let fresh = store.get_or_create("a");
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert!(!lock_window(&fresh).is_retired());
    }

    #[test]
    fn for_each_visits_all_clients() {
        let store = ClientWindowStore::new();
        store.get_or_create("a");
        store.get_or_create("b");
        let mut seen = Vec::new();
        store.for_each(|id, _| seen.push(id.to_string()));
        seen.sort();
        assert_eq!(seen, vec!["a", "b"]);
    }
}
