//! The slice of the outer router a match talks to

use crate::clock::{Clock, SystemClock};
use crate::config::RouterOptions;
use crate::id::MatchId;
use crate::share::{empty_object, replace_equal_deep};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 1000;

/// Broadcast whenever a match mutates its observable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub match_id: MatchId,
}

/// Router-wide context shared by every match
#[derive(Debug)]
pub struct RouterContext {
    options: RouterOptions,
    location_search: RwLock<Arc<Value>>,
    clock: Arc<dyn Clock>,
    broadcast_tx: broadcast::Sender<MatchEvent>,
}

impl RouterContext {
    pub fn new(options: RouterOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    pub fn with_clock(options: RouterOptions, clock: Arc<dyn Clock>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            options,
            location_search: RwLock::new(empty_object()),
            clock,
            broadcast_tx,
        }
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The current location's raw search, read by root matches
    pub fn location_search(&self) -> Arc<Value> {
        Arc::clone(&self.location_search.read())
    }

    /// Replaces the location search, keeping the old reference when unchanged
    pub fn set_location_search(&self, search: Value) {
        let mut current = self.location_search.write();
        *current = replace_equal_deep(&current, search);
    }

    /// Subscribe to match change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Tell subscribers that a match changed
    pub fn notify(&self, match_id: &MatchId) {
        // No receivers is fine: nothing is rendering yet.
        let _ = self.broadcast_tx.send(MatchEvent {
            match_id: match_id.clone(),
        });
    }
}

impl Default for RouterContext {
    fn default() -> Self {
        Self::new(RouterOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_location_search_is_shared_when_equal() {
        let router = RouterContext::default();
        router.set_location_search(json!({"q": "rust"}));
        let first = router.location_search();

        router.set_location_search(json!({"q": "rust"}));
        assert!(Arc::ptr_eq(&first, &router.location_search()));

        router.set_location_search(json!({"q": "tokio"}));
        assert!(!Arc::ptr_eq(&first, &router.location_search()));
    }

    #[tokio::test]
    async fn test_notify_reaches_subscribers() {
        let router = RouterContext::default();
        let mut rx = router.subscribe();

        router.notify(&MatchId::new("/users/1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.match_id, MatchId::new("/users/1"));
    }

    #[test]
    fn test_notify_without_subscribers() {
        RouterContext::default().notify(&MatchId::new("/"));
    }
}
