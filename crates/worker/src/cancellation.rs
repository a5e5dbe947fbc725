//! Cancellation tokens for the generations running in this process.

use std::collections::HashMap;
use std::sync::Mutex;

use lullaby_core::types::DbId;
use tokio_util::sync::CancellationToken;

/// Maps a story id to the token of its running attempt.
#[derive(Default)]
pub struct CancellationRegistry {
    running: Mutex<HashMap<DbId, (i32, CancellationToken)>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a token for a newly claimed attempt.
    pub fn register(&self, story_id: DbId, attempt: i32) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut running) = self.running.lock() {
            running.insert(story_id, (attempt, token.clone()));
        }
        token
    }

    /// Signal the running attempt for `story_id`, if any.
    ///
    /// Returns `true` when a token was found.
    pub fn cancel(&self, story_id: DbId) -> bool {
        let token = self
            .running
            .lock()
            .ok()
            .and_then(|running| running.get(&story_id).map(|(_, t)| t.clone()));
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal every running attempt.
    pub fn cancel_all(&self) {
        if let Ok(running) = self.running.lock() {
            for (_, token) in running.values() {
                token.cancel();
            }
        }
    }

    /// Forget a finished attempt. A newer attempt registered under the same
    /// story is left alone.
    pub fn remove(&self, story_id: DbId, attempt: i32) {
        if let Ok(mut running) = self.running.lock() {
            if running.get(&story_id).is_some_and(|(a, _)| *a == attempt) {
                running.remove(&story_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.running.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_fires_registered_token() {
        let registry = CancellationRegistry::new();
        let token = registry.register(1, 1);
        assert!(registry.cancel(1));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(2));
    }

    #[test]
    fn remove_ignores_other_attempts() {
        let registry = CancellationRegistry::new();
        registry.register(1, 1);
        let newer = registry.register(1, 2);

        registry.remove(1, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.cancel(1));
        assert!(newer.is_cancelled());

        registry.remove(1, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_all_fires_everything() {
        let registry = CancellationRegistry::new();
        let a = registry.register(1, 1);
        let b = registry.register(2, 1);
        registry.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
