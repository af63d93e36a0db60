//! Process-wide record of confirmed dependencies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use super::types::DependencyStatus;

/// Per-dependency slot. Holding the lock is what serialises
/// check-then-install for that dependency.
pub(crate) type StatusSlot = Arc<AsyncMutex<DependencyStatus>>;

/// Which dependencies are confirmed present.
///
/// Entries are created lazily on first use and only move back to
/// `Unknown` through [`invalidate`](Self::invalidate).
#[derive(Debug, Default)]
pub struct ProvisionState {
    slots: Mutex<HashMap<String, StatusSlot>>,
}

impl ProvisionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn slot(&self, name: &str) -> StatusSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(DependencyStatus::Unknown))),
        )
    }

    /// Current status without waiting. The flag is true while a check or
    /// install holds the lock; the status is then the last settled one,
    /// which for a dependency being provisioned is `Unknown`.
    pub fn peek(&self, name: &str) -> (DependencyStatus, bool) {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get(name) {
                Some(slot) => Arc::clone(slot),
                None => return (DependencyStatus::Unknown, false),
            }
        };

        let peeked = match slot.try_lock() {
            Ok(status) => (status.clone(), false),
            Err(_) => (DependencyStatus::Unknown, true),
        };
        peeked
    }

    /// Forgets the recorded status, waiting for any in-flight install first.
    pub async fn invalidate(&self, name: &str) {
        let slot = self.slot(name);
        *slot.lock().await = DependencyStatus::Unknown;
    }

    /// Forgets every recorded status.
    pub async fn invalidate_all(&self) {
        let slots: Vec<StatusSlot> = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.values().cloned().collect()
        };
        for slot in slots {
            *slot.lock().await = DependencyStatus::Unknown;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_unknown_until_recorded() {
        let state = ProvisionState::new();
        assert_eq!(state.peek("model"), (DependencyStatus::Unknown, false));

        *state.slot("model").lock().await = DependencyStatus::Ready {
            checked_at: Utc::now(),
        };
        assert!(state.peek("model").0.is_ready());
    }

    #[tokio::test]
    async fn test_peek_reports_in_progress() {
        let state = ProvisionState::new();
        let slot = state.slot("torch");
        let _held = slot.lock().await;

        let (status, in_progress) = state.peek("torch");
        assert_eq!(status, DependencyStatus::Unknown);
        assert!(in_progress);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let state = ProvisionState::new();
        for name in ["a", "b"] {
            *state.slot(name).lock().await = DependencyStatus::Ready {
                checked_at: Utc::now(),
            };
        }

        state.invalidate("a").await;
        assert_eq!(state.peek("a").0, DependencyStatus::Unknown);
        assert!(state.peek("b").0.is_ready());

        state.invalidate_all().await;
        assert_eq!(state.peek("b").0, DependencyStatus::Unknown);
    }

    #[test]
    fn test_same_slot_for_same_name() {
        let state = ProvisionState::new();
        assert!(Arc::ptr_eq(&state.slot("x"), &state.slot("x")));
        assert!(!Arc::ptr_eq(&state.slot("x"), &state.slot("y")));
    }
}
