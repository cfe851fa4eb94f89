//! Change notifications for external observers
//!
//! Stores publish a [`ChangeEvent`] after their state changed. Observers
//! (typically UI code) subscribe on the dispatcher instead of on individual
//! stores, and always receive events on the main context.

use crate::error::StoreError;

/// A store's "state changed" notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Name of the store that changed
    pub store: &'static str,
    /// What caused the change (e.g. "fetch-order-stats")
    pub cause: &'static str,
    /// Number of persisted rows written by the change
    pub rows_affected: usize,
    /// Set when the change reports a failure
    pub error: Option<StoreError>,
}

impl ChangeEvent {
    pub fn new(store: &'static str, cause: &'static str) -> Self {
        Self {
            store,
            cause,
            rows_affected: 0,
            error: None,
        }
    }

    pub fn with_rows_affected(mut self, rows_affected: usize) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    pub fn with_error(mut self, error: StoreError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Receiver of [`ChangeEvent`]s
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeObserver for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Handle returned by [`Dispatcher::add_observer`](crate::Dispatcher::add_observer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_builders() {
        let event = ChangeEvent::new("stats", "fetch")
            .with_rows_affected(2)
            .with_error(StoreError::generic("boom"));
        assert_eq!(event.rows_affected, 2);
        assert!(event.is_error());
        assert!(!ChangeEvent::new("stats", "fetch").is_error());
    }
}
