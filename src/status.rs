//! Observable run/pause state for the watch engine.
//!
//! The polling loop is started once at engine startup and never stopped;
//! [`RunState`] only gates whether a tick performs work. The state lives in
//! a [`StatusCell`] that any interested party (UI label, tests) can read or
//! subscribe to, with read-after-write consistency: a transition is visible
//! to the very next tick evaluation.

use parking_lot::{Mutex, RwLock};

/// Whether the engine is actively polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

impl RunState {
    /// Display name for UI status labels.
    pub fn display_name(&self) -> &'static str {
        match self {
            RunState::Running => "Running",
            RunState::Paused => "Paused",
        }
    }
}

type StatusCallback = Box<dyn Fn(RunState) + Send + Sync>;

/// Shared, observable holder for the engine's [`RunState`].
///
/// Subscribers are invoked on every transition, after the new state is
/// visible to readers and outside the state lock, so a callback may call
/// [`StatusCell::get`] without deadlocking. There is no unsubscribe: the
/// engine (and its observers) live for the process lifetime.
pub struct StatusCell {
    state: RwLock<RunState>,
    subscribers: Mutex<Vec<StatusCallback>>,
}

impl StatusCell {
    pub fn new(initial: RunState) -> Self {
        Self {
            state: RwLock::new(initial),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Current state.
    pub fn get(&self) -> RunState {
        *self.state.read()
    }

    /// Transition to `next`. Returns `true` if the state actually changed;
    /// subscribers are only notified on a change.
    pub fn set(&self, next: RunState) -> bool {
        {
            let mut state = self.state.write();
            if *state == next {
                return false;
            }
            *state = next;
        }
        for callback in self.subscribers.lock().iter() {
            callback(next);
        }
        true
    }

    /// Register a callback invoked on every state transition.
    pub fn subscribe(&self, callback: impl Fn(RunState) + Send + Sync + 'static) {
        self.subscribers.lock().push(Box::new(callback));
    }
}

impl std::fmt::Debug for StatusCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCell")
            .field("state", &self.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_read_after_write() {
        let cell = StatusCell::new(RunState::Running);
        assert_eq!(cell.get(), RunState::Running);
        cell.set(RunState::Paused);
        assert_eq!(cell.get(), RunState::Paused);
    }

    #[test]
    fn test_set_reports_change() {
        let cell = StatusCell::new(RunState::Running);
        assert!(cell.set(RunState::Paused));
        assert!(!cell.set(RunState::Paused));
        assert!(cell.set(RunState::Running));
    }

    #[test]
    fn test_subscriber_notified_on_transition() {
        let cell = StatusCell::new(RunState::Running);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        cell.subscribe(move |state| {
            if state == RunState::Paused {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        });
        cell.set(RunState::Paused);
        cell.set(RunState::Paused);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscriber_can_read_state() {
        let cell = Arc::new(StatusCell::new(RunState::Running));
        let cell_clone = Arc::clone(&cell);
        let observed = Arc::new(Mutex::new(None));
        let observed_clone = Arc::clone(&observed);
        cell.subscribe(move |_| {
            *observed_clone.lock() = Some(cell_clone.get());
        });
        cell.set(RunState::Paused);
        assert_eq!(*observed.lock(), Some(RunState::Paused));
    }
}
