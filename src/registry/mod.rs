//! In-memory bookkeeping of in-flight backup runs.

use std::collections::HashMap;
use std::sync::Mutex;

/// Run state of a single database. Never persisted; every process start
/// begins idle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum RunState {
    #[default]
    Idle,
    Running,
}

/// Tracks which databases currently have a backup run in flight.
///
/// The registry is the sole owner of the run states. Both operations take
/// the registry-wide lock only for the duration of the map access, never
/// across a dump run, so a slow dump can't block the timer loop on this
/// lock.
#[derive(Debug, Default)]
pub struct RunStateRegistry {
    states: Mutex<HashMap<String, RunState>>,
}

impl RunStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `database` as running if it was idle.
    ///
    /// Returns `false` without mutating anything when a run is already in
    /// flight; the caller is expected to skip its cycle in that case.
    pub fn try_begin(&self, database: &str) -> bool {
        let mut states = self
            .states
            .lock()
            .expect("run-state lock should not be poisoned");

        let state = states.entry(database.to_owned()).or_default();
        match state {
            RunState::Running => false,
            RunState::Idle => {
                *state = RunState::Running;
                true
            }
        }
    }

    /// Marks `database` as idle again.
    ///
    /// Ending an already-idle database is a no-op; a late cleanup racing a
    /// state reset must not be treated as a fault.
    pub fn end(&self, database: &str) {
        let mut states = self
            .states
            .lock()
            .expect("run-state lock should not be poisoned");

        if let Some(state) = states.get_mut(database) {
            *state = RunState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_on_idle_database_succeeds() {
        let registry = RunStateRegistry::new();
        assert!(registry.try_begin("db"));
    }

    #[test]
    fn begin_without_intervening_end_is_rejected() {
        let registry = RunStateRegistry::new();
        assert!(registry.try_begin("db"));
        assert!(!registry.try_begin("db"));
    }

    #[test]
    fn end_makes_database_available_again() {
        let registry = RunStateRegistry::new();
        assert!(registry.try_begin("db"));
        registry.end("db");
        assert!(registry.try_begin("db"));
    }

    #[test]
    fn end_on_idle_database_is_a_noop() {
        let registry = RunStateRegistry::new();
        registry.end("db");
        registry.end("unknown");
        assert!(registry.try_begin("db"));
    }

    #[test]
    fn databases_are_tracked_independently() {
        let registry = RunStateRegistry::new();
        assert!(registry.try_begin("first"));
        assert!(registry.try_begin("second"));
        registry.end("first");
        assert!(registry.try_begin("first"));
        assert!(!registry.try_begin("second"));
    }
}
