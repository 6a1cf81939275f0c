use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use taskflow_graph::CancellationSignal;

/// Tracks the `CancellationSignal` of every in-flight streamed run, keyed by
/// objective id, so `POST /api/v1/objectives/{id}/cancel` can flip a signal
/// the executor is already polling mid-run (spec.md §8 E2E scenario 4:
/// cancelling an objective while its stream is running must make that
/// stream emit `cancelled` and close). Without this, the only way a
/// `CancellationSignal` ever flips is `CancelOnDrop` on client disconnect —
/// an explicit cancel request never reached it.
#[derive(Default)]
pub struct CancellationRegistry {
    signals: Mutex<HashMap<String, CancellationSignal>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `signal` for `objective_id`, replacing any prior signal
    /// registered under the same id (e.g. a resumed run past an interrupt).
    pub fn register(&self, objective_id: impl Into<String>, signal: CancellationSignal) {
        self.signals.lock().unwrap().insert(objective_id.into(), signal);
    }

    /// Removes the registered signal for `objective_id`, called once its
    /// stream ends (completion, error, or disconnect).
    pub fn unregister(&self, objective_id: &str) {
        self.signals.lock().unwrap().remove(objective_id);
    }

    /// Flips the signal registered for `objective_id`, if any stream is
    /// currently attached to it. Returns whether one was found.
    pub fn cancel(&self, objective_id: &str) -> bool {
        match self.signals.lock().unwrap().get(objective_id) {
            Some(signal) => {
                signal.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn cancel_flips_the_registered_signal() {
        let registry = CancellationRegistry::new();
        let signal: CancellationSignal = Arc::new(AtomicBool::new(false));
        registry.register("obj-1", signal.clone());

        assert!(registry.cancel("obj-1"));
        assert!(signal.load(Ordering::Relaxed));
    }

    #[test]
    fn cancel_on_unknown_objective_is_a_noop() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel("missing"));
    }

    #[test]
    fn unregister_stops_future_cancels_from_finding_the_signal() {
        let registry = CancellationRegistry::new();
        let signal: CancellationSignal = Arc::new(AtomicBool::new(false));
        registry.register("obj-1", signal.clone());
        registry.unregister("obj-1");

        assert!(!registry.cancel("obj-1"));
        assert!(!signal.load(Ordering::Relaxed));
    }
}
