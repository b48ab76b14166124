//! Observer seams between the core and its collaborators
//!
//! Dashboards, persistence sinks, maintenance engines, and actuator bridges
//! attach here. Every observer returns `anyhow::Result<()>`; failures and panics
//! are logged per observer and never reach the fusion loop or a safety check.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::types::{FusedSensorData, PredictionResult, SafetyAlert};

/// Receives every published fused snapshot.
pub trait OnFusedData: Send + Sync {
    fn on_fused_data(&self, data: &FusedSensorData) -> anyhow::Result<()>;
}

/// Receives material predictions for published snapshots.
pub trait OnPrediction: Send + Sync {
    fn on_prediction(&self, prediction: &PredictionResult) -> anyhow::Result<()>;
}

/// Receives every new safety alert.
pub trait OnAlert: Send + Sync {
    fn on_alert(&self, alert: &SafetyAlert) -> anyhow::Result<()>;
}

/// Invoked once when an emergency stop is triggered.
pub trait ShutdownHook: Send + Sync {
    fn on_shutdown(&self, reason: &str) -> anyhow::Result<()>;
}

impl<F> OnFusedData for F
where
    F: Fn(&FusedSensorData) -> anyhow::Result<()> + Send + Sync,
{
    fn on_fused_data(&self, data: &FusedSensorData) -> anyhow::Result<()> {
        self(data)
    }
}

impl<F> OnPrediction for F
where
    F: Fn(&PredictionResult) -> anyhow::Result<()> + Send + Sync,
{
    fn on_prediction(&self, prediction: &PredictionResult) -> anyhow::Result<()> {
        self(prediction)
    }
}

impl<F> OnAlert for F
where
    F: Fn(&SafetyAlert) -> anyhow::Result<()> + Send + Sync,
{
    fn on_alert(&self, alert: &SafetyAlert) -> anyhow::Result<()> {
        self(alert)
    }
}

impl<F> ShutdownHook for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    fn on_shutdown(&self, reason: &str) -> anyhow::Result<()> {
        self(reason)
    }
}

/// Token returned on registration, used to remove the observer later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverHandle(u64);

/// Ordered set of observers of one kind.
///
/// Dispatch iterates over a snapshot, so observers may register or unregister
/// others from inside a callback without deadlocking.
pub struct ObserverRegistry<O: ?Sized> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ObserverHandle, Arc<O>)>>,
}

impl<O: ?Sized> Default for ObserverRegistry<O> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<O: ?Sized> ObserverRegistry<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<O>) -> ObserverHandle {
        let handle = ObserverHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((handle, observer));
        handle
    }

    /// Returns false if the handle was unknown or already removed.
    pub fn unregister(&self, handle: ObserverHandle) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(h, _)| *h != handle);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<O>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect()
    }

    /// Call every observer in registration order, isolating failures.
    ///
    /// Returns the number of observers that returned an error or panicked.
    pub fn dispatch(&self, kind: &'static str, mut call: impl FnMut(&O) -> anyhow::Result<()>) -> usize {
        let mut failures = 0;
        for observer in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| call(&*observer))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    error!(observer = kind, error = %e, "Observer failed");
                }
                Err(payload) => {
                    failures += 1;
                    error!(observer = kind, panic = %panic_message(payload.as_ref()), "Observer panicked");
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_failing_observer_does_not_block_others() {
        let registry: ObserverRegistry<dyn OnAlert> = ObserverRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        registry.register(Arc::new(|_: &SafetyAlert| -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }));
        registry.register(Arc::new(|_: &SafetyAlert| -> anyhow::Result<()> {
            panic!("observer bug")
        }));
        let counter = Arc::clone(&calls);
        registry.register(Arc::new(move |_: &SafetyAlert| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let count = AtomicUsize::new(0);
        let failures = registry.dispatch("alert", |o| {
            count.fetch_add(1, Ordering::SeqCst);
            o.on_alert(&crate::safety::test_alert())
        });

        assert_eq!(failures, 2);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_removes_observer() {
        let registry: ObserverRegistry<dyn ShutdownHook> = ObserverRegistry::new();
        let a = registry.register(Arc::new(|_: &str| -> anyhow::Result<()> { Ok(()) }));
        let b = registry.register(Arc::new(|_: &str| -> anyhow::Result<()> { Ok(()) }));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.unregister(a));
        assert!(!registry.unregister(a));
        assert_eq!(registry.len(), 1);
    }
}
