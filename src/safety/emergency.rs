//! Emergency stop latch with shutdown hooks and recorded reset

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::observers::{ObserverHandle, ObserverRegistry, ShutdownHook};

/// Latched emergency state. Stays active until an explicit reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyState {
    pub active: bool,
    pub reason: Option<String>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub last_reset_by: Option<String>,
    pub last_reset_at: Option<DateTime<Utc>>,
    /// Triggers that actually activated the latch
    pub trigger_count: u64,
}

/// Emergency state plus how long the current stop has lasted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyStatus {
    #[serde(flatten)]
    pub state: EmergencyState,
    pub duration_seconds: Option<f64>,
}

/// Idempotent emergency stop. The first `trigger` wins; later ones are no-ops
/// until `reset`. Authorization policy belongs to the caller, this only
/// records who reset it.
#[derive(Default)]
pub struct EmergencyController {
    state: Mutex<EmergencyState>,
    hooks: ObserverRegistry<dyn ShutdownHook>,
}

impl EmergencyController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EmergencyState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register_shutdown_hook(&self, hook: Arc<dyn ShutdownHook>) -> ObserverHandle {
        self.hooks.register(hook)
    }

    pub fn register_shutdown_callback<F>(&self, f: F) -> ObserverHandle
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.register(Arc::new(f))
    }

    pub fn unregister_shutdown_hook(&self, handle: ObserverHandle) -> bool {
        self.hooks.unregister(handle)
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Latch the emergency stop and run every shutdown hook once.
    ///
    /// Returns false (and runs nothing) when already active.
    pub fn trigger(&self, reason: &str) -> bool {
        {
            let mut state = self.lock();
            if state.active {
                debug!(reason, "Emergency stop already active, trigger ignored");
                return false;
            }
            state.active = true;
            state.reason = Some(reason.to_string());
            state.triggered_at = Some(Utc::now());
            state.trigger_count += 1;
        }

        error!(reason, "EMERGENCY STOP TRIGGERED");
        let failures = self.hooks.dispatch("shutdown_hook", |hook| hook.on_shutdown(reason));
        if failures > 0 {
            error!(failures, "Shutdown hooks failed during emergency stop");
        }
        true
    }

    /// Clear the latch, recording who authorized it. Always succeeds.
    pub fn reset(&self, authorized_by: &str) -> bool {
        let mut state = self.lock();
        let was_active = state.active;
        state.active = false;
        state.reason = None;
        state.triggered_at = None;
        state.last_reset_by = Some(authorized_by.to_string());
        state.last_reset_at = Some(Utc::now());
        drop(state);

        if was_active {
            warn!(authorized_by, "Emergency stop reset");
        } else {
            debug!(authorized_by, "Emergency reset requested while inactive");
        }
        true
    }

    pub fn state(&self) -> EmergencyState {
        self.lock().clone()
    }

    pub fn status(&self) -> EmergencyStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> EmergencyStatus {
        let state = self.state();
        let duration_seconds = state
            .triggered_at
            .filter(|_| state.active)
            .map(|t| (now - t).num_milliseconds().max(0) as f64 / 1000.0);
        EmergencyStatus {
            state,
            duration_seconds,
        }
    }
}
