//! Undo ledger: first-seen originals captured during a recording window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::bag::PropertyChange;
use crate::schema::Schema;
use crate::value::Value;

/// Outcome of re-assigning one captured original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertStep {
    Restored,
    AlreadyCurrent,
    Rejected,
}

/// What a revert did, name by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevertReport {
    pub restored: Vec<String>,
    pub unchanged: Vec<String>,
    /// Vetoed by a pre-change hook.
    pub rejected: Vec<String>,
    /// Captured names the schema no longer declares.
    pub skipped: Vec<String>,
}

impl RevertReport {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Default)]
pub struct UndoLedger {
    recording: AtomicBool,
    // Capture order is kept so reverts replay deterministically.
    originals: Mutex<Vec<(String, Value)>>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, Value)>> {
        self.originals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin_recording(&self) {
        self.recording.store(true, Ordering::SeqCst);
    }

    pub fn end_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Record `change.old` unless `change.name` was already captured.
    pub fn capture(&self, change: &PropertyChange<'_>) {
        if !self.is_recording() {
            return;
        }
        let mut originals = self.lock();
        if originals.iter().any(|(name, _)| name == change.name) {
            return;
        }
        originals.push((change.name.to_string(), change.old.clone()));
    }

    pub fn original(&self, name: &str) -> Option<Value> {
        self.lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn captured_names(&self) -> Vec<String> {
        self.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Start a new undo window without touching live values.
    pub fn reset_initial_state(&self) {
        self.lock().clear();
    }

    /// Drain the ledger and hand each original back to `apply`.
    ///
    /// Names missing from `schema` are skipped and the revert carries on.
    /// Capture is suspended while `apply` runs so the revert does not record
    /// itself.
    pub fn revert_with<F>(&self, schema: &Schema, mut apply: F) -> RevertReport
    where
        F: FnMut(&str, Value) -> RevertStep,
    {
        let originals = std::mem::take(&mut *self.lock());
        let was_recording = self.recording.swap(false, Ordering::SeqCst);

        let mut report = RevertReport::default();
        for (name, original) in originals {
            if !schema.contains(&name) {
                warn!(
                    settings = schema.type_name(),
                    property = %name,
                    "skipping revert of undeclared property"
                );
                report.skipped.push(name);
                continue;
            }
            match apply(&name, original) {
                RevertStep::Restored => report.restored.push(name),
                RevertStep::AlreadyCurrent => report.unchanged.push(name),
                RevertStep::Rejected => report.rejected.push(name),
            }
        }

        self.recording.store(was_recording, Ordering::SeqCst);
        debug!(
            settings = schema.type_name(),
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            rejected = report.rejected.len(),
            "reverted recorded changes"
        );
        report
    }
}
