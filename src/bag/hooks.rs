use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::subscription::Subscription;
use crate::value::Value;

/// Arguments of a pending mutation, handed to pre-change hooks.
#[derive(Debug, Clone, Copy)]
pub struct PropertyChange<'a> {
    pub name: &'a str,
    pub old: &'a Value,
    pub new: &'a Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

type BeforeHook = Arc<dyn Fn(&PropertyChange<'_>) -> Verdict + Send + Sync>;
type AfterHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Two-phase change hooks for one property bag.
///
/// `before` hooks run synchronously inside the bag's lock and may veto the
/// mutation. `after` hooks run once the new value is visible.
#[derive(Default)]
pub struct ChangeHooks {
    next_id: AtomicU64,
    before: RwLock<Vec<(u64, BeforeHook)>>,
    after: RwLock<Vec<(u64, AfterHook)>>,
}

impl ChangeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_changing<F>(self: &Arc<Self>, hook: F) -> Subscription
    where
        F: Fn(&PropertyChange<'_>) -> Verdict + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.before
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(hook)));

        let hooks = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(hooks) = hooks.upgrade() {
                hooks
                    .before
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(hook_id, _)| *hook_id != id);
            }
        })
    }

    pub fn on_changed<F>(self: &Arc<Self>, hook: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.after
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(hook)));

        let hooks = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(hooks) = hooks.upgrade() {
                hooks
                    .after
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(hook_id, _)| *hook_id != id);
            }
        })
    }

    /// Stops at the first rejection.
    pub(crate) fn run_before(&self, change: &PropertyChange<'_>) -> Verdict {
        let hooks: Vec<BeforeHook> = self
            .before
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();

        for hook in hooks {
            if hook(change) == Verdict::Reject {
                return Verdict::Reject;
            }
        }
        Verdict::Accept
    }

    pub(crate) fn run_after(&self, name: &str) {
        let hooks: Vec<AfterHook> = self
            .after
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();

        for hook in hooks {
            hook(name);
        }
    }

    pub fn changed_listener_count(&self) -> usize {
        self.after
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn changing_listener_count(&self) -> usize {
        self.before
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
