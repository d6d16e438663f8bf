//! Property storage with equality-gated, vetoable mutation.

mod hooks;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use tracing::debug;

use crate::value::Value;

pub use hooks::{ChangeHooks, PropertyChange, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Fire post-change notification after commit.
    pub notify: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        SetOptions { notify: true }
    }
}

impl SetOptions {
    pub fn quiet() -> Self {
        SetOptions { notify: false }
    }
}

static NEXT_BAG_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    // Bags this thread is delivering post-change for, with the notifications
    // their listeners raised in the meantime.
    static DELIVERING: RefCell<HashMap<u64, VecDeque<String>>> = RefCell::new(HashMap::new());
}

/// Hands the delivery turn to the next ticket, even when a listener panics.
struct TurnGuard<'a> {
    bag: &'a PropertyBag,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        DELIVERING.with(|delivering| delivering.borrow_mut().remove(&self.bag.id));
        *self.bag.lock_serving() += 1;
        self.bag.turn.notify_all();
    }
}

/// Name to value map owned by one settings instance.
///
/// Mutations are serialized by a writer lock that is held while pre-change
/// hooks run. Reads only take the value lock, so a hook may read the bag
/// (but not write it).
///
/// Every committed change takes a ticket while the writer lock is held, and
/// post-change listeners run on the committing thread once every earlier
/// ticket was delivered. Listeners therefore observe changes in commit order.
/// A listener that mutates the same bag does not wait for a ticket: its
/// notification is delivered right after the current listener returns, still
/// on the same thread.
pub struct PropertyBag {
    id: u64,
    values: RwLock<HashMap<String, Value>>,
    writer: Mutex<()>,
    hooks: Arc<ChangeHooks>,
    issued: AtomicU64,
    serving: Mutex<u64>,
    turn: Condvar,
}

impl Default for PropertyBag {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyBag {
    pub fn new() -> Self {
        PropertyBag {
            id: NEXT_BAG_ID.fetch_add(1, Ordering::Relaxed),
            values: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
            hooks: Arc::new(ChangeHooks::new()),
            issued: AtomicU64::new(0),
            serving: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    pub fn with_values(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        let bag = PropertyBag::new();
        bag.write_values().extend(values);
        bag
    }

    pub fn hooks(&self) -> &Arc<ChangeHooks> {
        &self.hooks
    }

    fn read_values(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_values(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_serving(&self) -> MutexGuard<'_, u64> {
        self.serving.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored value, or `Value::Null` when absent.
    pub fn get(&self, name: &str) -> Value {
        self.read_values().get(name).cloned().unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_values().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read_values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_values().is_empty()
    }

    /// Consistent copy of every stored value.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.read_values()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Set `name` to `value`. Returns `true` when the value changed.
    ///
    /// `on_accept` runs after every pre-change hook accepted and before the
    /// value is committed, still under the writer lock. When this returns
    /// `true` the post-change listeners have already run, unless the call was
    /// made from inside one of them.
    pub fn set<F>(&self, name: &str, value: Value, options: SetOptions, on_accept: F) -> bool
    where
        F: FnOnce(&PropertyChange<'_>),
    {
        let ticket = {
            let _writer = self.lock_writer();
            let old = self.get(name);
            if old == value {
                return false;
            }

            let change = PropertyChange {
                name,
                old: &old,
                new: &value,
            };
            if self.hooks.run_before(&change) == Verdict::Reject {
                debug!(property = name, "property change rejected");
                return false;
            }
            on_accept(&change);

            self.write_values().insert(name.to_string(), value);
            if !options.notify {
                return true;
            }
            self.enqueue(name)
        };

        if let Some(ticket) = ticket {
            self.deliver(ticket, name.to_string());
        }
        true
    }

    /// Raise post-change for `name` without touching its value.
    pub fn notify_changed(&self, name: &str) {
        let ticket = {
            let _writer = self.lock_writer();
            self.enqueue(name)
        };
        if let Some(ticket) = ticket {
            self.deliver(ticket, name.to_string());
        }
    }

    /// Called with the writer lock held. `None` when the notification was
    /// handed to a delivery already running on this thread.
    fn enqueue(&self, name: &str) -> Option<u64> {
        let nested = DELIVERING.with(|delivering| {
            match delivering.borrow_mut().get_mut(&self.id) {
                Some(queue) => {
                    queue.push_back(name.to_string());
                    true
                }
                None => false,
            }
        });
        if nested {
            None
        } else {
            Some(self.issued.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn deliver(&self, ticket: u64, name: String) {
        {
            let mut serving = self.lock_serving();
            while *serving != ticket {
                serving = self
                    .turn
                    .wait(serving)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        DELIVERING.with(|delivering| {
            delivering.borrow_mut().insert(self.id, VecDeque::new());
        });
        let _turn = TurnGuard { bag: self };

        let mut next = Some(name);
        while let Some(name) = next {
            self.hooks.run_after(&name);
            next = DELIVERING.with(|delivering| {
                delivering
                    .borrow_mut()
                    .get_mut(&self.id)
                    .and_then(VecDeque::pop_front)
            });
        }
    }
}
