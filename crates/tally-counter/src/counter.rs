use crate::error::{ChargeError, SetLimitError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};

/// One node's accounting state. All four fields move together under the
/// counter's lock; `snapshot()` is the only way to read them consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub usage: u64,
    pub limit: u64,
    pub max_usage: u64,
    pub fail_count: u64,
}

#[derive(Debug)]
struct CounterState {
    usage: u64,
    limit: u64,
    max_usage: u64,
    fail_count: u64,
}

/// A single node of a resource-accounting hierarchy.
///
/// Holds usage/limit/high-water/failure state plus a weak link to its
/// parent; it knows nothing about the tree beyond that one link. Chain
/// operations ([`charge`](Self::charge), [`uncharge`](Self::uncharge),
/// [`margin`](Self::margin)) walk parent links up to the root.
#[derive(Debug)]
pub struct ResourceCounter {
    label: Arc<str>,
    parent: Option<Weak<ResourceCounter>>,
    state: Mutex<CounterState>,
}

impl ResourceCounter {
    /// Creates a counter with the given limit. Pass `None` for a root.
    ///
    /// The label names the node in denial errors and logs; the layer that
    /// owns counters uses the owning group's path.
    pub fn new(
        label: impl Into<Arc<str>>,
        parent: Option<&Arc<ResourceCounter>>,
        limit: u64,
    ) -> Arc<ResourceCounter> {
        Arc::new(ResourceCounter {
            label: label.into(),
            parent: parent.map(Arc::downgrade),
            state: Mutex::new(CounterState {
                usage: 0,
                limit,
                max_usage: 0,
                fail_count: 0,
            }),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn parent_counter(&self) -> Option<Arc<ResourceCounter>> {
        // An ancestor that failed to upgrade means the tree above us is
        // gone; treat the chain as ending there rather than panicking.
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CounterState> {
        // Counter locks are only held for a few arithmetic ops; a poisoned
        // lock can only come from a panic inside that window.
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Attempts the increment at this node only.
    fn charge_one(&self, amount: u64) -> Result<(), ChargeError> {
        let mut state = self.lock();
        let new_usage = match state.usage.checked_add(amount) {
            Some(new_usage) if new_usage <= state.limit => new_usage,
            _ => {
                state.fail_count += 1;
                return Err(ChargeError::LimitExceeded {
                    node: Arc::clone(&self.label),
                    usage: state.usage,
                    limit: state.limit,
                    amount,
                });
            }
        };
        state.usage = new_usage;
        state.max_usage = state.max_usage.max(new_usage);
        Ok(())
    }

    fn uncharge_one(&self, amount: u64) {
        let mut state = self.lock();
        debug_assert!(
            state.usage >= amount,
            "uncharge of {amount} from '{}' underflows usage {}",
            self.label,
            state.usage
        );
        state.usage = state.usage.saturating_sub(amount);
    }

    /// Charges `amount` against this node and every ancestor up to the root.
    ///
    /// All-or-nothing across the entire chain: if any ancestor's limit
    /// would be exceeded, the increments already applied to the nodes below
    /// it are rolled back, the denying node's `fail_count` is bumped, and
    /// the error names that node. Locks are taken one node at a time, never
    /// across the whole chain.
    pub fn charge(self: &Arc<Self>, amount: u64) -> Result<(), ChargeError> {
        if amount == 0 {
            return Ok(());
        }
        let mut charged: Vec<Arc<ResourceCounter>> = Vec::new();
        let mut node = Arc::clone(self);
        loop {
            if let Err(err) = node.charge_one(amount) {
                for done in charged.iter().rev() {
                    done.uncharge_one(amount);
                }
                tracing::debug!(
                    target = "tally.counter",
                    node = %err.node(),
                    amount,
                    "charge denied"
                );
                return Err(err);
            }
            charged.push(Arc::clone(&node));
            match node.parent_counter() {
                Some(parent) => node = parent,
                None => return Ok(()),
            }
        }
    }

    /// Removes `amount` from this node and every ancestor.
    ///
    /// Never fails. Uncharging more than was charged is a contract
    /// violation by the caller: debug builds panic, release builds saturate
    /// at zero so one buggy caller cannot poison ancestor counters.
    pub fn uncharge(self: &Arc<Self>, amount: u64) {
        if amount == 0 {
            return;
        }
        let mut node = Arc::clone(self);
        loop {
            node.uncharge_one(amount);
            match node.parent_counter() {
                Some(parent) => node = parent,
                None => return,
            }
        }
    }

    /// Largest amount that could currently be charged through this node
    /// without any ancestor exceeding its limit.
    ///
    /// Advisory and point-in-time only: nothing is reserved, and a later
    /// [`charge`](Self::charge) may still be denied.
    pub fn margin(self: &Arc<Self>) -> u64 {
        let mut headroom = u64::MAX;
        let mut node = Arc::clone(self);
        loop {
            {
                let state = node.lock();
                headroom = headroom.min(state.limit.saturating_sub(state.usage));
            }
            match node.parent_counter() {
                Some(parent) => node = parent,
                None => return headroom,
            }
        }
    }

    pub fn usage(&self) -> u64 {
        self.lock().usage
    }

    pub fn limit(&self) -> u64 {
        self.lock().limit
    }

    /// Sets this node's limit. A limit below the current usage is refused:
    /// usage never exceeds limit, and that invariant is enforced by denying
    /// charges, not by clamping existing usage.
    pub fn set_limit(&self, limit: u64) -> Result<(), SetLimitError> {
        let mut state = self.lock();
        if limit < state.usage {
            return Err(SetLimitError::BelowUsage {
                requested: limit,
                usage: state.usage,
            });
        }
        state.limit = limit;
        Ok(())
    }

    pub fn max_usage(&self) -> u64 {
        self.lock().max_usage
    }

    /// Resets the high-water mark to the current usage (not to zero).
    pub fn reset_max_usage(&self) {
        let mut state = self.lock();
        state.max_usage = state.usage;
    }

    pub fn fail_count(&self) -> u64 {
        self.lock().fail_count
    }

    pub fn reset_fail_count(&self) {
        self.lock().fail_count = 0;
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let state = self.lock();
        CounterSnapshot {
            usage: state.usage,
            limit: state.limit,
            max_usage: state.max_usage,
            fail_count: state.fail_count,
        }
    }
}
