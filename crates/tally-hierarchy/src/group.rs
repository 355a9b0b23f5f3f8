use crate::error::{CreateError, DestroyError, LimitError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tally_counter::{ChargeError, CounterSnapshot, ResourceCounter};

/// One node of a resource-control hierarchy.
///
/// Owns exactly one counter and the set of its child groups; holds only a
/// weak back-reference to its parent. Tree restructuring (create/destroy)
/// is serialized per parent by the child-set lock; counter traffic never
/// takes that lock.
pub struct AccountingGroup {
    path: Arc<str>,
    counter: Arc<ResourceCounter>,
    parent: Option<Weak<AccountingGroup>>,
    children: Mutex<HashMap<String, Arc<AccountingGroup>>>,
    // Live subject references; a group with attached subjects is not
    // destroyable.
    pub(crate) subjects: AtomicUsize,
}

impl std::fmt::Debug for AccountingGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountingGroup")
            .field("path", &self.path)
            .field("counter", &self.counter.snapshot())
            .field("subjects", &self.subjects.load(Ordering::Relaxed))
            .finish()
    }
}

/// Cheap cloneable handle to an [`AccountingGroup`].
#[derive(Debug, Clone)]
pub struct GroupHandle {
    pub(crate) inner: Arc<AccountingGroup>,
}

/// Recursive serde snapshot of a subtree, intended for an external
/// attribute surface (file attributes, RPC, CLI).
///
/// Each group's four counter fields are read atomically, but the tree is
/// not a single consistent cut: concurrent charges may land between
/// sibling snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub path: String,
    pub counter: CounterSnapshot,
    pub subjects: usize,
    pub children: Vec<GroupReport>,
}

impl GroupHandle {
    /// Creates the root of a new hierarchy instance with the given limit.
    ///
    /// The root's limit represents the platform ceiling and cannot be
    /// changed afterwards; roots are expected to be created once at system
    /// start and live for the process lifetime.
    pub fn new_root(limit: u64) -> GroupHandle {
        let path: Arc<str> = Arc::from("/");
        let counter = ResourceCounter::new(Arc::clone(&path), None, limit);
        GroupHandle {
            inner: Arc::new(AccountingGroup {
                path,
                counter,
                parent: None,
                children: Mutex::new(HashMap::new()),
                subjects: AtomicUsize::new(0),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Last path segment, or `/` for the root.
    pub fn name(&self) -> &str {
        match self.inner.path.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => name,
            _ => "/",
        }
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn parent(&self) -> Option<GroupHandle> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| GroupHandle { inner })
    }

    pub fn same_group(&self, other: &GroupHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock_children(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AccountingGroup>>> {
        self.inner
            .children
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Creates a child group whose limit is inherited from this group's
    /// current limit.
    pub fn create_child(&self, name: &str) -> Result<GroupHandle, CreateError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(CreateError::InvalidName(name.to_string()));
        }
        let mut children = self.lock_children();
        if children.contains_key(name) {
            return Err(CreateError::AlreadyExists {
                parent: self.inner.path.to_string(),
                name: name.to_string(),
            });
        }
        let path: Arc<str> = if self.is_root() {
            Arc::from(format!("/{name}"))
        } else {
            Arc::from(format!("{}/{name}", self.inner.path))
        };
        let counter = ResourceCounter::new(
            Arc::clone(&path),
            Some(&self.inner.counter),
            self.inner.counter.limit(),
        );
        let child = Arc::new(AccountingGroup {
            path,
            counter,
            parent: Some(Arc::downgrade(&self.inner)),
            children: Mutex::new(HashMap::new()),
            subjects: AtomicUsize::new(0),
        });
        children.insert(name.to_string(), Arc::clone(&child));
        tracing::debug!(target = "tally.hierarchy", path = %child.path, "group created");
        Ok(GroupHandle { inner: child })
    }

    pub fn child(&self, name: &str) -> Option<GroupHandle> {
        self.lock_children()
            .get(name)
            .map(|inner| GroupHandle {
                inner: Arc::clone(inner),
            })
    }

    /// Destroys the named child group.
    ///
    /// Refused while the child still accounts usage, still has children of
    /// its own, or still has subjects attached — outstanding charges must
    /// be migrated out first. Holding the child-set lock across the checks
    /// excludes concurrent create/destroy at the same point in the tree.
    pub fn destroy_child(&self, name: &str) -> Result<(), DestroyError> {
        let mut children = self.lock_children();
        let child = children
            .get(name)
            .ok_or_else(|| DestroyError::NotFound(name.to_string()))?;

        let usage = child.counter.usage();
        if usage > 0 {
            return Err(DestroyError::NotEmpty {
                path: child.path.to_string(),
                usage,
            });
        }
        if !child
            .children
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .is_empty()
        {
            return Err(DestroyError::HasChildren {
                path: child.path.to_string(),
            });
        }
        if child.subjects.load(Ordering::SeqCst) != 0 {
            return Err(DestroyError::Busy {
                path: child.path.to_string(),
            });
        }

        let child = children.remove(name).expect("child present under lock");
        tracing::debug!(target = "tally.hierarchy", path = %child.path, "group destroyed");
        Ok(())
    }

    /// Charges `amount` against this group and every ancestor.
    /// All-or-nothing across the chain; see [`ResourceCounter::charge`].
    pub fn charge(&self, amount: u64) -> Result<(), ChargeError> {
        self.inner.counter.charge(amount)
    }

    /// Removes `amount` from this group and every ancestor.
    pub fn uncharge(&self, amount: u64) {
        self.inner.counter.uncharge(amount);
    }

    /// Headroom before any ancestor's limit is hit. Advisory only.
    pub fn margin(&self) -> u64 {
        self.inner.counter.margin()
    }

    pub fn usage(&self) -> u64 {
        self.inner.counter.usage()
    }

    pub fn limit(&self) -> u64 {
        self.inner.counter.limit()
    }

    /// Sets this group's limit. Rejected on the root, and rejected below
    /// the group's current usage.
    pub fn set_limit(&self, limit: u64) -> Result<(), LimitError> {
        if self.is_root() {
            return Err(LimitError::Root);
        }
        self.inner.counter.set_limit(limit)?;
        Ok(())
    }

    pub fn max_usage(&self) -> u64 {
        self.inner.counter.max_usage()
    }

    /// Resets the high-water mark to the current usage.
    pub fn reset_max_usage(&self) {
        self.inner.counter.reset_max_usage();
    }

    pub fn fail_count(&self) -> u64 {
        self.inner.counter.fail_count()
    }

    pub fn reset_fail_count(&self) {
        self.inner.counter.reset_fail_count();
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.inner.counter.snapshot()
    }

    /// Snapshot of this group and the subtree below it, children sorted by
    /// name.
    pub fn report(&self) -> GroupReport {
        let children: Vec<(String, GroupHandle)> = {
            let children = self.lock_children();
            let mut entries: Vec<(String, GroupHandle)> = children
                .iter()
                .map(|(name, inner)| {
                    (
                        name.clone(),
                        GroupHandle {
                            inner: Arc::clone(inner),
                        },
                    )
                })
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        };

        GroupReport {
            path: self.inner.path.to_string(),
            counter: self.inner.counter.snapshot(),
            subjects: self.inner.subjects.load(Ordering::Relaxed),
            children: children
                .into_iter()
                .map(|(_, child)| child.report())
                .collect(),
        }
    }
}
