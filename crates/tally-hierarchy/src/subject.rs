use crate::error::MigrationError;
use crate::group::GroupHandle;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use tally_counter::ChargeError;

/// Measures a subject's current concrete usage of one resource kind.
///
/// This is the capability bound at attachment time: counting a process's
/// open descriptors, sampling its resident pages, or reading a test
/// fixture's atomic. Implementations must be safe to call concurrently.
pub trait UsageProbe: Send + Sync {
    /// Current concrete usage, in the same units the subject charges in.
    fn current_usage(&self) -> u64;
}

/// A subject's live association with an accounting group, one per resource
/// dimension.
///
/// While held it keeps the group from being destroyed; it does not pin the
/// group's position in the tree. The association lock serializes the
/// subject's own charge/uncharge traffic with [`migrate`](Self::migrate),
/// so a migration can never double-count usage the subject is changing
/// concurrently.
pub struct SubjectAccount {
    probe: Arc<dyn UsageProbe>,
    group: Mutex<GroupHandle>,
}

impl std::fmt::Debug for SubjectAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectAccount")
            .field("group", &self.lock_group().path())
            .finish()
    }
}

impl SubjectAccount {
    /// Attaches a subject to `group` with the probe measuring it.
    pub fn attach(group: &GroupHandle, probe: Arc<dyn UsageProbe>) -> SubjectAccount {
        group.inner.subjects.fetch_add(1, Ordering::SeqCst);
        SubjectAccount {
            probe,
            group: Mutex::new(group.clone()),
        }
    }

    fn lock_group(&self) -> MutexGuard<'_, GroupHandle> {
        self.group.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// The subject's current group.
    pub fn group(&self) -> GroupHandle {
        self.lock_group().clone()
    }

    /// Charges a resource-allocation attempt through the current group's
    /// ancestor chain. Denial means the underlying allocation must be
    /// refused.
    pub fn charge(&self, amount: u64) -> Result<(), ChargeError> {
        self.lock_group().charge(amount)
    }

    /// Releases previously charged usage through the current group.
    pub fn uncharge(&self, amount: u64) {
        self.lock_group().uncharge(amount);
    }

    /// Pre-check: would `target` currently absorb this subject's measured
    /// usage?
    ///
    /// Informational only — nothing is reserved, and the subject's usage
    /// may change before a later [`migrate`](Self::migrate). A migration
    /// admitted here can therefore still overcommit relative to this
    /// answer; the system then denies further allocation until usage
    /// drops.
    pub fn attempt_admission(&self, target: &GroupHandle) -> bool {
        target.margin() >= self.probe.current_usage()
    }

    /// Moves this subject's accounted usage to `target`.
    ///
    /// Measures the subject, charges the target chain, and only then
    /// uncharges the source and swaps the group reference. If any target
    /// ancestor refuses the charge, nothing changes: the subject stays
    /// fully attached to its source group and every counter is as before
    /// the call. Migrating to the current group is a no-op.
    pub fn migrate(&self, target: &GroupHandle) -> Result<(), MigrationError> {
        let mut current = self.lock_group();
        if current.same_group(target) {
            return Ok(());
        }

        let amount = self.probe.current_usage();
        target.charge(amount)?;
        current.uncharge(amount);

        target.inner.subjects.fetch_add(1, Ordering::SeqCst);
        current.inner.subjects.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(
            target = "tally.hierarchy",
            from = %current.path(),
            to = %target.path(),
            amount,
            "subject migrated"
        );
        *current = target.clone();
        Ok(())
    }
}

impl Drop for SubjectAccount {
    fn drop(&mut self) {
        self.lock_group().inner.subjects.fetch_sub(1, Ordering::SeqCst);
    }
}
