use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_hierarchy::{GroupHandle, SubjectAccount, UsageProbe};

/// The resource dimensions tally accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Discrete, integral units: one charge per open handle.
    OpenHandles,
    /// Byte amounts, always whole multiples of the page size.
    MemoryPages,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::OpenHandles => "open_handles",
            ResourceKind::MemoryPages => "memory_pages",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binds one resource kind to the root of its hierarchy instance.
///
/// One controller per kind is created at system start; its root group
/// represents the platform ceiling and lives for the process lifetime
/// (init-once, teardown-never).
#[derive(Debug, Clone)]
pub struct Controller {
    kind: ResourceKind,
    root: GroupHandle,
}

impl Controller {
    pub fn new(kind: ResourceKind, root_limit: u64) -> Controller {
        let root = GroupHandle::new_root(root_limit);
        tracing::info!(
            target = "tally.control",
            kind = kind.as_str(),
            root_limit,
            "controller initialized"
        );
        Controller { kind, root }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn root(&self) -> &GroupHandle {
        &self.root
    }

    /// Attaches a subject that has no explicit placement yet; it starts at
    /// the root group.
    pub fn attach(&self, probe: Arc<dyn UsageProbe>) -> SubjectAccount {
        SubjectAccount::attach(&self.root, probe)
    }

    /// Attaches a subject directly to `group`.
    pub fn attach_to(&self, group: &GroupHandle, probe: Arc<dyn UsageProbe>) -> SubjectAccount {
        SubjectAccount::attach(group, probe)
    }
}
