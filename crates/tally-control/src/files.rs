use crate::config::ControlConfig;
use crate::controller::{Controller, ResourceKind};
use crate::probe;
use std::sync::Arc;
use tally_hierarchy::{GroupHandle, SubjectAccount, UsageProbe};

/// Root ceiling used when the platform maximum cannot be read.
const FALLBACK_ROOT_HANDLES_LIMIT: u64 = 1 << 20;

/// Accounts open file handles, one unit per descriptor.
#[derive(Debug, Clone)]
pub struct FilesController {
    inner: Controller,
}

impl FilesController {
    /// The root ceiling is the configured override if any, otherwise the
    /// platform open-file maximum.
    pub fn new(config: &ControlConfig) -> FilesController {
        let root_limit = config
            .root_handles_limit
            .or_else(probe::file_max)
            .unwrap_or(FALLBACK_ROOT_HANDLES_LIMIT);
        FilesController {
            inner: Controller::new(ResourceKind::OpenHandles, root_limit),
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.inner
    }

    pub fn root(&self) -> &GroupHandle {
        self.inner.root()
    }

    /// Attaches the current process to `group`, measured by its live
    /// descriptor count.
    pub fn attach_current_process(&self, group: &GroupHandle) -> SubjectAccount {
        self.inner.attach_to(group, Arc::new(OpenHandleProbe))
    }

    pub fn attach(&self, group: &GroupHandle, probe: Arc<dyn UsageProbe>) -> SubjectAccount {
        self.inner.attach_to(group, probe)
    }
}

/// Counts the current process's open descriptors via `/proc/self/fd`.
///
/// Best-effort: a restricted or missing `/proc` reads as zero usage, so
/// admission pre-checks pass and migration moves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenHandleProbe;

impl UsageProbe for OpenHandleProbe {
    fn current_usage(&self) -> u64 {
        probe::open_fd_count().unwrap_or(0)
    }
}
