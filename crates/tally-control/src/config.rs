use serde::{Deserialize, Serialize};

/// Controller configuration, deserialized from the embedding application's
/// configuration. Every field is optional; the default is the platform
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Root ceiling for open handles. Defaults to the platform open-file
    /// maximum (`/proc/sys/fs/file-max` where available).
    pub root_handles_limit: Option<u64>,
    /// Root ceiling for memory, in bytes. Defaults to unbounded.
    pub root_memory_limit_bytes: Option<u64>,
    /// Accounting page size override, in bytes. Defaults to 4 KiB.
    pub page_size_bytes: Option<u64>,
}
