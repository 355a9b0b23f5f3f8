//! Best-effort platform measurements. All readers degrade to `None` on
//! non-Linux targets or when `/proc` is restricted, logging the first
//! unexpected failure only.

#[cfg(target_os = "linux")]
use std::sync::OnceLock;

/// Number of file descriptors the current process has open, from
/// `/proc/self/fd`. The directory stream used for the read briefly holds
/// one descriptor of its own; it is excluded from the count.
pub(crate) fn open_fd_count() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let entries = match std::fs::read_dir("/proc/self/fd") {
            Ok(entries) => entries,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    static REPORTED: OnceLock<()> = OnceLock::new();
                    if REPORTED.set(()).is_ok() {
                        tracing::debug!(
                            target = "tally.control",
                            error = %err,
                            "failed to read /proc/self/fd while counting open handles"
                        );
                    }
                }
                return None;
            }
        };
        let count = entries.filter(|entry| entry.is_ok()).count() as u64;
        Some(count.saturating_sub(1))
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Platform open-file ceiling from `/proc/sys/fs/file-max`.
pub(crate) fn file_max() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let raw = match std::fs::read_to_string("/proc/sys/fs/file-max") {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    static REPORTED: OnceLock<()> = OnceLock::new();
                    if REPORTED.set(()).is_ok() {
                        tracing::debug!(
                            target = "tally.control",
                            error = %err,
                            "failed to read /proc/sys/fs/file-max"
                        );
                    }
                }
                return None;
            }
        };
        match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(err) => {
                static REPORTED: OnceLock<()> = OnceLock::new();
                if REPORTED.set(()).is_ok() {
                    tracing::debug!(
                        target = "tally.control",
                        raw = raw.trim(),
                        error = %err,
                        "failed to parse /proc/sys/fs/file-max"
                    );
                }
                None
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Current process resident-set size in bytes.
pub(crate) fn resident_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = sysinfo::System::new();
    if !system.refresh_process(pid) {
        return None;
    }
    system.process(pid).map(|process| process.memory())
}
