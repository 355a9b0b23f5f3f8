use crate::config::ControlConfig;
use crate::controller::{Controller, ResourceKind};
use crate::probe;
use std::sync::Arc;
use tally_hierarchy::{ChargeError, GroupHandle, SubjectAccount, UsageProbe};

/// Accounting page size when no override is configured.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Accounts memory in bytes, charged in whole pages.
///
/// Amounts flowing through this controller are always multiples of the
/// page size; callers work in page counts and the controller converts.
#[derive(Debug, Clone)]
pub struct PagesController {
    inner: Controller,
    page_size: u64,
}

impl PagesController {
    pub fn new(config: &ControlConfig) -> PagesController {
        let page_size = match config.page_size_bytes {
            Some(size) if size > 0 => size,
            Some(_) => {
                tracing::debug!(
                    target = "tally.control",
                    "ignoring zero page-size override"
                );
                DEFAULT_PAGE_SIZE
            }
            None => DEFAULT_PAGE_SIZE,
        };
        let root_limit = config.root_memory_limit_bytes.unwrap_or(u64::MAX);
        PagesController {
            inner: Controller::new(ResourceKind::MemoryPages, root_limit),
            page_size,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.inner
    }

    pub fn root(&self) -> &GroupHandle {
        self.inner.root()
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn bytes_for_pages(&self, pages: u64) -> u64 {
        pages.saturating_mul(self.page_size)
    }

    /// Charges `pages` whole pages through the subject's current group.
    pub fn charge_pages(&self, account: &SubjectAccount, pages: u64) -> Result<(), ChargeError> {
        account.charge(self.bytes_for_pages(pages))
    }

    /// Releases `pages` whole pages through the subject's current group.
    pub fn uncharge_pages(&self, account: &SubjectAccount, pages: u64) {
        account.uncharge(self.bytes_for_pages(pages));
    }

    /// Attaches the current process to `group`, measured by its resident
    /// set rounded up to whole pages.
    pub fn attach_current_process(&self, group: &GroupHandle) -> SubjectAccount {
        self.inner
            .attach_to(group, Arc::new(ResidentPagesProbe::new(self.page_size)))
    }

    pub fn attach(&self, group: &GroupHandle, probe: Arc<dyn UsageProbe>) -> SubjectAccount {
        self.inner.attach_to(group, probe)
    }
}

/// Samples the current process's resident set and rounds it up to whole
/// pages, expressed in bytes. Reads as zero where sampling is unavailable.
#[derive(Debug, Clone, Copy)]
pub struct ResidentPagesProbe {
    page_size: u64,
}

impl ResidentPagesProbe {
    pub fn new(page_size: u64) -> ResidentPagesProbe {
        ResidentPagesProbe {
            page_size: page_size.max(1),
        }
    }
}

impl UsageProbe for ResidentPagesProbe {
    fn current_usage(&self) -> u64 {
        let bytes = probe::resident_bytes().unwrap_or(0);
        bytes.div_ceil(self.page_size).saturating_mul(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_conversion_is_exact_multiples() {
        let controller = PagesController::new(&ControlConfig::default());
        assert_eq!(controller.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(controller.bytes_for_pages(0), 0);
        assert_eq!(controller.bytes_for_pages(3), 3 * DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn zero_page_size_override_falls_back_to_default() {
        let config = ControlConfig {
            page_size_bytes: Some(0),
            ..ControlConfig::default()
        };
        assert_eq!(PagesController::new(&config).page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn resident_probe_reports_whole_pages() {
        let probe = ResidentPagesProbe::new(4096);
        let usage = probe.current_usage();
        assert_eq!(usage % 4096, 0);
    }
}
