use tally_counter::{ChargeError, SetLimitError};
use thiserror::Error;

/// Group creation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("group '{parent}' already has a child named '{name}'")]
    AlreadyExists { parent: String, name: String },
    #[error("'{0}' is not a valid group name")]
    InvalidName(String),
}

/// Group destruction was refused. None of these corrupt any state; the
/// caller migrates subjects out (or destroys descendants first) and retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestroyError {
    #[error("group has no child named '{0}'")]
    NotFound(String),
    #[error("group '{path}' still accounts {usage} units")]
    NotEmpty { path: String, usage: u64 },
    #[error("group '{path}' still has child groups")]
    HasChildren { path: String },
    #[error("group '{path}' still has attached subjects")]
    Busy { path: String },
}

/// A limit write on a group was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("the root group's limit is the platform ceiling and is not adjustable")]
    Root,
    #[error(transparent)]
    BelowUsage(#[from] SetLimitError),
}

/// Migration failed; the subject remains fully attached to its source
/// group and every counter is exactly as before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("target group cannot absorb the subject's usage: {0}")]
    LimitExceeded(#[from] ChargeError),
}
