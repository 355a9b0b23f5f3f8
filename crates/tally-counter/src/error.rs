use std::sync::Arc;
use thiserror::Error;

/// A charge was denied by a specific node in the ancestor chain.
///
/// The denying node's counters are untouched apart from its `fail_count`;
/// every other node in the chain is left exactly as before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChargeError {
    #[error("charge of {amount} denied by '{node}': usage {usage} + {amount} exceeds limit {limit}")]
    LimitExceeded {
        /// Label of the limiting ancestor (the group path that owns it).
        node: Arc<str>,
        usage: u64,
        limit: u64,
        amount: u64,
    },
}

impl ChargeError {
    /// Label of the node that denied the charge.
    pub fn node(&self) -> &str {
        match self {
            ChargeError::LimitExceeded { node, .. } => node,
        }
    }
}

/// A limit write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SetLimitError {
    #[error("limit {requested} is below current usage {usage}")]
    BelowUsage { requested: u64, usage: u64 },
}
