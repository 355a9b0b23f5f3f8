//! Hierarchical resource counters.
//!
//! A [`ResourceCounter`] tracks one node's usage of a bounded resource
//! against a limit and links to its parent counter, forming an ancestor
//! chain. Charging walks the whole chain and is all-or-nothing: if any
//! ancestor would exceed its limit, increments already applied below it are
//! rolled back and the chain is left exactly as it was before the call.
//!
//! Counters are resource-agnostic; what a unit means (an open handle, a
//! byte of memory) is decided by the layer that owns them. Each counter
//! carries its own lock, acquired node-by-node during the walk, so long
//! chains under load do not serialize unrelated subtrees.

mod counter;
mod error;

pub use counter::{CounterSnapshot, ResourceCounter};
pub use error::{ChargeError, SetLimitError};
