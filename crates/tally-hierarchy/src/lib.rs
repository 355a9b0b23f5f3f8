//! Accounting group hierarchies.
//!
//! An [`AccountingGroup`] owns one [`ResourceCounter`] and sits in a tree:
//! parents hold strong references to their children, children hold only a
//! weak back-reference, so destruction can only proceed bottom-up. Charges
//! issued through a group propagate to every ancestor via the counter
//! chain.
//!
//! Subjects (processes, file owners, anything that consumes the resource)
//! hold a [`SubjectAccount`]: one live group reference per resource
//! dimension plus a [`UsageProbe`] capability that measures the subject's
//! concrete usage. [`SubjectAccount::migrate`] moves the already-accounted
//! quantity to another group without double-counting or leaking capacity:
//! it charges the target chain first and aborts, leaving all counters
//! untouched, if any target ancestor refuses.

mod error;
mod group;
mod subject;

pub use error::{CreateError, DestroyError, LimitError, MigrationError};
pub use group::{AccountingGroup, GroupHandle, GroupReport};
pub use subject::{SubjectAccount, UsageProbe};

pub use tally_counter::{ChargeError, CounterSnapshot, ResourceCounter, SetLimitError};
