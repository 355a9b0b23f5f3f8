//! Per-resource controllers.
//!
//! A [`Controller`] binds one resource kind to the root of its accounting
//! hierarchy and attaches subjects with a kind-appropriate measurement
//! probe. Two kinds are modeled: open file handles (discrete units) and
//! memory (byte amounts charged in whole pages).
//!
//! Controllers are created once at system start and their root groups live
//! for the process lifetime; the administrative surface that would expose
//! limits and usage as readable/writable attributes lives outside this
//! crate and consumes [`GroupHandle`](tally_hierarchy::GroupHandle) and
//! [`GroupReport`](tally_hierarchy::GroupReport) directly.
//!
//! Platform measurements (`/proc` reads, resident-set sampling) are
//! best-effort: where they are unavailable the probes read as zero usage.

mod config;
mod controller;
mod files;
mod pages;
mod probe;

pub use config::ControlConfig;
pub use controller::{Controller, ResourceKind};
pub use files::{FilesController, OpenHandleProbe};
pub use pages::{PagesController, ResidentPagesProbe, DEFAULT_PAGE_SIZE};
