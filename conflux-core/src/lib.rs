//! Conflux core: reconciles per-title media metadata advertised by
//! rank-ordered file servers into one canonical record per
//! title/season/episode.
//!
//! The engine is built from small, separately testable parts:
//!
//! - [`fetch`] — resilient, cache-aware outbound HTTP
//! - [`availability`] — per-run index of which servers advertise which
//!   field for which title
//! - [`arbiter`] — the pure may-this-server-write-this-field decision
//! - [`store`] — abstract upsert-by-key adapter over the canonical
//!   collection
//! - [`sync`] — one synchronizer per semantic field group
//! - [`bootstrap`] — placeholder creation for newly discovered titles
//! - [`orchestrator`] — per-server run driver
//! - [`verify`] — read-only post-sync audit
#![allow(missing_docs)]

pub mod arbiter;
pub mod availability;
pub mod bootstrap;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod store;
pub mod sync;
pub mod verify;

pub use error::{Result, SyncError};

pub use conflux_config as config;
pub use conflux_model as model;
