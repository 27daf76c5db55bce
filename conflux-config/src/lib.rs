//! Configuration loading and validation for Conflux.
//!
//! Settings layer a TOML file under `CONFLUX__`-prefixed environment
//! variables. Validation happens eagerly at load time; in particular,
//! two servers declaring the same priority is a configuration error
//! rather than a silent tie-break, because field arbitration would
//! otherwise become order-of-execution dependent.
#![allow(missing_docs)]

mod error;
mod loader;
mod models;

pub use error::{ConfigError, Result};
pub use loader::{load, load_from_path};
pub use models::{
    CacheSettings, ConfluxSettings, FetchSettings, RetrySettings,
    SyncSettings,
};
