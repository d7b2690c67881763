//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`hash_raw`] / [`hash_slice`] - Raw byte hashing for cache keys
//! - [`init_tracing`] - Logging setup

mod error;
mod hash;
mod logging;

pub use error::*;
pub use hash::*;
pub use logging::*;
