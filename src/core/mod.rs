//! Core building blocks shared by the material subsystem.
//!
//! - [`ObjectsRegistry`] - Memoizing get-or-create cache
//! - [`MaterialDirtyBits`] - Change tracking for material sync

mod cache;
mod dirty;

pub use cache::*;
pub use dirty::*;
