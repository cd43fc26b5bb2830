//! Remote data source boundary.
//!
//! - [`traits`]: [`RemoteSource`], [`Subscription`], [`ReleaseGuard`].
//! - [`memory`]: [`MemorySource`], an in-process backend.

pub mod memory;
pub mod traits;

pub use memory::MemorySource;
pub use traits::{ReleaseGuard, RemoteSource, Subscription, Unsubscribe};
