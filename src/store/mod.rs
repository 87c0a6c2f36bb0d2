//! # Versioned Resource Store
//!
//! [`Store`] is the immutable snapshot enforcing identity, version ordering
//! and referential integrity; [`StoreHandle`] serializes mutations against
//! it and publishes the resulting change events.

mod handle;
mod query;
mod snapshot;

pub use handle::*;
pub use query::*;
pub use snapshot::*;
