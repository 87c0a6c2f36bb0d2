//! Discovery and registration for networked media devices.
//!
//! A node owns a [`Store`] describing itself, finds a registry over mDNS
//! and keeps that registry's copy in step. A registry accepts those
//! registrations, expires silent nodes and streams filtered changes to
//! subscribers. See [`LedgerBuilder`] for assembling either role.

pub mod api;
mod bus;
mod config;
pub mod constants;
mod errors;
pub mod metrics;
mod model;
mod notification;
mod registration;
mod registry;
mod server;
mod store;
pub(crate) mod utils;

pub use bus::*;
pub use config::*;
pub use errors::*;
pub use model::*;
pub use notification::*;
pub use registration::*;
pub use registry::*;
pub use server::*;
pub use store::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod errors_test;
