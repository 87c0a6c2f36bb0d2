//! # Discovery & Registration Lifecycle
//!
//! Node-side machinery that finds a registry over multicast DNS, pushes the
//! node's resources to it and keeps the registration alive.
//!
//! - [`RegistrationState`] is a pure state machine: typed events in, actions
//!   out. It never touches the network or the clock.
//! - [`RegistrationLifecycle`] owns the state machine, the timers and the
//!   bus listener, and performs the actions through the [`ServiceDiscovery`]
//!   and [`RegistryClient`] seams.
//!
//! Failures never escape this module. Any rejected push, transport error or
//! missed heartbeat moves the lifecycle to `Disconnected`, and discovery is
//! restarted after a fixed delay.

mod client;
mod discovery;
mod lifecycle;
mod mdns;
mod state;

pub use client::*;
pub use discovery::*;
pub use lifecycle::*;
pub use mdns::*;
pub use state::*;

#[cfg(test)]
mod state_test;
