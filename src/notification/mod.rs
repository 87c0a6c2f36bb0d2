//! # Subscription & Notification Engine
//!
//! Query-side delivery of store changes to long-lived connections.
//!
//! ```text
//! EventBus -> dispatcher -> per-subscription filter -> per-connection session
//!                                                          |  coalesces into
//!                                                          v  one grain per window
//!                                                      websocket
//! ```
//!
//! A connection first receives one grain holding the current matching
//! collection. After that every change event whose topic is the
//! subscription's collection and which passes the subscription's filter is
//! queued on each of its connections. A session never sends more than one
//! grain per `max_update_rate_ms`; updates arriving inside the window are
//! merged into the next grain, never dropped.

mod engine;
mod filter;
mod grain;
mod session;
mod subscription;

pub use engine::*;
pub use filter::*;
pub use grain::*;
pub use subscription::*;

#[cfg(test)]
mod engine_test;
#[cfg(test)]
mod session_test;
