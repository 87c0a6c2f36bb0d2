//! Registry-side node liveness.
//!
//! Every registration or heartbeat refreshes a node's timestamp. The reaper
//! removes nodes that stay silent past the expiry, along with everything
//! registered below them, using ordinary store deletes so subscribers see
//! each removal.

mod health;
pub use health::*;
