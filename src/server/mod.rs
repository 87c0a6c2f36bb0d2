//! Process assembly: wires the store, bus, engines and HTTP surface for
//! either role.

mod builder;
mod ledger;

pub use builder::*;
pub use ledger::*;
