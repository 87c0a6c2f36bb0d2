mod common;
pub(crate) use common::*;
