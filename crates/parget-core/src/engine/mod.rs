//! The concurrent transfer engine: a coordinator fanning out one
//! worker per byte range over a shared, pre-sized output file.

mod coordinator;
mod range_worker;

pub use coordinator::*;
pub use range_worker::RangeOutcome;
