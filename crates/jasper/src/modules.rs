//! Modules are the interface between the command processor and the outside world: the trace it
//! consumes and the units it drives.

pub mod trace;
pub mod units;
