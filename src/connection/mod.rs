//! Running RTT connections
//!
//! [`LiveConnection`] wires a probe, a wire decoder, a configuration and a set of sinks
//! into a running pipeline. [`CommandHandle`] carries out-of-band commands to its
//! connection manager.

pub mod commands;
pub mod live;


pub use commands::{Command, CommandHandle};
pub use live::LiveConnection;
