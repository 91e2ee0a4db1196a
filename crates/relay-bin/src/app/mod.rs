//! Application wiring and lifecycle management.

mod init;
mod metrics_server;
mod shutdown;
mod sink;

pub use init::{run_relay, Relay};
