//! Transport layer
//!
//! - `connection`: client side, dials a driver and keeps the channel usable
//! - `dialer`: per-attempt hook deciding whether to reconnect after a loss
//! - `server`: background gRPC server with graceful and forced stop
//! - `unix_socket`: socket file preparation and cleanup

pub mod connection;
pub mod dialer;
pub mod server;
pub mod unix_socket;

pub use connection::{Connection, ConnectionManager, DialOptions};
pub use dialer::{ConnectionState, ReconnectHook, ReconnectPolicy};
pub use server::{NonBlockingServer, ServerState};
