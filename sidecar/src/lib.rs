use std::time::Duration;

pub const DEFAULT_COSI_ADDRESS: &str = "/run/cosi/socket";

/// Period of the "still connecting" warning while dialing a driver.
pub const CONNECTION_LOGGING_INTERVAL: Duration = Duration::from_secs(10);

/// Deadline for short calls to the driver.
pub const COSI_CALL_TIMEOUT: Duration = Duration::from_secs(1);

pub mod adapters;
pub mod endpoint;
pub mod error;
pub mod proto;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use endpoint::{Endpoint, Scheme};
pub use error::{ConnectError, EndpointError, ServeError};
pub use transport::{
    Connection, ConnectionManager, ConnectionState, DialOptions, NonBlockingServer,
    ReconnectPolicy, ServerState,
};
