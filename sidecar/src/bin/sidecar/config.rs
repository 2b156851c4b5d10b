//! Sidecar configuration
//!
//! Every option can be given on the command line or through the environment.
//! The log filter falls back to `RUST_LOG` when `COSI_LOG_LEVEL` is unset.

use std::env;
use std::time::Duration;

use clap::Parser;
use cosi_sidecar::DEFAULT_COSI_ADDRESS;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "cosi-driver-sidecar",
    about = "Bridges an orchestrator to a COSI driver over gRPC",
    disable_version_flag = true
)]
pub struct SidecarConfig {
    /// Driver endpoint to dial (unix://<path>, tcp://<host:port> or an absolute path)
    #[arg(long, env = "COSI_ADDRESS", default_value = DEFAULT_COSI_ADDRESS)]
    pub cosi_address: String,

    /// Endpoint the built-in mock driver serves on [default: the driver endpoint]
    #[arg(long, env = "COSI_LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Do not serve the built-in mock driver
    #[arg(long, env = "COSI_NO_MOCK_DRIVER")]
    pub no_mock_driver: bool,

    #[arg(long, env = "COSI_DRIVER_NAME", default_value = "testDriver")]
    pub driver_name: String,

    #[arg(long, env = "COSI_DRIVER_VERSION", default_value = "1.0")]
    pub driver_version: String,

    /// Bucket requested from the driver at start-up
    #[arg(long, env = "COSI_BUCKET_NAME", default_value = "testBucket")]
    pub bucket_name: String,

    /// Deprecated and ignored; the driver is dialed until it answers
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub connection_timeout: u64,

    /// Log filter, e.g. `info` or `cosi_sidecar=trace`
    #[arg(long, env = "COSI_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Print version and exit
    #[arg(long)]
    pub version: bool,
}

impl SidecarConfig {
    pub fn listen_address(&self) -> &str {
        self.listen_address.as_deref().unwrap_or(&self.cosi_address)
    }

    pub fn log_filter(&self) -> String {
        self.log_level
            .clone()
            .or_else(|| env::var("RUST_LOG").ok())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        (self.connection_timeout > 0).then(|| Duration::from_secs(self.connection_timeout))
    }
}
