//! COSI driver sidecar
//!
//! Serves the built-in mock driver, dials the driver endpoint, creates the
//! configured bucket and prints its id.

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use cosi_sidecar::adapters::grpc::MockDriver;
use cosi_sidecar::proto::CreateBucketRequest;
use cosi_sidecar::{COSI_CALL_TIMEOUT, ConnectionManager, NonBlockingServer, ServeError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::SidecarConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    let config = SidecarConfig::parse();

    if config.version {
        let program = env::args().next().unwrap_or_else(|| "cosi-driver-sidecar".to_string());
        println!("{program} {VERSION}");
        return ExitCode::SUCCESS;
    }

    init_tracing(&config.log_filter());
    info!(version = VERSION, "Starting COSI driver sidecar");

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("Invalid log filter {filter:?} ({err}), using info");
        EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: &SidecarConfig) -> Result<()> {
    if let Some(timeout) = config.connection_timeout() {
        warn!(
            timeout_secs = timeout.as_secs(),
            "--connection-timeout is deprecated and will have no effect"
        );
    }

    let mut server = NonBlockingServer::new();
    let serving = !config.no_mock_driver;
    if serving {
        let driver = MockDriver::new(&config.driver_name, &config.driver_version);
        server.start(config.listen_address(), Some(driver));
    }

    let mut server_ended = !serving;
    let outcome = tokio::select! {
        outcome = create_bucket(config) => outcome,
        served = server.wait(), if serving => {
            server_ended = true;
            Err(server_exit(served))
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    if !server_ended {
        server.stop();
        if let Err(err) = server.wait().await {
            warn!(error = %err, "gRPC server did not stop cleanly");
        }
    }

    outcome
}

async fn create_bucket(config: &SidecarConfig) -> Result<()> {
    debug!(endpoint = %config.cosi_address, "Attempting to open a gRPC connection");
    let connection = ConnectionManager::default()
        .connect(&config.cosi_address, None)
        .await
        .with_context(|| format!("error connecting to COSI driver at {}", config.cosi_address))?;

    debug!(bucket = %config.bucket_name, "Calling COSI driver to create bucket");
    let request = CreateBucketRequest {
        name: config.bucket_name.clone(),
        ..Default::default()
    };
    let response = connection
        .client()
        .create_bucket(request, COSI_CALL_TIMEOUT)
        .await
        .context("error calling COSI CreateBucket")?;

    let Some(bucket) = response.bucket else {
        bail!("COSI CreateBucket returned no bucket");
    };
    info!(bucket = %config.bucket_name, bucket_id = %bucket.bucket_id, "COSI CreateBucket succeeded");
    println!("{}", bucket.bucket_id);
    Ok(())
}

fn server_exit(served: Result<(), ServeError>) -> anyhow::Error {
    match served {
        Ok(()) => anyhow!("gRPC server stopped unexpectedly"),
        Err(err) => anyhow::Error::new(err).context("gRPC server failed"),
    }
}
