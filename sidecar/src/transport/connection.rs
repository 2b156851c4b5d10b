//! Resilient client connections to a driver endpoint

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::task::AbortOnDropHandle;
use tonic::transport::{Channel, Endpoint as ChannelEndpoint, Uri};
use tower::service_fn;
use tracing::{debug, info, warn};

use super::dialer::{ConnectionState, ReconnectHook, ReconnectPolicy};
use crate::CONNECTION_LOGGING_INTERVAL;
use crate::adapters::grpc::DriverClient;
use crate::endpoint::{Endpoint, Scheme};
use crate::error::ConnectError;

/// Authority used for local socket channels; never resolved.
const LOCAL_SOCKET_AUTHORITY: &str = "http://[::]:50051";

/// Dial tuning for a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// Period of the "still connecting" warning. Zero disables it.
    pub logging_interval: Duration,
    /// Upper bound of the delay between failed attempts.
    pub max_backoff: Duration,
    /// Give up after the first failed attempt instead of retrying.
    pub fail_fast: bool,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            logging_interval: CONNECTION_LOGGING_INTERVAL,
            max_backoff: Duration::from_secs(1),
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    options: DialOptions,
}

impl ConnectionManager {
    pub fn new(options: DialOptions) -> Self {
        Self { options }
    }

    /// Dial `endpoint` and return once the connection is established.
    ///
    /// Retries until the driver answers unless `fail_fast` is set. There is no
    /// deadline; drop the returned future to give up, which also stops the
    /// background dial.
    ///
    /// `policy` is consulted once each time an established connection is
    /// lost and is only accepted for `unix://` endpoints.
    pub async fn connect(
        &self,
        endpoint: &str,
        policy: Option<ReconnectPolicy>,
    ) -> Result<Connection, ConnectError> {
        let endpoint = Endpoint::parse(endpoint)?;
        if policy.is_some() && !endpoint.is_local_socket() {
            return Err(ConnectError::UnsupportedPolicyTarget(endpoint.to_string()));
        }

        let hook = Arc::new(ReconnectHook::new(
            endpoint.to_string(),
            policy,
            self.options.max_backoff,
        ));

        info!(endpoint = %endpoint, "Connecting to driver");
        let dial = match endpoint.scheme() {
            Scheme::Unix => {
                let path = endpoint.address().to_string();
                let channel_endpoint = ChannelEndpoint::from_static(LOCAL_SOCKET_AUTHORITY);
                tokio::spawn(establish(
                    channel_endpoint,
                    hook.clone(),
                    self.options.fail_fast,
                    move || UnixStream::connect(path.clone()),
                ))
            }
            Scheme::Tcp => {
                let address = endpoint.address().to_string();
                let channel_endpoint =
                    ChannelEndpoint::from_shared(format!("http://{address}"))
                        .map_err(|err| ConnectError::dial(&endpoint, err))?;
                tokio::spawn(establish(
                    channel_endpoint,
                    hook.clone(),
                    self.options.fail_fast,
                    move || TcpStream::connect(address.clone()),
                ))
            }
        };
        let mut dial = AbortOnDropHandle::new(dial);

        let period = self.options.logging_interval;
        let log_progress = !period.is_zero();
        let period = period.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);

        let channel = loop {
            tokio::select! {
                joined = &mut dial => {
                    break joined.map_err(|err| ConnectError::dial(&endpoint, err))??;
                }
                _ = ticker.tick(), if log_progress => {
                    warn!(endpoint = %endpoint, "Still connecting to {}", endpoint);
                }
            }
        };

        Ok(Connection {
            endpoint,
            channel,
            hook,
        })
    }
}

/// Keep building a channel through `hook` until one is up.
async fn establish<C, Fut, IO>(
    channel_endpoint: ChannelEndpoint,
    hook: Arc<ReconnectHook>,
    fail_fast: bool,
    open: C,
) -> Result<Channel, ConnectError>
where
    C: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = io::Result<IO>> + Send + 'static,
    IO: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    loop {
        let connector = {
            let hook = hook.clone();
            let open = open.clone();
            service_fn(move |_: Uri| {
                let hook = hook.clone();
                let open = open.clone();
                async move { hook.attempt(open).await.map(TokioIo::new) }
            })
        };

        match channel_endpoint.connect_with_connector(connector).await {
            Ok(channel) => return Ok(channel),
            Err(err) if fail_fast => return Err(ConnectError::dial(hook.endpoint(), err)),
            Err(err) => {
                debug!(endpoint = %hook.endpoint(), error = %err, "Dial attempt failed, retrying");
            }
        }
    }
}

/// An established channel to a driver.
///
/// Requests issued on a lost connection transparently trigger a reconnect,
/// subject to the reconnect policy given to `connect`.
pub struct Connection {
    endpoint: Endpoint,
    channel: Channel,
    hook: Arc<ReconnectHook>,
}

impl Connection {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.hook.state()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.hook.subscribe()
    }

    pub fn client(&self) -> DriverClient {
        DriverClient::new(self.channel.clone())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}
