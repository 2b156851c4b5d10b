//! Non-blocking gRPC server lifecycle
//!
//! [`NonBlockingServer::start`] returns immediately; binding and serving
//! happen on a background task. Setup failures end that task and are
//! reported by [`NonBlockingServer::wait`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{error, info, warn};

use super::unix_socket;
use crate::adapters::grpc::{RouteLayer, interceptor};
use crate::endpoint::{Endpoint, Scheme};
use crate::error::ServeError;
use crate::proto::{CosiDriver, CosiDriverServer, CreateBucketRequest, CreateBucketResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    Created,
    Serving,
    GracefulStopping,
    ForceStopped,
    Stopped,
}

pub struct NonBlockingServer {
    endpoint: String,
    graceful: CancellationToken,
    force: CancellationToken,
    state: Arc<watch::Sender<ServerState>>,
    task: Option<JoinHandle<Result<(), ServeError>>>,
    started: bool,
}

impl NonBlockingServer {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        Self {
            endpoint: String::new(),
            graceful: CancellationToken::new(),
            force: CancellationToken::new(),
            state: Arc::new(state),
            task: None,
            started: false,
        }
    }

    /// Start serving `driver` on `endpoint` in the background.
    ///
    /// With no driver nothing is registered and every call is answered with
    /// `Unimplemented`. A server can be started once.
    pub fn start<D: CosiDriver>(&mut self, endpoint: &str, driver: Option<D>) {
        if self.started {
            warn!(
                endpoint = %endpoint,
                running = %self.endpoint,
                "gRPC server already started, ignoring start request"
            );
            return;
        }
        self.started = true;
        self.endpoint = endpoint.to_string();

        self.task = Some(tokio::spawn(serve(
            endpoint.to_string(),
            driver,
            self.graceful.clone(),
            self.force.clone(),
            self.state.clone(),
        )));
    }

    /// Wait for the serving task to end.
    ///
    /// Cancel safe: dropping the returned future keeps the task, so a later
    /// call still waits for it.
    pub async fn wait(&mut self) -> Result<(), ServeError> {
        let Some(task) = self.task.as_mut() else {
            return Err(ServeError::NotStarted);
        };
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(err) => {
                error!(endpoint = %self.endpoint, error = %err, "gRPC serving task failed");
                Err(ServeError::Panicked {
                    endpoint: self.endpoint.clone(),
                })
            }
        }
    }

    /// Stop accepting connections and let in-flight calls complete.
    pub fn stop(&self) {
        info!(endpoint = %self.endpoint, "Stopping gRPC server");
        self.transition(ServerState::GracefulStopping);
        self.graceful.cancel();
    }

    /// Stop immediately, aborting in-flight calls.
    pub fn force_stop(&self) {
        warn!(endpoint = %self.endpoint, "Force stopping gRPC server");
        self.transition(ServerState::ForceStopped);
        self.force.cancel();
        self.graceful.cancel();
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    fn transition(&self, next: ServerState) {
        self.state.send_if_modified(|state| {
            let allowed = match next {
                ServerState::GracefulStopping => {
                    matches!(*state, ServerState::Created | ServerState::Serving)
                }
                ServerState::ForceStopped => !matches!(*state, ServerState::Stopped),
                _ => false,
            };
            if allowed {
                *state = next;
            }
            allowed
        });
    }
}

impl Default for NonBlockingServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn serve<D: CosiDriver>(
    raw: String,
    driver: Option<D>,
    graceful: CancellationToken,
    force: CancellationToken,
    state: Arc<watch::Sender<ServerState>>,
) -> Result<(), ServeError> {
    let result = run(&raw, driver, graceful, force, &state).await;
    match &result {
        Ok(()) => info!(endpoint = %raw, "gRPC server stopped"),
        Err(err) => error!(endpoint = %raw, error = %err, "gRPC server failed"),
    }
    state.send_replace(ServerState::Stopped);
    result
}

async fn run<D: CosiDriver>(
    raw: &str,
    driver: Option<D>,
    graceful: CancellationToken,
    force: CancellationToken,
    state: &watch::Sender<ServerState>,
) -> Result<(), ServeError> {
    let endpoint = Endpoint::parse(raw)?;

    if driver.is_none() {
        warn!(endpoint = %endpoint, "No driver registered, calls will be answered with Unimplemented");
    }
    let service = driver.map(|inner| CosiDriverServer::new(InterceptedDriver { inner }));
    let router = Server::builder()
        .layer(RouteLayer::new(force.clone()))
        .add_optional_service(service);
    let shutdown = graceful.cancelled_owned();

    let served = match endpoint.scheme() {
        Scheme::Unix => {
            let path = Path::new(endpoint.address());
            let listener = unix_socket::bind(path)?;
            mark_serving(state, &endpoint);

            let served = until_forced(
                router.serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown),
                &force,
            )
            .await;
            unix_socket::cleanup(path);
            served
        }
        Scheme::Tcp => {
            let listener = TcpListener::bind(endpoint.address())
                .await
                .map_err(|source| ServeError::Bind {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            mark_serving(state, &endpoint);

            until_forced(
                router.serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown),
                &force,
            )
            .await
        }
    };

    served.map_err(|source| ServeError::Serve {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn mark_serving(state: &watch::Sender<ServerState>, endpoint: &Endpoint) {
    state.send_if_modified(|state| {
        let created = *state == ServerState::Created;
        if created {
            *state = ServerState::Serving;
        }
        created
    });
    info!(endpoint = %endpoint, "gRPC server listening");
}

async fn until_forced<F>(
    serving: F,
    force: &CancellationToken,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = Result<(), tonic::transport::Error>>,
{
    tokio::select! {
        result = serving => result,
        _ = force.cancelled() => Ok(()),
    }
}

/// Registered in place of the driver so every call is logged.
struct InterceptedDriver<D> {
    inner: D,
}

#[tonic::async_trait]
impl<D: CosiDriver> CosiDriver for InterceptedDriver<D> {
    async fn create_bucket(
        &self,
        request: Request<CreateBucketRequest>,
    ) -> Result<Response<CreateBucketResponse>, Status> {
        interceptor::handle(request, |req| self.inner.create_bucket(req)).await
    }
}
