//! Route-level middleware for the gRPC server
//!
//! Applied to the whole router, so it sees every call regardless of the
//! service or method it targets, including calls nothing is registered for.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio_util::sync::CancellationToken;
use tonic::Status;
use tonic::body::Body;
use tonic::codegen::http;
use tower::{Layer, Service};
use tracing::warn;

use super::interceptor::CallRoute;

/// Tags each request with its route and aborts pending calls once `abort`
/// is cancelled.
#[derive(Debug, Clone)]
pub struct RouteLayer {
    abort: CancellationToken,
}

impl RouteLayer {
    pub fn new(abort: CancellationToken) -> Self {
        Self { abort }
    }
}

impl<S> Layer<S> for RouteLayer {
    type Service = RouteService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteService {
            inner,
            abort: self.abort.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteService<S> {
    inner: S,
    abort: CancellationToken,
}

impl<S, B> Service<http::Request<B>> for RouteService<S>
where
    S: Service<http::Request<B>, Response = http::Response<Body>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        let route = request.uri().path().to_string();
        request.extensions_mut().insert(CallRoute(route.clone()));
        let call = self.inner.call(request);
        let abort = self.abort.clone();

        Box::pin(async move {
            tokio::select! {
                response = call => response,
                _ = abort.cancelled() => {
                    warn!(method = %route, "Aborting in-flight call");
                    Ok(Status::aborted("server is shutting down").into_http())
                }
            }
        })
    }
}
