//! Logging interceptor for unary gRPC calls
//!
//! [`unary`] wraps a single invocation on either side of the wire; servers
//! use [`handle`], which takes the method from the request route. Method
//! names are logged at debug level, payloads at trace level with every
//! sensitive field replaced by [`STRIPPED`], failures at error level. The
//! wrapped call sees the original request and its result is returned as is.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tonic::{Request, Response, Status};
use tracing::{debug, error, trace};

use crate::proto::{Bucket, CreateBucketRequest, CreateBucketResponse};

/// Replacement for sensitive values in logged messages.
pub const STRIPPED: &str = "***stripped***";

/// Messages that may carry secrets.
///
/// Implementations blank out their sensitive fields; the default keeps the
/// message unchanged.
pub trait StripSecrets: Clone + fmt::Debug {
    fn strip_secrets(&mut self) {}
}

impl StripSecrets for CreateBucketRequest {
    fn strip_secrets(&mut self) {
        strip_values(&mut self.secrets);
    }
}

impl StripSecrets for CreateBucketResponse {}

impl StripSecrets for Bucket {}

fn strip_values(map: &mut HashMap<String, String>) {
    for value in map.values_mut() {
        *value = STRIPPED.to_string();
    }
}

/// Display adapter that formats a sanitized copy of a message.
pub struct Redacted<'a, T>(pub &'a T);

impl<T: StripSecrets> fmt::Display for Redacted<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sanitized = self.0.clone();
        sanitized.strip_secrets();
        write!(f, "{sanitized:?}")
    }
}

/// Route of an incoming call, attached by the server's route layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRoute(pub String);

const UNKNOWN_ROUTE: &str = "<unknown>";

/// Server side of [`unary`]: the logged method is the route the call came in on.
pub async fn handle<Req, Resp, F, Fut>(request: Request<Req>, handler: F) -> Result<Response<Resp>, Status>
where
    Req: StripSecrets,
    Resp: StripSecrets,
    F: FnOnce(Request<Req>) -> Fut,
    Fut: Future<Output = Result<Response<Resp>, Status>>,
{
    let method = request
        .extensions()
        .get::<CallRoute>()
        .map_or_else(|| UNKNOWN_ROUTE.to_string(), |route| route.0.clone());
    unary(&method, request, handler).await
}

/// Run `call` with logging around it.
pub async fn unary<Req, Resp, F, Fut>(
    method: &str,
    request: Request<Req>,
    call: F,
) -> Result<Response<Resp>, Status>
where
    Req: StripSecrets,
    Resp: StripSecrets,
    F: FnOnce(Request<Req>) -> Fut,
    Fut: Future<Output = Result<Response<Resp>, Status>>,
{
    debug!(method, "GRPC call");
    trace!(method, request = %Redacted(request.get_ref()), "GRPC request");

    let result = call(request).await;

    match &result {
        Ok(response) => {
            trace!(method, response = %Redacted(response.get_ref()), "GRPC response");
        }
        Err(status) => {
            error!(method, code = ?status.code(), message = status.message(), "GRPC error");
        }
    }
    result
}
