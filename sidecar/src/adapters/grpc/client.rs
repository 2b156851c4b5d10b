//! Client side of the CosiDriver service
//!
//! Every outgoing call goes through the same logging interceptor as the
//! server side and carries an explicit deadline.

use std::time::Duration;

use tonic::transport::Channel;
use tonic::{Request, Status};

use super::interceptor;
use crate::proto::{CREATE_BUCKET, CosiDriverClient, CreateBucketRequest, CreateBucketResponse};

#[derive(Debug, Clone)]
pub struct DriverClient {
    inner: CosiDriverClient<Channel>,
}

impl DriverClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: CosiDriverClient::new(channel),
        }
    }

    /// Call CreateBucket, giving up with `DeadlineExceeded` after `deadline`.
    ///
    /// The deadline is also sent to the driver as `grpc-timeout`.
    pub async fn create_bucket(
        &self,
        request: CreateBucketRequest,
        deadline: Duration,
    ) -> Result<CreateBucketResponse, Status> {
        let mut client = self.inner.clone();
        let mut request = Request::new(request);
        request.set_timeout(deadline);

        let response = interceptor::unary(CREATE_BUCKET, request, |req| async move {
            match tokio::time::timeout(deadline, client.create_bucket(req)).await {
                Ok(result) => result,
                Err(_) => Err(Status::deadline_exceeded(format!(
                    "{CREATE_BUCKET} did not complete within {deadline:?}"
                ))),
            }
        })
        .await?;

        Ok(response.into_inner())
    }
}
