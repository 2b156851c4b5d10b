//! Built-in CosiDriver implementation used as a stand-in for a real driver

use tonic::{Request, Response, Status};
use tracing::info;

use crate::proto::{Bucket, CosiDriver, CreateBucketRequest, CreateBucketResponse};

/// Bucket id handed out for every CreateBucket call.
pub const MOCK_BUCKET_ID: &str = "1111111111";

/// Test double answering CreateBucket with a fixed bucket id
#[derive(Debug, Clone)]
pub struct MockDriver {
    name: String,
    version: String,
}

impl MockDriver {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[tonic::async_trait]
impl CosiDriver for MockDriver {
    async fn create_bucket(
        &self,
        request: Request<CreateBucketRequest>,
    ) -> Result<Response<CreateBucketResponse>, Status> {
        if self.name.is_empty() {
            return Err(Status::unavailable("Driver name not configured"));
        }
        if self.version.is_empty() {
            return Err(Status::unavailable("Driver is missing version"));
        }

        let req = request.into_inner();
        info!(
            driver = %self.name,
            version = %self.version,
            bucket = %req.name,
            "Creating bucket"
        );

        Ok(Response::new(CreateBucketResponse {
            bucket: Some(Bucket {
                bucket_id: MOCK_BUCKET_ID.to_string(),
                ..Default::default()
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn request(name: &str) -> Request<CreateBucketRequest> {
        Request::new(CreateBucketRequest {
            name: name.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_create_bucket_returns_fixed_id() {
        let driver = MockDriver::new("testDriver", "1.0");

        let response = driver.create_bucket(request("testBucket")).await.unwrap();

        let bucket = response.into_inner().bucket.unwrap();
        assert_eq!(bucket.bucket_id, MOCK_BUCKET_ID);
    }

    #[tokio::test]
    async fn test_missing_name_is_unavailable() {
        let driver = MockDriver::new("", "1.0");

        let status = driver.create_bucket(request("testBucket")).await.unwrap_err();

        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "Driver name not configured");
    }

    #[tokio::test]
    async fn test_missing_version_is_unavailable() {
        let driver = MockDriver::new("testDriver", "");

        let status = driver.create_bucket(request("testBucket")).await.unwrap_err();

        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "Driver is missing version");
    }
}
