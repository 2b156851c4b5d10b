//! Connection loss and recovery against a real server

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cosi_sidecar::adapters::grpc::{DriverClient, MOCK_BUCKET_ID, MockDriver};
use cosi_sidecar::proto::{CosiDriver, CreateBucketRequest, CreateBucketResponse};
use cosi_sidecar::{
    ConnectError, ConnectionManager, ConnectionState, NonBlockingServer, ReconnectPolicy,
};
use tempfile::TempDir;
use tonic::{Request, Response, Status};

const DEADLINE: Duration = Duration::from_secs(5);

/// Mock driver that counts the calls it serves
#[derive(Clone)]
struct CountingDriver {
    inner: MockDriver,
    calls: Arc<AtomicUsize>,
}

impl CountingDriver {
    fn new() -> Self {
        Self {
            inner: MockDriver::new("testDriver", "1.0"),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl CosiDriver for CountingDriver {
    async fn create_bucket(
        &self,
        request: Request<CreateBucketRequest>,
    ) -> Result<Response<CreateBucketResponse>, Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_bucket(request).await
    }
}

fn counting_policy(answer: bool) -> (ReconnectPolicy, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let policy: ReconnectPolicy = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        answer
    });
    (policy, calls)
}

fn bucket_request() -> CreateBucketRequest {
    CreateBucketRequest {
        name: "testBucket".to_string(),
        ..Default::default()
    }
}

fn start(endpoint: &str, driver: CountingDriver) -> NonBlockingServer {
    let mut server = NonBlockingServer::new();
    server.start(endpoint, Some(driver));
    server
}

async fn shut_down(mut server: NonBlockingServer) {
    server.stop();
    server.wait().await.unwrap();
    // let the client notice the closed connection
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Retry until the call succeeds, as a caller riding out a restart would.
async fn create_bucket_eventually(client: &DriverClient) -> CreateBucketResponse {
    let mut last = None;
    for _ in 0..50 {
        match client.create_bucket(bucket_request(), DEADLINE).await {
            Ok(response) => return response,
            Err(status) => {
                assert!(
                    !ConnectError::is_reconnect_disabled_status(&status),
                    "policy allowed the reconnect: {status:?}"
                );
                last = Some(status);
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("call never succeeded, last error: {last:?}");
}

#[tokio::test]
async fn test_reconnects_after_server_restart() {
    let dir = TempDir::new().unwrap();
    let endpoint = format!("unix://{}", dir.path().join("cosi.sock").display());
    let (policy, asked) = counting_policy(true);

    let first = CountingDriver::new();
    let server = start(&endpoint, first.clone());
    let connection = ConnectionManager::default()
        .connect(&endpoint, Some(policy))
        .await
        .unwrap();
    let client = connection.client();
    client.create_bucket(bucket_request(), DEADLINE).await.unwrap();
    assert_eq!(first.calls(), 1);

    shut_down(server).await;
    let second = CountingDriver::new();
    let server = start(&endpoint, second.clone());

    let response = create_bucket_eventually(&client).await;

    assert_eq!(response.bucket.unwrap().bucket_id, MOCK_BUCKET_ID);
    assert!(second.calls() >= 1);
    assert_eq!(connection.state(), ConnectionState::Connected);
    assert_eq!(asked.load(Ordering::SeqCst), 1, "one loss, one question");

    shut_down(server).await;
}

#[tokio::test]
async fn test_vetoed_reconnect_never_reaches_new_server() {
    let dir = TempDir::new().unwrap();
    let endpoint = format!("unix://{}", dir.path().join("cosi.sock").display());
    let (policy, asked) = counting_policy(false);

    let server = start(&endpoint, CountingDriver::new());
    let connection = ConnectionManager::default()
        .connect(&endpoint, Some(policy))
        .await
        .unwrap();
    let client = connection.client();
    client.create_bucket(bucket_request(), DEADLINE).await.unwrap();
    let mut states = connection.state_changes();

    shut_down(server).await;
    let replacement = CountingDriver::new();
    let server = start(&endpoint, replacement.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    for _ in 0..3 {
        let status = client
            .create_bucket(bucket_request(), DEADLINE)
            .await
            .unwrap_err();
        assert!(
            matches!(status.code(), tonic::Code::Unavailable | tonic::Code::Unknown),
            "unexpected status: {status:?}"
        );
        assert!(
            ConnectError::is_reconnect_disabled_status(&status),
            "veto not reported: {status:?}"
        );
    }

    assert_eq!(replacement.calls(), 0);
    assert!(states.has_changed().unwrap(), "loss was never published");
    assert_eq!(*states.borrow_and_update(), ConnectionState::Lost);
    assert_eq!(connection.state(), ConnectionState::Lost);
    assert_eq!(asked.load(Ordering::SeqCst), 1);

    shut_down(server).await;
}

#[tokio::test]
async fn test_connect_waits_for_late_server() {
    let dir = TempDir::new().unwrap();
    let endpoint = format!("unix://{}", dir.path().join("late.sock").display());

    let late = endpoint.clone();
    let server = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        start(&late, CountingDriver::new())
    });

    let connection = ConnectionManager::default().connect(&endpoint, None).await.unwrap();
    let response = connection
        .client()
        .create_bucket(bucket_request(), DEADLINE)
        .await
        .unwrap();

    assert_eq!(response.bucket.unwrap().bucket_id, MOCK_BUCKET_ID);
    assert_eq!(connection.state(), ConnectionState::Connected);

    shut_down(server.await.unwrap()).await;
}
